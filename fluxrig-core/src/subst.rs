//! Placeholder Substitution
//!
//! Scope labels and string overrides in scripts may reference context
//! variables as `{{KEY}}`. Substitution happens when the enclosing node
//! executes, against the live context.

use crate::value::display_value;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").unwrap())
}

fn residual_re() -> &'static Regex {
    static RESIDUAL_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    RESIDUAL_RE.get_or_init(|| Regex::new(r"\{\{[^}]*\}\}").unwrap())
}

/// Replace every `{{KEY}}` whose key resolves; unresolved tokens are kept verbatim.
pub fn substitute<'v>(template: &str, lookup: impl Fn(&str) -> Option<&'v Value>) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures<'_>| {
            lookup(&caps[1])
                .and_then(display_value)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Substitute inside a value: strings are templated, other values pass through
pub fn substitute_value<'v>(value: &Value, lookup: impl Fn(&str) -> Option<&'v Value>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute(s, lookup)),
        other => other.clone(),
    }
}

/// Keys of all placeholders still present in `text`
pub fn placeholders(text: &str) -> Vec<String> {
    placeholder_re()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Whether `text` still contains a `{{...}}` token, including `{{}}` and
/// tokens with inner whitespace that never substitute
pub fn has_placeholders(text: &str) -> bool {
    residual_re().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn vars() -> HashMap<&'static str, Value> {
        HashMap::from([
            ("CHAN", json!(2)),
            ("DUT", json!("UmTRX")),
            ("EMPTY", Value::Null),
        ])
    }

    #[test]
    fn test_substitute_known_keys() {
        let vars = vars();
        let out = substitute("TRX{{CHAN}}/{{ DUT }}", |k| vars.get(k));
        assert_eq!(out, "TRX2/UmTRX");
        assert!(!out.contains("{{"));
    }

    #[test]
    fn test_unresolved_tokens_are_kept() {
        let vars = vars();
        let out = substitute("TRX{{MISSING}}-{{EMPTY}}", |k| vars.get(k));
        assert_eq!(out, "TRX{{MISSING}}-{{EMPTY}}");
        assert_eq!(placeholders(&out), vec!["MISSING", "EMPTY"]);
    }

    #[test]
    fn test_malformed_tokens_are_detected() {
        let vars = vars();
        for text in ["TRX{{}}", "TRX{{A B}}", "{{ }}"] {
            assert_eq!(substitute(text, |k| vars.get(k)), text);
            assert!(has_placeholders(text), "{}", text);
        }
        assert!(placeholders("TRX{{}}").is_empty());
        assert!(!has_placeholders("TRX2"));
        assert!(!has_placeholders("{single}"));
    }

    #[test]
    fn test_substitution_is_idempotent() {
        let vars = vars();
        let once = substitute("{{CHAN}}{{CHAN}}", |k| vars.get(k));
        let twice = substitute(&once, |k| vars.get(k));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_substitute_value_passes_non_strings() {
        let vars = vars();
        assert_eq!(substitute_value(&json!(7), |k| vars.get(k)), json!(7));
        assert_eq!(
            substitute_value(&json!("ch{{CHAN}}"), |k| vars.get(k)),
            json!("ch2")
        );
    }
}
