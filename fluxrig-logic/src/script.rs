//! Script Parser
//!
//! Recursive descent over the YAML structure:
//!
//! ```yaml
//! - bundle:
//!     name: init
//!     scope: "TRX{{CHAN}}"
//!     testsuites:
//!       - host_uname
//!       - tx_power: { abort_bundle_on_failure: true, args: { LEVEL: 10 } }
//!       - repeat:
//!           args: [ { CHAN: 1 }, { CHAN: 2 } ]
//!           bundle: { name: per_channel, testsuites: [ tx_power ] }
//! ```
//!
//! Parsing does not stop at the first problem: every issue is collected so
//! one pass reports the whole script.

use crate::node::{Bindings, Bundle, DEFAULT_REPEAT_NAME, GLOBAL_SCOPE, Iterations, Node, Repeat, TestCase};
use fluxrig_core::Registry;
use serde_yaml::{Mapping, Value as Yaml};
use std::fmt;
use thiserror::Error;

/// Problem found at one location of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptIssue {
    /// Node path, e.g. `[0].bundle(init).testsuites[2]`
    pub location: String,
    /// What is wrong
    pub message: String,
}

impl fmt::Display for ScriptIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Errors from script parsing
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Not valid YAML
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Structurally invalid script
    #[error("got {count} errors in test script")]
    Invalid {
        /// Number of issues
        count: usize,
        /// Every issue found
        issues: Vec<ScriptIssue>,
    },
}

impl ScriptError {
    /// Issues of an invalid script (empty for YAML errors)
    pub fn issues(&self) -> &[ScriptIssue] {
        match self {
            ScriptError::Invalid { issues, .. } => issues,
            ScriptError::Yaml(_) => &[],
        }
    }
}

/// Parse a script into its top-level bundles
pub fn parse_script(text: &str, registry: &Registry) -> Result<Vec<Bundle>, ScriptError> {
    let tree: Yaml = serde_yaml::from_str(text)?;
    let mut parser = Parser {
        registry,
        issues: Vec::new(),
    };
    let bundles = parser.top_level(&tree);

    if parser.issues.is_empty() {
        Ok(bundles)
    } else {
        Err(ScriptError::Invalid {
            count: parser.issues.len(),
            issues: parser.issues,
        })
    }
}

struct Parser<'r> {
    registry: &'r Registry,
    issues: Vec<ScriptIssue>,
}

impl Parser<'_> {
    fn issue(&mut self, location: &str, message: impl Into<String>) {
        self.issues.push(ScriptIssue {
            location: location.to_string(),
            message: message.into(),
        });
    }

    fn top_level(&mut self, tree: &Yaml) -> Vec<Bundle> {
        let Some(entries) = tree.as_sequence() else {
            if !tree.is_null() {
                self.issue("<root>", "script must be a list of bundles");
            }
            return Vec::new();
        };

        let mut bundles = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let loc = format!("[{}]", i);
            match entry.get("bundle") {
                Some(body) => {
                    if let Some(bundle) = self.bundle(body, &loc) {
                        bundles.push(bundle);
                    }
                }
                None => self.issue(&loc, "top level entries must be bundles"),
            }
        }
        bundles
    }

    fn bundle(&mut self, body: &Yaml, loc: &str) -> Option<Bundle> {
        let Some(map) = body.as_mapping() else {
            self.issue(loc, "bundle must be a mapping");
            return None;
        };
        let before = self.issues.len();

        let name = match map.get("name").and_then(Yaml::as_str) {
            Some(name) => name.to_string(),
            None => {
                self.issue(loc, "bundle has no `name`");
                String::from("<bundle>")
            }
        };
        let loc = format!("{}.bundle({})", loc, name);
        let description = self.text(map, "description", &loc).unwrap_or_else(|| name.clone());
        let scope = self
            .text(map, "scope", &loc)
            .unwrap_or_else(|| GLOBAL_SCOPE.to_string());

        let mut children = Vec::new();
        match map.get("testsuites").map(|v| v.as_sequence()) {
            Some(Some(entries)) => {
                for (i, entry) in entries.iter().enumerate() {
                    let entry_loc = format!("{}.testsuites[{}]", loc, i);
                    if let Some(node) = self.entry(entry, &entry_loc) {
                        children.push(node);
                    }
                }
            }
            Some(None) => self.issue(&loc, "`testsuites` must be a list"),
            None => self.issue(&loc, "bundle has no `testsuites`"),
        }

        (self.issues.len() == before).then(|| Bundle {
            name,
            description,
            scope,
            children,
            enabled: true,
        })
    }

    fn entry(&mut self, entry: &Yaml, loc: &str) -> Option<Node> {
        match entry {
            Yaml::String(name) => self.test_case(name, &Yaml::Null, loc).map(Node::Test),
            Yaml::Mapping(map) => {
                let mut pairs = map.iter();
                let (Some((key, body)), None) = (pairs.next(), pairs.next()) else {
                    self.issue(loc, "entry must have exactly one key");
                    return None;
                };
                match key.as_str() {
                    Some("bundle") => self.bundle(body, loc).map(Node::Bundle),
                    Some("repeat") => self.repeat(body, loc).map(Node::Repeat),
                    Some(name) => self.test_case(name, body, loc).map(Node::Test),
                    None => {
                        self.issue(loc, "entry key must be a string");
                        None
                    }
                }
            }
            _ => {
                self.issue(loc, "entry must be a test name or a mapping");
                None
            }
        }
    }

    fn test_case(&mut self, name: &str, options: &Yaml, loc: &str) -> Option<TestCase> {
        let loc = format!("{}.{}", loc, name);
        let before = self.issues.len();

        let test = match self.registry.lookup(name) {
            Ok(test) => Some(test),
            Err(e) => {
                self.issue(&loc, e.to_string());
                None
            }
        };

        let mut abort_bundle_on_failure = false;
        let mut args = Bindings::new();
        match options {
            Yaml::Null => {}
            Yaml::Mapping(map) => {
                if let Some(flag) = map.get("abort_bundle_on_failure") {
                    match str_to_bool(flag) {
                        Some(b) => abort_bundle_on_failure = b,
                        None => self.issue(&loc, "`abort_bundle_on_failure` must be a boolean"),
                    }
                }
                if let Some(raw) = map.get("args") {
                    match raw.as_mapping() {
                        Some(raw) => args = self.bindings(raw, &loc),
                        None => self.issue(&loc, "`args` must be a mapping"),
                    }
                }
            }
            _ => self.issue(&loc, "test options must be a mapping"),
        }

        let test = test?;
        (self.issues.len() == before).then(|| TestCase {
            name: name.to_string(),
            test,
            args,
            abort_bundle_on_failure,
            enabled: true,
        })
    }

    fn repeat(&mut self, body: &Yaml, loc: &str) -> Option<Repeat> {
        let Some(map) = body.as_mapping() else {
            self.issue(loc, "repeat must be a mapping");
            return None;
        };
        let before = self.issues.len();

        let name = self
            .text(map, "name", loc)
            .unwrap_or_else(|| DEFAULT_REPEAT_NAME.to_string());
        let loc = format!("{}.repeat({})", loc, name);
        let description = self.text(map, "description", &loc).unwrap_or_else(|| name.clone());

        let iterations = if let Some(raw) = map.get("args") {
            match raw.as_sequence() {
                Some(sets) => {
                    let mut parsed = Vec::with_capacity(sets.len());
                    for (i, set) in sets.iter().enumerate() {
                        match set.as_mapping() {
                            Some(set) => parsed.push(self.bindings(set, &format!("{}.args[{}]", loc, i))),
                            None => self.issue(&format!("{}.args[{}]", loc, i), "override set must be a mapping"),
                        }
                    }
                    Some(Iterations::Args(parsed))
                }
                None => {
                    self.issue(&loc, "`args` must be a list of mappings");
                    None
                }
            }
        } else if let Some(raw) = map.get("count") {
            match raw.as_u64() {
                Some(n) => Some(Iterations::Count(n as usize)),
                None => {
                    self.issue(&loc, "`count` must be a non-negative integer");
                    None
                }
            }
        } else {
            self.issue(&loc, "repeat needs `count` or `args`");
            None
        };

        let child = if let Some(inner) = map.get("bundle") {
            self.bundle(inner, &loc).map(Node::Bundle)
        } else if let Some(inner) = map.get("repeat") {
            self.repeat(inner, &loc).map(Node::Repeat)
        } else {
            self.issue(&loc, "repeat needs a `bundle` or `repeat` child");
            None
        };

        match (iterations, child) {
            (Some(iterations), Some(child)) if self.issues.len() == before => Some(Repeat {
                name,
                description,
                iterations,
                child: Box::new(child),
                enabled: true,
            }),
            _ => None,
        }
    }

    fn bindings(&mut self, map: &Mapping, loc: &str) -> Bindings {
        let mut out = Bindings::with_capacity(map.len());
        for (key, value) in map {
            let Some(key) = key.as_str() else {
                self.issue(loc, "override keys must be strings");
                continue;
            };
            match serde_json::to_value(value) {
                Ok(value) => out.push((key.to_string(), value)),
                Err(e) => self.issue(loc, format!("unsupported value for `{}`: {}", key, e)),
            }
        }
        out
    }

    fn text(&mut self, map: &Mapping, key: &str, loc: &str) -> Option<String> {
        let value = map.get(key)?;
        match value {
            Yaml::String(s) => Some(s.clone()),
            Yaml::Number(n) => Some(n.to_string()),
            Yaml::Bool(b) => Some(b.to_string()),
            _ => {
                self.issue(loc, format!("`{}` must be a string", key));
                None
            }
        }
    }
}

/// Booleans as written by hand: `true`, `yes`, `t`, `1` (any case)
fn str_to_bool(value: &Yaml) -> Option<bool> {
    match value {
        Yaml::Bool(b) => Some(*b),
        Yaml::String(s) => Some(matches!(s.to_lowercase().as_str(), "yes" | "true" | "t" | "1")),
        Yaml::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxrig_core::TestDescriptor;
    use serde_json::{Value, json};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        for name in ["power", "freq", "ident"] {
            registry.register(TestDescriptor::new(name, |_| Ok(Value::Null)));
        }
        registry
    }

    const SCRIPT: &str = r#"
- bundle:
    name: init
    description: Initialization
    testsuites:
      - ident
      - power:
          abort_bundle_on_failure: yes
          args: { LEVEL: 10, NAME: "ch{{CHAN}}" }
- bundle:
    name: channels
    scope: "TRX{{CHAN}}"
    testsuites:
      - repeat:
          name: chan
          args:
            - { CHAN: 1 }
            - { CHAN: 2 }
          bundle:
            name: per_channel
            testsuites: [ power, freq ]
      - repeat:
          count: 3
          repeat:
            count: 2
            bundle: { name: inner, testsuites: [ freq ] }
"#;

    #[test]
    fn test_parse_structure() {
        let bundles = parse_script(SCRIPT, &registry()).unwrap();
        assert_eq!(bundles.len(), 2);

        let init = &bundles[0];
        assert_eq!(init.description, "Initialization");
        assert_eq!(init.scope, GLOBAL_SCOPE);
        let Node::Test(power) = &init.children[1] else {
            panic!("expected a test case");
        };
        assert!(power.abort_bundle_on_failure);
        assert_eq!(
            power.args,
            vec![
                ("LEVEL".to_string(), json!(10)),
                ("NAME".to_string(), json!("ch{{CHAN}}"))
            ]
        );

        let channels = &bundles[1];
        assert_eq!(channels.scope, "TRX{{CHAN}}");
        assert_eq!(channels.description, "channels");
        let Node::Repeat(chan) = &channels.children[0] else {
            panic!("expected a repeat");
        };
        assert_eq!(chan.iterations.len(), 2);
        assert_eq!(chan.child.name(), "per_channel");
        let Node::Repeat(outer) = &channels.children[1] else {
            panic!("expected a repeat");
        };
        assert_eq!(outer.name, DEFAULT_REPEAT_NAME);
        assert_eq!(outer.iterations, Iterations::Count(3));
        assert!(matches!(&*outer.child, Node::Repeat(inner) if inner.iterations == Iterations::Count(2)));
    }

    #[test]
    fn test_parse_twice_is_equal() {
        let registry = registry();
        let a = parse_script(SCRIPT, &registry).unwrap();
        let b = parse_script(SCRIPT, &registry).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_errors_are_accumulated() {
        let script = r#"
- bundle:
    name: broken
    testsuites:
      - nope
      - power: { args: [1, 2] }
      - repeat:
          bundle: { name: x, testsuites: [ missing ] }
      - repeat:
          count: 1
- not_a_bundle: 1
"#;
        let err = parse_script(script, &registry()).unwrap_err();
        let ScriptError::Invalid { count, issues } = &err else {
            panic!("expected an invalid script");
        };
        assert_eq!(*count, issues.len());
        assert_eq!(*count, 6, "{:#?}", issues);
        assert!(issues[0].message.contains("unknown test `nope`"));
        assert!(issues.iter().any(|i| i.message.contains("`count` or `args`")));
        assert!(issues.iter().any(|i| i.message.contains("`bundle` or `repeat` child")));
        assert!(issues.iter().any(|i| i.location == "[1]"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse_script("- bundle: [", &registry()).unwrap_err();
        assert!(matches!(err, ScriptError::Yaml(_)));
        assert!(err.issues().is_empty());
    }
}
