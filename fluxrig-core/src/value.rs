//! Value Helpers
//!
//! Test functions produce [`serde_json::Value`]s. These helpers give them the
//! loose numeric/truthiness semantics the checkers and the result store need.

use serde_json::Value;

/// Interpret a value as a number.
///
/// Numbers convert directly and strings are parsed after trimming, so a
/// `"15.5"` read back from an instrument compares like `15.5`.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Truthiness: null, false, zero and empty strings/collections are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Render a value the way it is shown to operators and substituted into
/// templates: strings without quotes, everything else as JSON.
///
/// Returns `None` for null, which is treated as "not bound".
pub fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_number() {
        assert_eq!(as_number(&json!(15)), Some(15.0));
        assert_eq!(as_number(&json!(" -3.5 ")), Some(-3.5));
        assert_eq!(as_number(&json!("MATC")), None);
        assert_eq!(as_number(&json!(true)), None);
        assert_eq!(as_number(&Value::Null), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("x")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&Value::Null));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("TRX1")).as_deref(), Some("TRX1"));
        assert_eq!(display_value(&json!(100)).as_deref(), Some("100"));
        assert_eq!(display_value(&Value::Null), None);
    }
}
