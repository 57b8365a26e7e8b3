//! JSON Output

use fluxrig_core::ScopeResults;

/// Generate the prettified `scope -> test -> [timestamp, verdict, value]` report
pub fn generate_json_report(results: &ScopeResults) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(results)
}

/// Parse a report produced by [`generate_json_report`]
pub fn parse_json_report(text: &str) -> Result<ScopeResults, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxrig_core::{ResultRecord, Verdict};
    use serde_json::json;

    #[test]
    fn test_report_shape() {
        let mut results = ScopeResults::new();
        results
            .entry("TRX1".to_string())
            .or_default()
            .insert("tx_power".to_string(), ResultRecord::now(Verdict::Pass, json!(21.5)));

        let text = generate_json_report(&results).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["TRX1"]["tx_power"][1], json!("PASS"));
        assert_eq!(raw["TRX1"]["tx_power"][2], json!(21.5));

        assert_eq!(parse_json_report(&text).unwrap(), results);
    }

    #[test]
    fn test_rejects_bad_verdict() {
        let text = r#"{"global": {"x": ["2024-01-01T00:00:00Z", "MAYBE", 1]}}"#;
        assert!(parse_json_report(text).is_err());
    }
}
