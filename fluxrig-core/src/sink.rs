//! Result Sink Contract
//!
//! The engine records every outcome through [`ResultSink`]. The concrete
//! store (history, persistence, presentation hooks) lives in
//! `fluxrig-report`; the engine only depends on this trait.

use crate::descriptor::TestDescriptor;
use crate::verdict::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Latest outcome of one test in one scope.
///
/// Persisted as a `[timestamp, verdict, value]` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "(DateTime<Utc>, Verdict, Value)",
    into = "(DateTime<Utc>, Verdict, Value)"
)]
pub struct ResultRecord {
    /// When the outcome was recorded
    pub timestamp: DateTime<Utc>,
    /// Verdict of the run
    pub verdict: Verdict,
    /// Raw value produced by the test (null when none)
    pub value: Value,
}

impl ResultRecord {
    /// Record stamped with the current time
    pub fn now(verdict: Verdict, value: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            verdict,
            value,
        }
    }

    /// Sentinel returned for tests without a result: `(epoch, N/A, null)`
    pub fn missing() -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            verdict: Verdict::NotApplicable,
            value: Value::Null,
        }
    }

    /// Whether this is the [`ResultRecord::missing`] sentinel
    pub fn is_missing(&self) -> bool {
        self.timestamp == DateTime::<Utc>::UNIX_EPOCH
            && self.verdict == Verdict::NotApplicable
            && self.value.is_null()
    }
}

impl From<(DateTime<Utc>, Verdict, Value)> for ResultRecord {
    fn from((timestamp, verdict, value): (DateTime<Utc>, Verdict, Value)) -> Self {
        Self {
            timestamp,
            verdict,
            value,
        }
    }
}

impl From<ResultRecord> for (DateTime<Utc>, Verdict, Value) {
    fn from(record: ResultRecord) -> Self {
        (record.timestamp, record.verdict, record.value)
    }
}

/// scope -> test name -> latest record
pub type ScopeResults = BTreeMap<String, BTreeMap<String, ResultRecord>>;

/// Verdict -> number of records
pub type Summary = BTreeMap<Verdict, usize>;

/// Scope-keyed ledger of test outcomes plus the presentation hooks the
/// engine drives while walking a script.
pub trait ResultSink {
    /// Scope that subsequent writes target
    fn scope(&self) -> &str;

    /// Direct subsequent writes to `scope`
    fn set_scope(&mut self, scope: &str);

    /// Empty the current-run bucket of `scope`
    fn clear_scope(&mut self, scope: &str);

    /// Record an executed test. Returns `verdict`.
    fn record(
        &mut self,
        path: &str,
        test: &TestDescriptor,
        verdict: Verdict,
        value: Value,
        reason: Option<&str>,
    ) -> Verdict;

    /// Record a test that was not executed. Historical data for the test is
    /// carried forward instead of being overwritten. Returns `verdict`.
    fn record_skip(
        &mut self,
        path: &str,
        test: &TestDescriptor,
        verdict: Verdict,
        reason: Option<&str>,
    ) -> Verdict;

    /// Latest record of `test` in `scope` (current scope when `None`), or
    /// [`ResultRecord::missing`]
    fn lookup(&self, test: &str, scope: Option<&str>) -> ResultRecord;

    /// Pre-seed from the newest persisted report of `run_id`. Returns the
    /// number of entries merged.
    fn load_previous(&mut self, run_id: &str) -> usize;

    /// Count of records per verdict across all scopes
    fn summary(&self) -> Summary;

    /// Full scope -> test -> record structure as JSON
    fn serialize(&self) -> Result<String, serde_json::Error>;

    /// Notification that a bundle started executing
    fn enter_bundle(&mut self, path: &str, name: &str, description: &str);

    /// General progress message
    fn output_progress(&mut self, message: &str);
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct NullSink {
    scope: String,
}

#[cfg(test)]
impl ResultSink for NullSink {
    fn scope(&self) -> &str {
        &self.scope
    }
    fn set_scope(&mut self, scope: &str) {
        self.scope = scope.to_string();
    }
    fn clear_scope(&mut self, _scope: &str) {}
    fn record(
        &mut self,
        _path: &str,
        _test: &TestDescriptor,
        verdict: Verdict,
        _value: Value,
        _reason: Option<&str>,
    ) -> Verdict {
        verdict
    }
    fn record_skip(
        &mut self,
        _path: &str,
        _test: &TestDescriptor,
        verdict: Verdict,
        _reason: Option<&str>,
    ) -> Verdict {
        verdict
    }
    fn lookup(&self, _test: &str, _scope: Option<&str>) -> ResultRecord {
        ResultRecord::missing()
    }
    fn load_previous(&mut self, _run_id: &str) -> usize {
        0
    }
    fn summary(&self) -> Summary {
        Summary::new()
    }
    fn serialize(&self) -> Result<String, serde_json::Error> {
        Ok("{}".to_string())
    }
    fn enter_bundle(&mut self, _path: &str, _name: &str, _description: &str) {}
    fn output_progress(&mut self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_as_triple() {
        let record = ResultRecord::now(Verdict::Pass, json!(15));
        let json = serde_json::to_value(&record).unwrap();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[1], json!("PASS"));
        assert_eq!(arr[2], json!(15));

        let back: ResultRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_missing_sentinel() {
        let missing = ResultRecord::missing();
        assert!(missing.is_missing());
        assert_eq!(missing.verdict, Verdict::NotApplicable);
        assert!(!ResultRecord::now(Verdict::NotApplicable, Value::Null).is_missing());
    }
}
