//! Test Verdicts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single test invocation.
///
/// The ordering is used for reporting only (summaries are listed
/// `NotApplicable` first, `Pass` last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Not executed: DUT incompatibility or explicit exclusion
    #[serde(rename = "N/A")]
    NotApplicable,
    /// Execution raised, was interrupted, or was skipped after an abort
    #[serde(rename = "ABORTED")]
    Aborted,
    /// The checker rejected the value (including instrument timeouts)
    #[serde(rename = "FAIL")]
    Fail,
    /// The checker accepted the value
    #[serde(rename = "PASS")]
    Pass,
}

impl Verdict {
    /// All verdicts in reporting order
    pub const ALL: [Verdict; 4] = [
        Verdict::NotApplicable,
        Verdict::Aborted,
        Verdict::Fail,
        Verdict::Pass,
    ];

    /// Short display name
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::NotApplicable => "N/A",
            Verdict::Aborted => "ABORTED",
            Verdict::Fail => "FAIL",
            Verdict::Pass => "PASS",
        }
    }

    /// Whether this verdict counts as success
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// Build a verdict from a boolean check
    pub fn from_bool(ok: bool) -> Self {
        if ok { Verdict::Pass } else { Verdict::Fail }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporting_order() {
        let mut verdicts = vec![Verdict::Pass, Verdict::NotApplicable, Verdict::Fail, Verdict::Aborted];
        verdicts.sort();
        assert_eq!(verdicts, Verdict::ALL.to_vec());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Verdict::NotApplicable).unwrap();
        assert_eq!(json, "\"N/A\"");
        let back: Verdict = serde_json::from_str("\"ABORTED\"").unwrap();
        assert_eq!(back, Verdict::Aborted);
    }

    #[test]
    fn test_display_padding() {
        assert_eq!(format!("{:>7}", Verdict::Pass), "   PASS");
    }
}
