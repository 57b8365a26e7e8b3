//! Run Summary
//!
//! Human-readable per-verdict totals printed after a campaign.

use colored::*;
use fluxrig_core::{Summary, Verdict};

/// Records that did not pass
pub fn not_passed(summary: &Summary) -> usize {
    summary
        .iter()
        .filter(|(verdict, _)| !verdict.is_pass())
        .map(|(_, count)| count)
        .sum()
}

/// Format the summary for terminal display
pub fn format_summary(summary: &Summary) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("Fluxrig Results\n");
    output.push_str(&"=".repeat(60));
    output.push('\n');

    for verdict in Verdict::ALL {
        let count = summary.get(&verdict).copied().unwrap_or(0);
        let name = format!("{:>8}", verdict);
        let name = match verdict {
            Verdict::NotApplicable => name.blue(),
            Verdict::Aborted => name.yellow(),
            Verdict::Fail => name.red(),
            Verdict::Pass => name.green(),
        };
        output.push_str(&format!("{}: {:>2}\n", name, count));
    }

    output.push_str(&"=".repeat(60));
    output.push('\n');

    if not_passed(summary) > 0 {
        output.push_str(&format!("\n{}\n", "WARNING! NOT ALL TESTS PASSED!".red().bold()));
    }

    output
}
