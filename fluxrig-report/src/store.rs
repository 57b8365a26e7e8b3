//! Result Store
//!
//! Scope-keyed ledger of the current run plus a read-only copy of the
//! previous run of the same device, used for deltas and for carrying
//! historical outcomes of skipped tests forward.

use crate::archive::ReportArchive;
use crate::json::generate_json_report;
use crate::reporter::{BundleEvent, Reporter, ResultEvent, TracingReporter};
use chrono::Utc;
use fluxrig_core::{
    ResultRecord, ResultSink, ScopeResults, Summary, TestDescriptor, Verdict, as_number,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Scope used until a bundle sets one
pub const DEFAULT_SCOPE: &str = "global";

/// In-memory [`ResultSink`] with optional on-disk history
pub struct ResultStore {
    current: ScopeResults,
    previous: ScopeResults,
    scope: String,
    archive: Option<ReportArchive>,
    reporter: Box<dyn Reporter>,
}

impl ResultStore {
    /// Store reporting through `reporter`, without history
    pub fn new(reporter: Box<dyn Reporter>) -> Self {
        Self {
            current: ScopeResults::new(),
            previous: ScopeResults::new(),
            scope: DEFAULT_SCOPE.to_string(),
            archive: None,
            reporter,
        }
    }

    /// Read history from (and let callers write to) `archive`
    pub fn with_archive(mut self, archive: ReportArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Configured archive
    pub fn archive(&self) -> Option<&ReportArchive> {
        self.archive.as_ref()
    }

    /// Current-run records
    pub fn results(&self) -> &ScopeResults {
        &self.current
    }

    /// Records of the previous run
    pub fn previous(&self) -> &ScopeResults {
        &self.previous
    }

    /// Use `previous` as the previous run and pre-seed every scope/test not
    /// yet recorded in this run. Returns the number of seeded entries.
    pub fn seed_previous(&mut self, previous: ScopeResults) -> usize {
        let mut seeded = 0;
        for (scope, tests) in &previous {
            let bucket = self.current.entry(scope.clone()).or_default();
            for (test, record) in tests {
                if !bucket.contains_key(test) {
                    bucket.insert(test.clone(), record.clone());
                    seeded += 1;
                }
            }
        }
        self.previous = previous;
        seeded
    }

    fn previous_record(&self, test: &str) -> Option<&ResultRecord> {
        self.previous.get(&self.scope).and_then(|tests| tests.get(test))
    }

    fn bucket(&mut self) -> &mut BTreeMap<String, ResultRecord> {
        self.current.entry(self.scope.clone()).or_default()
    }

    fn notify(
        &mut self,
        path: &str,
        test: &TestDescriptor,
        record: &ResultRecord,
        delta: Option<f64>,
        reason: Option<&str>,
    ) {
        let event = ResultEvent {
            timestamp: record.timestamp,
            path: path.to_string(),
            scope: self.scope.clone(),
            test: test.name().to_string(),
            label: test.label().to_string(),
            verdict: record.verdict,
            value: record.value.clone(),
            previous: self.previous_record(test.name()).cloned(),
            delta,
            reason: reason.map(str::to_string),
        };
        self.reporter.record_result(&event);
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(Box::new(TracingReporter))
    }
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("scope", &self.scope)
            .field("scopes", &self.current.len())
            .field("previous_scopes", &self.previous.len())
            .field("archive", &self.archive)
            .finish()
    }
}

impl ResultSink for ResultStore {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn set_scope(&mut self, scope: &str) {
        self.scope = scope.to_string();
    }

    fn clear_scope(&mut self, scope: &str) {
        if let Some(bucket) = self.current.get_mut(scope) {
            bucket.clear();
        }
    }

    fn record(
        &mut self,
        path: &str,
        test: &TestDescriptor,
        verdict: Verdict,
        value: Value,
        reason: Option<&str>,
    ) -> Verdict {
        let delta = self.previous_record(test.name()).and_then(|prev| {
            let old = as_number(&prev.value)?;
            let new = as_number(&value)?;
            Some(new - old)
        });

        let record = ResultRecord::now(verdict, value);
        self.bucket().insert(test.name().to_string(), record.clone());
        self.notify(path, test, &record, delta, reason);
        verdict
    }

    fn record_skip(
        &mut self,
        path: &str,
        test: &TestDescriptor,
        verdict: Verdict,
        reason: Option<&str>,
    ) -> Verdict {
        // History wins; otherwise the skip replaces anything written earlier this run
        let record = self
            .previous_record(test.name())
            .cloned()
            .unwrap_or_else(|| ResultRecord::now(verdict, Value::Null));
        self.bucket().insert(test.name().to_string(), record);

        let shown = ResultRecord {
            timestamp: Utc::now(),
            verdict,
            value: Value::Null,
        };
        self.notify(path, test, &shown, None, reason);
        verdict
    }

    fn lookup(&self, test: &str, scope: Option<&str>) -> ResultRecord {
        let scope = scope.unwrap_or(&self.scope);
        self.current
            .get(scope)
            .and_then(|tests| tests.get(test))
            .cloned()
            .unwrap_or_else(ResultRecord::missing)
    }

    fn load_previous(&mut self, run_id: &str) -> usize {
        let Some(archive) = self.archive.clone() else {
            return 0;
        };

        let scan = match archive.scan(run_id) {
            Ok(scan) => scan,
            Err(e) => {
                tracing::warn!(error = %e, "cannot scan report history");
                self.reporter.output_progress(&format!("Cannot scan report history: {}", e));
                return 0;
            }
        };
        for name in &scan.malformed {
            self.reporter
                .output_progress(&format!("Skipping report with malformed date: {}", name));
        }

        let Some((stamp, path)) = scan.latest else {
            self.reporter
                .output_progress(&format!("No previous data were found for {}", run_id));
            return 0;
        };

        self.reporter.output_progress(&format!(
            "Loading previous data from {} ({})",
            path.display(),
            stamp
        ));
        match archive.read(&path) {
            Ok(previous) => self.seed_previous(previous),
            Err(e) => {
                tracing::warn!(error = %e, "cannot load previous report");
                self.reporter.output_progress(&e.to_string());
                0
            }
        }
    }

    fn summary(&self) -> Summary {
        let mut summary = Summary::new();
        for record in self.current.values().flat_map(|tests| tests.values()) {
            *summary.entry(record.verdict).or_insert(0) += 1;
        }
        summary
    }

    fn serialize(&self) -> Result<String, serde_json::Error> {
        generate_json_report(&self.current)
    }

    fn enter_bundle(&mut self, path: &str, name: &str, description: &str) {
        let event = BundleEvent {
            timestamp: Utc::now(),
            path: path.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        };
        self.reporter.enter_bundle(&event);
    }

    fn output_progress(&mut self, message: &str) {
        self.reporter.output_progress(message);
    }
}
