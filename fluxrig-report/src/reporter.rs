//! Presentation Hooks
//!
//! The store notifies a [`Reporter`] about everything worth showing to an
//! operator. Console and GUI front ends implement it; the engine never sees it.

use chrono::{DateTime, Utc};
use fluxrig_core::{ResultRecord, Verdict};
use serde_json::Value;
use std::sync::mpsc::{Receiver, Sender, channel};

/// A bundle started executing
#[derive(Debug, Clone, PartialEq)]
pub struct BundleEvent {
    /// When the bundle was entered
    pub timestamp: DateTime<Utc>,
    /// Path of the parent node
    pub path: String,
    /// Bundle name
    pub name: String,
    /// Bundle description (may be empty)
    pub description: String,
}

/// A test outcome was recorded
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEvent {
    /// When the outcome was recorded
    pub timestamp: DateTime<Utc>,
    /// Path of the enclosing node
    pub path: String,
    /// Scope the outcome was written to
    pub scope: String,
    /// Registered test name
    pub test: String,
    /// Human-readable label of the test
    pub label: String,
    /// Verdict of this run
    pub verdict: Verdict,
    /// Value of this run (null for skipped tests)
    pub value: Value,
    /// Record of the same scope/test from the previous run
    pub previous: Option<ResultRecord>,
    /// `value - previous.value` when both are numeric
    pub delta: Option<f64>,
    /// Why the test was skipped or failed, when known
    pub reason: Option<String>,
}

impl ResultEvent {
    /// Verdict of the previous run, if any
    pub fn previous_verdict(&self) -> Option<Verdict> {
        self.previous.as_ref().map(|r| r.verdict)
    }
}

/// Receiver of presentation events
pub trait Reporter {
    /// General progress message
    fn output_progress(&mut self, message: &str);

    /// A bundle started executing
    fn enter_bundle(&mut self, event: &BundleEvent);

    /// A test outcome was recorded
    fn record_result(&mut self, event: &ResultEvent);
}

/// Reporter that forwards everything to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn output_progress(&mut self, message: &str) {
        tracing::info!("{}", message);
    }

    fn enter_bundle(&mut self, event: &BundleEvent) {
        tracing::info!(path = %event.path, description = %event.description, "bundle {}", event.name);
    }

    fn record_result(&mut self, event: &ResultEvent) {
        tracing::info!(
            scope = %event.scope,
            verdict = %event.verdict,
            value = %event.value,
            reason = event.reason.as_deref().unwrap_or(""),
            "{}",
            event.label
        );
    }
}

/// Event forwarded by [`ChannelReporter`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    /// Progress message
    Progress(String),
    /// Bundle entered
    Bundle(BundleEvent),
    /// Outcome recorded
    Result(ResultEvent),
}

/// Reporter sending owned events over an mpsc channel, for event-driven
/// front ends
#[derive(Debug)]
pub struct ChannelReporter {
    tx: Sender<ReportEvent>,
}

impl ChannelReporter {
    /// Reporter plus the receiving end of its channel
    pub fn new() -> (Self, Receiver<ReportEvent>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ReportEvent) {
        // A dropped receiver only means nobody is watching any more
        let _ = self.tx.send(event);
    }
}

impl Reporter for ChannelReporter {
    fn output_progress(&mut self, message: &str) {
        self.send(ReportEvent::Progress(message.to_string()));
    }

    fn enter_bundle(&mut self, event: &BundleEvent) {
        self.send(ReportEvent::Bundle(event.clone()));
    }

    fn record_result(&mut self, event: &ResultEvent) {
        self.send(ReportEvent::Result(event.clone()));
    }
}
