#![warn(missing_docs)]
//! Fluxrig Report - Result Store and Presentation
//!
//! - `ResultStore`: the scope-keyed ledger implementing `ResultSink`
//! - `Reporter`: presentation hooks for console and GUI front ends
//! - `ReportArchive`: persisted report naming, history lookup and writing
//! - JSON (de)serialization of the `scope -> test -> record` structure

mod archive;
mod json;
mod reporter;
mod store;

pub use archive::{ArchiveError, HistoryScan, ReportArchive, STAMP_FORMAT};
pub use json::{generate_json_report, parse_json_report};
pub use reporter::{
    BundleEvent, ChannelReporter, ReportEvent, Reporter, ResultEvent, TracingReporter,
};
pub use store::{DEFAULT_SCOPE, ResultStore};
