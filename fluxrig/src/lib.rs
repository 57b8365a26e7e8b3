#![warn(missing_docs)]
//! # Fluxrig
//!
//! Script-driven hardware-in-the-loop test rig for RF conformance campaigns.
//!
//! Fluxrig runs a YAML test script against a registry of named test functions:
//! - **Registry**: tests are registered explicitly at startup with a DUT applicability set and a checker
//! - **Script Tree**: bundles (scoped sequences), repeats (iteration over counts or argument sets) and test cases
//! - **Dispatcher**: exclusion, DUT filtering, run-wide abort and panic containment around every call
//! - **Result Store**: per-scope verdict ledger with history from the previous run and deltas
//! - **Console Driver**: colored result lines, operator prompts, SIGINT abort, persisted JSON reports
//!
//! ## Quick Start
//!
//! ```ignore
//! use fluxrig::prelude::*;
//!
//! fn main() {
//!     let mut registry = Registry::new();
//!     fluxrig::register_builtin(&mut registry);
//!     registry.register(
//!         TestDescriptor::new("tx_power", |ctx| {
//!             let tester = ctx.resource_mut::<MyTester>(keys::INSTRUMENT)?;
//!             Ok(tester.measure_power()?.into())
//!         })
//!         .with_applicability(Applicability::only(["UmTRX"]))
//!         .with_checker(Checker::range(
//!             Param::limit("burst_power_peak_min"),
//!             Param::limit("burst_power_peak_max"),
//!         )),
//!     );
//!     fluxrig::run_with_registry(registry).unwrap();
//! }
//! ```
//!
//! ## Scripts
//!
//! ```yaml
//! - bundle:
//!     name: system
//!     scope: system
//!     testsuites: [ host_uname, run_id ]
//! - bundle:
//!     name: channels
//!     testsuites:
//!       - repeat:
//!           args: [ { CHAN: 1 }, { CHAN: 2 } ]
//!           bundle:
//!             name: channel
//!             scope: "TRX{{CHAN}}"
//!             testsuites:
//!               - tx_power: { abort_bundle_on_failure: true }
//! ```

// Re-export core types
pub use fluxrig_core::{
    AbortFlag, Applicability, AutoUi, Checker, Context, Param, Registry, RegistryError,
    ResultRecord, ResultSink, ScopeResults, Summary, TestDescriptor, TestError, Ui, Verdict, keys,
};

// Re-export the interpreter
pub use fluxrig_logic::{
    Bundle, Dispatcher, Executor, Iterations, Node, Repeat, ScriptError, ScriptIssue, TestCase,
    parse_script,
};

// Re-export results and reporting
pub use fluxrig_report::{
    BundleEvent, ChannelReporter, ReportArchive, ReportEvent, Reporter, ResultEvent, ResultStore,
    TracingReporter,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Applicability, Checker, Context, Param, Registry, TestDescriptor, TestError, Verdict, keys,
    };
    pub use serde_json::{Value, json};
}

// Re-export the console driver
pub use fluxrig_cli::{ConsoleReporter, ConsoleUi, FluxrigConfig, format_summary};

/// Register the built-in host test suite
pub use fluxrig_cli::register_builtin;

/// Run the fluxrig CLI with a populated registry.
///
/// Call this from your campaign binary's `main()`:
/// ```ignore
/// fn main() {
///     let mut registry = fluxrig::Registry::new();
///     fluxrig::register_builtin(&mut registry);
///     fluxrig::run_with_registry(registry).unwrap();
/// }
/// ```
pub use fluxrig_cli::run_with_registry;
