#![warn(missing_docs)]
//! Fluxrig Logic - Script Interpreter
//!
//! Turns a YAML test script into an immutable tree of bundles, repeats and
//! test cases, then walks it depth-first. Every leaf goes through the
//! `Dispatcher`, which applies exclusion, DUT applicability and abort rules
//! before calling the registered test function.

mod dispatch;
mod executor;
mod node;
mod script;

pub use dispatch::Dispatcher;
pub use executor::{Executor, run_node};
pub use node::{
    Bindings, Bundle, DEFAULT_REPEAT_NAME, GLOBAL_SCOPE, Iterations, Node, Repeat, TestCase,
};
pub use script::{ScriptError, ScriptIssue, parse_script};
