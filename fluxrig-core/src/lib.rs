#![warn(missing_docs)]
//! Fluxrig Core - Test Model
//!
//! This crate provides the types every other fluxrig crate builds on:
//! - `Context` threaded through a run (variables, resources, UI, results)
//! - `TestDescriptor` and the explicit `Registry` scripts resolve against
//! - `Checker` rules turning raw values into a `Verdict`
//! - `ResultSink`, the contract the engine records outcomes through

mod checker;
mod context;
mod descriptor;
mod error;
mod sink;
pub mod subst;
mod value;
mod verdict;

pub use checker::{Checker, Param};
pub use context::{AbortFlag, AutoUi, Context, Ui, keys};
pub use descriptor::{Applicability, Registry, RegistryError, TestDescriptor, TestFn};
pub use error::TestError;
pub use sink::{ResultRecord, ResultSink, ScopeResults, Summary};
pub use value::{as_number, display_value, is_truthy};
pub use verdict::Verdict;
