//! Run Context
//!
//! A single mutable, string-keyed context is threaded by reference through a
//! whole run. It carries caller inputs (DUT tag, limits, handles, UI) and the
//! values test functions publish for later tests (e.g. the run identifier).
//!
//! Variables live in two layers:
//! - **globals**: written by the caller and by test functions, visible for the
//!   rest of the run
//! - **frames**: local bindings pushed by repeat iterations and test-case
//!   arguments, visible only while the frame is active
//!
//! Lookups search frames innermost-first, then globals. Writes always go
//! to globals and replace the key in any active frame that binds it.

use crate::error::TestError;
use crate::sink::ResultSink;
use crate::subst;
use crate::value::as_number;
use fxhash::FxHashMap;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Well-known context keys shared with collaborators
pub mod keys {
    /// Device-under-test tag, drives applicability filtering
    pub const DUT: &str = "DUT";
    /// Limits table of the selected DUT (object of name -> value)
    pub const LIMITS: &str = "DUT_CHECKS";
    /// Radio channel number under test
    pub const ARFCN: &str = "ARFCN";
    /// Transceiver channel currently selected
    pub const CHANNEL: &str = "CHAN";
    /// Iteration path maintained by repeat blocks (`/0/2`)
    pub const ITER: &str = "ITER";
    /// Run identifier published by a test, used to name the report
    pub const RUN_ID: &str = "TEST_ID";
    /// Transport handle for the device under test
    pub const TRANSPORT: &str = "BTS";
    /// Instrument handle for the RF tester
    pub const INSTRUMENT: &str = "CMD";
}

/// Blocking operator interaction
pub trait Ui {
    /// Show `text` and wait for the operator. `true` means confirmed.
    fn ask(&mut self, text: &str) -> bool;
}

/// Non-interactive UI answering every question the same way
#[derive(Debug, Clone, Copy)]
pub struct AutoUi {
    /// Answer returned for every question
    pub answer: bool,
}

impl Ui for AutoUi {
    fn ask(&mut self, text: &str) -> bool {
        tracing::debug!(question = text, answer = self.answer, "auto-answering");
        self.answer
    }
}

/// Run-wide cancellation flag.
///
/// Cloned handles share the same state, so an interrupt handler or an
/// operator "stop" action can raise it while the run is in progress. Once
/// raised it stays raised for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    /// Create a lowered flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Only touches an atomic, safe from signal handlers.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutable state threaded through one execution run
pub struct Context {
    globals: FxHashMap<String, Value>,
    frames: Vec<FxHashMap<String, Value>>,
    resources: FxHashMap<String, Box<dyn Any>>,
    ui: Box<dyn Ui>,
    results: Box<dyn ResultSink>,
    abort: AbortFlag,
}

impl Context {
    /// Create a context around a UI and a result sink
    pub fn new(ui: Box<dyn Ui>, results: Box<dyn ResultSink>) -> Self {
        Self {
            globals: FxHashMap::default(),
            frames: Vec::new(),
            resources: FxHashMap::default(),
            ui,
            results,
            abort: AbortFlag::new(),
        }
    }

    /// Share an externally owned abort flag (e.g. one wired to SIGINT)
    pub fn with_abort_flag(mut self, flag: AbortFlag) -> Self {
        self.abort = flag;
        self
    }

    /// Look up a variable, innermost frame first
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(key))
            .or_else(|| self.globals.get(key))
    }

    /// Look up a variable that must be bound
    pub fn require(&self, key: &str) -> Result<&Value, TestError> {
        self.get(key)
            .ok_or_else(|| TestError::MissingKey(key.to_string()))
    }

    /// Look up a string variable
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Look up a numeric variable (numbers or numeric strings)
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(as_number)
    }

    /// Publish a variable for the rest of the run.
    ///
    /// Active frames binding the same key are updated as well, so a later
    /// [`get`](Self::get) sees the new value before and after they pop.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        for frame in &mut self.frames {
            if let Some(slot) = frame.get_mut(&key) {
                *slot = value.clone();
            }
        }
        self.globals.insert(key, value);
    }

    /// Remove a global variable, returning its value
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        self.globals.remove(key)
    }

    /// Whether a variable or resource is bound under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some() || self.resources.contains_key(key)
    }

    /// Run `f` with `bindings` visible as local variables.
    ///
    /// The frame is popped when `f` returns, so sibling iterations never see
    /// each other's bindings; globals written inside `f` survive.
    pub fn with_frame<R>(
        &mut self,
        bindings: FxHashMap<String, Value>,
        f: impl FnOnce(&mut Context) -> R,
    ) -> R {
        self.frames.push(bindings);
        let out = f(self);
        self.frames.pop();
        out
    }

    /// Number of active local frames
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Merged view of all visible variables
    pub fn variables(&self) -> BTreeMap<&str, &Value> {
        let mut merged: BTreeMap<&str, &Value> =
            self.globals.iter().map(|(k, v)| (k.as_str(), v)).collect();
        for frame in &self.frames {
            merged.extend(frame.iter().map(|(k, v)| (k.as_str(), v)));
        }
        merged
    }

    /// Substitute `{{KEY}}` placeholders from the visible variables
    pub fn substitute(&self, template: &str) -> String {
        subst::substitute(template, |key| self.get(key))
    }

    /// Substitute placeholders inside a value (strings only)
    pub fn substitute_value(&self, value: &Value) -> Value {
        subst::substitute_value(value, |key| self.get(key))
    }

    /// Tag of the device under test
    pub fn dut(&self) -> Option<&str> {
        self.get_str(keys::DUT)
    }

    /// Entry of the DUT limits table
    pub fn limit(&self, name: &str) -> Option<&Value> {
        self.get(keys::LIMITS).and_then(|limits| limits.get(name))
    }

    /// Numeric entry of the DUT limits table
    pub fn limit_f64(&self, name: &str) -> Option<f64> {
        self.limit(name).and_then(as_number)
    }

    /// Store a collaborator handle (instrument, transport, ...)
    pub fn insert_resource<T: Any>(&mut self, key: impl Into<String>, resource: T) {
        self.resources.insert(key.into(), Box::new(resource));
    }

    /// Borrow a collaborator handle
    pub fn resource<T: Any>(&self, key: &str) -> Result<&T, TestError> {
        let boxed = self
            .resources
            .get(key)
            .ok_or_else(|| TestError::MissingKey(key.to_string()))?;
        boxed.downcast_ref::<T>().ok_or(TestError::Resource {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Mutably borrow a collaborator handle
    pub fn resource_mut<T: Any>(&mut self, key: &str) -> Result<&mut T, TestError> {
        let boxed = self
            .resources
            .get_mut(key)
            .ok_or_else(|| TestError::MissingKey(key.to_string()))?;
        boxed.downcast_mut::<T>().ok_or(TestError::Resource {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Remove a collaborator handle, e.g. to close it at the end of a run
    pub fn take_resource<T: Any>(&mut self, key: &str) -> Option<T> {
        let boxed = self.resources.remove(key)?;
        boxed.downcast::<T>().ok().map(|b| *b)
    }

    /// Ask the operator a blocking question
    pub fn ask(&mut self, text: &str) -> bool {
        self.ui.ask(text)
    }

    /// Result sink of this run
    pub fn results(&self) -> &dyn ResultSink {
        self.results.as_ref()
    }

    /// Mutable result sink of this run
    pub fn results_mut(&mut self) -> &mut dyn ResultSink {
        self.results.as_mut()
    }

    /// Report a progress line through the result sink
    pub fn progress(&mut self, message: &str) {
        self.results.output_progress(message);
    }

    /// Run-wide abort flag
    pub fn abort_flag(&self) -> &AbortFlag {
        &self.abort
    }

    /// Whether the run has been aborted
    pub fn is_aborted(&self) -> bool {
        self.abort.is_raised()
    }

    /// Consume the context, keeping only the result sink
    pub fn into_results(self) -> Box<dyn ResultSink> {
        self.results
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("variables", &self.variables())
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("aborted", &self.abort.is_raised())
            .finish()
    }
}
