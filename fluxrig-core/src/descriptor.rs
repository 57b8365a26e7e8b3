//! Test Registry
//!
//! Every leaf a script can reference is a [`TestDescriptor`] held in an
//! explicit [`Registry`]. The registry is built by the application before a
//! script is parsed and passed to the parser by reference.

use crate::checker::Checker;
use crate::context::Context;
use crate::error::TestError;
use crate::verdict::Verdict;
use fxhash::FxHashMap;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Signature of a test function: reads and writes the context, returns the
/// measured value (null when there is nothing to report)
pub type TestFn = dyn Fn(&mut Context) -> Result<Value, TestError>;

/// DUT tags a test applies to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Applicability {
    /// Any device, including runs without a DUT tag
    #[default]
    Any,
    /// Only the listed device tags
    Only(BTreeSet<String>),
}

impl Applicability {
    /// Restrict to a set of DUT tags
    pub fn only<S: Into<String>>(tags: impl IntoIterator<Item = S>) -> Self {
        Applicability::Only(tags.into_iter().map(Into::into).collect())
    }

    /// Whether a test with this applicability runs on `dut`.
    ///
    /// Restricted tests never run when no DUT tag is set.
    pub fn matches(&self, dut: Option<&str>) -> bool {
        match self {
            Applicability::Any => true,
            Applicability::Only(tags) => dut.is_some_and(|d| tags.contains(d)),
        }
    }
}

impl fmt::Display for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applicability::Any => f.write_str("any"),
            Applicability::Only(tags) => {
                let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
                f.write_str(&tags.join(", "))
            }
        }
    }
}

/// Registered test
pub struct TestDescriptor {
    name: String,
    function: Box<TestFn>,
    applicability: Applicability,
    checker: Checker,
    label: String,
    requires: Vec<String>,
}

impl TestDescriptor {
    /// New descriptor applicable to any DUT, with the presence checker and
    /// the name as its label
    pub fn new(
        name: impl Into<String>,
        function: impl Fn(&mut Context) -> Result<Value, TestError> + 'static,
    ) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            function: Box::new(function),
            applicability: Applicability::Any,
            checker: Checker::default(),
            requires: Vec::new(),
        }
    }

    /// Restrict the DUT tags this test runs on
    pub fn with_applicability(mut self, applicability: Applicability) -> Self {
        self.applicability = applicability;
        self
    }

    /// Set the checker classifying the returned value
    pub fn with_checker(mut self, checker: Checker) -> Self {
        self.checker = checker;
        self
    }

    /// Set the human-readable label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Context keys that must be bound for the test to run
    pub fn with_requires<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.requires = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Unique name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// DUT applicability
    pub fn applicability(&self) -> &Applicability {
        &self.applicability
    }

    /// Checker
    pub fn checker(&self) -> &Checker {
        &self.checker
    }

    /// Required context keys
    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    /// Required keys not bound in `ctx`
    pub fn missing_keys(&self, ctx: &Context) -> Vec<&str> {
        self.requires
            .iter()
            .filter(|k| !ctx.contains(k))
            .map(String::as_str)
            .collect()
    }

    /// Invoke the test function
    pub fn call(&self, ctx: &mut Context) -> Result<Value, TestError> {
        (self.function)(ctx)
    }

    /// Classify a value with this test's checker
    pub fn check(&self, value: &Value, ctx: &Context) -> Verdict {
        self.checker.check(value, ctx)
    }
}

impl fmt::Debug for TestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDescriptor")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("applicability", &self.applicability)
            .field("checker", &self.checker)
            .field("requires", &self.requires)
            .finish()
    }
}

/// Registry lookup failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No test registered under the name
    #[error("unknown test `{0}`")]
    UnknownTest(String),
}

/// Name -> test descriptor map, iterated in registration order
#[derive(Debug, Default)]
pub struct Registry {
    tests: Vec<Rc<TestDescriptor>>,
    index: FxHashMap<String, usize>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test. A second registration under the same name replaces
    /// the first and keeps its listing position; the replaced descriptor is
    /// returned.
    pub fn register(&mut self, test: TestDescriptor) -> Option<Rc<TestDescriptor>> {
        let test = Rc::new(test);
        match self.index.get(test.name()) {
            Some(&slot) => {
                tracing::debug!(test = test.name(), "replacing registered test");
                Some(std::mem::replace(&mut self.tests[slot], test))
            }
            None => {
                self.index.insert(test.name().to_string(), self.tests.len());
                self.tests.push(test);
                None
            }
        }
    }

    /// Shorthand for registering a function with default settings
    pub fn register_fn(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&mut Context) -> Result<Value, TestError> + 'static,
    ) -> Option<Rc<TestDescriptor>> {
        self.register(TestDescriptor::new(name, function))
    }

    /// Descriptor registered under `name`
    pub fn lookup(&self, name: &str) -> Result<Rc<TestDescriptor>, RegistryError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTest(name.to_string()))
    }

    /// Descriptor registered under `name`, if any
    pub fn get(&self, name: &str) -> Option<&Rc<TestDescriptor>> {
        self.index.get(name).map(|&slot| &self.tests[slot])
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All descriptors in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Rc<TestDescriptor>> + '_ {
        self.tests.iter()
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tests.iter().map(|t| t.name())
    }

    /// Number of registered tests
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}
