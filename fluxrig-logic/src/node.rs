//! Execution Node Tree
//!
//! Built once from a script and never mutated. Test cases hold the resolved
//! descriptor so evaluation never consults the registry again.

use fluxrig_core::TestDescriptor;
use serde_json::Value;
use std::rc::Rc;

/// Ordered `key -> value` overrides as written in the script
pub type Bindings = Vec<(String, Value)>;

/// Scope used by bundles that do not name one
pub const GLOBAL_SCOPE: &str = "global";

/// Name given to repeat blocks without one
pub const DEFAULT_REPEAT_NAME: &str = "<repeat>";

/// One node of a test script
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Invocation of a registered test
    Test(TestCase),
    /// Parameterized iteration over one child
    Repeat(Repeat),
    /// Ordered group sharing a result scope
    Bundle(Bundle),
}

impl Node {
    /// Display name
    pub fn name(&self) -> &str {
        match self {
            Node::Test(t) => &t.name,
            Node::Repeat(r) => &r.name,
            Node::Bundle(b) => &b.name,
        }
    }

    /// Number of test-case leaves below this node (repeats count once)
    pub fn leaf_count(&self) -> usize {
        match self {
            Node::Test(_) => 1,
            Node::Repeat(r) => r.child.leaf_count(),
            Node::Bundle(b) => b.children.iter().map(Node::leaf_count).sum(),
        }
    }
}

/// Leaf invoking one registered test
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Registered test name
    pub name: String,
    /// Resolved descriptor
    pub test: Rc<TestDescriptor>,
    /// Local variables bound for this invocation
    pub args: Bindings,
    /// Halt the remaining siblings when this test does not pass
    pub abort_bundle_on_failure: bool,
    /// Disabled tests are reported and skipped
    pub enabled: bool,
}

impl TestCase {
    /// Test case with default options
    pub fn new(test: Rc<TestDescriptor>) -> Self {
        Self {
            name: test.name().to_string(),
            test,
            args: Bindings::new(),
            abort_bundle_on_failure: false,
            enabled: true,
        }
    }
}

impl PartialEq for TestCase {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.args == other.args
            && self.abort_bundle_on_failure == other.abort_bundle_on_failure
            && self.enabled == other.enabled
    }
}

/// How many times a repeat runs and with which overrides
#[derive(Debug, Clone, PartialEq)]
pub enum Iterations {
    /// Anonymous iterations
    Count(usize),
    /// One iteration per override set
    Args(Vec<Bindings>),
}

impl Iterations {
    /// Number of iterations
    pub fn len(&self) -> usize {
        match self {
            Iterations::Count(n) => *n,
            Iterations::Args(sets) => sets.len(),
        }
    }

    /// Whether the repeat runs zero times
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Re-runs one child with per-iteration overrides
#[derive(Debug, Clone, PartialEq)]
pub struct Repeat {
    /// Name used in paths
    pub name: String,
    /// Description
    pub description: String,
    /// Iterations
    pub iterations: Iterations,
    /// Child bundle or nested repeat
    pub child: Box<Node>,
    /// Disabled repeats are no-ops
    pub enabled: bool,
}

/// Named, ordered group of steps
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    /// Name used in paths
    pub name: String,
    /// Description
    pub description: String,
    /// Scope label, may contain `{{KEY}}` placeholders
    pub scope: String,
    /// Children in declaration order
    pub children: Vec<Node>,
    /// Disabled bundles are no-ops
    pub enabled: bool,
}

impl Bundle {
    /// Empty bundle in the global scope
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            scope: GLOBAL_SCOPE.to_string(),
            children: Vec::new(),
            enabled: true,
        }
    }
}
