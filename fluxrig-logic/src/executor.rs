//! Script Executor
//!
//! Depth-first evaluation of the node tree with one shared [`Context`].
//! Children run in declaration order; a `false` return from a node tells
//! the enclosing bundle to stop running its remaining children.

use crate::dispatch::Dispatcher;
use crate::node::{Bindings, Bundle, Iterations, Node, Repeat, TestCase};
use crate::script::{ScriptError, parse_script};
use fluxrig_core::{Context, Registry, Verdict, display_value, keys, subst};
use fxhash::FxHashMap;
use serde_json::Value;

/// Parsed script plus the dispatch policy used to run it
#[derive(Debug, Clone)]
pub struct Executor {
    bundles: Vec<Bundle>,
    dispatcher: Dispatcher,
}

impl Executor {
    /// Parse a script against `registry`
    pub fn parse(text: &str, registry: &Registry) -> Result<Self, ScriptError> {
        Ok(Self::new(parse_script(text, registry)?))
    }

    /// Executor over already built bundles
    pub fn new(bundles: Vec<Bundle>) -> Self {
        Self {
            bundles,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Replace the dispatch policy
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Top-level bundles
    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    /// Dispatch policy
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run every top-level bundle in order.
    ///
    /// Returns `false` when at least one bundle stopped early.
    pub fn run(&self, ctx: &mut Context) -> bool {
        if self.dispatcher.trace_calls() {
            let globals: Vec<String> = ctx
                .variables()
                .into_iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            ctx.progress(&format!(
                "Run testsuite with global variables: {}",
                globals.join(", ")
            ));
        }

        ctx.set(keys::ITER, "");
        let mut completed = true;
        for bundle in &self.bundles {
            if self.dispatcher.trace_calls() {
                ctx.progress(&format!("Executing bundle: {}", bundle.name));
            }
            completed &= run_bundle(bundle, "", ctx, &self.dispatcher);
        }
        completed
    }
}

/// Evaluate one node below `path`
pub fn run_node(node: &Node, path: &str, ctx: &mut Context, dispatcher: &Dispatcher) -> bool {
    match node {
        Node::Test(case) => run_test(case, path, ctx, dispatcher),
        Node::Repeat(repeat) => run_repeat(repeat, path, ctx, dispatcher),
        Node::Bundle(bundle) => run_bundle(bundle, path, ctx, dispatcher),
    }
}

fn run_test(case: &TestCase, path: &str, ctx: &mut Context, dispatcher: &Dispatcher) -> bool {
    if !case.enabled {
        ctx.progress(&format!("Test {} in {} bundle is disabled", case.name, path));
        return true;
    }
    if !case.test.applicability().matches(ctx.dut()) {
        dispatcher.skip_incompatible(path, &case.test, ctx);
        return true;
    }

    let verdict = if case.args.is_empty() {
        dispatcher.dispatch(path, &case.test, ctx)
    } else {
        let frame = resolve(&case.args, ctx);
        ctx.with_frame(frame.into_iter().collect(), |ctx| {
            dispatcher.dispatch(path, &case.test, ctx)
        })
    };

    if case.abort_bundle_on_failure && verdict != Verdict::Pass {
        ctx.progress(&format!(
            "Test {} failed which also fails whole {} bundle",
            case.name, path
        ));
        return false;
    }
    true
}

fn run_repeat(repeat: &Repeat, path: &str, ctx: &mut Context, dispatcher: &Dispatcher) -> bool {
    if !repeat.enabled {
        return true;
    }

    let parent_iter = ctx.get_str(keys::ITER).unwrap_or_default().to_string();
    for i in 0..repeat.iterations.len() {
        let (overrides, child_path) = iteration(repeat, i, path, ctx);

        let mut frame: FxHashMap<String, Value> = overrides.into_iter().collect();
        frame.insert(keys::ITER.to_string(), Value::String(format!("{}/{}", parent_iter, i)));
        // Iterations always run to the end; only the abort flag stops the leaves
        ctx.with_frame(frame, |ctx| run_node(&repeat.child, &child_path, ctx, dispatcher));
    }
    true
}

fn run_bundle(bundle: &Bundle, path: &str, ctx: &mut Context, dispatcher: &Dispatcher) -> bool {
    if !bundle.enabled {
        return true;
    }

    let scope = ctx.substitute(&bundle.scope);
    if subst::has_placeholders(&scope) {
        let unbound = subst::placeholders(&scope).join(", ");
        tracing::warn!(bundle = %bundle.name, scope = %scope, "unresolved scope placeholders");
        ctx.progress(&format!(
            "Bundle {}/{} skipped: scope `{}` references unbound {}",
            path, bundle.name, bundle.scope, unbound
        ));
        // Leaves land in the enclosing scope, never under the literal label
        let reason = format!("unresolved scope {}", scope);
        let child_path = format!("{}/{}", path, bundle.name);
        for child in &bundle.children {
            skip_node(child, &child_path, ctx, &reason);
        }
        return true;
    }

    let outer_scope = ctx.results().scope().to_string();
    ctx.results_mut().set_scope(&scope);
    ctx.results_mut()
        .enter_bundle(path, &bundle.name, &bundle.description);

    let child_path = format!("{}/{}", path, bundle.name);
    let mut completed = true;
    for child in &bundle.children {
        if !run_node(child, &child_path, ctx, dispatcher) {
            completed = false;
            break;
        }
    }

    ctx.results_mut().set_scope(&outer_scope);
    completed
}

/// Overrides and child path of iteration `i`
fn iteration(repeat: &Repeat, i: usize, path: &str, ctx: &Context) -> (Bindings, String) {
    let overrides = match &repeat.iterations {
        Iterations::Count(_) => Bindings::new(),
        Iterations::Args(sets) => resolve(&sets[i], ctx),
    };
    let label = if overrides.is_empty() {
        i.to_string()
    } else {
        render(&overrides)
    };
    let child_path = format!("{}/{}@{}", path, repeat.name, label);
    (overrides, child_path)
}

/// Record every enabled leaf below `node` as aborted without calling it
fn skip_node(node: &Node, path: &str, ctx: &mut Context, reason: &str) {
    match node {
        Node::Test(case) => {
            if case.enabled {
                ctx.results_mut()
                    .record_skip(path, &case.test, Verdict::Aborted, Some(reason));
            }
        }
        Node::Repeat(repeat) if repeat.enabled => {
            for i in 0..repeat.iterations.len() {
                let (_, child_path) = iteration(repeat, i, path, ctx);
                skip_node(&repeat.child, &child_path, ctx, reason);
            }
        }
        Node::Bundle(bundle) if bundle.enabled => {
            let child_path = format!("{}/{}", path, bundle.name);
            for child in &bundle.children {
                skip_node(child, &child_path, ctx, reason);
            }
        }
        _ => {}
    }
}

/// Substitute string overrides against the live context
fn resolve(bindings: &Bindings, ctx: &Context) -> Bindings {
    bindings
        .iter()
        .map(|(k, v)| (k.clone(), ctx.substitute_value(v)))
        .collect()
}

fn render(bindings: &Bindings) -> String {
    bindings
        .iter()
        .map(|(k, v)| format!("{}={}", k, display_value(v).unwrap_or_else(|| "null".into())))
        .collect::<Vec<_>>()
        .join(",")
}
