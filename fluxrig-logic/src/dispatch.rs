//! Dispatcher
//!
//! The one policy function every leaf goes through. Nothing a test function
//! does (error or panic) escapes it; every call records exactly one outcome.

use fluxrig_core::{Context, TestDescriptor, TestError, Verdict};
use fxhash::FxHashSet;
use std::panic::{self, AssertUnwindSafe};

/// Skip, abort and classification policy for test invocations
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    exclude: FxHashSet<String>,
    trace_calls: bool,
}

impl Dispatcher {
    /// Dispatcher without exclusions or tracing
    pub fn new() -> Self {
        Self::default()
    }

    /// Never run the named tests; they are recorded as `NotApplicable`
    pub fn with_exclude<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Emit a progress line before each call
    pub fn with_trace(mut self, trace_calls: bool) -> Self {
        self.trace_calls = trace_calls;
        self
    }

    /// Whether `name` is excluded
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.contains(name)
    }

    /// Whether calls are traced
    pub fn trace_calls(&self) -> bool {
        self.trace_calls
    }

    /// Record a test that does not apply to the DUT bound in `ctx`
    pub fn skip_incompatible(&self, path: &str, test: &TestDescriptor, ctx: &mut Context) -> Verdict {
        let reason = format!(
            "{} in {} isn't compatible with DUT:{}, ignoring",
            test.name(),
            path,
            ctx.dut().unwrap_or("none")
        );
        ctx.results_mut()
            .record_skip(path, test, Verdict::NotApplicable, Some(&reason))
    }

    /// Run one test under the skip/abort policy and record its outcome
    pub fn dispatch(&self, path: &str, test: &TestDescriptor, ctx: &mut Context) -> Verdict {
        if self.is_excluded(test.name()) {
            return ctx
                .results_mut()
                .record_skip(path, test, Verdict::NotApplicable, Some("excluded"));
        }
        if !test.applicability().matches(ctx.dut()) {
            return self.skip_incompatible(path, test, ctx);
        }
        if ctx.is_aborted() {
            return ctx
                .results_mut()
                .record_skip(path, test, Verdict::Aborted, None);
        }

        let missing = test.missing_keys(ctx);
        if !missing.is_empty() {
            let reason = format!("missing context keys: {}", missing.join(", "));
            tracing::warn!(test = test.name(), path, "{}", reason);
            return ctx
                .results_mut()
                .record_skip(path, test, Verdict::Aborted, Some(&reason));
        }

        if self.trace_calls {
            ctx.progress(&format!("Calling {}/{}", path, test.name()));
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| test.call(ctx)));
        match outcome {
            Ok(Ok(value)) => {
                let verdict = test.check(&value, ctx);
                ctx.results_mut().record(path, test, verdict, value, None)
            }
            Ok(Err(TestError::Interrupted)) => {
                tracing::warn!(test = test.name(), path, "interrupted, aborting the run");
                ctx.abort_flag().raise();
                ctx.results_mut().record(
                    path,
                    test,
                    Verdict::Aborted,
                    serde_json::Value::Null,
                    Some("interrupted"),
                )
            }
            Ok(Err(e)) if e.is_timeout() => {
                let reason = e.to_string();
                ctx.results_mut()
                    .record(path, test, Verdict::Fail, serde_json::Value::Null, Some(&reason))
            }
            Ok(Err(e)) => {
                tracing::error!(test = test.name(), path, error = ?e, "test failed: {}", e);
                let reason = e.to_string();
                ctx.results_mut()
                    .record(path, test, Verdict::Aborted, serde_json::Value::Null, Some(&reason))
            }
            Err(panic) => {
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                tracing::error!(test = test.name(), path, "test panicked: {}", message);
                ctx.results_mut().record(
                    path,
                    test,
                    Verdict::Aborted,
                    serde_json::Value::Null,
                    Some(&format!("panic: {}", message)),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxrig_core::{Applicability, AutoUi, Checker, keys};
    use fluxrig_report::{ChannelReporter, ReportEvent, ResultStore};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::mpsc::Receiver;

    fn context(dut: &str) -> (Context, Receiver<ReportEvent>) {
        let (reporter, rx) = ChannelReporter::new();
        let store = ResultStore::new(Box::new(reporter));
        let mut ctx = Context::new(Box::new(AutoUi { answer: true }), Box::new(store));
        ctx.set(keys::DUT, dut);
        (ctx, rx)
    }

    fn counted(
        name: &str,
        calls: &Rc<Cell<usize>>,
        result: impl Fn() -> Result<serde_json::Value, TestError> + 'static,
    ) -> TestDescriptor {
        let calls = calls.clone();
        TestDescriptor::new(name, move |_| {
            calls.set(calls.get() + 1);
            result()
        })
    }

    fn power(calls: &Rc<Cell<usize>>, value: i64) -> TestDescriptor {
        counted("power", calls, move || Ok(json!(value)))
            .with_applicability(Applicability::only(["RadioX"]))
            .with_checker(Checker::range(10, 20))
    }

    #[test]
    fn test_incompatible_dut_is_not_applicable() {
        let calls = Rc::new(Cell::new(0));
        let test = power(&calls, 15);
        let (mut ctx, rx) = context("RadioY");

        let verdict = Dispatcher::new().dispatch("/b", &test, &mut ctx);

        assert_eq!(verdict, Verdict::NotApplicable);
        assert_eq!(calls.get(), 0);
        let Some(ReportEvent::Result(event)) = rx.try_iter().last() else {
            panic!("expected a result event");
        };
        assert!(event.reason.unwrap().contains("DUT:RadioY"));
    }

    #[test]
    fn test_compatible_dut_passes() {
        let calls = Rc::new(Cell::new(0));
        let test = power(&calls, 15);
        let (mut ctx, _rx) = context("RadioX");

        assert_eq!(Dispatcher::new().dispatch("/b", &test, &mut ctx), Verdict::Pass);
        assert_eq!(calls.get(), 1);
        assert_eq!(ctx.results().lookup("power", None).value, json!(15));
    }

    #[test]
    fn test_excluded_test_is_not_called() {
        let calls = Rc::new(Cell::new(0));
        let test = power(&calls, 15);
        let (mut ctx, _rx) = context("RadioX");

        let dispatcher = Dispatcher::new().with_exclude(["power"]);
        assert_eq!(dispatcher.dispatch("/b", &test, &mut ctx), Verdict::NotApplicable);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_generic_error_aborts_only_the_test() {
        let calls = Rc::new(Cell::new(0));
        let test = counted("flaky", &calls, || Err(TestError::failed("socket closed")));
        let (mut ctx, _rx) = context("RadioX");

        assert_eq!(Dispatcher::new().dispatch("/b", &test, &mut ctx), Verdict::Aborted);
        assert!(!ctx.is_aborted());
        assert_eq!(ctx.results().lookup("flaky", None).verdict, Verdict::Aborted);
    }

    #[test]
    fn test_panic_is_contained() {
        let test = TestDescriptor::new("boom", |_| panic!("instrument exploded"));
        let (mut ctx, rx) = context("RadioX");

        assert_eq!(Dispatcher::new().dispatch("/b", &test, &mut ctx), Verdict::Aborted);
        assert!(!ctx.is_aborted());
        let Some(ReportEvent::Result(event)) = rx.try_iter().last() else {
            panic!("expected a result event");
        };
        assert_eq!(event.reason.as_deref(), Some("panic: instrument exploded"));
    }

    #[test]
    fn test_timeout_is_a_failure() {
        let calls = Rc::new(Cell::new(0));
        let test = counted("slow", &calls, || Err(TestError::Timeout("CMD57 silent".into())));
        let (mut ctx, rx) = context("RadioX");

        assert_eq!(Dispatcher::new().dispatch("/b", &test, &mut ctx), Verdict::Fail);
        assert!(!ctx.is_aborted());
        let Some(ReportEvent::Result(event)) = rx.try_iter().last() else {
            panic!("expected a result event");
        };
        assert_eq!(event.reason.as_deref(), Some("timeout: CMD57 silent"));
    }

    #[test]
    fn test_interrupt_aborts_everything_after() {
        let calls = Rc::new(Cell::new(0));
        let stop = counted("stop", &calls, || Err(TestError::Interrupted));
        let after = counted("after", &calls, || Ok(json!(1)));
        let (mut ctx, _rx) = context("RadioX");
        let dispatcher = Dispatcher::new();

        assert_eq!(dispatcher.dispatch("/b", &stop, &mut ctx), Verdict::Aborted);
        assert!(ctx.is_aborted());
        for _ in 0..3 {
            assert_eq!(dispatcher.dispatch("/b", &after, &mut ctx), Verdict::Aborted);
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(ctx.results().lookup("after", None).verdict, Verdict::Aborted);
    }

    #[test]
    fn test_missing_required_keys() {
        let calls = Rc::new(Cell::new(0));
        let test = counted("needs_cmd", &calls, || Ok(json!(1)))
            .with_requires([keys::INSTRUMENT, keys::ARFCN]);
        let (mut ctx, rx) = context("RadioX");
        ctx.set(keys::ARFCN, 100);

        assert_eq!(Dispatcher::new().dispatch("/b", &test, &mut ctx), Verdict::Aborted);
        assert_eq!(calls.get(), 0);
        let Some(ReportEvent::Result(event)) = rx.try_iter().last() else {
            panic!("expected a result event");
        };
        assert_eq!(event.reason.as_deref(), Some("missing context keys: CMD"));

        ctx.insert_resource(keys::INSTRUMENT, ());
        assert_eq!(Dispatcher::new().dispatch("/b", &test, &mut ctx), Verdict::Pass);
        assert_eq!(calls.get(), 1);
    }
}
