//! Built-in Test Suite
//!
//! Host-side tests that need no instrument: system identification, the
//! run identifier, operator prompts and pauses. Registered by the binary
//! before any script is parsed.

use fluxrig_core::{Checker, Context, Registry, TestDescriptor, TestError, Verdict, keys};
use fluxrig_report::ReportArchive;
use serde_json::{Value, json};
use std::path::Path;
use std::time::{Duration, Instant};

/// Variable holding the `operator_confirm` question
pub const PROMPT: &str = "PROMPT";
/// Variable holding the `pause` duration in seconds
pub const PAUSE_SECS: &str = "PAUSE_SECS";

const SYSTEM_SCOPE: &str = "system";
const PAUSE_SLICE: Duration = Duration::from_millis(100);

/// Register every built-in test into `registry`
pub fn register_builtin(registry: &mut Registry) {
    registry.register(
        TestDescriptor::new("host_uname", |_| read_uname().map(Value::from))
            .with_label("Host system information"),
    );
    registry.register(
        TestDescriptor::new("dut_tag", |ctx| Ok(ctx.require(keys::DUT)?.clone()))
            .with_label("Device under test")
            .with_requires([keys::DUT]),
    );
    registry.register(
        TestDescriptor::new("operator_confirm", operator_confirm)
            .with_label("Operator confirmation")
            .with_checker(Checker::Truthy),
    );
    registry.register(
        TestDescriptor::new("pause", pause)
            .with_label("Pause")
            .with_checker(Checker::Ignore),
    );
    registry.register(TestDescriptor::new("run_id", run_id).with_label("Run identifier"));
}

/// `<os> <hostname> <release>`, the host part being the second word
fn read_uname() -> Result<String, TestError> {
    let kernel = Path::new("/proc/sys/kernel");
    let read = |name: &str| {
        std::fs::read_to_string(kernel.join(name)).map(|text| text.trim().to_string())
    };

    match (read("ostype"), read("hostname"), read("osrelease")) {
        (Ok(os), Ok(host), Ok(release)) => Ok(format!("{} {} {}", os, host, release)),
        _ => {
            let host = std::env::var("HOSTNAME")
                .map_err(|_| TestError::failed("cannot determine the host name"))?;
            Ok(format!("{} {}", std::env::consts::OS, host))
        }
    }
}

fn operator_confirm(ctx: &mut Context) -> Result<Value, TestError> {
    let question = match ctx.get_str(PROMPT) {
        Some(template) => ctx.substitute(template),
        None => "Continue?".to_string(),
    };
    Ok(json!(ctx.ask(&question)))
}

/// Sleep in short slices so an interrupt is noticed promptly
fn pause(ctx: &mut Context) -> Result<Value, TestError> {
    let secs = ctx.get_f64(PAUSE_SECS).unwrap_or(1.0);
    let deadline = Duration::try_from_secs_f64(secs)
        .ok()
        .and_then(|length| Instant::now().checked_add(length))
        .ok_or_else(|| TestError::Failed(format!("invalid {}: {}", PAUSE_SECS, secs)))?;

    loop {
        if ctx.is_aborted() {
            return Err(TestError::Interrupted);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(json!(secs));
        }
        std::thread::sleep(PAUSE_SLICE.min(deadline - now));
    }
}

/// Derive `TEST_ID` from the host name and DUT, loading that identity's history.
///
/// Needs a passing `host_uname` in the current or the `system` scope;
/// returns null otherwise.
fn run_id(ctx: &mut Context) -> Result<Value, TestError> {
    let mut uname = ctx.results().lookup("host_uname", None);
    if uname.is_missing() {
        uname = ctx.results().lookup("host_uname", Some(SYSTEM_SCOPE));
    }
    if uname.verdict != Verdict::Pass {
        return Ok(Value::Null);
    }
    let Some(host) = uname.value.as_str().and_then(|u| u.split_whitespace().nth(1)) else {
        return Ok(Value::Null);
    };

    let fixed = match ctx.dut() {
        Some(dut) => format!("{}_{}", host, dut),
        None => host.to_string(),
    };
    let loaded = ctx.results_mut().load_previous(&fixed);
    tracing::debug!(fixed = %fixed, loaded, "previous results merged");

    let id = ReportArchive::stamp_run_id(&fixed);
    ctx.set(keys::RUN_ID, id.clone());
    Ok(Value::String(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxrig_core::{AbortFlag, AutoUi};
    use fluxrig_report::{ChannelReporter, ResultStore};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        register_builtin(&mut registry);
        registry
    }

    fn context(answer: bool) -> Context {
        let (reporter, _rx) = ChannelReporter::new();
        let store = ResultStore::new(Box::new(reporter));
        Context::new(Box::new(AutoUi { answer }), Box::new(store))
    }

    #[test]
    fn test_all_registered() {
        let registry = registry();
        for name in ["host_uname", "dut_tag", "operator_confirm", "pause", "run_id"] {
            assert!(registry.contains(name), "{} missing", name);
        }
    }

    #[test]
    fn test_dut_tag() {
        let registry = registry();
        let test = registry.lookup("dut_tag").unwrap();
        let mut ctx = context(true);
        ctx.set(keys::DUT, "UmTRX");

        let value = test.call(&mut ctx).unwrap();
        assert_eq!(value, json!("UmTRX"));
        assert_eq!(test.check(&value, &ctx), Verdict::Pass);
    }

    #[test]
    fn test_operator_confirm_uses_answer() {
        let registry = registry();
        let test = registry.lookup("operator_confirm").unwrap();

        let mut ctx = context(false);
        ctx.set(PROMPT, "Connect channel {{CHAN}}");
        ctx.set(keys::CHANNEL, 2);
        let value = test.call(&mut ctx).unwrap();
        assert_eq!(test.check(&value, &ctx), Verdict::Fail);

        let mut ctx = context(true);
        let value = test.call(&mut ctx).unwrap();
        assert_eq!(test.check(&value, &ctx), Verdict::Pass);
    }

    #[test]
    fn test_pause_zero_returns() {
        let registry = registry();
        let test = registry.lookup("pause").unwrap();
        let mut ctx = context(true);
        ctx.set(PAUSE_SECS, 0);
        assert_eq!(test.call(&mut ctx).unwrap(), json!(0.0));
    }

    #[test]
    fn test_pause_rejects_unusable_durations() {
        let registry = registry();
        let test = registry.lookup("pause").unwrap();
        for secs in [json!(-1.5), json!(1e300)] {
            let mut ctx = context(true);
            ctx.set(PAUSE_SECS, secs.clone());
            let err = test.call(&mut ctx).unwrap_err();
            assert!(matches!(err, TestError::Failed(_)), "{}", secs);
            assert!(err.to_string().contains(PAUSE_SECS));
        }
    }

    #[test]
    fn test_pause_notices_abort() {
        let registry = registry();
        let test = registry.lookup("pause").unwrap();
        let flag = AbortFlag::new();
        let mut ctx = context(true).with_abort_flag(flag.clone());
        ctx.set(PAUSE_SECS, 60);
        flag.raise();

        let err = test.call(&mut ctx).unwrap_err();
        assert!(err.is_interrupt());
    }

    #[test]
    fn test_run_id_without_uname_is_null() {
        let registry = registry();
        let test = registry.lookup("run_id").unwrap();
        let mut ctx = context(true);

        let value = test.call(&mut ctx).unwrap();
        assert!(value.is_null());
        assert!(!ctx.contains(keys::RUN_ID));
        assert_eq!(test.check(&value, &ctx), Verdict::Fail);
    }

    #[test]
    fn test_run_id_from_system_scope() {
        let registry = registry();
        let uname = registry.lookup("host_uname").unwrap();
        let run_id = registry.lookup("run_id").unwrap();
        let mut ctx = context(true);
        ctx.set(keys::DUT, "UmTRX");

        ctx.results_mut().set_scope(SYSTEM_SCOPE);
        ctx.results_mut()
            .record("/system", &uname, Verdict::Pass, json!("Linux bench7 6.1.0"), None);
        ctx.results_mut().set_scope("channel-1");

        let value = run_id.call(&mut ctx).unwrap();
        let id = value.as_str().unwrap();
        assert!(id.starts_with("bench7_UmTRX_"));
        assert_eq!(ctx.get_str(keys::RUN_ID), Some(id));
    }
}
