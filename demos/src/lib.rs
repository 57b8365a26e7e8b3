//! Fluxrig Demos
//!
//! Runnable demonstrations against a simulated RF tester. This crate is not
//! published; it exists solely to host examples that depend on `fluxrig`.
//!
//! Run any example with:
//! ```sh
//! cargo run --example <name> -p fluxrig-demos
//! ```
//!
//! | Example | Scenario |
//! |---------|----------|
//! | `bts_campaign` | Non-interactive campaign: system checks, then a repeat over channels with per-DUT limits |
//! | `bench_cli` | The full `fluxrig` command line with the simulated tester registered |

use fluxrig::prelude::*;

/// Simulated GSM tester standing in for a serial-attached instrument
#[derive(Debug, Clone)]
pub struct SimulatedTester {
    /// Reported device name
    pub name: String,
    /// Peak burst power on channel 1, dBm
    pub power_dbm: f64,
    /// Power drop per additional channel, dB
    pub channel_step_db: f64,
    /// Frequency error, Hz
    pub freq_error_hz: f64,
    /// RMS phase error, degrees
    pub phase_error_deg: f64,
    /// Go silent after this many measurements
    pub silent_after: Option<usize>,
    measurements: usize,
}

impl SimulatedTester {
    /// Healthy tester reading `power_dbm` on channel 1
    pub fn new(power_dbm: f64) -> Self {
        Self {
            name: "Rohde&Schwarz CMD57 (simulated)".to_string(),
            power_dbm,
            channel_step_db: 0.5,
            freq_error_hz: -12.0,
            phase_error_deg: 1.8,
            silent_after: None,
            measurements: 0,
        }
    }

    /// Stop answering after `n` measurements
    pub fn silent_after(mut self, n: usize) -> Self {
        self.silent_after = Some(n);
        self
    }

    /// Identification string
    pub fn identify(&self) -> &str {
        &self.name
    }

    fn measure(&mut self, what: &str, value: f64) -> Result<f64, TestError> {
        if self.silent_after.is_some_and(|n| self.measurements >= n) {
            return Err(TestError::Timeout(format!("no answer to {} query", what)));
        }
        self.measurements += 1;
        Ok(value)
    }

    /// Peak burst power of `channel` (1-based)
    pub fn burst_power(&mut self, channel: i64) -> Result<f64, TestError> {
        let value = self.power_dbm - self.channel_step_db * (channel.max(1) - 1) as f64;
        self.measure("burst power", value)
    }

    /// Frequency error of the current burst
    pub fn freq_error(&mut self) -> Result<f64, TestError> {
        self.measure("frequency error", self.freq_error_hz)
    }

    /// RMS phase error of the current burst
    pub fn phase_error(&mut self) -> Result<f64, TestError> {
        self.measure("phase error", self.phase_error_deg)
    }
}

fn tester(ctx: &mut Context) -> Result<&mut SimulatedTester, TestError> {
    ctx.resource_mut::<SimulatedTester>(keys::INSTRUMENT)
}

/// Variable read by `tester_connect`: channel 1 peak power of a new tester
pub const TESTER_POWER: &str = "TESTER_POWER";

/// Attach a tester as `CMD` unless one is bound already
fn tester_connect(ctx: &mut Context) -> Result<Value, TestError> {
    if !ctx.contains(keys::INSTRUMENT) {
        let power = ctx.get_f64(TESTER_POWER).unwrap_or(21.0);
        ctx.insert_resource(keys::INSTRUMENT, SimulatedTester::new(power));
    }
    Ok(Value::from(tester(ctx)?.identify()))
}

/// Register the RF tests driving a [`SimulatedTester`] bound as `CMD`
pub fn register_rf_tests(registry: &mut Registry) {
    let radios = Applicability::only(["UmTRX", "UmSITE"]);

    registry.register(
        TestDescriptor::new("tester_connect", tester_connect).with_label("Tester connection"),
    );

    registry.register(
        TestDescriptor::new("tester_name", |ctx| {
            Ok(Value::from(tester(ctx)?.identify()))
        })
        .with_label("Tester device name")
        .with_requires([keys::INSTRUMENT]),
    );
    registry.register(
        TestDescriptor::new("burst_power_peak", |ctx| {
            let channel = ctx.get_f64(keys::CHANNEL).unwrap_or(1.0) as i64;
            Ok(json!(tester(ctx)?.burst_power(channel)?))
        })
        .with_label("TX power peak")
        .with_applicability(radios.clone())
        .with_requires([keys::INSTRUMENT])
        .with_checker(Checker::range(
            Param::limit("burst_power_peak_min"),
            Param::limit("burst_power_peak_max"),
        )),
    );
    registry.register(
        TestDescriptor::new("freq_error", |ctx| Ok(json!(tester(ctx)?.freq_error()?)))
            .with_label("Frequency error")
            .with_applicability(radios.clone())
            .with_requires([keys::INSTRUMENT])
            .with_checker(Checker::abs_within(Param::limit("freq_error"))),
    );
    registry.register(
        TestDescriptor::new("phase_err_rms", |ctx| Ok(json!(tester(ctx)?.phase_error()?)))
            .with_label("Phase error RMS")
            .with_applicability(radios)
            .with_requires([keys::INSTRUMENT])
            .with_checker(Checker::range(0.0, Param::limit("phase_err_rms_max"))),
    );
}

/// Campaign used by the examples
pub const CAMPAIGN: &str = r#"
- bundle:
    name: system
    description: Host and tester identification
    scope: system
    testsuites:
      - host_uname
      - dut_tag
      - tester_connect: { abort_bundle_on_failure: true }
      - tester_name
      - run_id
- bundle:
    name: radio
    description: Per-channel RF measurements
    testsuites:
      - repeat:
          name: channels
          args: [ { CHAN: 1 }, { CHAN: 2 } ]
          bundle:
            name: trx
            description: "Transceiver {{CHAN}}"
            scope: "TRX{{CHAN}}"
            testsuites:
              - burst_power_peak: { abort_bundle_on_failure: true }
              - freq_error
              - phase_err_rms
"#;

/// Limit table of the simulated UmTRX
pub fn umtrx_limits() -> Value {
    json!({
        "burst_power_peak_min": 17,
        "burst_power_peak_max": 24,
        "freq_error": 50,
        "phase_err_rms_max": 5,
    })
}
