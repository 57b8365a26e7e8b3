//! Simulated BTS Campaign
//!
//! Runs a two-channel campaign against the simulated tester without any
//! operator interaction:
//! - System identification in the `system` scope
//! - A repeat over channels, each channel scoped as `TRX<n>`
//! - Per-DUT limits bound as `DUT_CHECKS`
//!
//! Run with: cargo run --example bts_campaign -p fluxrig-demos

use fluxrig::prelude::*;
use fluxrig::{AutoUi, ConsoleReporter, Executor, ResultStore, format_summary};
use fluxrig_demos::{CAMPAIGN, SimulatedTester, register_rf_tests, umtrx_limits};

fn main() -> anyhow::Result<()> {
    let mut registry = Registry::new();
    fluxrig::register_builtin(&mut registry);
    register_rf_tests(&mut registry);

    let executor = Executor::parse(CAMPAIGN, &registry)?;

    let store = ResultStore::new(Box::new(ConsoleReporter));
    let mut ctx = Context::new(Box::new(AutoUi { answer: true }), Box::new(store));
    ctx.set(keys::DUT, "UmTRX");
    ctx.set(keys::ARFCN, 100);
    ctx.set(keys::LIMITS, umtrx_limits());
    // Channel 2 reads 2 dB low
    let mut tester = SimulatedTester::new(21.0);
    tester.channel_step_db = 2.0;
    ctx.insert_resource(keys::INSTRUMENT, tester);

    executor.run(&mut ctx);

    println!("{}", format_summary(&ctx.results().summary()));
    println!("{}", ctx.results().serialize()?);
    Ok(())
}
