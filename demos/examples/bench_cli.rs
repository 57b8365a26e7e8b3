//! Bench Command Line
//!
//! The complete `fluxrig` CLI with the simulated tester attached, as a
//! bench binary would be built:
//!
//! ```sh
//! cargo run --example bench_cli -p fluxrig-demos -- demos/scripts/campaign.yaml --dut UmTRX
//! cargo run --example bench_cli -p fluxrig-demos -- list
//! ```
//!
//! Limits come from `fluxrig.toml` (`fluxrig init` prints one).

use fluxrig::Registry;
use fluxrig_demos::register_rf_tests;

fn main() {
    let mut registry = Registry::new();
    fluxrig::register_builtin(&mut registry);
    register_rf_tests(&mut registry);

    if let Err(e) = fluxrig::run_with_registry(registry) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
