//! Fluxrig command line entry point

use fluxrig_core::Registry;

fn main() {
    let mut registry = Registry::new();
    fluxrig_cli::register_builtin(&mut registry);

    if let Err(e) = fluxrig_cli::run_with_registry(registry) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
