#![warn(missing_docs)]
//! Fluxrig CLI Library
//!
//! Command line driver for test campaigns. The binary registers its tests
//! in an explicit startup phase and hands the registry over:
//!
//! ```ignore
//! fn main() {
//!     let mut registry = fluxrig_core::Registry::new();
//!     fluxrig_cli::register_builtin(&mut registry);
//!     if let Err(e) = fluxrig_cli::run_with_registry(registry) {
//!         eprintln!("Error: {:#}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

mod config;
mod console;
mod formatting;
mod signal;
mod suite;

pub use config::*;
pub use console::{ConsoleReporter, ConsoleUi, Transition, format_bundle, format_result, is_confirmation};
pub use formatting::{format_summary, not_passed};
pub use signal::install_interrupt_handler;
pub use suite::{PAUSE_SECS, PROMPT, register_builtin};

use clap::{Parser, Subcommand};
use fluxrig_core::{AbortFlag, Context, Registry, keys};
use fluxrig_logic::{Dispatcher, Executor, ScriptError, parse_script};
use fluxrig_report::{ReportArchive, ResultStore};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Variable holding the `--channels` list
pub const CHANNELS: &str = "CHANNELS";

/// Fluxrig CLI arguments
#[derive(Parser, Debug)]
#[command(name = "fluxrig")]
#[command(author, version, about = "Fluxrig - script-driven RF conformance test rig")]
pub struct Cli {
    /// Optional subcommand (Run, List, Check, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// YAML test script
    pub script: Option<PathBuf>,

    /// Device under test tag (selects DUT-specific tests and limits)
    #[arg(short, long, global = true)]
    pub dut: Option<String>,

    /// ARFCN to test
    #[arg(short, long, global = true)]
    pub arfcn: Option<i64>,

    /// Test only these channels
    #[arg(short, long, value_delimiter = ',', global = true)]
    pub channels: Vec<i64>,

    /// Tests to exclude, comma separated (added to the config list)
    #[arg(short = 'x', long, value_delimiter = ',', global = true)]
    pub exclude: Vec<String>,

    /// Extra global variable; VALUE is parsed as JSON when possible
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var, global = true)]
    pub vars: Vec<(String, Value)>,

    /// Trace script execution
    #[arg(short, long, global = true)]
    pub trace: bool,

    /// Directory of persisted reports (overrides the config)
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the script (default)
    Run {
        /// YAML test script
        script: Option<PathBuf>,
    },
    /// List all registered tests
    List,
    /// Parse the script and report every problem without running it
    Check {
        /// YAML test script
        script: Option<PathBuf>,
    },
    /// Print a default fluxrig.toml
    Init,
}

/// How a finished run was persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalized {
    /// Report written to this path
    Saved(PathBuf),
    /// No test produced a run identifier
    NoRunId,
    /// The run was aborted and `save_on_abort` is off
    AbortedUnsaved,
}

/// Parse a `KEY=VALUE` pair; VALUE is JSON when it parses, a string otherwise
pub fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in `{}`", raw));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Parse the command line and run with the given registry.
/// This is the main entry point for campaign binaries.
pub fn run_with_registry(registry: Registry) -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli, registry)
}

/// Run with pre-parsed arguments.
pub fn run_with_cli(cli: Cli, registry: Registry) -> anyhow::Result<()> {
    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("fluxrig=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("fluxrig=info")
            .init();
    }

    // Discover fluxrig.toml configuration (CLI flags override)
    let mut config = FluxrigConfig::discover().unwrap_or_default();
    apply_overrides(&mut config, &cli);

    match &cli.command {
        Some(Commands::List) => list_tests(&registry),
        Some(Commands::Init) => {
            print!("{}", FluxrigConfig::default_toml());
            Ok(())
        }
        Some(Commands::Check { script }) => {
            check_script(require_script(script.as_deref(), &cli)?, &registry)
        }
        Some(Commands::Run { script }) => run_or_exit(script.as_deref(), &cli, &config, &registry),
        None => run_or_exit(None, &cli, &config, &registry),
    }
}

/// The subcommand's script wins over the top-level one
fn require_script<'a>(script: Option<&'a Path>, cli: &'a Cli) -> anyhow::Result<&'a Path> {
    script
        .or(cli.script.as_deref())
        .ok_or_else(|| anyhow::anyhow!("no test script given"))
}

fn run_or_exit(
    script: Option<&Path>,
    cli: &Cli,
    config: &FluxrigConfig,
    registry: &Registry,
) -> anyhow::Result<()> {
    let script = require_script(script, cli)?;
    if run_script(script, cli, config, registry)? == Finalized::AbortedUnsaved {
        std::process::exit(1);
    }
    Ok(())
}

/// Layer CLI flags over the configuration file
pub fn apply_overrides(config: &mut FluxrigConfig, cli: &Cli) {
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.display().to_string();
    }
    if cli.trace {
        config.runner.trace_calls = true;
    }
    for name in &cli.exclude {
        if !config.runner.exclude.contains(name) {
            config.runner.exclude.push(name.clone());
        }
    }
    if !config.runner.exclude.is_empty() {
        tracing::info!("Exclude list: {:?}", config.runner.exclude);
    }
}

/// Bind the run-wide variables: config variables, `--var` pairs, then the
/// DUT, its limit table, ARFCN and channels
pub fn bind_globals(ctx: &mut Context, cli: &Cli, config: &FluxrigConfig) {
    for (key, value) in &config.variables {
        ctx.set(key.clone(), value.clone());
    }
    for (key, value) in &cli.vars {
        ctx.set(key.clone(), value.clone());
    }

    if let Some(dut) = &cli.dut {
        ctx.set(keys::DUT, dut.clone());
        match config.limits_for(dut) {
            Some(limits) => ctx.set(keys::LIMITS, limits),
            None => tracing::warn!(dut = %dut, "no limit table configured"),
        }
    }
    if let Some(arfcn) = cli.arfcn {
        ctx.set(keys::ARFCN, arfcn);
    }
    if !cli.channels.is_empty() {
        ctx.set(CHANNELS, cli.channels.clone());
    }
    if !ctx.contains(keys::CHANNEL) {
        ctx.set(keys::CHANNEL, "");
    }
}

fn list_tests(registry: &Registry) -> anyhow::Result<()> {
    println!("Fluxrig Tests:");
    for test in registry.iter() {
        println!(
            "{:>35}: {:<50} [{}]",
            test.name(),
            test.label(),
            test.applicability()
        );
    }
    println!("{} tests registered.", registry.len());
    Ok(())
}

fn report_issues(err: &ScriptError) {
    for issue in err.issues() {
        eprintln!("  {}", issue);
    }
}

fn check_script(script: &Path, registry: &Registry) -> anyhow::Result<()> {
    let text = read_script(script)?;
    match parse_script(&text, registry) {
        Ok(bundles) => {
            let leaves: usize = bundles
                .iter()
                .flat_map(|bundle| &bundle.children)
                .map(|node| node.leaf_count())
                .sum();
            println!(
                "{}: {} bundles, {} test cases",
                script.display(),
                bundles.len(),
                leaves
            );
            Ok(())
        }
        Err(e) => {
            report_issues(&e);
            Err(e.into())
        }
    }
}

fn read_script(script: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(script)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", script.display(), e))
}

fn run_script(
    script: &Path,
    cli: &Cli,
    config: &FluxrigConfig,
    registry: &Registry,
) -> anyhow::Result<Finalized> {
    let text = read_script(script)?;
    let executor = match Executor::parse(&text, registry) {
        Ok(executor) => executor,
        Err(e) => {
            report_issues(&e);
            return Err(e.into());
        }
    };

    let archive = config.output.archive();
    let store = ResultStore::new(Box::new(ConsoleReporter)).with_archive(archive.clone());

    let abort = AbortFlag::new();
    install_interrupt_handler(abort.clone());
    let ui = ConsoleUi::new(abort.clone());
    let mut ctx = Context::new(Box::new(ui), Box::new(store)).with_abort_flag(abort);
    bind_globals(&mut ctx, cli, config);

    let dispatcher = Dispatcher::new()
        .with_exclude(config.runner.exclude.iter().cloned())
        .with_trace(config.runner.trace_calls);
    let executor = executor.with_dispatcher(dispatcher);

    tracing::info!(script = %script.display(), bundles = executor.bundles().len(), "starting run");
    if !executor.run(&mut ctx) {
        tracing::info!("at least one bundle stopped early");
    }

    println!("{}", format_summary(&ctx.results().summary()));
    finalize(&ctx, &archive, config.output.save_on_abort)
}

/// Persist the report of a finished run.
///
/// Aborted runs are only written with `save_on_abort`. The file is named
/// after the `TEST_ID` variable; without it nothing is written.
pub fn finalize(
    ctx: &Context,
    archive: &ReportArchive,
    save_on_abort: bool,
) -> anyhow::Result<Finalized> {
    if ctx.is_aborted() && !save_on_abort {
        println!("Test was aborted, don't save data");
        return Ok(Finalized::AbortedUnsaved);
    }

    let Some(run_id) = ctx.get_str(keys::RUN_ID) else {
        tracing::warn!("{} variable wasn't declared during test, skipping writing results", keys::RUN_ID);
        return Ok(Finalized::NoRunId);
    };

    let report = ctx.results().serialize()?;
    let path = archive.write(run_id, &report)?;
    println!("Report written to {}", path.display());
    Ok(Finalized::Saved(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxrig_core::{AutoUi, Verdict};
    use fluxrig_report::ChannelReporter;
    use serde_json::json;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("fluxrig").chain(args.iter().copied()))
    }

    fn context() -> Context {
        let (reporter, _rx) = ChannelReporter::new();
        let store = ResultStore::new(Box::new(reporter));
        Context::new(Box::new(AutoUi { answer: true }), Box::new(store))
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(parse_var("ARFCN=60").unwrap(), ("ARFCN".into(), json!(60)));
        assert_eq!(parse_var("ON=true").unwrap(), ("ON".into(), json!(true)));
        assert_eq!(
            parse_var("SITE=lab 3").unwrap(),
            ("SITE".into(), json!("lab 3"))
        );
        assert_eq!(parse_var("EMPTY=").unwrap(), ("EMPTY".into(), json!("")));
        assert!(parse_var("NOVALUE").is_err());
        assert!(parse_var("=1").is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = cli(&[
            "campaign.yaml",
            "--dut",
            "UmTRX",
            "-x",
            "vswr,gps",
            "--channels",
            "1,2",
            "--var",
            "OPERATOR=kim",
        ]);
        assert_eq!(cli.script.as_deref(), Some(Path::new("campaign.yaml")));
        assert_eq!(cli.dut.as_deref(), Some("UmTRX"));
        assert_eq!(cli.exclude, vec!["vswr", "gps"]);
        assert_eq!(cli.channels, vec![1, 2]);
        assert_eq!(cli.vars, vec![("OPERATOR".to_string(), json!("kim"))]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_subcommand_script_and_global_flags() {
        let check = cli(&["check", "other.yaml", "--dut", "UmSITE"]);
        let Some(Commands::Check { script }) = &check.command else {
            panic!("expected the check command");
        };
        assert_eq!(
            require_script(script.as_deref(), &check).unwrap(),
            Path::new("other.yaml")
        );
        assert_eq!(check.dut.as_deref(), Some("UmSITE"));

        let list = cli(&["list"]);
        assert!(matches!(list.command, Some(Commands::List)));
        assert!(require_script(None, &list).is_err());
    }

    #[test]
    fn test_overrides_union_excludes() {
        let mut config = FluxrigConfig::default();
        config.runner.exclude = vec!["gps".into()];
        let cli = cli(&["--exclude", "gps,vswr", "--trace", "--output-dir", "/tmp/reports"]);

        apply_overrides(&mut config, &cli);
        assert_eq!(config.runner.exclude, vec!["gps", "vswr"]);
        assert!(config.runner.trace_calls);
        assert_eq!(config.output.directory, "/tmp/reports");
    }

    #[test]
    fn test_bind_globals() {
        let config: FluxrigConfig = toml::from_str(
            r#"
            [variables]
            ARFCN = 10
            SITE = "lab"

            [limits.UmTRX]
            freq_error = 50
            "#,
        )
        .unwrap();
        let cli = cli(&["--dut", "UmTRX", "--arfcn", "60", "--var", "SITE=roof"]);
        let mut ctx = context();

        bind_globals(&mut ctx, &cli, &config);
        assert_eq!(ctx.dut(), Some("UmTRX"));
        assert_eq!(ctx.get(keys::ARFCN), Some(&json!(60)));
        assert_eq!(ctx.get_str("SITE"), Some("roof"));
        assert_eq!(ctx.limit_f64("freq_error"), Some(50.0));
        assert_eq!(ctx.get_str(keys::CHANNEL), Some(""));
    }

    #[test]
    fn test_finalize_aborted_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ReportArchive::new(dir.path(), "bts-test");
        let ctx = context();
        ctx.abort_flag().raise();
        assert_eq!(finalize(&ctx, &archive, false).unwrap(), Finalized::AbortedUnsaved);
    }

    #[test]
    fn test_finalize_without_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ReportArchive::new(dir.path(), "bts-test");
        let ctx = context();
        assert_eq!(finalize(&ctx, &archive, false).unwrap(), Finalized::NoRunId);
    }

    #[test]
    fn test_finalize_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ReportArchive::new(dir.path(), "bts-test");
        let mut registry = Registry::new();
        register_builtin(&mut registry);
        let test = registry.lookup("dut_tag").unwrap();

        let mut ctx = context();
        ctx.abort_flag().raise();
        ctx.set(keys::RUN_ID, "bench7_2026-01-02-030405");
        ctx.results_mut()
            .record("/", &test, Verdict::Pass, json!("UmTRX"), None);

        let Finalized::Saved(path) = finalize(&ctx, &archive, true).unwrap() else {
            panic!("expected the report to be saved");
        };
        assert_eq!(
            path,
            dir.path().join("bts-test.bench7_2026-01-02-030405.json")
        );
        let saved = archive.read(&path).unwrap();
        assert_eq!(saved["global"]["dut_tag"].verdict, Verdict::Pass);
    }
}
