//! Configuration loading from fluxrig.toml
//!
//! Bench configuration can be specified in a `fluxrig.toml` file next to the
//! test scripts. The configuration is automatically discovered by walking up
//! from the current directory. Command line flags override it.

use fluxrig_report::ReportArchive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// File name looked up by [`FluxrigConfig::discover`]
pub const CONFIG_FILE: &str = "fluxrig.toml";

/// Fluxrig configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FluxrigConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Report output configuration
    #[serde(default)]
    pub output: OutputConfig,
    /// Extra global context variables
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    /// Per-DUT limit tables, bound as `DUT_CHECKS` for the selected DUT
    #[serde(default)]
    pub limits: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunnerConfig {
    /// Print every test call and the initial variables
    #[serde(default)]
    pub trace_calls: bool,
    /// Tests never executed (recorded as N/A)
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory of persisted reports
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// File name prefix of persisted reports
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Persist the report even when the run was aborted
    #[serde(default)]
    pub save_on_abort: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            prefix: default_prefix(),
            save_on_abort: false,
        }
    }
}

fn default_output_dir() -> String {
    "out".to_string()
}
fn default_prefix() -> String {
    "bts-test".to_string()
}

impl OutputConfig {
    /// Report archive for this output configuration
    pub fn archive(&self) -> ReportArchive {
        ReportArchive::new(&self.directory, &self.prefix)
    }
}

impl FluxrigConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), "ignoring config: {}", e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Limit table of `dut` as a JSON object
    pub fn limits_for(&self, dut: &str) -> Option<Value> {
        self.limits
            .get(dut)
            .map(|table| Value::Object(table.clone().into_iter().collect()))
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Fluxrig Configuration

[runner]
# Print every test call and the initial variables
trace_calls = false
# Tests that are never executed (recorded as N/A)
exclude = []

[output]
# Directory of persisted reports
directory = "out"
# Reports are written as <prefix>.<run-id>.json
prefix = "bts-test"
# Persist the report even when the run was aborted
save_on_abort = false

[variables]
# Extra global variables visible to every test
# ARFCN = 100

# Per-device limits, bound as DUT_CHECKS for the selected --dut
[limits.UmTRX]
burst_power_peak_min = 17
burst_power_peak_max = 24
freq_error = 50

[limits.UmSITE]
burst_power_peak_min = 5
burst_power_peak_max = 12
freq_error = 50
"#
        .to_string()
    }
}
