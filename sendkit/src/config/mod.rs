//! Configuration for the `sendkit-sim` driver.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/sendkit/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;

use sendkit_proto::device::DeviceId;

use crate::attempt::{AttemptConfig, MAX_RETRIES_PER_RECIPIENT};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    attempt: AttemptFileConfig,
    sim: SimFileConfig,
}

/// `[attempt]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AttemptFileConfig {
    max_retries: Option<u32>,
}

/// `[sim]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SimFileConfig {
    devices: Option<Vec<i64>>,
    sealed_sender: Option<bool>,
    websocket_failures: Option<Vec<DeviceId>>,
    rest_failures: Option<Vec<DeviceId>>,
    ud_auth_failures: Option<Vec<DeviceId>>,
    unreachable_devices: Option<Vec<DeviceId>>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Scripted scenario for the simulated service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Raw device list of the simulated recipient.
    pub devices: Vec<i64>,
    /// Whether the attempt starts with a sealed-sender credential.
    pub sealed_sender: bool,
    /// Devices whose first websocket send fails.
    pub websocket_failures: Vec<DeviceId>,
    /// Devices whose first REST send fails.
    pub rest_failures: Vec<DeviceId>,
    /// Devices whose first sealed send is rejected.
    pub ud_auth_failures: Vec<DeviceId>,
    /// Devices that never accept a send.
    pub unreachable_devices: Vec<DeviceId>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            devices: vec![1, 2, 3],
            sealed_sender: true,
            websocket_failures: Vec::new(),
            rest_failures: Vec::new(),
            ud_auth_failures: Vec::new(),
            unreachable_devices: Vec::new(),
        }
    }
}

/// Fully resolved simulator configuration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Settings applied to each delivery attempt.
    pub attempt: AttemptConfig,
    /// The scripted scenario.
    pub sim: SimConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            attempt: AttemptConfig {
                max_retries: MAX_RETRIES_PER_RECIPIENT,
            },
            sim: SimConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read,
    /// or if any config file that exists cannot be parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: ConfigFile) -> Self {
        let defaults = Self::default();
        let sim = file.sim;

        Self {
            attempt: AttemptConfig {
                max_retries: cli
                    .max_retries
                    .or(file.attempt.max_retries)
                    .unwrap_or(defaults.attempt.max_retries),
            },
            sim: SimConfig {
                devices: cli
                    .devices
                    .clone()
                    .or(sim.devices)
                    .unwrap_or(defaults.sim.devices),
                sealed_sender: !cli.identified
                    && sim.sealed_sender.unwrap_or(defaults.sim.sealed_sender),
                websocket_failures: sim
                    .websocket_failures
                    .unwrap_or(defaults.sim.websocket_failures),
                rest_failures: sim.rest_failures.unwrap_or(defaults.sim.rest_failures),
                ud_auth_failures: sim
                    .ud_auth_failures
                    .unwrap_or(defaults.sim.ud_auth_failures),
                unreachable_devices: sim
                    .unreachable_devices
                    .unwrap_or(defaults.sim.unreachable_devices),
            },
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Run a scripted delivery attempt")]
pub struct CliArgs {
    /// Path to config file (default: `~/.config/sendkit/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Initial retry budget for the attempt.
    #[arg(long, env = "SENDKIT_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Comma-separated device ids of the simulated recipient.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub devices: Option<Vec<i64>>,

    /// Start without a sealed-sender credential.
    #[arg(long)]
    pub identified: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "SENDKIT_LOG")]
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("sendkit").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
