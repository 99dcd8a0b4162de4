//! Layered configuration loading for pulsewire.
//!
//! # Configuration Philosophy
//!
//! Configuration is split into two categories:
//!
//! - **Infrastructure** ([`EndpointConfig`], [`TelemetryConfig`]): where
//!   readings are delivered and how the process logs. Fixed for the life of
//!   the process.
//!
//! - **Session** ([`ActivitySettings`], [`SimulatorConfig`]): what each
//!   monitoring session asks the sensor backend for.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/pulsewire/config.toml` (system)
//! 2. `~/.config/pulsewire/config.toml` (user)
//! 3. `./pulsewire.toml` (local override, replaced by `--config <path>`)
//! 4. Environment variables (`PULSEWIRE_*`)
//!
//! # Example Config
//!
//! ```toml
//! [endpoint]
//! scheme = "http"
//! host = "collector.local"
//! port = 8080
//! base_path = "IoT-Application/rest/v1"
//! timeout_ms = 5000
//!
//! [activity]
//! activity = "walking"
//! environment = "outdoor"
//! quantity_type = "heart-rate"
//!
//! [telemetry]
//! otlp_endpoint = "127.0.0.1:4317"
//! log_level = "info"
//!
//! [simulator]
//! interval_ms = 1000
//! base_rate_hz = 1.2
//! ```

pub mod infra;
pub mod loader;
pub mod session;

pub use infra::{EndpointConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use session::{ActivitySettings, SimulatorConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete pulsewire configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PulseConfig {
    /// Remote collection endpoint.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Activity configuration handed to the sensor backend.
    #[serde(default)]
    pub activity: ActivitySettings,

    /// Logging and OTLP export.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Simulated sensor settings.
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl PulseConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/pulsewire/config.toml`
    /// 3. `~/.config/pulsewire/config.toml`
    /// 4. `./pulsewire.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an explicit file replacing `./pulsewire.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        Self::load_files(&files, |key| std::env::var(key).ok())
    }

    /// Load the given files in order, then apply overrides from `env`.
    ///
    /// `env` is a lookup function so callers (and tests) can supply an
    /// environment other than the process one.
    pub fn load_files<F>(files: &[PathBuf], env: F) -> Result<(Self, ConfigSources), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in files {
            let table = loader::load_from_file(path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path.clone());
        }

        let mut config = loader::from_table(merged, Path::new("<merged>"))?;
        loader::apply_env_overrides(&mut config, &mut sources, env);

        Ok((config, sources))
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::from("# pulsewire configuration\n\n");
        // Every field is a plain string or number, serialization cannot fail
        match toml::to_string_pretty(self) {
            Ok(body) => output.push_str(&body),
            Err(e) => output.push_str(&format!("# failed to render config: {}\n", e)),
        }
        output
    }
}
