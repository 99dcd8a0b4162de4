//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, PulseConfig};
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided it replaces the local override and is returned
/// even when missing, so loading reports it instead of quietly falling back
/// to `./pulsewire.toml`. Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/pulsewire/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("pulsewire/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("pulsewire.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load one config file as a raw TOML table.
///
/// The table is checked against [`PulseConfig`] so a bad value is reported
/// against the file it came from rather than the merged result.
pub fn load_from_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    from_table(table.clone(), path)?;
    Ok(table)
}

/// Deserialize a (possibly merged) table into a typed config.
pub fn from_table(table: toml::Table, path: &Path) -> Result<PulseConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base`, key by key. Nested tables merge recursively;
/// any other value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply environment variable overrides to config.
///
/// Unparseable numeric values are ignored and not recorded as overrides.
pub fn apply_env_overrides<F>(config: &mut PulseConfig, sources: &mut ConfigSources, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut record = |key: &str| sources.env_overrides.push(key.to_string());

    // Endpoint
    if let Some(v) = env("PULSEWIRE_ENDPOINT_SCHEME") {
        config.endpoint.scheme = v;
        record("PULSEWIRE_ENDPOINT_SCHEME");
    }
    if let Some(v) = env("PULSEWIRE_ENDPOINT_HOST") {
        config.endpoint.host = v;
        record("PULSEWIRE_ENDPOINT_HOST");
    }
    if let Some(v) = env("PULSEWIRE_ENDPOINT_PORT") {
        if let Ok(port) = v.parse() {
            config.endpoint.port = port;
            record("PULSEWIRE_ENDPOINT_PORT");
        }
    }
    if let Some(v) = env("PULSEWIRE_BASE_PATH") {
        config.endpoint.base_path = v;
        record("PULSEWIRE_BASE_PATH");
    }
    if let Some(v) = env("PULSEWIRE_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.endpoint.timeout_ms = ms;
            record("PULSEWIRE_TIMEOUT_MS");
        }
    }

    // Telemetry
    if let Some(v) = env("PULSEWIRE_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
        record("PULSEWIRE_OTLP_ENDPOINT");
    }
    // Also support standard OTEL env var
    if let Some(v) = env("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
        record("OTEL_EXPORTER_OTLP_ENDPOINT");
    }
    if let Some(v) = env("PULSEWIRE_LOG_LEVEL") {
        config.telemetry.log_level = v;
        record("PULSEWIRE_LOG_LEVEL");
    }
    // Also support RUST_LOG
    if let Some(v) = env("RUST_LOG") {
        config.telemetry.log_level = v;
        record("RUST_LOG");
    }
}
