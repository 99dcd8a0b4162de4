//! Infrastructure configuration - where readings go and how we log.

use serde::{Deserialize, Serialize};

/// Remote collection endpoint that receives converted readings.
///
/// Readings are posted to `<scheme>://<host>:<port>/<base_path>/saveHeartRate/<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// URL scheme.
    /// Default: http
    #[serde(default = "EndpointConfig::default_scheme")]
    pub scheme: String,

    /// Host name or address of the collection service.
    /// Default: localhost
    #[serde(default = "EndpointConfig::default_host")]
    pub host: String,

    /// TCP port of the collection service.
    /// Default: 8080
    #[serde(default = "EndpointConfig::default_port")]
    pub port: u16,

    /// Path prefix in front of `saveHeartRate`.
    /// Default: IoT-Application/rest/v1
    #[serde(default = "EndpointConfig::default_base_path")]
    pub base_path: String,

    /// Per-request timeout in milliseconds.
    /// Default: 5000
    #[serde(default = "EndpointConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl EndpointConfig {
    fn default_scheme() -> String {
        "http".to_string()
    }

    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_base_path() -> String {
        "IoT-Application/rest/v1".to_string()
    }

    fn default_timeout_ms() -> u64 {
        5_000
    }

    /// Base URL without the reading path, e.g. `http://localhost:8080/IoT-Application/rest/v1`.
    pub fn base_url(&self) -> String {
        let path = self.base_path.trim_matches('/');
        if path.is_empty() {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}", self.scheme, self.host, self.port, path)
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            scheme: Self::default_scheme(),
            host: Self::default_host(),
            port: Self::default_port(),
            base_path: Self::default_base_path(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint for OpenTelemetry. Empty disables export.
    /// Default: "" (disabled)
    #[serde(default)]
    pub otlp_endpoint: String,

    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// Whether OTLP export is configured.
    pub fn otlp_enabled(&self) -> bool {
        !self.otlp_endpoint.trim().is_empty()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            log_level: Self::default_log_level(),
        }
    }
}
