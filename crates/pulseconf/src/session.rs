//! Session configuration - what a monitoring session asks the sensor backend for.

use serde::{Deserialize, Serialize};

/// Fixed activity configuration handed to the sensor backend on start.
///
/// Values are plain strings here; pulsewire parses them into typed
/// configuration and rejects unknown kinds at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySettings {
    /// Activity kind (walking, running, cycling, other).
    /// Default: walking
    #[serde(default = "ActivitySettings::default_activity")]
    pub activity: String,

    /// Environment kind (indoor, outdoor, unknown).
    /// Default: outdoor
    #[serde(default = "ActivitySettings::default_environment")]
    pub environment: String,

    /// Quantity type under observation.
    /// Default: heart-rate
    #[serde(default = "ActivitySettings::default_quantity_type")]
    pub quantity_type: String,
}

impl ActivitySettings {
    fn default_activity() -> String {
        "walking".to_string()
    }

    fn default_environment() -> String {
        "outdoor".to_string()
    }

    fn default_quantity_type() -> String {
        "heart-rate".to_string()
    }
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            activity: Self::default_activity(),
            environment: Self::default_environment(),
            quantity_type: Self::default_quantity_type(),
        }
    }
}

/// Simulated sensor used by `pulsewire run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Milliseconds between emitted batches.
    /// Default: 1000
    #[serde(default = "SimulatorConfig::default_interval_ms")]
    pub interval_ms: u64,

    /// Resting rate in events per second (1.2 Hz = 72 bpm).
    /// Default: 1.2
    #[serde(default = "SimulatorConfig::default_base_rate_hz")]
    pub base_rate_hz: f64,
}

impl SimulatorConfig {
    fn default_interval_ms() -> u64 {
        1_000
    }

    fn default_base_rate_hz() -> f64 {
        1.2
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            base_rate_hz: Self::default_base_rate_hz(),
        }
    }
}
