//! Sensor-side and delivery-side value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::convert::{floor_per_minute, to_per_minute};
use crate::error::Error;

/// Tag identifying which physiological signal a sample represents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantityType(pub String);

impl QuantityType {
    pub const HEART_RATE: &'static str = "heart-rate";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn heart_rate() -> Self {
        Self::new(Self::HEART_RATE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuantityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frequency units a rate sample may be declared in.
///
/// Anything expressible as counts per second is compatible; everything
/// else (mass, distance, ...) is rejected before conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    PerSecond,
    PerMinute,
    PerHour,
}

impl RateUnit {
    /// Whole events per minute for `value` declared in this unit.
    ///
    /// Per-second rates go through [`to_per_minute`]. Slower units are scaled
    /// by division straight to per-minute, never through a reciprocal, so
    /// whole bpm values come out exact.
    pub fn reading(self, value: f64) -> Result<u64, Error> {
        match self {
            RateUnit::PerSecond => to_per_minute(value),
            RateUnit::PerMinute => floor_per_minute(value),
            RateUnit::PerHour => floor_per_minute(value / 60.0),
        }
    }
}

impl FromStr for RateUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "count/s" | "/s" | "hz" => Ok(RateUnit::PerSecond),
            "count/min" | "/min" | "bpm" => Ok(RateUnit::PerMinute),
            "count/h" | "/h" => Ok(RateUnit::PerHour),
            _ => Err(Error::InvalidSample(format!(
                "unit '{}' is not expressible as count/s",
                s
            ))),
        }
    }
}

/// One quantity emitted by the sensor backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub quantity_type: QuantityType,
    pub value: f64,
    pub unit: String,
    pub recorded_at: DateTime<Utc>,
}

impl RawSample {
    pub fn new(
        quantity_type: QuantityType,
        value: f64,
        unit: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            quantity_type,
            value,
            unit: unit.into(),
            recorded_at,
        }
    }

    /// Heart-rate sample in count/s recorded now.
    pub fn heart_rate(per_second: f64) -> Self {
        Self::new(QuantityType::heart_rate(), per_second, "count/s", Utc::now())
    }

    /// The sample as whole events per minute, or `InvalidSample` for units
    /// that are not rates and for negative or non-finite values.
    pub fn reading(&self) -> Result<u64, Error> {
        self.unit.parse::<RateUnit>()?.reading(self.value)
    }
}

/// A rate normalized to whole events per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedReading {
    pub value: u64,
    pub computed_at: DateTime<Utc>,
}

impl ConvertedReading {
    pub fn new(value: u64) -> Self {
        Self {
            value,
            computed_at: Utc::now(),
        }
    }
}

impl fmt::Display for ConvertedReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/min", self.value)
    }
}
