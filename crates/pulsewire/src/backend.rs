//! External collaborators: the sensor/session backend and the authorization gate.
//!
//! The core never owns a sensor. It hands an [`ActivityConfig`] and a
//! [`BatchListener`] to whatever implements [`SessionBackend`] and reacts to
//! the batches that come back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use pulseconf::ActivitySettings;

use crate::bridge::BatchListener;
use crate::error::{BackendError, Error};
use crate::sample::QuantityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Walking,
    Running,
    Cycling,
    Other,
}

impl FromStr for ActivityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walking" => Ok(ActivityKind::Walking),
            "running" => Ok(ActivityKind::Running),
            "cycling" => Ok(ActivityKind::Cycling),
            "other" => Ok(ActivityKind::Other),
            _ => Err(Error::Configuration(format!("unknown activity kind '{}'", s))),
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityKind::Walking => "walking",
            ActivityKind::Running => "running",
            ActivityKind::Cycling => "cycling",
            ActivityKind::Other => "other",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    Indoor,
    Outdoor,
    Unknown,
}

impl FromStr for EnvironmentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indoor" => Ok(EnvironmentKind::Indoor),
            "outdoor" => Ok(EnvironmentKind::Outdoor),
            "unknown" => Ok(EnvironmentKind::Unknown),
            _ => Err(Error::Configuration(format!("unknown environment kind '{}'", s))),
        }
    }
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnvironmentKind::Indoor => "indoor",
            EnvironmentKind::Outdoor => "outdoor",
            EnvironmentKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// What a session asks the backend to collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityConfig {
    pub activity: ActivityKind,
    pub environment: EnvironmentKind,
    pub quantity_type: QuantityType,
}

impl ActivityConfig {
    pub fn heart_rate(activity: ActivityKind, environment: EnvironmentKind) -> Self {
        Self {
            activity,
            environment,
            quantity_type: QuantityType::heart_rate(),
        }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self::heart_rate(ActivityKind::Walking, EnvironmentKind::Outdoor)
    }
}

impl TryFrom<&ActivitySettings> for ActivityConfig {
    type Error = Error;

    fn try_from(settings: &ActivitySettings) -> Result<Self, Self::Error> {
        let quantity = settings.quantity_type.trim();
        if quantity.is_empty() {
            return Err(Error::Configuration("quantity_type is empty".to_string()));
        }

        Ok(Self {
            activity: settings.activity.parse()?,
            environment: settings.environment.parse()?,
            quantity_type: QuantityType::new(quantity),
        })
    }
}

/// The platform's workout session and live data builder, seen from the core.
///
/// Timestamps passed in are the session boundaries; implementations should
/// use them rather than reading the clock themselves.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Accept the configuration and register the batch listener.
    /// An error here means the session cannot start.
    async fn configure(
        &self,
        config: &ActivityConfig,
        listener: Arc<dyn BatchListener>,
    ) -> Result<(), BackendError>;

    async fn start_activity(&self, at: DateTime<Utc>);

    /// Open the collection window. Batches flow after this succeeds.
    async fn begin_collection(&self, at: DateTime<Utc>) -> Result<(), BackendError>;

    async fn end(&self);

    /// Close the collection window. No batches arrive after this returns.
    async fn end_collection(&self, at: DateTime<Utc>) -> Result<(), BackendError>;

    /// Finalize and discard the backend's session object.
    async fn finish_session(&self) -> Result<(), BackendError>;
}

/// Grants read access to a quantity type. Treated as a precondition: the
/// coordinator logs the answer but never refuses to start because of it.
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    async fn request_read_access(&self, quantity: &QuantityType) -> Result<bool, BackendError>;
}
