//! Error taxonomy for the session pipeline.
//!
//! Nothing here terminates a session. Callers log these and carry on; the
//! only visible effect of most failures is a missing reading downstream.

use thiserror::Error;

/// Errors surfaced by the coordinator, bridge, converter and delivery client.
#[derive(Debug, Error)]
pub enum Error {
    /// The session backend rejected the activity configuration, or the
    /// configuration itself is unusable. The session stays Idle.
    #[error("configuration rejected: {0}")]
    Configuration(String),

    /// `start()` while a session is Active or Ending.
    #[error("a session is already running")]
    AlreadyRunning,

    /// `stop()` (or any session-bound operation) without an Active session.
    #[error("no session is running")]
    NotRunning,

    /// Sample data the pipeline cannot use: negative or non-finite rate,
    /// or a unit that is not a rate.
    #[error("invalid sample: {0}")]
    InvalidSample(String),

    /// One delivery failed (bad URL, network error, non-2xx). The reading is dropped.
    #[error("delivery failed: {0}")]
    DeliveryFailure(String),
}

impl Error {
    /// Benign transition errors: reported to the caller, never logged as failures.
    pub fn is_benign(&self) -> bool {
        matches!(self, Error::AlreadyRunning | Error::NotRunning)
    }
}

/// Failure reported by an external collaborator (sensor backend, authorization).
#[derive(Debug, Clone, Error)]
#[error("{operation} failed: {message}")]
pub struct BackendError {
    pub operation: &'static str,
    pub message: String,
}

impl BackendError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
