//! Fire-and-forget delivery of converted readings to the collection endpoint.
//!
//! Each reading becomes one `POST <base>/saveHeartRate/<n>` with an empty
//! body, spawned on the runtime and never joined by the caller. Outcomes are
//! logged and counted; nothing is retried, so a reading reaches the endpoint
//! at most once.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use pulseconf::EndpointConfig;

use crate::error::Error;
use crate::sample::ConvertedReading;

/// Path segment the collection service exposes for readings.
pub const READING_PATH: &str = "saveHeartRate";

/// Anything that accepts converted readings. The bridge only sees this.
pub trait ReadingSink: Send + Sync {
    fn submit(&self, reading: ConvertedReading);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeliveryId(pub String);

impl DeliveryId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeliveryOutcome {
    Pending,
    Success,
    Failed,
}

/// One outbound call. Only pending tasks are retained.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryTask {
    pub id: DeliveryId,
    pub url: String,
    pub reading: u64,
    pub outcome: DeliveryOutcome,
    pub created_at: DateTime<Utc>,
}

/// Counters for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub in_flight: usize,
}

/// HTTP client for the collection endpoint.
///
/// Cheap to clone; clones share the task table and counters.
#[derive(Clone)]
pub struct DeliveryClient {
    client: Client,
    base_url: String,
    tasks: Arc<Mutex<HashMap<DeliveryId, DeliveryTask>>>,
    stats: Arc<Mutex<DeliveryStats>>,
    tracker: TaskTracker,
    runtime: Handle,
}

impl DeliveryClient {
    /// Build a client for the configured endpoint.
    ///
    /// Must be called inside a tokio runtime: deliveries are spawned on it,
    /// even when `submit` is called from a non-runtime thread.
    pub fn new(endpoint: &EndpointConfig) -> Result<Self, Error> {
        let runtime = Handle::try_current().map_err(|e| {
            Error::Configuration(format!("delivery client needs a tokio runtime: {}", e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(endpoint.timeout_ms))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: endpoint.base_url(),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(Mutex::new(DeliveryStats::default())),
            tracker: TaskTracker::new(),
            runtime,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Target URL for one reading: `<base>/saveHeartRate/<value>`.
    pub fn build_url(&self, value: u64) -> Result<Url, Error> {
        let raw = format!("{}/{}/{}", self.base_url, READING_PATH, value);
        Url::parse(&raw)
            .map_err(|e| Error::DeliveryFailure(format!("malformed URL '{}': {}", raw, e)))
    }

    /// Spawn one delivery and return immediately.
    ///
    /// Returns `None` when the URL cannot be built; the reading is dropped.
    pub fn deliver(&self, reading: ConvertedReading) -> Option<DeliveryId> {
        let url = match self.build_url(reading.value) {
            Ok(url) => url,
            Err(e) => {
                {
                    let mut stats = lock(&self.stats);
                    stats.attempted += 1;
                    stats.failed += 1;
                }
                tracing::error!(reading.value = reading.value, error = %e, "Reading dropped");
                return None;
            }
        };

        let open = self.in_flight();
        if !open.is_empty() {
            tracing::debug!(
                open = open.len(),
                ids = ?open.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
                "Open deliveries"
            );
        }

        let id = self.register(&url, reading.value);
        let span = tracing::info_span!(
            "delivery",
            delivery.id = %id,
            reading.value = reading.value,
        );

        let this = self.clone();
        let task_id = id.clone();
        self.tracker.spawn_on(
            async move {
                // Outcome is logged and counted inside; nobody awaits it.
                let _ = this.execute(&task_id, url).await;
            }
            .instrument(span),
            &self.runtime,
        );

        Some(id)
    }

    /// Deliver one reading and wait for the outcome.
    pub async fn send_once(&self, reading: ConvertedReading) -> Result<StatusCode, Error> {
        let url = self.build_url(reading.value)?;
        let id = self.register(&url, reading.value);
        self.execute(&id, url).await
    }

    /// Snapshot of deliveries that have not completed yet.
    pub fn in_flight(&self) -> Vec<DeliveryTask> {
        lock(&self.tasks).values().cloned().collect()
    }

    pub fn stats(&self) -> DeliveryStats {
        let mut stats = lock(&self.stats).clone();
        stats.in_flight = lock(&self.tasks).len();
        stats
    }

    /// Wait up to `timeout` for every spawned delivery to finish.
    ///
    /// Returns `true` if nothing was left running. Session stop never calls
    /// this; the CLI uses it before exiting.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        self.tracker.reopen();
        drained
    }

    fn register(&self, url: &Url, value: u64) -> DeliveryId {
        let id = DeliveryId::new();
        let task = DeliveryTask {
            id: id.clone(),
            url: url.to_string(),
            reading: value,
            outcome: DeliveryOutcome::Pending,
            created_at: Utc::now(),
        };

        lock(&self.tasks).insert(id.clone(), task);
        lock(&self.stats).attempted += 1;
        id
    }

    async fn execute(&self, id: &DeliveryId, url: Url) -> Result<StatusCode, Error> {
        let result = self.post(url.clone()).await;

        // Completed tasks are discarded; only the counters remember them
        lock(&self.tasks).remove(id);

        match &result {
            Ok(status) => {
                lock(&self.stats).succeeded += 1;
                tracing::info!(http.status = status.as_u16(), url = %url, "Reading delivered");
            }
            Err(e) => {
                lock(&self.stats).failed += 1;
                tracing::warn!(url = %url, error = %e, "Reading dropped");
            }
        }

        result
    }

    async fn post(&self, url: Url) -> Result<StatusCode, Error> {
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| Error::DeliveryFailure(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::DeliveryFailure(format!(
                "endpoint returned {}",
                status
            )));
        }

        Ok(status)
    }
}

impl ReadingSink for DeliveryClient {
    fn submit(&self, reading: ConvertedReading) {
        self.deliver(reading);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
