//! In-process sensor backend for `pulsewire run` and local testing.
//!
//! Emits one batch per tick while the collection window is open: a
//! heart-rate sample that drifts around the configured resting rate, and
//! every fifth tick an unrelated step-count sample that the bridge filters out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use pulseconf::SimulatorConfig;

use crate::backend::{ActivityConfig, AuthorizationGate, SessionBackend};
use crate::bridge::BatchListener;
use crate::error::BackendError;
use crate::sample::{QuantityType, RawSample};

struct Collection {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SimulatedBackend {
    settings: SimulatorConfig,
    quantity: Mutex<Option<QuantityType>>,
    listener: Mutex<Option<Arc<dyn BatchListener>>>,
    collection: Mutex<Option<Collection>>,
}

impl SimulatedBackend {
    pub fn new(settings: SimulatorConfig) -> Self {
        Self {
            settings,
            quantity: Mutex::new(None),
            listener: Mutex::new(None),
            collection: Mutex::new(None),
        }
    }

    pub fn is_collecting(&self) -> bool {
        lock(&self.collection).is_some()
    }

    /// Batch emitted on tick `n`.
    pub fn batch_for_tick(quantity: &QuantityType, base_rate_hz: f64, n: u64) -> Vec<RawSample> {
        let now = Utc::now();
        let wobble = 1.0 + 0.08 * (n as f64 * 0.3).sin();
        let mut batch = vec![RawSample::new(
            quantity.clone(),
            base_rate_hz * wobble,
            "count/s",
            now,
        )];

        if n % 5 == 4 {
            batch.push(RawSample::new(
                QuantityType::new("step-count"),
                1.8,
                "count/s",
                now,
            ));
        }

        batch
    }
}

#[async_trait]
impl SessionBackend for SimulatedBackend {
    async fn configure(
        &self,
        config: &ActivityConfig,
        listener: Arc<dyn BatchListener>,
    ) -> Result<(), BackendError> {
        if self.settings.interval_ms == 0 {
            return Err(BackendError::new("configure", "simulator interval_ms must be > 0"));
        }
        if !self.settings.base_rate_hz.is_finite() || self.settings.base_rate_hz < 0.0 {
            return Err(BackendError::new(
                "configure",
                format!("simulator base_rate_hz {} is not a usable rate", self.settings.base_rate_hz),
            ));
        }

        *lock(&self.quantity) = Some(config.quantity_type.clone());
        *lock(&self.listener) = Some(listener);
        tracing::debug!(
            activity = %config.activity,
            environment = %config.environment,
            quantity = %config.quantity_type,
            "Simulator configured"
        );
        Ok(())
    }

    async fn start_activity(&self, at: DateTime<Utc>) {
        tracing::debug!(%at, "Simulated activity started");
    }

    async fn begin_collection(&self, at: DateTime<Utc>) -> Result<(), BackendError> {
        let listener = lock(&self.listener)
            .clone()
            .ok_or_else(|| BackendError::new("begin_collection", "backend not configured"))?;
        let quantity = lock(&self.quantity)
            .clone()
            .ok_or_else(|| BackendError::new("begin_collection", "backend not configured"))?;

        let mut collection = lock(&self.collection);
        if collection.is_some() {
            return Err(BackendError::new("begin_collection", "collection already open"));
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = Duration::from_millis(self.settings.interval_ms);
        let base_rate = self.settings.base_rate_hz;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut n = 0u64;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        listener.on_batch(SimulatedBackend::batch_for_tick(&quantity, base_rate, n));
                        n += 1;
                    }
                }
            }
            tracing::debug!(batches = n, "Simulated collection closed");
        });

        *collection = Some(Collection { cancel, handle });
        tracing::debug!(%at, interval_ms = self.settings.interval_ms, "Simulated collection open");
        Ok(())
    }

    async fn end(&self) {
        tracing::debug!("Simulated activity ended");
    }

    async fn end_collection(&self, at: DateTime<Utc>) -> Result<(), BackendError> {
        let collection = lock(&self.collection)
            .take()
            .ok_or_else(|| BackendError::new("end_collection", "collection was not open"))?;

        collection.cancel.cancel();
        collection
            .handle
            .await
            .map_err(|e| BackendError::new("end_collection", e.to_string()))?;

        tracing::debug!(%at, "Simulated collection ended");
        Ok(())
    }

    async fn finish_session(&self) -> Result<(), BackendError> {
        lock(&self.listener).take();
        lock(&self.quantity).take();
        Ok(())
    }
}

#[async_trait]
impl AuthorizationGate for SimulatedBackend {
    async fn request_read_access(&self, quantity: &QuantityType) -> Result<bool, BackendError> {
        tracing::debug!(quantity = %quantity, "Simulator grants read access");
        Ok(true)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_stay_near_base_rate() {
        let quantity = QuantityType::heart_rate();
        for n in 0..50 {
            let batch = SimulatedBackend::batch_for_tick(&quantity, 1.2, n);
            let rate = batch[0].value;
            assert!(rate > 1.2 * 0.9 && rate < 1.2 * 1.1, "tick {} rate {}", n, rate);
            assert_eq!(batch[0].quantity_type, quantity);
        }
    }

    #[test]
    fn test_every_fifth_batch_has_noise() {
        let quantity = QuantityType::heart_rate();
        assert_eq!(SimulatedBackend::batch_for_tick(&quantity, 1.2, 3).len(), 1);
        let noisy = SimulatedBackend::batch_for_tick(&quantity, 1.2, 4);
        assert_eq!(noisy.len(), 2);
        assert_eq!(noisy[1].quantity_type, QuantityType::new("step-count"));
    }

    #[tokio::test]
    async fn test_begin_collection_requires_configure() {
        let backend = SimulatedBackend::new(SimulatorConfig::default());
        assert!(backend.begin_collection(Utc::now()).await.is_err());
        assert!(backend.end_collection(Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        struct Nothing;
        impl BatchListener for Nothing {
            fn on_batch(&self, _batch: Vec<RawSample>) {}
        }

        let backend = SimulatedBackend::new(SimulatorConfig {
            interval_ms: 0,
            ..Default::default()
        });
        let result = backend
            .configure(&ActivityConfig::default(), Arc::new(Nothing))
            .await;
        assert!(result.is_err());
    }
}
