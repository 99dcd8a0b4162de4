//! Common test utilities for pulsewire tests
//!
//! A backend whose every step can be made to fail or pause, and a sink
//! that records readings instead of sending them.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use pulseconf::EndpointConfig;
use pulsewire::{
    ActivityConfig, AuthorizationGate, BackendError, BatchListener, ConvertedReading,
    QuantityType, RawSample, ReadingSink, SessionBackend,
};

/// Pauses `end_collection` until released.
#[derive(Clone, Default)]
pub struct TeardownGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct ScriptedBackend {
    listener: Mutex<Option<Arc<dyn BatchListener>>>,
    calls: Mutex<Vec<&'static str>>,
    gate: Mutex<Option<TeardownGate>>,
    pub reject_configure: AtomicBool,
    pub fail_begin: AtomicBool,
    pub fail_end_collection: AtomicBool,
    pub fail_finish: AtomicBool,
    pub hang_finish: AtomicBool,
    pub deny_access: AtomicBool,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Push a batch through the registered listener, as the sensor would.
    /// Returns false when no listener is registered.
    pub fn emit(&self, batch: Vec<RawSample>) -> bool {
        let listener = self.listener.lock().unwrap().clone();
        match listener {
            Some(listener) => {
                listener.on_batch(batch);
                true
            }
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn gate_teardown(&self) -> TeardownGate {
        let gate = TeardownGate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SessionBackend for ScriptedBackend {
    async fn configure(
        &self,
        _config: &ActivityConfig,
        listener: Arc<dyn BatchListener>,
    ) -> Result<(), BackendError> {
        self.record("configure");
        if self.reject_configure.load(Ordering::SeqCst) {
            return Err(BackendError::new("configure", "unsupported activity"));
        }
        *self.listener.lock().unwrap() = Some(listener);
        Ok(())
    }

    async fn start_activity(&self, _at: DateTime<Utc>) {
        self.record("start_activity");
    }

    async fn begin_collection(&self, _at: DateTime<Utc>) -> Result<(), BackendError> {
        self.record("begin_collection");
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(BackendError::new("begin_collection", "sensor unavailable"));
        }
        Ok(())
    }

    async fn end(&self) {
        self.record("end");
    }

    async fn end_collection(&self, _at: DateTime<Utc>) -> Result<(), BackendError> {
        self.record("end_collection");
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail_end_collection.load(Ordering::SeqCst) {
            return Err(BackendError::new("end_collection", "stream error"));
        }
        Ok(())
    }

    async fn finish_session(&self) -> Result<(), BackendError> {
        self.record("finish_session");
        if self.hang_finish.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_finish.load(Ordering::SeqCst) {
            return Err(BackendError::new("finish_session", "workout could not be saved"));
        }
        *self.listener.lock().unwrap() = None;
        Ok(())
    }
}

#[async_trait]
impl AuthorizationGate for ScriptedBackend {
    async fn request_read_access(&self, _quantity: &QuantityType) -> Result<bool, BackendError> {
        if self.deny_access.load(Ordering::SeqCst) {
            return Err(BackendError::new("authorization", "user declined"));
        }
        Ok(true)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    readings: Mutex<Vec<ConvertedReading>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn values(&self) -> Vec<u64> {
        self.readings.lock().unwrap().iter().map(|r| r.value).collect()
    }
}

impl ReadingSink for RecordingSink {
    fn submit(&self, reading: ConvertedReading) {
        self.readings.lock().unwrap().push(reading);
    }
}

pub fn heart_rate(per_second: f64) -> RawSample {
    RawSample::heart_rate(per_second)
}

pub fn other(kind: &str, value: f64, unit: &str) -> RawSample {
    RawSample::new(QuantityType::new(kind), value, unit, Utc::now())
}

/// Endpoint config pointing at a wiremock server.
pub fn endpoint_for(server: &wiremock::MockServer) -> EndpointConfig {
    let address = server.address();
    EndpointConfig {
        host: address.ip().to_string(),
        port: address.port(),
        timeout_ms: 2_000,
        ..Default::default()
    }
}
