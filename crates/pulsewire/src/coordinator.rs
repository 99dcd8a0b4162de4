//! Session coordinator - the one place `start()` and `stop()` land.
//!
//! Owns the state machine and the collection bridge, and drives the sensor
//! backend through a session. The state machine sits behind an async mutex:
//! `start()` holds it from the idle check through activation, `stop()` holds
//! it only for Active -> Ending and again for Ending -> Idle, so a `start()`
//! racing a teardown sees Ending and reports `AlreadyRunning`.
//!
//! Teardown runs in its own task with every backend call bounded by a
//! timeout. A hung backend or a dropped `stop()` future still ends Idle.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn, Instrument};

use crate::backend::{ActivityConfig, AuthorizationGate, SessionBackend};
use crate::bridge::{BatchListener, CollectionBridge};
use crate::delivery::ReadingSink;
use crate::error::Error;
use crate::state::{Session, SessionId, SessionState, SessionStateMachine};

/// Result of a completed `stop()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// False if closing the collection window or finalizing the backend
    /// session reported an error or timed out. The session is Idle either way.
    pub finalized: bool,
}

/// Upper bound for each backend call during teardown.
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SessionCoordinator {
    backend: Arc<dyn SessionBackend>,
    activity: ActivityConfig,
    machine: Arc<Mutex<SessionStateMachine>>,
    bridge: Arc<CollectionBridge>,
    state_rx: watch::Receiver<SessionState>,
    teardown_timeout: Duration,
}

impl SessionCoordinator {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        activity: ActivityConfig,
        sink: Arc<dyn ReadingSink>,
    ) -> Self {
        let machine = SessionStateMachine::new();
        let state_rx = machine.subscribe();
        let bridge = Arc::new(CollectionBridge::new(
            activity.quantity_type.clone(),
            sink,
            machine.subscribe(),
        ));

        Self {
            backend,
            activity,
            machine: Arc::new(Mutex::new(machine)),
            bridge,
            state_rx,
            teardown_timeout: TEARDOWN_TIMEOUT,
        }
    }

    /// Bound each teardown call by `limit` instead of [`TEARDOWN_TIMEOUT`].
    pub fn with_teardown_timeout(mut self, limit: Duration) -> Self {
        self.teardown_timeout = limit;
        self
    }

    pub fn activity(&self) -> &ActivityConfig {
        &self.activity
    }

    /// The listener registered with the backend on every start.
    pub fn bridge(&self) -> Arc<CollectionBridge> {
        self.bridge.clone()
    }

    /// Current state without waiting on an in-progress transition.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    pub async fn session(&self) -> Option<Session> {
        self.machine.lock().await.session().cloned()
    }

    /// Ask for read access to the monitored quantity.
    ///
    /// Denials and errors are logged and otherwise ignored; access is a
    /// precondition the caller is responsible for.
    pub async fn authorize(&self, gate: &dyn AuthorizationGate) -> bool {
        let quantity = &self.activity.quantity_type;
        match gate.request_read_access(quantity).await {
            Ok(true) => {
                info!(quantity = %quantity, "Read access granted");
                true
            }
            Ok(false) => {
                warn!(quantity = %quantity, "Read access denied, continuing");
                false
            }
            Err(e) => {
                warn!(quantity = %quantity, error = %e, "Authorization request failed, continuing");
                false
            }
        }
    }

    /// Idle -> Active.
    ///
    /// Configures the backend, registers the bridge as its listener, and
    /// opens the collection window at the current time.
    #[tracing::instrument(skip(self), fields(activity = %self.activity.activity))]
    pub async fn start(&self) -> Result<SessionId, Error> {
        let mut machine = self.machine.lock().await;

        if let Err(e) = machine.ensure_idle() {
            info!(session.state = %machine.state(), "Start ignored");
            return Err(e);
        }

        let listener: Arc<dyn BatchListener> = self.bridge.clone();
        if let Err(e) = self.backend.configure(&self.activity, listener).await {
            error!(error = %e, "Backend rejected session configuration");
            return Err(Error::Configuration(e.to_string()));
        }

        let now = Utc::now();
        let id = machine.activate(now)?.id.clone();

        self.backend.start_activity(now).await;
        match self.backend.begin_collection(now).await {
            Ok(()) => info!(session.id = %id, "Session started"),
            Err(e) => error!(
                session.id = %id,
                error = %e,
                "Collection did not start, session stays active until stopped"
            ),
        }

        Ok(id)
    }

    /// Active -> Ending -> Idle.
    ///
    /// Teardown failures and timeouts are logged; the session always ends
    /// Idle, even if this future is dropped part way. Pending deliveries are
    /// not awaited.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self) -> Result<SessionSummary, Error> {
        let ending = {
            let mut machine = self.machine.lock().await;
            match machine.begin_ending(Utc::now()) {
                Ok(session) => session,
                Err(e) => {
                    info!(session.state = %machine.state(), "Stop ignored");
                    return Err(e);
                }
            }
        };
        let ended_at = ending.ended_at.unwrap_or_else(Utc::now);
        debug!(session.id = %ending.id, "Session ending");

        let task = tokio::spawn(
            teardown(
                self.backend.clone(),
                self.machine.clone(),
                ended_at,
                self.teardown_timeout,
            )
            .instrument(tracing::info_span!("teardown", session.id = %ending.id)),
        );

        match task.await {
            Ok(result) => result,
            Err(e) => {
                // Backend panicked mid-teardown; still get back to Idle
                error!(session.id = %ending.id, error = %e, "Teardown task failed");
                let session = self.machine.lock().await.finish()?;
                Ok(SessionSummary {
                    id: session.id,
                    started_at: session.started_at,
                    ended_at,
                    finalized: false,
                })
            }
        }
    }
}

/// Close the backend session and move Ending -> Idle.
async fn teardown(
    backend: Arc<dyn SessionBackend>,
    machine: Arc<Mutex<SessionStateMachine>>,
    ended_at: DateTime<Utc>,
    limit: Duration,
) -> Result<SessionSummary, Error> {
    let timeout_ms = limit.as_millis() as u64;
    let mut finalized = true;

    if timeout(limit, backend.end()).await.is_err() {
        warn!(timeout_ms, "Activity did not end in time");
        finalized = false;
    }

    match timeout(limit, backend.end_collection(ended_at)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(error = %e, "Collection did not close cleanly");
            finalized = false;
        }
        Err(_) => {
            warn!(timeout_ms, "Collection did not close in time");
            finalized = false;
        }
    }

    match timeout(limit, backend.finish_session()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "Session finalization failed");
            finalized = false;
        }
        Err(_) => {
            error!(timeout_ms, "Session finalization timed out");
            finalized = false;
        }
    }

    let session = machine.lock().await.finish()?;
    info!(session.id = %session.id, finalized, "Session stopped");

    Ok(SessionSummary {
        id: session.id,
        started_at: session.started_at,
        ended_at,
        finalized,
    })
}
