//! pulsewire - live heart-rate session coordinator.
//!
//! A sensor backend emits batches of raw samples while a session is active.
//! The [`CollectionBridge`] keeps the newest sample of the monitored
//! quantity, [`to_per_minute`] turns its rate into whole events per minute,
//! and the [`DeliveryClient`] posts the result to the collection endpoint
//! without waiting for the answer.
//!
//! ```text
//! start() ─► SessionCoordinator ─► SessionBackend ─► on_batch ─► CollectionBridge
//!                                                                  │
//!                              POST .../saveHeartRate/{n} ◄─ DeliveryClient ◄─ to_per_minute
//! ```

pub mod backend;
pub mod bridge;
pub mod convert;
pub mod coordinator;
pub mod delivery;
pub mod error;
pub mod sample;
pub mod simulator;
pub mod state;
pub mod telemetry;

pub use backend::{ActivityConfig, ActivityKind, AuthorizationGate, EnvironmentKind, SessionBackend};
pub use bridge::{BatchListener, BatchOutcome, CollectionBridge};
pub use convert::{floor_per_minute, to_per_minute};
pub use coordinator::{SessionCoordinator, SessionSummary, TEARDOWN_TIMEOUT};
pub use delivery::{
    DeliveryClient, DeliveryId, DeliveryOutcome, DeliveryStats, DeliveryTask, ReadingSink,
};
pub use error::{BackendError, Error, Result};
pub use sample::{ConvertedReading, QuantityType, RateUnit, RawSample};
pub use simulator::SimulatedBackend;
pub use state::{Session, SessionId, SessionState, SessionStateMachine};
