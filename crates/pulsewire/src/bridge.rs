//! Batch listener between the sensor backend and the delivery pipeline.

use std::sync::Arc;
use tokio::sync::watch;

use crate::delivery::ReadingSink;
use crate::error::Error;
use crate::sample::{ConvertedReading, QuantityType, RawSample};
use crate::state::SessionState;

/// Receives batches of raw samples from the sensor backend.
///
/// Called from whatever thread or task the backend uses; must not block.
pub trait BatchListener: Send + Sync {
    fn on_batch(&self, batch: Vec<RawSample>);
}

/// What happened to one batch.
#[derive(Debug)]
pub enum BatchOutcome {
    /// A reading was converted and handed to the sink.
    Submitted(ConvertedReading),
    /// No sample of the monitored type.
    Empty,
    /// The session was not Active when the batch arrived.
    Inactive(SessionState),
    /// The latest sample was unusable.
    Rejected(Error),
}

/// Filters batches down to the monitored quantity, converts the most recent
/// sample and submits it.
pub struct CollectionBridge {
    monitored: QuantityType,
    sink: Arc<dyn ReadingSink>,
    state: watch::Receiver<SessionState>,
}

impl CollectionBridge {
    pub fn new(
        monitored: QuantityType,
        sink: Arc<dyn ReadingSink>,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            monitored,
            sink,
            state,
        }
    }

    pub fn monitored(&self) -> &QuantityType {
        &self.monitored
    }

    /// Run one batch through filter, unit check, conversion and submission.
    pub fn process(&self, batch: Vec<RawSample>) -> BatchOutcome {
        let state = *self.state.borrow();
        if state != SessionState::Active {
            return BatchOutcome::Inactive(state);
        }

        // Latest wins; on equal timestamps the later entry in the batch wins
        let latest = batch
            .into_iter()
            .filter(|sample| sample.quantity_type == self.monitored)
            .reduce(|newest, sample| {
                if sample.recorded_at >= newest.recorded_at {
                    sample
                } else {
                    newest
                }
            });

        let Some(sample) = latest else {
            return BatchOutcome::Empty;
        };

        let value = match sample.reading() {
            Ok(value) => value,
            Err(e) => return BatchOutcome::Rejected(e),
        };

        let reading = ConvertedReading::new(value);
        self.sink.submit(reading);
        BatchOutcome::Submitted(reading)
    }
}

impl BatchListener for CollectionBridge {
    fn on_batch(&self, batch: Vec<RawSample>) {
        let size = batch.len();
        match self.process(batch) {
            BatchOutcome::Submitted(reading) => {
                tracing::info!(reading.value = reading.value, batch.size = size, "Current heart rate");
            }
            BatchOutcome::Empty => {
                tracing::trace!(batch.size = size, quantity = %self.monitored, "No monitored samples in batch");
            }
            BatchOutcome::Inactive(state) => {
                tracing::debug!(batch.size = size, session.state = %state, "Batch ignored, session not active");
            }
            BatchOutcome::Rejected(e) => {
                tracing::warn!(batch.size = size, error = %e, "Batch skipped");
            }
        }
    }
}
