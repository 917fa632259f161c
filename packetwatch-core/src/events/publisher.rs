use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::trace;

use crate::aggregate::AggregateStats;
use crate::record::ClassifiedRecord;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("Invalid capacity (must be a power of two)")]
    InvalidCapacity,
}

/// One classified batch and the stats after folding it.
#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    pub records: Arc<[ClassifiedRecord]>,
    pub stats: AggregateStats,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Batch(BatchReport),
    /// A capture iteration failed; the loop backs off and retries.
    Error { message: String },
    /// A record was dropped because it could not be classified.
    ClassificationFailed { reason: String },
}

/// Fan-out of pipeline events plus a slot holding the last batch.
pub struct Publisher {
    sender: broadcast::Sender<PipelineEvent>,
    latest: Mutex<Option<BatchReport>>,
}

impl Publisher {
    /// `capacity` bounds how far a subscriber may lag.
    pub fn with_capacity(capacity: usize) -> Result<Self, EventError> {
        if !capacity.is_power_of_two() {
            return Err(EventError::InvalidCapacity);
        }
        let (sender, _) = broadcast::channel(capacity);
        Ok(Self {
            sender,
            latest: Mutex::new(None),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Stores the batch as the latest and sends it to subscribers.
    pub fn publish_batch(&self, report: BatchReport) {
        *self.latest.lock() = Some(report.clone());
        self.publish(PipelineEvent::Batch(report));
    }

    /// Sends to current subscribers. Having none is not an error.
    pub fn publish(&self, event: PipelineEvent) {
        if self.sender.send(event).is_err() {
            trace!("event dropped, no subscribers");
        }
    }

    pub fn latest(&self) -> Option<BatchReport> {
        self.latest.lock().clone()
    }

    pub fn clear_latest(&self) {
        *self.latest.lock() = None;
    }
}
