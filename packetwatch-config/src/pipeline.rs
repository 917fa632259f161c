//! Capture loop tuning: batch size, pacing and backoff.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Pipeline loop configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct PipelineConfig {
    /// Packets per batch handed to one aggregator fold.
    #[validate(range(min = 1, max = 10000))]
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches (milliseconds).
    #[validate(range(max = 60000))]
    #[serde(default = "default_pacing")]
    pub pacing_ms: u64,

    /// Pause after a failed capture iteration (milliseconds).
    #[validate(range(min = 1, max = 300000))]
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,

    /// Capacity of the subscriber broadcast channel (must be a power of two).
    #[validate(range(min = 1, max = 65536))]
    #[validate(custom(function = validation::validate_power_of_two))]
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_batch_size() -> usize {
    50
}

fn default_pacing() -> u64 {
    2000
}

fn default_backoff() -> u64 {
    5000
}

fn default_event_capacity() -> usize {
    256
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pacing_ms: default_pacing(),
            backoff_ms: default_backoff(),
            event_capacity: default_event_capacity(),
        }
    }
}
