//! ## packetwatch-core::events
//! **Pipeline events fanned out over a bounded broadcast channel**
//!
//! The capture loop is the only producer. Subscribers that fall more than
//! the channel capacity behind lose the oldest events, never block the loop.
//! The last batch is also kept for consumers that poll instead of subscribe.

mod publisher;

pub use publisher::{BatchReport, EventError, PipelineEvent, Publisher};
