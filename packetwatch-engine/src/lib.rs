//! # packetwatch-engine
//!
//! The pipeline orchestrator: owns the capture thread and exposes the
//! `start`/`stop`/`status` control surface plus event subscription, so
//! frontends (the CLI today) share one implementation.

mod capture_loop;
pub mod pipeline;

pub use pipeline::{Pipeline, PipelineState, PipelineStatus};
