//! # Packetwatch Telemetry and Monitoring
//!
//! Crate for logging and metrics of the capture pipeline.

pub mod logging;
pub mod metrics;

pub use logging::{EventLogger, TelemetryError};
pub use metrics::PipelineMetrics;
