//! ## packetwatch-telemetry::logging
//! Structured logging with tracing and OpenTelemetry attributes.
//!
//! `RUST_LOG` always wins over the configured default filter.

use opentelemetry::KeyValue;
use thiserror::Error;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Global subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber.
    pub fn init(default_filter: &str, json: bool) -> Result<(), TelemetryError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(default_filter).map_err(|e| TelemetryError::Filter {
                filter: default_filter.to_string(),
                reason: e.to_string(),
            })?,
        };

        let builder = fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE);

        let installed = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        installed.map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))
    }

    /// Emits a security event with OpenTelemetry-style attributes.
    #[inline]
    pub fn log_event(event_type: &str, metadata: &[KeyValue]) {
        let span = tracing::info_span!(
            "security_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );
        let _entered = span.enter();
        tracing::info!(metadata = ?metadata, "Security event occurred");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_logging() {
        EventLogger::log_event(
            "malicious_packet",
            &[KeyValue::new("source", "10.0.0.7")],
        );
        assert!(logs_contain("Security event occurred"));
        assert!(logs_contain("10.0.0.7"));
    }
}
