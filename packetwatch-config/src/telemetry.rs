//! Observability configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Telemetry configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TelemetryConfig {
    /// Default `EnvFilter` directives; `RUST_LOG` takes precedence.
    #[validate(custom(function = validation::validate_log_filter))]
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json_logs: bool,
}

fn default_log_filter() -> String {
    "info".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json_logs: false,
        }
    }
}
