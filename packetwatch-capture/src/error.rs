use thiserror::Error;

/// Failures raised by capture backends and sessions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The backend cannot enumerate or open devices at all.
    #[error("Capture backend unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to open '{interface}': {reason}")]
    Open { interface: String, reason: String },

    /// A read failed for a reason other than the read timeout.
    #[error("Capture read failed: {0}")]
    Read(String),

    /// A single frame could not be decoded. Never escapes a session.
    #[error("Packet decode failed: {0}")]
    Decode(String),
}
