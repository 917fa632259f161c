use packetwatch_capture::{CaptureError, SelectError};
use thiserror::Error;

use crate::events::EventError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable capture interface; `start` leaves the pipeline idle.
    #[error("No active network interface found")]
    NoInterfaceFound,

    /// Interface enumeration or device open failed at start.
    #[error("Capture backend unavailable: {0}")]
    CaptureBackendUnavailable(String),

    /// Transient read fault inside the capture loop.
    #[error("Capture iteration failed: {0}")]
    CaptureIteration(#[source] CaptureError),

    #[error("Event channel: {0}")]
    Events(#[from] EventError),

    #[error("Failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl From<SelectError> for PipelineError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::NoInterfaceFound => PipelineError::NoInterfaceFound,
        }
    }
}

impl From<CaptureError> for PipelineError {
    /// Failures at open time make the backend unavailable; read faults are
    /// iteration errors.
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Read(_) | CaptureError::Decode(_) => PipelineError::CaptureIteration(err),
            CaptureError::Unavailable(_) | CaptureError::Open { .. } => {
                PipelineError::CaptureBackendUnavailable(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_errors_split_by_phase() {
        let open = CaptureError::Open {
            interface: "eth0".into(),
            reason: "permission denied".into(),
        };
        assert!(matches!(
            PipelineError::from(open),
            PipelineError::CaptureBackendUnavailable(msg) if msg.contains("permission denied")
        ));
        assert!(matches!(
            PipelineError::from(CaptureError::Read("EIO".into())),
            PipelineError::CaptureIteration(_)
        ));
    }
}
