//! Pipeline orchestrator.
//!
//! State machine `Idle -> Running -> Stopping -> Idle`. All control state sits
//! behind one mutex; the capture thread shares it and sleeps on the paired
//! condvar so `stop` can cut pacing and backoff waits short.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

use packetwatch_capture::{
    CaptureBackend, CaptureSession, CloseHandle, InterfaceSelector, InterfaceSource,
    SystemInterfaces,
};
use packetwatch_config::{CaptureConfig, PipelineConfig};
use packetwatch_core::{
    AggregateStats, Aggregator, BatchReport, PipelineError, PipelineEvent, Publisher,
};
use packetwatch_detection::ClassifierAdapter;
use packetwatch_telemetry::PipelineMetrics;

use crate::capture_loop::CaptureLoop;

const CAPTURE_THREAD_NAME: &str = "packetwatch-capture";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Running,
    Stopping,
}

/// Point-in-time view returned by every control call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub interface: Option<String>,
    pub stats: AggregateStats,
}

pub(crate) struct Control {
    pub(crate) state: PipelineState,
    pub(crate) aggregator: Aggregator,
    interface: Option<String>,
    close: Option<CloseHandle>,
    worker: Option<JoinHandle<()>>,
}

impl Control {
    fn status(&self) -> PipelineStatus {
        PipelineStatus {
            state: self.state,
            interface: self.interface.clone(),
            stats: self.aggregator.snapshot(),
        }
    }
}

/// State shared between the control surface and the capture thread.
pub(crate) struct Shared {
    pub(crate) control: Mutex<Control>,
    pub(crate) wake: Condvar,
    pub(crate) publisher: Publisher,
}

impl Shared {
    /// Called by the capture thread as its last act.
    pub(crate) fn finish(&self) {
        let mut control = self.control.lock();
        control.state = PipelineState::Idle;
        control.close = None;
        self.wake.notify_all();
    }
}

pub struct Pipeline {
    shared: Arc<Shared>,
    backend: Arc<dyn CaptureBackend>,
    interfaces: Arc<dyn InterfaceSource>,
    classifier: ClassifierAdapter,
    capture: CaptureConfig,
    settings: PipelineConfig,
    metrics: PipelineMetrics,
}

impl Pipeline {
    pub fn new(
        capture: CaptureConfig,
        settings: PipelineConfig,
        backend: Arc<dyn CaptureBackend>,
        classifier: ClassifierAdapter,
    ) -> Result<Self, PipelineError> {
        let publisher = Publisher::with_capacity(settings.event_capacity)?;
        Ok(Self {
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    state: PipelineState::Idle,
                    aggregator: Aggregator::new(),
                    interface: None,
                    close: None,
                    worker: None,
                }),
                wake: Condvar::new(),
                publisher,
            }),
            interfaces: Arc::new(SystemInterfaces::new(backend.clone())),
            backend,
            classifier,
            capture,
            settings,
            metrics: PipelineMetrics::new(),
        })
    }

    /// Replaces the OS/backend interface lists used when no interface is named.
    pub fn with_interface_source(mut self, interfaces: Arc<dyn InterfaceSource>) -> Self {
        self.interfaces = interfaces;
        self
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Starts capturing unless already running, in which case the current
    /// status is returned unchanged.
    ///
    /// The interface is `interface_hint`, else the configured interface, else
    /// whatever the selector picks. The capture session is opened before the
    /// state leaves `Idle`, so a failed open leaves the pipeline idle.
    #[instrument(level = "info", name = "pipeline_start", skip(self))]
    pub fn start(&self, interface_hint: Option<&str>) -> Result<PipelineStatus, PipelineError> {
        let mut control = self.shared.control.lock();
        if control.state != PipelineState::Idle {
            return Ok(control.status());
        }
        // A loop that ended on its own (end of replay) leaves its handle behind.
        if let Some(finished) = control.worker.take() {
            let _ = finished.join();
        }

        let interface = match interface_hint.or(self.capture.interface.as_deref()) {
            Some(name) => name.to_string(),
            None => {
                InterfaceSelector::new(self.interfaces.clone())
                    .select_interface()?
                    .name
            }
        };

        let session = CaptureSession::open(self.backend.as_ref(), &interface, &self.capture)
            .map_err(|e| PipelineError::CaptureBackendUnavailable(e.to_string()))?;

        control.aggregator.reset();
        self.shared.publisher.clear_latest();
        control.interface = Some(interface.clone());
        control.close = Some(session.close_handle());
        control.state = PipelineState::Running;

        let worker = CaptureLoop::new(
            self.shared.clone(),
            self.classifier.clone(),
            self.metrics.clone(),
            &self.settings,
        );
        let spawned = thread::Builder::new()
            .name(CAPTURE_THREAD_NAME.to_string())
            .spawn(move || worker.run(session));

        match spawned {
            Ok(handle) => control.worker = Some(handle),
            Err(e) => {
                control.state = PipelineState::Idle;
                control.close = None;
                control.interface = None;
                return Err(PipelineError::Spawn(e));
            }
        }

        info!(interface = %interface, "pipeline started");
        Ok(control.status())
    }

    /// Stops the capture thread and waits for it to exit. Safe to call in
    /// any state and from several threads at once.
    #[instrument(level = "info", name = "pipeline_stop", skip(self))]
    pub fn stop(&self) -> PipelineStatus {
        let mut control = self.shared.control.lock();
        let worker = match control.state {
            PipelineState::Idle => control.worker.take(),
            PipelineState::Stopping => {
                self.wait_idle(&mut control);
                return control.status();
            }
            PipelineState::Running => {
                control.state = PipelineState::Stopping;
                if let Some(close) = &control.close {
                    close.close();
                }
                self.shared.wake.notify_all();
                control.worker.take()
            }
        };
        drop(control);

        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("capture thread panicked");
                self.shared.finish();
            }
            info!("pipeline stopped");
        }
        self.status()
    }

    fn wait_idle(&self, control: &mut MutexGuard<'_, Control>) {
        while control.state != PipelineState::Idle {
            self.shared.wake.wait(control);
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.shared.control.lock().status()
    }

    /// Push delivery of every event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.publisher.subscribe()
    }

    /// The most recent batch since the last start.
    pub fn latest(&self) -> Option<BatchReport> {
        self.shared.publisher.latest()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.status().state != PipelineState::Idle {
            warn!("pipeline dropped while running, stopping");
        }
        self.stop();
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
