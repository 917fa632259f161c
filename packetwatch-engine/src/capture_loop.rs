//! Body of the capture thread.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tracing::{debug, error, info, instrument, trace, warn};

use packetwatch_capture::{CaptureSession, CapturedBatch, RawPacket};
use packetwatch_config::PipelineConfig;
use packetwatch_core::{BatchReport, ClassifiedRecord, PipelineError, PipelineEvent};
use packetwatch_detection::{ClassifierAdapter, FeatureExtractor, Label};
use packetwatch_telemetry::{EventLogger, PipelineMetrics};

use crate::pipeline::{PipelineState, Shared};

pub(crate) struct CaptureLoop {
    shared: Arc<Shared>,
    classifier: ClassifierAdapter,
    metrics: PipelineMetrics,
    batch_size: usize,
    pacing: Duration,
    backoff: Duration,
}

impl CaptureLoop {
    pub(crate) fn new(
        shared: Arc<Shared>,
        classifier: ClassifierAdapter,
        metrics: PipelineMetrics,
        settings: &PipelineConfig,
    ) -> Self {
        Self {
            shared,
            classifier,
            metrics,
            batch_size: settings.batch_size,
            pacing: Duration::from_millis(settings.pacing_ms),
            backoff: Duration::from_millis(settings.backoff_ms),
        }
    }

    /// Runs until stopped or the source is exhausted, then releases the
    /// session and marks the pipeline idle. The pipeline is also marked idle
    /// if a classifier panics and takes the thread down.
    #[instrument(level = "debug", name = "capture_loop", skip_all, fields(interface = %session.interface()))]
    pub(crate) fn run(self, session: CaptureSession) {
        let _finish = FinishOnExit(&self.shared);
        // Declared after the guard so the session is dropped first.
        let mut session = session;
        while self.is_running() {
            match session.next_batch(self.batch_size) {
                Ok(batch) => {
                    let finished = session.is_finished();
                    if !(finished && batch.packets.is_empty()) {
                        self.process(batch);
                    }
                    if finished {
                        if self.is_running() {
                            info!("capture source exhausted");
                        }
                        break;
                    }
                    self.pause(self.pacing);
                }
                Err(e) => {
                    let err = PipelineError::from(e);
                    self.metrics.capture_errors.inc();
                    warn!(error = %err, backoff_ms = self.backoff.as_millis() as u64, "capture iteration failed");
                    self.shared.publisher.publish(PipelineEvent::Error {
                        message: err.to_string(),
                    });
                    self.pause(self.backoff);
                }
            }
        }

        session.close();
        debug!("capture loop exited");
    }

    fn is_running(&self) -> bool {
        self.shared.control.lock().state == PipelineState::Running
    }

    /// Sleeps for `duration` unless `stop` wakes it first.
    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut control = self.shared.control.lock();
        while control.state == PipelineState::Running {
            if self.shared.wake.wait_until(&mut control, deadline).timed_out() {
                break;
            }
        }
    }

    fn process(&self, batch: CapturedBatch) {
        let started = Instant::now();
        self.metrics.packets_captured.inc_by(batch.packets.len() as u64);
        self.metrics.decode_failures.inc_by(batch.skipped);

        let records: Vec<ClassifiedRecord> = batch
            .packets
            .into_iter()
            .filter_map(|packet| self.classify(packet))
            .collect();

        let stats = self.shared.control.lock().aggregator.fold(&records);
        self.metrics
            .batch_duration
            .observe(started.elapsed().as_secs_f64());

        info!(
            batch_benign = stats.batch_benign,
            batch_malicious = stats.batch_malicious,
            total_benign = stats.total_benign,
            total_malicious = stats.total_malicious,
            "batch classified"
        );
        self.shared.publisher.publish_batch(BatchReport {
            records: records.into(),
            stats,
        });
    }

    fn classify(&self, packet: RawPacket) -> Option<ClassifiedRecord> {
        let features = FeatureExtractor::extract(&packet);
        match self.classifier.classify(&features) {
            Ok(label) => {
                trace!(length = packet.length, protocol = %packet.protocol, %label, "packet classified");
                self.metrics.inc_classified(label.as_str());
                if label == Label::Malicious {
                    log_malicious(&packet);
                }
                Some(ClassifiedRecord::new(packet, features, label))
            }
            Err(e) => {
                debug!(error = %e, "dropping unclassifiable packet");
                self.metrics.classification_failures.inc();
                self.shared
                    .publisher
                    .publish(PipelineEvent::ClassificationFailed {
                        reason: e.to_string(),
                    });
                None
            }
        }
    }
}

/// Marks the pipeline idle when the capture thread leaves `run`, by return
/// or by unwinding.
struct FinishOnExit<'a>(&'a Shared);

impl Drop for FinishOnExit<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("capture thread panicked, pipeline is idle");
            self.0.publisher.publish(PipelineEvent::Error {
                message: "capture thread panicked".to_string(),
            });
        }
        self.0.finish();
    }
}

fn log_malicious(packet: &RawPacket) {
    let address = |a: Option<std::net::IpAddr>| a.map(|ip| ip.to_string()).unwrap_or_default();
    EventLogger::log_event(
        "malicious_packet",
        &[
            KeyValue::new("protocol", packet.protocol.clone()),
            KeyValue::new("source", address(packet.source_address)),
            KeyValue::new("destination", address(packet.dest_address)),
            KeyValue::new("length", i64::from(packet.length)),
        ],
    );
}
