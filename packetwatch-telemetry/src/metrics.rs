//! ## packetwatch-telemetry::metrics
//! Prometheus counters and histograms for the capture pipeline.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub registry: Registry,
    pub packets_captured: IntCounter,
    pub decode_failures: IntCounter,
    pub classified: IntCounterVec,
    pub classification_failures: IntCounter,
    pub capture_errors: IntCounter,
    pub batch_duration: Histogram,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        Self::register(registry).expect("static metric definitions are valid and unique")
    }

    fn register(registry: Registry) -> Result<Self, prometheus::Error> {
        let packets_captured = IntCounter::new(
            "packetwatch_packets_captured_total",
            "Packets decoded from the capture backend",
        )?;
        let decode_failures = IntCounter::new(
            "packetwatch_decode_failures_total",
            "Frames skipped because they could not be decoded",
        )?;
        let classified = IntCounterVec::new(
            Opts::new("packetwatch_classified_total", "Classified packets by label"),
            &["label"],
        )?;
        let classification_failures = IntCounter::new(
            "packetwatch_classification_failures_total",
            "Packets dropped because the classifier failed",
        )?;
        let capture_errors = IntCounter::new(
            "packetwatch_capture_errors_total",
            "Capture loop iterations that failed and backed off",
        )?;
        let batch_duration = Histogram::with_opts(
            HistogramOpts::new(
                "packetwatch_batch_duration_seconds",
                "Time to extract, classify and fold one batch",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;

        registry.register(Box::new(packets_captured.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;
        registry.register(Box::new(classified.clone()))?;
        registry.register(Box::new(classification_failures.clone()))?;
        registry.register(Box::new(capture_errors.clone()))?;
        registry.register(Box::new(batch_duration.clone()))?;

        Ok(Self {
            registry,
            packets_captured,
            decode_failures,
            classified,
            classification_failures,
            capture_errors,
            batch_duration,
        })
    }

    /// Renders the registry in the text exposition format.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn inc_classified(&self, label: &str) {
        self.classified.with_label_values(&[label]).inc();
    }
}
