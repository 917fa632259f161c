use chrono::{DateTime, Utc};
use packetwatch_capture::RawPacket;
use packetwatch_detection::{FeatureVector, Label};
use serde::Serialize;

/// A packet with the features it was classified on and the resulting label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRecord {
    pub packet: RawPacket,
    pub features: FeatureVector,
    pub label: Label,
    /// Wall-clock time the record was classified.
    pub observed_at: DateTime<Utc>,
}

impl ClassifiedRecord {
    pub fn new(packet: RawPacket, features: FeatureVector, label: Label) -> Self {
        Self {
            packet,
            features,
            label,
            observed_at: Utc::now(),
        }
    }

    pub fn is_malicious(&self) -> bool {
        self.label == Label::Malicious
    }
}
