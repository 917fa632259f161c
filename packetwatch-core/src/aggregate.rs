//! Running label counts across batches.

use serde::Serialize;

use crate::record::ClassifiedRecord;

/// Label counts since the pipeline last started.
///
/// `total_*` only grow between resets; `batch_*` describe the latest batch
/// alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub total_benign: u64,
    pub total_malicious: u64,
    pub batch_benign: u64,
    pub batch_malicious: u64,
    /// Batches folded since the last reset.
    pub batches: u64,
}

impl AggregateStats {
    pub fn total(&self) -> u64 {
        self.total_benign + self.total_malicious
    }
}

#[derive(Debug, Default)]
pub struct Aggregator {
    stats: AggregateStats,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a batch to the totals and makes it the current batch.
    pub fn fold(&mut self, records: &[ClassifiedRecord]) -> AggregateStats {
        let malicious = records.iter().filter(|r| r.is_malicious()).count() as u64;
        let benign = records.len() as u64 - malicious;

        self.stats.total_benign += benign;
        self.stats.total_malicious += malicious;
        self.stats.batch_benign = benign;
        self.stats.batch_malicious = malicious;
        self.stats.batches += 1;
        self.stats
    }

    pub fn reset(&mut self) {
        self.stats = AggregateStats::default();
    }

    pub fn snapshot(&self) -> AggregateStats {
        self.stats
    }
}
