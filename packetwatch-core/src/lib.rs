//! # packetwatch-core
//!
//! Shared vocabulary of the capture pipeline: classified records, running
//! label counts, the event publisher and the pipeline error taxonomy.
//!
//! ### Key Submodules:
//! - `record`: `ClassifiedRecord`, one labelled packet
//! - `aggregate`: `Aggregator` folding batches into `AggregateStats`
//! - `events`: `Publisher` fan-out of `PipelineEvent`s plus the last batch
//! - `error`: `PipelineError`

pub mod aggregate;
pub mod error;
pub mod events;
pub mod record;

pub use aggregate::{AggregateStats, Aggregator};
pub use error::PipelineError;
pub use events::{BatchReport, EventError, PipelineEvent, Publisher};
pub use packetwatch_detection::Label;
pub use record::ClassifiedRecord;

pub mod prelude {
    pub use crate::aggregate::*;
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::record::*;
    pub use packetwatch_detection::Label;
}
