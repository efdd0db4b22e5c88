//! Sample processing: distance filter, day-file writer and the pipeline
//! that ties them together

pub mod filter;
pub mod log_writer;
pub mod pipeline;

pub use filter::{FilterDecision, SampleFilter};
pub use log_writer::{format_record, LogError, LogResult, LogWriter, PartitionDate};
pub use pipeline::{AgentState, FixOutcome, Pipeline};
