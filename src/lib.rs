//! Background location sampling agent
//!
//! Collects position fixes from platform providers, both pushed by the
//! provider and pulled on a fixed cadence, discards fixes that moved less
//! than a minimum distance from the last accepted one, and appends the
//! rest to one plain-text file per calendar day.
//!
//! - [`source`]: provider capability boundary, preference chain, mock and
//!   simulated providers
//! - [`processing`]: distance filter, day-file writer, processing pipeline
//! - [`api`]: [`TrackingAgent`] lifecycle, status and notifications
//! - [`utils`]: configuration

pub mod core;
pub mod source;
pub mod processing;
pub mod api;
pub mod utils;
pub mod logging;

// Re-export commonly used types
pub use core::{surface_distance_m, PositionSample, SampleError};
pub use source::{
    FixOrigin, FixSink, MockProvider, PositionProvider, ProviderChain, ProviderError,
    ProviderId, RecoveryStrategy, SimulatedProvider, SourceEvent, SubscriptionRequest,
};
pub use processing::{FilterDecision, LogError, LogWriter, PartitionDate, Pipeline, SampleFilter};
pub use api::{
    inspect_log_dir, AgentError, AgentResult, AgentSnapshot, AgentStatus, CallbackNotifier,
    Freshness, LogDirectoryStatus, SchedulerState, StatusNotifier, TrackingAgent,
    TracingNotifier,
};
pub use utils::config::{AgentConfig, ConfigError};
