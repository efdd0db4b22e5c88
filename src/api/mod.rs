//! Agent control surface
//!
//! Lifecycle control ([`TrackingAgent`]), status reporting and the
//! notification seam used for the user-visible "last position" line.

pub mod error;
pub mod notifier;
pub mod scheduler;
pub mod status;

pub use error::{AgentError, AgentResult};
pub use notifier::{notification_text, CallbackNotifier, StatusNotifier, TracingNotifier};
pub use scheduler::TrackingAgent;
pub use status::{
    inspect_log_dir, AgentSnapshot, AgentStatus, Freshness, HaltReason, LogDirectoryStatus,
    LogFileInfo, SchedulerState,
};
