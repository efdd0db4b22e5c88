//! Agent-level error taxonomy

use thiserror::Error;

use crate::processing::log_writer::LogError;
use crate::source::{ProviderError, RecoveryStrategy};
use crate::utils::config::ConfigError;

/// Errors surfaced to the agent's caller.
///
/// Provider failures the agent can run through (an unavailable provider, a
/// transient backend error) never reach the caller; they are logged and
/// show up in the snapshot's `last_provider_error`.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Provider failure that stopped or prevented a run, e.g. denied permission
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Log directory could not be read
    #[error(transparent)]
    Io(#[from] LogError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// `start()` called while the agent is not stopped
    #[error("agent is already running")]
    AlreadyRunning,
    /// `start()` called outside a tokio runtime
    #[error("agent must be started from within a tokio runtime")]
    NoRuntime,
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

impl AgentError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, AgentError::Provider(ProviderError::PermissionDenied { .. }))
    }

    /// True for errors after which calling again may succeed without
    /// outside intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            AgentError::Provider(e) => e.recovery_strategy() != RecoveryStrategy::Halt,
            AgentError::Io(_) | AgentError::AlreadyRunning => true,
            AgentError::Config(_) | AgentError::NoRuntime => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ProviderId;

    #[test]
    fn test_permission_denied_passes_through() {
        let err: AgentError = ProviderError::PermissionDenied {
            provider: ProviderId::gps(),
        }
        .into();
        assert!(err.is_permission_denied());
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "location permission denied for provider gps");
    }

    #[test]
    fn test_transient_provider_errors_are_recoverable() {
        let err: AgentError = ProviderError::Backend {
            provider: ProviderId::network(),
            details: "timeout".into(),
        }
        .into();
        assert!(!err.is_permission_denied());
        assert!(err.is_recoverable());
        assert!(matches!(err, AgentError::Provider(ProviderError::Backend { .. })));
    }

    #[test]
    fn test_lifecycle_errors() {
        assert!(AgentError::AlreadyRunning.is_recoverable());
        assert!(!AgentError::NoRuntime.is_recoverable());
    }
}
