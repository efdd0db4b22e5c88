//! Provider error types and recovery classification

use thiserror::Error;

use crate::source::ProviderId;

/// Errors reported across the position provider boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Positioning is not authorized for this process
    #[error("location permission denied for provider {provider}")]
    PermissionDenied { provider: ProviderId },
    /// Provider is switched off or has no hardware behind it
    #[error("provider {provider} is unavailable")]
    Unavailable { provider: ProviderId },
    /// Provider-specific failure
    #[error("provider {provider} failed: {details}")]
    Backend { provider: ProviderId, details: String },
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// What the scheduler should do after a provider error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Stop attempting fixes and surface the error
    Halt,
    /// Move on to the next provider in preference order
    Fallback,
    /// Leave things as they are and try again on the next tick
    RetryNextTick,
}

impl ProviderError {
    pub fn provider(&self) -> &ProviderId {
        match self {
            ProviderError::PermissionDenied { provider }
            | ProviderError::Unavailable { provider }
            | ProviderError::Backend { provider, .. } => provider,
        }
    }

    /// Get the recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            ProviderError::PermissionDenied { .. } => RecoveryStrategy::Halt,
            ProviderError::Unavailable { .. } => RecoveryStrategy::Fallback,
            ProviderError::Backend { .. } => RecoveryStrategy::RetryNextTick,
        }
    }

    /// Check if the agent can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_strategy(), RecoveryStrategy::Halt)
    }
}
