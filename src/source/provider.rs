//! Position provider interface and subscription parameters

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::PositionSample;
use crate::source::{FixSink, ProviderId, ProviderResult};

/// Capability boundary to a platform positioning backend.
///
/// Methods take `&self` so a provider can be shared between the scheduler
/// and whatever thread produces its push fixes.
pub trait PositionProvider: Send + Sync {
    /// Provider name used for preference ordering
    fn id(&self) -> &ProviderId;

    /// Check whether the provider is currently switched on.
    /// Returns `Err(PermissionDenied)` when positioning is not authorized.
    fn is_enabled(&self) -> ProviderResult<bool>;

    /// Start pushing fixes into `sink`, honoring the request hints.
    /// Replaces any earlier subscription of this provider.
    fn subscribe(&self, request: &SubscriptionRequest, sink: FixSink) -> ProviderResult<()>;

    /// Most recent fix the provider knows about, if any
    fn last_known_fix(&self) -> ProviderResult<Option<PositionSample>>;

    /// Stop pushing fixes. Calling this without a subscription is not an error.
    fn unsubscribe(&self) -> ProviderResult<()>;
}

/// Hints passed along with a push subscription
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Minimum time between pushed fixes (milliseconds)
    pub min_interval_ms: u64,
    /// Minimum movement between pushed fixes (meters)
    pub min_distance_m: f64,
}

impl SubscriptionRequest {
    pub fn new(min_interval_ms: u64, min_distance_m: f64) -> Self {
        Self {
            min_interval_ms,
            min_distance_m,
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for SubscriptionRequest {
    fn default() -> Self {
        Self {
            min_interval_ms: crate::core::DEFAULT_PULL_INTERVAL_MS,
            min_distance_m: crate::core::DEFAULT_MIN_DISTANCE_M,
        }
    }
}
