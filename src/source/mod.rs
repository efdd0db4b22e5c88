//! Position source boundary
//!
//! Providers are the platform's positioning backends (satellite receiver,
//! network triangulation, ...). The agent consumes them through the
//! [`PositionProvider`] trait and keeps them in a [`ProviderChain`] ordered
//! from most to least accurate.

pub mod provider;
pub mod chain;
pub mod error;
pub mod mock;
pub mod simulated;

pub use provider::{PositionProvider, SubscriptionRequest};
pub use chain::ProviderChain;
pub use error::{ProviderError, ProviderResult, RecoveryStrategy};
pub use mock::MockProvider;
pub use simulated::SimulatedProvider;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::PositionSample;

/// Name of a positioning provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(name: impl Into<String>) -> Self {
        ProviderId(name.into())
    }

    /// Satellite receiver
    pub fn gps() -> Self {
        ProviderId::new("gps")
    }

    /// Cell/Wi-Fi based positioning
    pub fn network() -> Self {
        ProviderId::new("network")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a fix reached the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOrigin {
    /// Delivered by a provider subscription
    Push,
    /// Fetched by the pull cadence
    Pull,
}

/// Events flowing from providers into the scheduler queue
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// A new fix
    Fix {
        provider: ProviderId,
        origin: FixOrigin,
        sample: PositionSample,
    },
    /// A provider was switched on or off
    Availability { provider: ProviderId, enabled: bool },
}

/// Handle a provider uses to push events into a running agent.
///
/// The agent's queue is bounded: when it is full the event is dropped and
/// counted. Once the agent is stopped every delivery is refused.
#[derive(Debug, Clone)]
pub struct FixSink {
    provider: ProviderId,
    tx: mpsc::Sender<SourceEvent>,
    closed: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl FixSink {
    pub(crate) fn new(
        provider: ProviderId,
        tx: mpsc::Sender<SourceEvent>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            provider,
            tx,
            closed,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Share a drop counter with the agent
    pub(crate) fn counting_drops(mut self, dropped: Arc<AtomicU64>) -> Self {
        self.dropped = dropped;
        self
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// True once the owning agent has been asked to stop
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }

    /// Events lost to a full queue
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Push a fix. Returns false if the agent stopped or its queue is full.
    pub fn deliver(&self, sample: PositionSample) -> bool {
        self.send(SourceEvent::Fix {
            provider: self.provider.clone(),
            origin: FixOrigin::Push,
            sample,
        })
    }

    /// Report that the provider was switched on or off
    pub fn availability_changed(&self, enabled: bool) -> bool {
        self.send(SourceEvent::Availability {
            provider: self.provider.clone(),
            enabled,
        })
    }

    fn send(&self, event: SourceEvent) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(provider = %self.provider, "Agent queue full, event dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
