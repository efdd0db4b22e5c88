//! Mock provider implementation for testing and development

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::PositionSample;
use crate::source::{
    FixSink, PositionProvider, ProviderError, ProviderId, ProviderResult, SubscriptionRequest,
};

/// Scriptable provider: tests flip availability, permission and failures
/// and push fixes by hand.
pub struct MockProvider {
    id: ProviderId,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    enabled: bool,
    permission_denied: bool,
    failure: Option<String>,
    query_failure: Option<ProviderError>,
    last_known: Option<PositionSample>,
    sink: Option<FixSink>,
    request: Option<SubscriptionRequest>,
    subscribe_calls: u32,
    unsubscribe_calls: u32,
    last_known_queries: u32,
}

impl MockProvider {
    /// Create an enabled mock provider with no known fix
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            state: Mutex::new(MockState {
                enabled: true,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch the provider on or off, notifying an active subscriber
    pub fn set_enabled(&self, enabled: bool) {
        let sink = {
            let mut state = self.state();
            state.enabled = enabled;
            state.sink.clone()
        };
        if let Some(sink) = sink {
            sink.availability_changed(enabled);
        }
    }

    /// Simulate revoked location permission
    pub fn deny_permission(&self) {
        self.state().permission_denied = true;
    }

    pub fn grant_permission(&self) {
        self.state().permission_denied = false;
    }

    /// Make every query fail with a backend error
    pub fn fail_with(&self, details: &str) {
        self.state().failure = Some(details.to_string());
    }

    /// Fail only `last_known_fix`; the provider still reports itself enabled
    pub fn fail_queries_with(&self, error: ProviderError) {
        self.state().query_failure = Some(error);
    }

    pub fn clear_failure(&self) {
        let mut state = self.state();
        state.failure = None;
        state.query_failure = None;
    }

    /// Set the fix returned by `last_known_fix`
    pub fn set_last_known(&self, sample: Option<PositionSample>) {
        self.state().last_known = sample;
    }

    /// Push a fix to the current subscriber. Also becomes the last known fix.
    /// Returns false when nobody is subscribed or the agent refused it.
    pub fn push(&self, sample: PositionSample) -> bool {
        let sink = {
            let mut state = self.state();
            state.last_known = Some(sample.clone());
            state.sink.clone()
        };
        match sink {
            Some(sink) => sink.deliver(sample),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.state().sink.is_some()
    }

    /// Hints passed with the current subscription
    pub fn subscription_request(&self) -> Option<SubscriptionRequest> {
        self.state().request
    }

    pub fn subscribe_count(&self) -> u32 {
        self.state().subscribe_calls
    }

    pub fn unsubscribe_count(&self) -> u32 {
        self.state().unsubscribe_calls
    }

    /// Number of `last_known_fix` queries answered
    pub fn query_count(&self) -> u32 {
        self.state().last_known_queries
    }

    fn check_access(&self, state: &MockState) -> ProviderResult<()> {
        if state.permission_denied {
            return Err(ProviderError::PermissionDenied {
                provider: self.id.clone(),
            });
        }
        if let Some(details) = &state.failure {
            return Err(ProviderError::Backend {
                provider: self.id.clone(),
                details: details.clone(),
            });
        }
        Ok(())
    }
}

impl PositionProvider for MockProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn is_enabled(&self) -> ProviderResult<bool> {
        let state = self.state();
        self.check_access(&state)?;
        Ok(state.enabled)
    }

    fn subscribe(&self, request: &SubscriptionRequest, sink: FixSink) -> ProviderResult<()> {
        let mut state = self.state();
        self.check_access(&state)?;
        if !state.enabled {
            return Err(ProviderError::Unavailable {
                provider: self.id.clone(),
            });
        }
        state.subscribe_calls += 1;
        state.request = Some(*request);
        state.sink = Some(sink);
        Ok(())
    }

    fn last_known_fix(&self) -> ProviderResult<Option<PositionSample>> {
        let mut state = self.state();
        self.check_access(&state)?;
        state.last_known_queries += 1;
        if let Some(error) = &state.query_failure {
            return Err(error.clone());
        }
        if !state.enabled {
            return Ok(None);
        }
        Ok(state.last_known.clone())
    }

    fn unsubscribe(&self) -> ProviderResult<()> {
        let mut state = self.state();
        state.unsubscribe_calls += 1;
        state.sink = None;
        state.request = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceEvent;
    use chrono::Utc;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn sample(lat: f64, lon: f64) -> PositionSample {
        PositionSample::at(Utc::now(), lat, lon).unwrap()
    }

    #[test]
    fn test_mock_provider_creation() {
        let provider = MockProvider::new(ProviderId::gps());
        assert_eq!(provider.id(), &ProviderId::gps());
        assert!(provider.is_enabled().unwrap());
        assert!(provider.last_known_fix().unwrap().is_none());
        assert!(!provider.is_subscribed());
    }

    #[test]
    fn test_push_requires_subscription() {
        let provider = MockProvider::new(ProviderId::gps());
        assert!(!provider.push(sample(1.0, 2.0)));
        // still remembered as last known
        assert!(provider.last_known_fix().unwrap().is_some());
    }

    #[test]
    fn test_subscription_delivers_fixes() {
        let provider = MockProvider::new(ProviderId::gps());
        let (tx, mut rx) = mpsc::channel(8);
        let sink = FixSink::new(ProviderId::gps(), tx, CancellationToken::new());
        let request = SubscriptionRequest::new(1000, 2.5);

        provider.subscribe(&request, sink).unwrap();
        assert_eq!(provider.subscription_request(), Some(request));
        assert!(provider.push(sample(1.0, 2.0)));
        assert!(matches!(rx.try_recv(), Ok(SourceEvent::Fix { .. })));

        provider.set_enabled(false);
        assert!(matches!(
            rx.try_recv(),
            Ok(SourceEvent::Availability { enabled: false, .. })
        ));

        provider.unsubscribe().unwrap();
        assert!(!provider.is_subscribed());
        assert_eq!(provider.unsubscribe_count(), 1);
    }

    #[test]
    fn test_disabled_provider_refuses_subscription() {
        let provider = MockProvider::new(ProviderId::network());
        provider.set_enabled(false);
        let (tx, _rx) = mpsc::channel(8);
        let sink = FixSink::new(ProviderId::network(), tx, CancellationToken::new());

        let result = provider.subscribe(&SubscriptionRequest::default(), sink);
        assert!(matches!(result, Err(ProviderError::Unavailable { .. })));
        assert_eq!(provider.subscribe_count(), 0);
    }

    #[test]
    fn test_permission_simulation() {
        let provider = MockProvider::new(ProviderId::gps());
        provider.deny_permission();
        assert!(matches!(
            provider.is_enabled(),
            Err(ProviderError::PermissionDenied { .. })
        ));
        assert!(provider.last_known_fix().is_err());

        provider.grant_permission();
        assert!(provider.is_enabled().unwrap());
    }

    #[test]
    fn test_failure_simulation() {
        let provider = MockProvider::new(ProviderId::gps());
        provider.fail_with("antenna fault");
        assert!(matches!(
            provider.last_known_fix(),
            Err(ProviderError::Backend { .. })
        ));
        provider.clear_failure();
        assert!(provider.last_known_fix().is_ok());
        assert_eq!(provider.query_count(), 1);
    }

    #[test]
    fn test_query_failure_keeps_provider_enabled() {
        let provider = MockProvider::new(ProviderId::gps());
        provider.set_last_known(Some(sample(1.0, 2.0)));
        provider.fail_queries_with(ProviderError::Unavailable {
            provider: ProviderId::gps(),
        });

        assert!(provider.is_enabled().unwrap());
        assert!(matches!(
            provider.last_known_fix(),
            Err(ProviderError::Unavailable { .. })
        ));

        provider.clear_failure();
        assert!(provider.last_known_fix().unwrap().is_some());
        assert_eq!(provider.query_count(), 2);
    }
}
