//! Ordered provider preference list with fallback

use std::sync::Arc;

use tracing::{debug, warn};

use crate::source::{PositionProvider, ProviderError, ProviderId, ProviderResult, RecoveryStrategy};

/// Providers ordered from most to least accurate
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn PositionProvider>>,
}

impl ProviderChain {
    /// Create a chain that keeps the given order
    pub fn new(providers: Vec<Arc<dyn PositionProvider>>) -> Self {
        Self { providers }
    }

    /// Create a chain ordered by a list of provider names.
    ///
    /// Providers missing from `order` keep their relative order after the
    /// named ones.
    pub fn with_preference(mut providers: Vec<Arc<dyn PositionProvider>>, order: &[String]) -> Self {
        providers.sort_by_key(|p| {
            order
                .iter()
                .position(|name| name == p.id().as_str())
                .unwrap_or(order.len())
        });
        Self { providers }
    }

    /// Append a provider with the lowest preference
    pub fn push(&mut self, provider: Arc<dyn PositionProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id().clone()).collect()
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn PositionProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    /// Position of a provider in preference order (0 = most preferred)
    pub fn rank(&self, id: &ProviderId) -> Option<usize> {
        self.providers.iter().position(|p| p.id() == id)
    }

    /// All providers reporting themselves enabled, in preference order.
    ///
    /// A permission error aborts the scan; any other error just skips the
    /// provider.
    pub fn available(&self) -> ProviderResult<Vec<Arc<dyn PositionProvider>>> {
        let mut available = Vec::new();
        for provider in &self.providers {
            match provider.is_enabled() {
                Ok(true) => available.push(Arc::clone(provider)),
                Ok(false) => debug!(provider = %provider.id(), "Provider disabled"),
                Err(e) => skip_or_halt(e)?,
            }
        }
        Ok(available)
    }

    /// The most preferred enabled provider
    pub fn best_available(&self) -> ProviderResult<Option<Arc<dyn PositionProvider>>> {
        for provider in &self.providers {
            match provider.is_enabled() {
                Ok(true) => return Ok(Some(Arc::clone(provider))),
                Ok(false) => continue,
                Err(e) => skip_or_halt(e)?,
            }
        }
        Ok(None)
    }
}

fn skip_or_halt(error: ProviderError) -> ProviderResult<()> {
    match error.recovery_strategy() {
        RecoveryStrategy::Halt => Err(error),
        _ => {
            warn!(provider = %error.provider(), error = %error, "Skipping provider");
            Ok(())
        }
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockProvider;

    fn chain_of(gps: &Arc<MockProvider>, network: &Arc<MockProvider>) -> ProviderChain {
        let gps: Arc<dyn PositionProvider> = gps.clone();
        let network: Arc<dyn PositionProvider> = network.clone();
        ProviderChain::new(vec![gps, network])
    }

    #[test]
    fn test_prefers_first_enabled() {
        let gps = Arc::new(MockProvider::new(ProviderId::gps()));
        let network = Arc::new(MockProvider::new(ProviderId::network()));
        let chain = chain_of(&gps, &network);

        let best = chain.best_available().unwrap().unwrap();
        assert_eq!(best.id(), &ProviderId::gps());
    }

    #[test]
    fn test_falls_back_when_primary_disabled() {
        let gps = Arc::new(MockProvider::new(ProviderId::gps()));
        let network = Arc::new(MockProvider::new(ProviderId::network()));
        gps.set_enabled(false);
        let chain = chain_of(&gps, &network);

        let best = chain.best_available().unwrap().unwrap();
        assert_eq!(best.id(), &ProviderId::network());
        assert_eq!(chain.available().unwrap().len(), 1);
    }

    #[test]
    fn test_none_available() {
        let gps = Arc::new(MockProvider::new(ProviderId::gps()));
        let network = Arc::new(MockProvider::new(ProviderId::network()));
        gps.set_enabled(false);
        network.set_enabled(false);
        let chain = chain_of(&gps, &network);

        assert!(chain.best_available().unwrap().is_none());
        assert!(chain.available().unwrap().is_empty());
    }

    #[test]
    fn test_backend_error_skips_provider() {
        let gps = Arc::new(MockProvider::new(ProviderId::gps()));
        let network = Arc::new(MockProvider::new(ProviderId::network()));
        gps.fail_with("receiver offline");
        let chain = chain_of(&gps, &network);

        let best = chain.best_available().unwrap().unwrap();
        assert_eq!(best.id(), &ProviderId::network());
    }

    #[test]
    fn test_permission_denied_propagates() {
        let gps = Arc::new(MockProvider::new(ProviderId::gps()));
        let network = Arc::new(MockProvider::new(ProviderId::network()));
        gps.deny_permission();
        let chain = chain_of(&gps, &network);

        assert!(matches!(
            chain.best_available(),
            Err(ProviderError::PermissionDenied { .. })
        ));
        assert!(chain.available().is_err());
    }

    #[test]
    fn test_with_preference_orders_by_name() {
        let gps: Arc<dyn PositionProvider> = Arc::new(MockProvider::new(ProviderId::gps()));
        let network: Arc<dyn PositionProvider> = Arc::new(MockProvider::new(ProviderId::network()));
        let fused: Arc<dyn PositionProvider> = Arc::new(MockProvider::new(ProviderId::new("fused")));
        let order = vec!["gps".to_string(), "network".to_string()];

        let chain = ProviderChain::with_preference(vec![fused, network, gps], &order);
        assert_eq!(
            chain.ids(),
            vec![ProviderId::gps(), ProviderId::network(), ProviderId::new("fused")]
        );
        assert_eq!(chain.rank(&ProviderId::network()), Some(1));
        assert!(chain.get(&ProviderId::new("missing")).is_none());
    }
}
