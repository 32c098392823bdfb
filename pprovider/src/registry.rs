//! Providers keyed by [`ProviderId`], one adapter per upstream API.
//!
//! ```rust
//! use pprovider::{ProviderErrorKind, ProviderId, ProviderRegistry};
//!
//! let registry = ProviderRegistry::new();
//! assert!(registry.is_empty());
//!
//! let missing = registry.resolve(ProviderId::Ollama).err().unwrap();
//! assert_eq!(missing.kind, ProviderErrorKind::InvalidRequest);
//! ```

use std::sync::Arc;

use pcommon::Registry;

use crate::{ModelProvider, ProviderError, ProviderId};

#[derive(Default)]
pub struct ProviderRegistry {
    providers: Registry<ProviderId, Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&mut self, provider: P) -> Option<Arc<dyn ModelProvider>>
    where
        P: ModelProvider + 'static,
    {
        self.register_arc(Arc::new(provider))
    }

    /// Installs `provider` under its own id, handing back any adapter it replaced.
    pub fn register_arc(
        &mut self,
        provider: Arc<dyn ModelProvider>,
    ) -> Option<Arc<dyn ModelProvider>> {
        let id = provider.id();
        let replaced = self.providers.insert(id, provider);
        if replaced.is_some() {
            tracing::debug!(phase = "provider", event = "replaced", provider = %id);
        }
        replaced
    }

    pub fn get(&self, provider_id: ProviderId) -> Option<Arc<dyn ModelProvider>> {
        self.providers.get(&provider_id).cloned()
    }

    /// Like [`Self::get`], but a missing provider is a request error.
    pub fn resolve(&self, provider_id: ProviderId) -> Result<Arc<dyn ModelProvider>, ProviderError> {
        self.get(provider_id).ok_or_else(|| {
            ProviderError::invalid_request(format!("provider '{provider_id}' is not registered"))
        })
    }

    pub fn contains(&self, provider_id: ProviderId) -> bool {
        self.providers.contains_key(&provider_id)
    }

    /// Registered ids in wire-name order.
    pub fn ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.providers.keys().copied().collect();
        ids.sort_by_key(|id| id.as_str());
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}
