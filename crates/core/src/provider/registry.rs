//! Ordered set of registered providers.

use std::sync::Arc;

use super::SubtitleProvider;

/// Providers in registration order, looked up by name.
///
/// Search results are merged in this order, so it also decides how ties
/// between providers are broken.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn SubtitleProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. A provider with the same name is replaced in
    /// place, keeping its position.
    pub fn register(&mut self, provider: Arc<dyn SubtitleProvider>) {
        match self
            .providers
            .iter()
            .position(|existing| existing.name() == provider.name())
        {
            Some(index) => self.providers[index] = provider,
            None => self.providers.push(provider),
        }
    }

    /// Builder-style registration.
    pub fn with(mut self, provider: Arc<dyn SubtitleProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SubtitleProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SubtitleProvider>> {
        self.providers.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
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
            .field("providers", &self.names())
            .finish()
    }
}
