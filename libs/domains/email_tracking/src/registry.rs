use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EmailError, EmailResult};
use crate::providers::EmailProvider;

/// Startup-built table of provider adapters keyed by provider name.
///
/// Every dispatch and every webhook goes through [`ProviderRegistry::resolve`].
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn EmailProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn EmailProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Add an adapter under its own name, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn EmailProvider>) {
        let name = provider.name();
        if self.providers.insert(name, provider).is_some() {
            tracing::warn!(provider = name, "Replaced registered email provider");
        }
    }

    pub fn resolve(&self, name: &str) -> EmailResult<Arc<dyn EmailProvider>> {
        match self.providers.get(name) {
            Some(provider) => Ok(Arc::clone(provider)),
            None => {
                tracing::warn!(provider = %name, "Email provider is not supported");
                Err(EmailError::UnsupportedProvider(name.to_string()))
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
