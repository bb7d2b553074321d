use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ProvisionError;
use crate::providers::{builtin_provider, Provider, BUILTIN_PROVIDERS};

/// Resolves the provider a target config names
pub trait ProviderManager: Send + Sync {
    fn get_provider(&self, name: &str) -> Result<Arc<dyn Provider>, ProvisionError>;
}

/// Loaded providers by name
///
/// Lookups share a read lock and can run concurrently, registering and
/// unregistering take the write lock.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every provider that ships with this crate
    pub fn with_builtin_providers(config: &Config) -> Result<Self> {
        let registry = Self::new();
        for name in BUILTIN_PROVIDERS {
            registry.register(*name, builtin_provider(name, config)?);
        }
        Ok(registry)
    }

    /// Registers a provider, returning the one it replaced
    pub fn register(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
    ) -> Option<Arc<dyn Provider>> {
        let name = name.into();
        info!(provider = %name, "Registering provider");
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, provider)
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Provider>> {
        info!(provider = %name, "Unregistering provider");
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}

impl ProviderManager for ProviderRegistry {
    fn get_provider(&self, name: &str) -> Result<Arc<dyn Provider>, ProvisionError> {
        let provider = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();

        debug!(provider = %name, found = provider.is_some(), "Resolving provider");
        provider.ok_or_else(|| ProvisionError::ProviderNotFound(name.to_string()))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingProvider;

    #[test]
    fn test_resolution_is_idempotent() {
        let registry = ProviderRegistry::new();
        registry.register("docker", Arc::new(RecordingProvider::default()));

        let first = registry.get_provider("docker").unwrap();
        let second = registry.get_provider("docker").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_miss_is_provider_not_found() {
        let registry = ProviderRegistry::new();

        let err = registry.get_provider("kubernetes").unwrap_err();

        assert!(matches!(err, ProvisionError::ProviderNotFound(ref name) if name == "kubernetes"));
    }

    #[test]
    fn test_register_replaces_and_unregister_removes() {
        let registry = ProviderRegistry::new();
        let first: Arc<dyn Provider> = Arc::new(RecordingProvider::default());
        let second: Arc<dyn Provider> = Arc::new(RecordingProvider::default());

        assert!(registry.register("docker", first.clone()).is_none());
        let replaced = registry.register("docker", second.clone()).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert!(Arc::ptr_eq(&registry.get_provider("docker").unwrap(), &second));

        assert!(registry.unregister("docker").is_some());
        assert!(registry.get_provider("docker").is_err());
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_builtin_providers_are_registered() {
        let registry = ProviderRegistry::with_builtin_providers(&Config::from_lookup(|_| None)).unwrap();

        assert_eq!(registry.names(), vec!["local".to_string()]);
        assert!(registry.get_provider("local").is_ok());
    }

    #[test]
    fn test_concurrent_lookups_during_registration() {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register("docker", Arc::new(RecordingProvider::default()));

        let handles = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        registry.register(format!("extra-{i}"), Arc::new(RecordingProvider::default()));
                    }
                    registry.get_provider("docker").is_ok()
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(registry.names().len(), 5);
    }
}
