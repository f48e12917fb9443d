//! Plugin-based provider registry
//!
//! The registry maps the type names used in configuration to factories for
//! DNS providers, IP detectors and push caches, so the run driver never
//! hardcodes a backend.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dnsync_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_builtins();
//! dnsync_provider_dyndns::register(&registry);
//! dnsync_ip_api::register(&registry);
//!
//! let provider = registry.create_provider(&module.provider, config.dry_run)?;
//! ```
//!
//! ## Registration
//!
//! Plugin crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("dyndns", Box::new(DynDnsFactory));
//! }
//! ```

use crate::cache::{FilePushCacheFactory, MemoryPushCacheFactory};
use crate::config::{CacheConfig, DetectorConfig, ProviderConfig};
use crate::detector::StaticDetectorFactory;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, IpDetector, PushCache};
use crate::traits::{DnsProviderFactory, IpDetectorFactory, PushCacheFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of provider, detector and cache factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,
    detectors: RwLock<HashMap<String, Box<dyn IpDetectorFactory>>>,
    caches: RwLock<HashMap<String, Arc<dyn PushCacheFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the factories implemented in this crate
    ///
    /// Registers the `static` detector and the `file` and `memory` caches.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_detector("static", Box::new(StaticDetectorFactory));
        registry.register_cache("file", Box::new(FilePushCacheFactory));
        registry.register_cache("memory", Box::new(MemoryPushCacheFactory));
        registry
    }

    /// Register a DNS provider factory under a provider type name
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), factory);
    }

    /// Register an IP detector factory under a detector type name
    pub fn register_detector(&self, name: impl Into<String>, factory: Box<dyn IpDetectorFactory>) {
        let mut detectors = self.detectors.write().unwrap_or_else(PoisonError::into_inner);
        detectors.insert(name.into(), factory);
    }

    /// Register a push cache factory under a cache type name
    pub fn register_cache(&self, name: impl Into<String>, factory: Box<dyn PushCacheFactory>) {
        let mut caches = self.caches.write().unwrap_or_else(PoisonError::into_inner);
        caches.insert(name.into(), Arc::from(factory));
    }

    /// Create a DNS provider from a module's provider configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error::Config)`: If the type is not registered or creation fails
    pub fn create_provider(
        &self,
        config: &ProviderConfig,
        dry_run: bool,
    ) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config, dry_run)
    }

    /// Create an IP detector from configuration
    pub fn create_detector(&self, config: &DetectorConfig) -> Result<Box<dyn IpDetector>> {
        let detector_type = config.type_name();
        let detectors = self.detectors.read().unwrap_or_else(PoisonError::into_inner);

        let factory = detectors
            .get(detector_type)
            .ok_or_else(|| Error::config(format!("Unknown detector type: {}", detector_type)))?;

        factory.create(config)
    }

    /// Open the push cache described by `config`
    ///
    /// # Returns
    ///
    /// - `Ok(None)`: the cache is disabled
    /// - `Ok(Some(cache))`: opened cache
    /// - `Err(Error)`: unknown type or the store could not be opened
    pub async fn open_cache(&self, config: &CacheConfig) -> Result<Option<Arc<dyn PushCache>>> {
        let cache_type = match config {
            CacheConfig::File { .. } => "file",
            CacheConfig::Memory => "memory",
            CacheConfig::Disabled => return Ok(None),
        };

        let factory = {
            let caches = self.caches.read().unwrap_or_else(PoisonError::into_inner);
            caches
                .get(cache_type)
                .ok_or_else(|| Error::config(format!("Unknown cache type: {}", cache_type)))?
                .clone()
        };

        // lock released before awaiting the factory
        factory.open(config).await.map(Some)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered detector types
    pub fn list_detectors(&self) -> Vec<String> {
        let detectors = self.detectors.read().unwrap_or_else(PoisonError::into_inner);
        detectors.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if a detector type is registered
    pub fn has_detector(&self, name: &str) -> bool {
        let detectors = self.detectors.read().unwrap_or_else(PoisonError::into_inner);
        detectors.contains_key(name)
    }

    /// Check if a cache type is registered
    pub fn has_cache(&self, name: &str) -> bool {
        let caches = self.caches.read().unwrap_or_else(PoisonError::into_inner);
        caches.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProviderFactory;

    impl DnsProviderFactory for MockProviderFactory {
        fn create(&self, _config: &ProviderConfig, _dry_run: bool) -> Result<Box<dyn DnsProvider>> {
            Err(Error::not_found("Mock provider not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();

        assert!(!registry.has_provider("mock"));
        registry.register_provider("mock", Box::new(MockProviderFactory));
        assert!(registry.has_provider("mock"));
        assert!(registry.list_providers().contains(&"mock".to_string()));
    }

    #[test]
    fn test_builtins() {
        let registry = ProviderRegistry::with_builtins();
        assert!(registry.has_detector("static"));
        assert!(registry.has_cache("file"));
        assert!(registry.has_cache("memory"));
        assert!(!registry.has_provider("dyndns"));
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let registry = ProviderRegistry::new();
        let config = ProviderConfig::Ipv64 {
            update_key: "key".into(),
            update_url: None,
        };
        assert!(matches!(
            registry.create_provider(&config, false),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_disabled_cache_opens_nothing() {
        let registry = ProviderRegistry::with_builtins();
        assert!(registry.open_cache(&CacheConfig::Disabled).await.unwrap().is_none());
        assert!(registry.open_cache(&CacheConfig::Memory).await.unwrap().is_some());
    }
}
