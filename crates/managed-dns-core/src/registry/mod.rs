//! Plugin registry for DNS providers and value sources
//!
//! The host application builds a [`Registry`], registers the backends it
//! links in and hands it to
//! [`Supervisor::provision`](crate::Supervisor::provision). Nothing registers
//! itself globally.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use managed_dns_core::Registry;
//!
//! let mut registry = Registry::with_builtins();
//! managed_dns_ip_http::register(&mut registry);
//! managed_dns_provider_cloudflare::register(&mut registry);
//!
//! let (supervisor, events) = Supervisor::provision(&config, &registry)?;
//! ```
//!
//! ## Registration
//!
//! Backend crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &mut Registry) {
//!     registry.register_provider("cloudflare", Box::new(CloudflareFactory));
//! }
//! ```

use crate::config::{ProviderConfig, SourceConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, ProviderFactory, SourceFactory, ValueSource};
use std::collections::HashMap;

/// Factories for DNS providers and value sources, keyed by type name
///
/// Type names are matched against [`ProviderConfig::type_name`] and
/// [`SourceConfig::type_name`]. Registering a name twice replaces the
/// earlier factory.
#[derive(Default)]
pub struct Registry {
    providers: HashMap<String, Box<dyn ProviderFactory>>,
    sources: HashMap<String, Box<dyn SourceFactory>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.list_providers())
            .field("sources", &self.list_sources())
            .finish()
    }
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the sources shipped in this crate
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::sources::register(&mut registry);
        registry
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn ProviderFactory>,
    ) {
        self.providers.insert(name.into(), factory);
    }

    /// Register a value source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "http", "static")
    /// - `factory`: Factory object for creating source instances
    pub fn register_source(&mut self, name: impl Into<String>, factory: Box<dyn SourceFactory>) {
        self.sources.insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: A new, exclusively owned instance
    /// - `Err(Error::Config)`: If the type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();

        let factory = self
            .providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a value source from configuration
    pub fn create_source(&self, config: &SourceConfig) -> Result<Box<dyn ValueSource>> {
        let source_type = config.type_name();

        let factory = self
            .sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown source type: {}", source_type)))?;

        factory.create(config)
    }

    /// List all registered provider types, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered source types, sorted
    pub fn list_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }
}
