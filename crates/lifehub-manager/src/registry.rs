//! Provider factory map.
//!
//! The manager never matches on [`ProviderKind`] to build adapters; it looks
//! the constructor up here. Registrations are checked against the enabled
//! providers when the manager is built, so a missing one fails at startup
//! instead of on first use.

use std::collections::BTreeMap;
use std::sync::Arc;

use lifehub_providers::{
    HttpTransport, Integration, IntegrationConfig, ProviderKind, ProviderResult,
};
use tracing::debug;

use crate::error::{ManagerError, ManagerResult};

/// Builds an adapter from resolved settings and a transport.
pub type IntegrationFactory =
    fn(IntegrationConfig, Arc<dyn HttpTransport>) -> ProviderResult<Arc<dyn Integration>>;

fn adapter<I: Integration + 'static>(
    built: ProviderResult<I>,
) -> ProviderResult<Arc<dyn Integration>> {
    built.map(|integration| Arc::new(integration) as Arc<dyn Integration>)
}

/// Maps each provider to its adapter constructor.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<ProviderKind, IntegrationFactory>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every compiled-in adapter.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        #[cfg(feature = "todoist")]
        let registry = registry.register(ProviderKind::Todoist, |config, transport| {
            adapter(lifehub_providers::TodoistIntegration::new(config, transport))
        });
        #[cfg(feature = "google-calendar")]
        let registry = registry.register(ProviderKind::GoogleCalendar, |config, transport| {
            adapter(lifehub_providers::GoogleCalendarIntegration::new(config, transport))
        });
        #[cfg(feature = "outlook-calendar")]
        let registry = registry.register(ProviderKind::OutlookCalendar, |config, transport| {
            adapter(lifehub_providers::OutlookCalendarIntegration::new(config, transport))
        });
        #[cfg(feature = "notion")]
        let registry = registry.register(ProviderKind::Notion, |config, transport| {
            adapter(lifehub_providers::NotionIntegration::new(config, transport))
        });
        #[cfg(feature = "onenote")]
        let registry = registry.register(ProviderKind::OneNote, |config, transport| {
            adapter(lifehub_providers::OneNoteIntegration::new(config, transport))
        });
        #[cfg(feature = "youtube")]
        let registry = registry.register(ProviderKind::YouTube, |config, transport| {
            adapter(lifehub_providers::YouTubeIntegration::new(config, transport))
        });
        registry
    }

    /// Builder method to add or replace a factory.
    pub fn register(mut self, provider: ProviderKind, factory: IntegrationFactory) -> Self {
        self.factories.insert(provider, factory);
        self
    }

    /// Removes a factory.
    pub fn unregister(&mut self, provider: ProviderKind) -> bool {
        self.factories.remove(&provider).is_some()
    }

    /// Returns true if a factory is registered.
    pub fn contains(&self, provider: ProviderKind) -> bool {
        self.factories.contains_key(&provider)
    }

    /// Returns the registered providers, in display order.
    pub fn providers(&self) -> Vec<ProviderKind> {
        self.factories.keys().copied().collect()
    }

    /// Checks that every enabled provider has a factory.
    pub fn validate(&self, enabled: &[ProviderKind]) -> ManagerResult<()> {
        match enabled.iter().find(|p| !self.contains(**p)) {
            Some(&missing) => Err(ManagerError::MissingFactory(missing)),
            None => Ok(()),
        }
    }

    /// Instantiates an adapter.
    pub fn create(
        &self,
        provider: ProviderKind,
        config: IntegrationConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> ManagerResult<Arc<dyn Integration>> {
        let factory = self
            .factories
            .get(&provider)
            .ok_or(ManagerError::UnsupportedProvider(provider))?;
        debug!(provider = %provider, "creating adapter");
        Ok(factory(config, transport)?)
    }
}
