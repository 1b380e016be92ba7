//! The integration registry.
//!
//! [`IntegrationManager`] owns every live adapter under a generated id, guards
//! operations on status and capabilities, and is the only component that
//! writes to the credential store. Item persistence goes through
//! [`run_import`] so all providers share one dedupe path.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lifehub_core::{ExportResult, ImportResult, Item, TimeWindow};
use lifehub_providers::{
    AuthorizationRequest, Capabilities, CredentialStore, ExportOptions, HttpTransport,
    ImportOptions, Integration, IntegrationConfig, IntegrationStatus, ItemStore, ProviderKind,
    ReqwestTransport, TokenRecord, run_import, run_url_import,
};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{ProviderInfo, provider_info};
use crate::config::ManagerConfig;
use crate::error::{ManagerError, ManagerResult};
use crate::registry::ProviderRegistry;

const USER_AGENT: &str = concat!("lifehub/", env!("CARGO_PKG_VERSION"));

struct Entry {
    provider: ProviderKind,
    created_at: DateTime<Utc>,
    integration: Arc<dyn Integration>,
}

impl Entry {
    fn info(&self, id: &str) -> IntegrationInfo {
        let session = self.integration.session();
        IntegrationInfo {
            id: id.to_string(),
            provider: self.provider,
            status: session.status(),
            created_at: self.created_at,
            last_sync_at: session.last_sync_at(),
            last_error: session.last_error(),
            has_credentials: session.token().is_some(),
            capabilities: self.integration.capabilities(),
        }
    }
}

/// A point-in-time view of one integration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationInfo {
    pub id: String,
    pub provider: ProviderKind,
    pub status: IntegrationStatus,
    pub created_at: DateTime<Utc>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Whether the adapter holds a token in memory.
    pub has_credentials: bool,
    pub capabilities: Capabilities,
}

/// Counts across the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrationSummary {
    pub total: usize,
    pub by_status: BTreeMap<IntegrationStatus, usize>,
    pub by_provider: BTreeMap<ProviderKind, usize>,
}

impl IntegrationSummary {
    /// Number of integrations in a status.
    pub fn with_status(&self, status: IntegrationStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Creates, authenticates, imports through and removes integrations.
pub struct IntegrationManager {
    config: ManagerConfig,
    registry: ProviderRegistry,
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialStore>,
    items: Arc<dyn ItemStore>,
    integrations: RwLock<HashMap<String, Entry>>,
    initialized: Mutex<bool>,
}

impl IntegrationManager {
    /// Creates a manager with every compiled-in adapter.
    ///
    /// # Errors
    ///
    /// `MissingFactory` if an enabled provider was compiled out.
    pub fn new(
        config: ManagerConfig,
        credentials: Arc<dyn CredentialStore>,
        items: Arc<dyn ItemStore>,
    ) -> ManagerResult<Self> {
        Self::with_registry(config, credentials, items, ProviderRegistry::with_defaults())
    }

    /// Creates a manager with a custom factory map.
    pub fn with_registry(
        config: ManagerConfig,
        credentials: Arc<dyn CredentialStore>,
        items: Arc<dyn ItemStore>,
        registry: ProviderRegistry,
    ) -> ManagerResult<Self> {
        registry.validate(&config.enabled_providers)?;
        let transport = Arc::new(ReqwestTransport::new(config.timeout, USER_AGENT)?);
        Ok(Self {
            config,
            registry,
            transport,
            credentials,
            items,
            integrations: RwLock::new(HashMap::new()),
            initialized: Mutex::new(false),
        })
    }

    /// Builder method to replace the HTTP transport handed to new adapters.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Returns the resolved configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the item store imports write to.
    pub fn item_store(&self) -> &dyn ItemStore {
        self.items.as_ref()
    }

    /// Metadata of every provider this manager can create.
    pub fn available_providers(&self) -> Vec<ProviderInfo> {
        self.registry.providers().into_iter().map(provider_info).collect()
    }

    fn generate_id(provider: ProviderKind) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            provider,
            Utc::now().timestamp_millis(),
            &suffix[..8]
        )
    }

    async fn lookup(&self, id: &str) -> ManagerResult<Arc<dyn Integration>> {
        self.integrations
            .read()
            .await
            .get(id)
            .map(|entry| entry.integration.clone())
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))
    }

    /// Creates and registers a disconnected integration.
    ///
    /// `config` overrides the configured settings for the provider;
    /// `credentials` seeds the adapter's session without authenticating.
    ///
    /// # Errors
    ///
    /// `UnsupportedProvider` if no factory is registered, or the adapter's
    /// own configuration error.
    pub async fn create_integration(
        &self,
        provider: ProviderKind,
        config: Option<IntegrationConfig>,
        credentials: Option<TokenRecord>,
    ) -> ManagerResult<String> {
        let config = config.unwrap_or_else(|| self.config.integration_config(provider));
        let integration = self.registry.create(provider, config, self.transport.clone())?;
        if let Some(record) = credentials {
            integration.session().set_token(record);
        }

        let id = Self::generate_id(provider);
        self.integrations.write().await.insert(
            id.clone(),
            Entry {
                provider,
                created_at: Utc::now(),
                integration,
            },
        );
        info!(id = %id, provider = %provider, "integration created");
        Ok(id)
    }

    /// Authenticates an integration and persists its credential record.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id; the adapter's error otherwise, with its
    /// status left at `Error`.
    pub async fn authenticate_integration(&self, id: &str) -> ManagerResult<()> {
        let integration = self.lookup(id).await?;
        integration.authenticate().await?;
        self.persist_credentials(integration.as_ref()).await?;
        Ok(())
    }

    /// Builds the OAuth authorization URL for an integration.
    pub async fn authorization_request(
        &self,
        id: &str,
        redirect_uri: &str,
    ) -> ManagerResult<AuthorizationRequest> {
        let integration = self.lookup(id).await?;
        Ok(integration.authorization_request(redirect_uri)?)
    }

    /// Exchanges an authorization code, then authenticates and persists.
    pub async fn complete_authorization(
        &self,
        id: &str,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<&str>,
    ) -> ManagerResult<()> {
        let integration = self.lookup(id).await?;
        integration
            .exchange_code(code, redirect_uri, pkce_verifier)
            .await?;
        self.authenticate_integration(id).await
    }

    async fn persist_credentials(&self, integration: &dyn Integration) -> ManagerResult<()> {
        if let Some(record) = integration.credentials() {
            self.credentials
                .store_token(integration.kind(), record)
                .await?;
            debug!(provider = %integration.kind(), "credentials persisted");
        }
        Ok(())
    }

    /// Stores the record again if a refresh replaced `before`.
    async fn persist_if_rotated(&self, integration: &dyn Integration, before: Option<TokenRecord>) {
        if integration.credentials() == before {
            return;
        }
        if let Err(e) = self.persist_credentials(integration).await {
            warn!(provider = %integration.kind(), error = %e, "failed to persist refreshed credentials");
        }
    }

    /// Imports may start while `Connected`; a running import (`Syncing`) is
    /// let through so the session can reject it with `ImportInProgress`.
    fn require_connected(id: &str, integration: &dyn Integration, allow_syncing: bool) -> ManagerResult<()> {
        match integration.status() {
            IntegrationStatus::Connected => Ok(()),
            IntegrationStatus::Syncing if allow_syncing => Ok(()),
            status => Err(ManagerError::NotConnected {
                id: id.to_string(),
                status: status.to_string(),
            }),
        }
    }

    fn import_options(&self, category_hint: Option<String>) -> ImportOptions {
        let window = TimeWindow::around(Utc::now(), self.config.window_days);
        let options = ImportOptions::new().with_time_window(window);
        match category_hint {
            Some(category) => options.with_category(category),
            None => options,
        }
    }

    /// Imports everything the integration can fetch.
    ///
    /// # Errors
    ///
    /// `NotFound`, `NotConnected`, `UnsupportedOperation` for adapters that
    /// only import URLs, or the pipeline's error.
    pub async fn import_data(
        &self,
        id: &str,
        category_hint: Option<String>,
    ) -> ManagerResult<ImportResult> {
        let integration = self.lookup(id).await?;
        Self::require_connected(id, integration.as_ref(), true)?;
        if !integration.capabilities().import {
            return Err(ManagerError::UnsupportedOperation {
                provider: integration.kind(),
                operation: "import",
            });
        }

        let before = integration.credentials();
        let result = run_import(
            integration.as_ref(),
            self.items.as_ref(),
            self.import_options(category_hint),
        )
        .await;
        self.persist_if_rotated(integration.as_ref(), before).await;
        Ok(result?)
    }

    /// Imports the content behind one URL.
    pub async fn import_url(
        &self,
        id: &str,
        url: &str,
        category_hint: Option<String>,
    ) -> ManagerResult<ImportResult> {
        let integration = self.lookup(id).await?;
        Self::require_connected(id, integration.as_ref(), true)?;
        if !integration.capabilities().url_import {
            return Err(ManagerError::UnsupportedOperation {
                provider: integration.kind(),
                operation: "URL import",
            });
        }

        let before = integration.credentials();
        let result = run_url_import(
            integration.as_ref(),
            self.items.as_ref(),
            url,
            self.import_options(category_hint),
        )
        .await;
        self.persist_if_rotated(integration.as_ref(), before).await;
        Ok(result?)
    }

    /// Creates `items` upstream.
    ///
    /// # Errors
    ///
    /// `NotConnected` or `UnsupportedOperation` before anything is sent.
    pub async fn export_data(
        &self,
        id: &str,
        items: Vec<Item>,
        options: ExportOptions,
    ) -> ManagerResult<ExportResult> {
        let integration = self.lookup(id).await?;
        Self::require_connected(id, integration.as_ref(), false)?;
        if !integration.capabilities().export {
            return Err(ManagerError::UnsupportedOperation {
                provider: integration.kind(),
                operation: "export",
            });
        }

        let before = integration.credentials();
        let result = integration.export_items(items, options).await;
        self.persist_if_rotated(integration.as_ref(), before).await;
        Ok(result?)
    }

    /// Imports each id in turn. Never fails: a failing id yields a zero-item
    /// result carrying the error, in the same position as the input.
    pub async fn bulk_import(&self, ids: &[String], category_hint: Option<String>) -> Vec<ImportResult> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = match self.import_data(id, category_hint.clone()).await {
                Ok(result) => result,
                Err(e) => {
                    let provider = self
                        .integrations
                        .read()
                        .await
                        .get(id)
                        .map_or("unknown", |entry| entry.provider.as_str());
                    warn!(id = %id, error = %e, "bulk import entry failed");
                    ImportResult::failed(provider, e.to_string())
                }
            };
            results.push(result);
        }
        info!(
            requested = ids.len(),
            imported = results.iter().map(|r| r.imported_items).sum::<usize>(),
            "bulk import finished"
        );
        results
    }

    /// Counts integrations by status and by provider.
    pub async fn integration_summary(&self) -> IntegrationSummary {
        let integrations = self.integrations.read().await;
        let mut summary = IntegrationSummary {
            total: integrations.len(),
            ..Default::default()
        };
        for entry in integrations.values() {
            *summary.by_status.entry(entry.integration.status()).or_default() += 1;
            *summary.by_provider.entry(entry.provider).or_default() += 1;
        }
        summary
    }

    /// Returns a snapshot of one integration.
    pub async fn get_integration(&self, id: &str) -> Option<IntegrationInfo> {
        self.integrations.read().await.get(id).map(|entry| entry.info(id))
    }

    /// Returns snapshots of every integration, oldest first.
    pub async fn list_integrations(&self) -> Vec<IntegrationInfo> {
        let mut infos: Vec<IntegrationInfo> = self
            .integrations
            .read()
            .await
            .iter()
            .map(|(id, entry)| entry.info(id))
            .collect();
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        infos
    }

    /// Returns the ids registered for a provider.
    pub async fn ids_for(&self, provider: ProviderKind) -> Vec<String> {
        self.list_integrations()
            .await
            .into_iter()
            .filter(|info| info.provider == provider)
            .map(|info| info.id)
            .collect()
    }

    /// Unregisters an integration. Stored credentials are kept.
    pub async fn remove_integration(&self, id: &str) -> ManagerResult<()> {
        let entry = self
            .integrations
            .write()
            .await
            .remove(id)
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
        entry.integration.disconnect();
        info!(id = %id, provider = %entry.provider, "integration removed");
        Ok(())
    }

    /// Disconnects an integration and deletes its credential record.
    ///
    /// With `force_reimport`, the provider's items are deleted too so the
    /// next import starts from scratch. Returns the number of items deleted.
    pub async fn disconnect_integration(&self, id: &str, force_reimport: bool) -> ManagerResult<usize> {
        let integration = self.lookup(id).await?;
        let provider = integration.kind();
        integration.disconnect();
        self.credentials.delete_token(provider).await?;

        let removed = if force_reimport {
            self.items.delete_items_by_source(provider.as_str()).await?
        } else {
            0
        };
        info!(id = %id, provider = %provider, removed, "integration disconnected");
        Ok(removed)
    }

    /// Restores integrations from persisted credentials.
    ///
    /// Runs once; later calls return an empty list. Integrations whose
    /// credentials no longer authenticate are dropped with a warning rather
    /// than reported. Returns the restored ids.
    pub async fn initialize(&self) -> Vec<String> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            debug!("integration manager already initialized");
            return Vec::new();
        }

        let mut restored = Vec::new();
        for &provider in &self.config.enabled_providers {
            match self.restore(provider).await {
                Ok(Some(id)) => restored.push(id),
                Ok(None) => {}
                Err(e) => warn!(provider = %provider, error = %e, "dropping integration that failed to restore"),
            }
        }

        *initialized = true;
        info!(restored = restored.len(), "integration manager initialized");
        restored
    }

    async fn restore(&self, provider: ProviderKind) -> ManagerResult<Option<String>> {
        let record = self.credentials.get_token(provider).await?;
        let config = self.config.integration_config(provider);
        // API-key providers are usable without a stored token.
        if record.is_none() && config.api_key.is_none() {
            return Ok(None);
        }

        let id = self.create_integration(provider, Some(config), record).await?;
        if let Err(e) = self.authenticate_integration(&id).await {
            self.integrations.write().await.remove(&id);
            return Err(e);
        }
        debug!(id = %id, provider = %provider, "integration restored");
        Ok(Some(id))
    }
}

impl std::fmt::Debug for IntegrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationManager")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
