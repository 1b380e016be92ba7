//! Command implementations.
//!
//! Every invocation builds a fresh [`IntegrationManager`] over the file
//! stores in the data directory and restores integrations from stored
//! credentials, so commands address providers rather than integration ids.

pub mod auth;
pub mod config;
pub mod import;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use lifehub_manager::{FileCredentialStore, FileItemStore, IntegrationManager, LifehubConfig};
use lifehub_providers::{HttpTransport, IntegrationStatus, ProviderKind};
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Settings shared by every command.
pub struct Context {
    pub config: LifehubConfig,
    pub data_dir: PathBuf,
    pub json: bool,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl Context {
    pub fn new(config: LifehubConfig, data_dir: Option<PathBuf>, json: bool) -> Self {
        let data_dir = data_dir.unwrap_or_else(|| config.data_dir());
        Self {
            config,
            data_dir,
            json,
            transport: None,
        }
    }

    /// Builder method to replace the HTTP transport of managers built later.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Directory holding one credential file per provider.
    pub fn credentials_dir(&self) -> PathBuf {
        self.data_dir.join("credentials")
    }

    /// File holding every imported item.
    pub fn items_path(&self) -> PathBuf {
        self.data_dir.join("items.json")
    }

    /// Builds a manager over the file stores. Nothing is restored yet.
    pub fn manager(&self) -> CliResult<IntegrationManager> {
        let manager = IntegrationManager::new(
            self.config.to_manager_config()?,
            Arc::new(FileCredentialStore::new(self.credentials_dir())),
            Arc::new(FileItemStore::new(self.items_path())),
        )?;
        debug!("data directory: {:?}", self.data_dir);
        Ok(match self.transport {
            Some(ref transport) => manager.with_transport(transport.clone()),
            None => manager,
        })
    }

    /// Builds a manager and restores every integration with credentials.
    pub async fn restored_manager(&self) -> CliResult<IntegrationManager> {
        let manager = self.manager()?;
        manager.initialize().await;
        Ok(manager)
    }

    fn ensure_enabled(&self, provider: ProviderKind) -> CliResult<()> {
        if self.config.enabled_providers.contains(&provider) {
            Ok(())
        } else {
            Err(CliError::config(format!(
                "{provider} is not listed in enabled_providers"
            )))
        }
    }
}

/// Returns the id of the provider's connected integration.
pub(crate) async fn connected_id(
    manager: &IntegrationManager,
    provider: ProviderKind,
) -> CliResult<String> {
    for id in manager.ids_for(provider).await {
        if let Some(info) = manager.get_integration(&id).await
            && info.status == IntegrationStatus::Connected
        {
            return Ok(id);
        }
    }
    Err(CliError::NotConnected(provider))
}
