//! Integration registry for lifehub.
//!
//! - [`IntegrationManager`] - Creates, authenticates, imports through and
//!   restores integrations
//! - [`ProviderRegistry`] - The provider to adapter-constructor map
//! - [`catalog`] - Display metadata per provider
//! - [`LifehubConfig`] - `config.toml`, with secret references
//! - [`FileCredentialStore`] / [`FileItemStore`] - JSON file stores
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lifehub_manager::{FileCredentialStore, FileItemStore, IntegrationManager, LifehubConfig};
//!
//! let config = LifehubConfig::load()?;
//! let data_dir = config.data_dir();
//! let manager = IntegrationManager::new(
//!     config.to_manager_config()?,
//!     Arc::new(FileCredentialStore::new(data_dir.join("credentials"))),
//!     Arc::new(FileItemStore::new(data_dir.join("items.json"))),
//! )?;
//! for id in manager.initialize().await {
//!     let result = manager.import_data(&id, None).await?;
//!     println!("{}: {} new", result.provider, result.imported_items);
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod manager;
pub mod registry;
pub mod secret;
pub mod stores;

pub use catalog::{ProviderInfo, catalog, provider_info};
pub use config::{LifehubConfig, ManagerConfig, ProviderSettings};
pub use error::{ManagerError, ManagerResult};
pub use manager::{IntegrationInfo, IntegrationManager, IntegrationSummary};
pub use registry::{IntegrationFactory, ProviderRegistry};
pub use stores::{FileCredentialStore, FileItemStore};
