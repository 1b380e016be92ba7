//! Manager error types.

use lifehub_providers::{ProviderError, ProviderKind, StoreError};
use thiserror::Error;

/// Errors raised by [`crate::IntegrationManager`] operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No integration is registered under the id.
    #[error("integration not found: {0}")]
    NotFound(String),

    /// The provider has no registered factory.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(ProviderKind),

    /// The integration must be connected first.
    #[error("integration {id} is not connected (status: {status})")]
    NotConnected { id: String, status: String },

    /// The adapter does not declare the capability.
    #[error("{provider} does not support {operation}")]
    UnsupportedOperation {
        provider: ProviderKind,
        operation: &'static str,
    },

    /// A provider enabled in configuration has no factory.
    #[error("no factory registered for enabled provider {0}")]
    MissingFactory(ProviderKind),

    /// An adapter operation failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A credential or item store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be loaded or resolved.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ManagerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// A specialized Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;
