//! CLI error types.

use lifehub_manager::ManagerError;
use lifehub_providers::ProviderKind;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Manager or provider error.
    #[error(transparent)]
    Manager(#[from] ManagerError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No usable integration for the provider.
    #[error("{0} is not connected; run `lifehub connect {0}` or `lifehub auth {0}` first")]
    NotConnected(ProviderKind),

    /// The OAuth flow could not be completed.
    #[error("authorization failed: {0}")]
    Auth(String),

    /// Output could not be rendered.
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
