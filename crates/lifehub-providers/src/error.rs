//! Error types for integration operations.
//!
//! Every adapter reports failures as a [`ProviderError`] carrying a closed
//! [`ProviderErrorCode`]. Retry and propagation decisions are made on the code
//! and the structured fields, never on the message text.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// No credential is available at all.
    NoCredential,
    /// The credential was rejected by the provider.
    InvalidCredential,
    /// Exchanging the refresh token for a new access token failed.
    TokenRefreshFailed,
    /// Rate limit exceeded and the retry budget is exhausted.
    RateLimited,
    /// Non-2xx response that is neither a 401 nor a 429.
    RequestFailed,
    /// Connection failed, timeout, DNS resolution, etc.
    Network,
    /// The provider answered with something we could not parse.
    InvalidResponse,
    /// The integration does not declare this capability.
    UnsupportedOperation,
    /// An import is already running on this integration.
    ImportInProgress,
    /// Missing or invalid configuration.
    Configuration,
    /// Unexpected state, bug.
    Internal,
}

impl ProviderErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimited)
    }

    /// Returns true if the session's credentials can no longer be used.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            Self::NoCredential | Self::InvalidCredential | Self::TokenRefreshFailed
        )
    }

    /// Returns the wire name of this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::TokenRefreshFailed => "token_refresh_failed",
            Self::RateLimited => "rate_limited",
            Self::RequestFailed => "request_failed",
            Self::Network => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::UnsupportedOperation => "unsupported_operation",
            Self::ImportInProgress => "import_in_progress",
            Self::Configuration => "configuration_error",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to a provider.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// The provider that generated this error (e.g. "todoist").
    provider: Option<String>,
    /// HTTP status, for `RequestFailed` and friends.
    status: Option<u16>,
    /// Response body or other detail, truncated.
    details: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Response bodies kept in errors are cut to this many characters.
const MAX_DETAILS_LEN: usize = 512;

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            status: None,
            details: None,
            source: None,
        }
    }

    /// No credential is available.
    pub fn no_credential(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NoCredential, message)
    }

    /// The credential was rejected.
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidCredential, message)
    }

    /// The token refresh failed.
    pub fn token_refresh_failed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::TokenRefreshFailed, message)
    }

    /// Rate limit exhausted.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    /// Non-2xx response.
    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(ProviderErrorCode::RequestFailed, message);
        err.status = Some(status);
        err
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Network, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::UnsupportedOperation, message)
    }

    /// Creates an import-in-progress error.
    pub fn import_in_progress(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ImportInProgress, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Configuration, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Internal, message)
    }

    /// Sets the provider name for this error, unless one is already set.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        if self.provider.is_none() {
            self.provider = Some(provider.into());
        }
        self
    }

    /// Sets the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches response details, truncated.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details: String = details.into();
        let details = if details.chars().count() > MAX_DETAILS_LEN {
            let mut cut: String = details.chars().take(MAX_DETAILS_LEN).collect();
            cut.push('…');
            cut
        } else {
            details
        };
        if !details.is_empty() {
            self.details = Some(details);
        }
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider name, if set.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Returns the HTTP status, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the response details, if any.
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true if the session's credentials can no longer be used.
    pub fn is_credential_failure(&self) -> bool {
        self.code.is_credential_failure()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}", self.code)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
