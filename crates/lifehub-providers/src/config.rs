//! Per-integration adapter settings.
//!
//! Values arrive already resolved: secret references are expanded by the
//! caller (see the manager's configuration layer) before they get here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::ProviderKind;

/// Settings handed to an adapter factory.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// OAuth client id.
    pub client_id: Option<String>,
    /// OAuth client secret (confidential clients only).
    pub client_secret: Option<String>,
    /// API key (YouTube).
    pub api_key: Option<String>,
    /// Microsoft tenant for Graph providers; `common` when unset.
    pub tenant: Option<String>,
    /// Overrides the provider's default OAuth scopes.
    pub scopes: Vec<String>,
    /// Overrides the provider's default item category.
    pub category: Option<String>,
    /// Calendar ids to import; all calendars when empty.
    pub calendar_ids: Vec<String>,
}

impl IntegrationConfig {
    /// Creates an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set OAuth client credentials.
    pub fn with_client(mut self, client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = client_secret;
        self
    }

    /// Builder method to set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Builder method to set the default category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Returns the configured client id, or an empty string.
    pub fn client_id_or_empty(&self) -> String {
        self.client_id.clone().unwrap_or_default()
    }

    /// Returns the scopes override, or `defaults`.
    pub fn scopes_or(&self, defaults: &[&str]) -> Vec<String> {
        if self.scopes.is_empty() {
            defaults.iter().map(|s| s.to_string()).collect()
        } else {
            self.scopes.clone()
        }
    }

    /// Checks that settings required by the provider are present.
    ///
    /// Static-token providers need nothing; OAuth settings are only checked
    /// when an OAuth flow is started.
    pub fn validate(&self, provider: ProviderKind) -> ProviderResult<()> {
        if let Some(ref secret) = self.client_secret
            && !secret.is_empty()
            && self.client_id.as_deref().is_none_or(str::is_empty)
        {
            return Err(ProviderError::configuration("client_secret is set without client_id")
                .with_provider(provider.as_str()));
        }
        if matches!(provider, ProviderKind::OutlookCalendar | ProviderKind::OneNote)
            && self.client_secret.as_deref().is_some_and(|s| !s.is_empty())
        {
            return Err(ProviderError::configuration(
                "Microsoft Graph integrations use PKCE and take no client_secret",
            )
            .with_provider(provider.as_str()));
        }
        Ok(())
    }
}

impl fmt::Debug for IntegrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("tenant", &self.tenant)
            .field("scopes", &self.scopes)
            .field("category", &self.category)
            .field("calendar_ids", &self.calendar_ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    #[test]
    fn scopes_fall_back_to_defaults() {
        let config = IntegrationConfig::new();
        assert_eq!(config.scopes_or(&["a", "b"]), vec!["a", "b"]);

        let config = IntegrationConfig {
            scopes: vec!["c".into()],
            ..Default::default()
        };
        assert_eq!(config.scopes_or(&["a"]), vec!["c"]);
    }

    #[test]
    fn graph_providers_reject_secrets() {
        let config = IntegrationConfig::new().with_client("id", Some("secret".into()));
        assert!(config.validate(ProviderKind::GoogleCalendar).is_ok());
        assert_eq!(
            config.validate(ProviderKind::OneNote).unwrap_err().code(),
            ProviderErrorCode::Configuration
        );
    }

    #[test]
    fn secret_without_client_id_is_rejected() {
        let config = IntegrationConfig {
            client_secret: Some("secret".into()),
            ..Default::default()
        };
        assert!(config.validate(ProviderKind::Todoist).is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = IntegrationConfig::new()
            .with_client("id", Some("hunter2".into()))
            .with_api_key("AIza-key");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("AIza-key"));
    }
}
