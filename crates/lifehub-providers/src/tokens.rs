//! Credential records.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;

/// Tokens are treated as expired this long before their real expiry.
const EXPIRY_BUFFER_SECS: i64 = 60;

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Persisted access/refresh token and metadata for one provider.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// The provider this record belongs to.
    pub provider: ProviderKind,
    /// The access token for API requests.
    pub access_token: String,
    /// The refresh token, for providers with expiring tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Usually `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// When the access token expires (already shortened by a small buffer).
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// The scopes that were granted.
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    /// When the record was created or last refreshed.
    pub updated_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Creates a non-expiring record for a static token.
    pub fn new(provider: ProviderKind, access_token: impl Into<String>) -> Self {
        Self {
            provider,
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            expires_at: None,
            scopes: Vec::new(),
            workspace_id: None,
            workspace_name: None,
            bot_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Builder method to set the refresh token.
    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token.filter(|t| !t.is_empty());
        self
    }

    /// Builder method to set the expiry from an `expires_in` value.
    pub fn with_expires_in(mut self, expires_in_secs: Option<i64>) -> Self {
        self.expires_at = expires_in_secs.map(expiry_from_now);
        self
    }

    /// Builder method to set an absolute expiry.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Builder method to set the token type.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Builder method to set the granted scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Builder method to set workspace metadata.
    pub fn with_workspace(
        mut self,
        workspace_id: Option<String>,
        workspace_name: Option<String>,
        bot_id: Option<String>,
    ) -> Self {
        self.workspace_id = workspace_id;
        self.workspace_name = workspace_name;
        self.bot_id = bot_id;
        self
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Returns true if a refresh token is held.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|at| at - Utc::now())
    }

    /// Returns a refreshed copy.
    ///
    /// A provider that does not rotate refresh tokens returns none; the old
    /// refresh token is kept in that case.
    pub fn rotated(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        let mut next = self.clone();
        next.access_token = access_token.into();
        if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
            next.refresh_token = Some(token);
        }
        next.expires_at = expires_in_secs.map(expiry_from_now);
        next.updated_at = Utc::now();
        next
    }
}

fn expiry_from_now(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_BUFFER_SECS)
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("provider", &self.provider)
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("workspace_id", &self.workspace_id)
            .field("workspace_name", &self.workspace_name)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_token_never_expires() {
        let record = TokenRecord::new(ProviderKind::Todoist, "abc");
        assert!(!record.is_expired());
        assert!(!record.has_refresh_token());
        assert_eq!(record.token_type, "Bearer");
    }

    #[test]
    fn expiry_applies_buffer() {
        let record = TokenRecord::new(ProviderKind::GoogleCalendar, "abc").with_expires_in(Some(30));
        assert!(record.is_expired());

        let record = TokenRecord::new(ProviderKind::GoogleCalendar, "abc").with_expires_in(Some(3600));
        assert!(!record.is_expired());
        assert!(record.time_until_expiry().unwrap() > Duration::minutes(55));
    }

    #[test]
    fn rotation_keeps_old_refresh_token() {
        let record = TokenRecord::new(ProviderKind::OutlookCalendar, "old")
            .with_refresh_token(Some("refresh-1".to_string()));

        let kept = record.rotated("new", None, Some(3600));
        assert_eq!(kept.access_token, "new");
        assert_eq!(kept.refresh_token.as_deref(), Some("refresh-1"));

        let rotated = record.rotated("newer", Some("refresh-2".to_string()), Some(3600));
        assert_eq!(rotated.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let record = TokenRecord::new(ProviderKind::Notion, "secret-token")
            .with_refresh_token(Some("secret-refresh".to_string()));
        let debug = format!("{:?}", record);
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn serde_defaults() {
        let json = r#"{"provider":"notion","access_token":"t","updated_at":"2025-01-01T00:00:00Z"}"#;
        let record: TokenRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.token_type, "Bearer");
        assert!(record.refresh_token.is_none());
        assert!(record.scopes.is_empty());
    }
}
