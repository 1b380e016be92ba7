//! Integration trait definition.
//!
//! This module defines the [`Integration`] trait, the contract every provider
//! adapter implements, along with the small value types that flow through it.
//!
//! Adapters are responsible for:
//! - Authenticating and probing the connection
//! - Fetching and converting upstream content into [`Item`]s
//! - Provider-specific OAuth parameters
//!
//! Retry, rate-limit backoff and token refresh live in
//! [`crate::session`]; deduplication and persistence live in
//! [`crate::import`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use lifehub_core::{ExportResult, Item, TimeWindow};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};
use crate::session::{self, AuthSession};
use crate::tokens::TokenRecord;
use crate::transport::{HttpRequest, HttpResponse};

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so the manager can hold
/// `Arc<dyn Integration>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "todoist")]
    Todoist,
    #[serde(rename = "google_calendar")]
    GoogleCalendar,
    #[serde(rename = "outlook_calendar")]
    OutlookCalendar,
    #[serde(rename = "notion")]
    Notion,
    #[serde(rename = "onenote")]
    OneNote,
    #[serde(rename = "youtube")]
    YouTube,
}

impl ProviderKind {
    /// All providers, in display order.
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Todoist,
        ProviderKind::GoogleCalendar,
        ProviderKind::OutlookCalendar,
        ProviderKind::Notion,
        ProviderKind::OneNote,
        ProviderKind::YouTube,
    ];

    /// Returns the provider name used in ids, item sources and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todoist => "todoist",
            Self::GoogleCalendar => "google_calendar",
            Self::OutlookCalendar => "outlook_calendar",
            Self::Notion => "notion",
            Self::OneNote => "onenote",
            Self::YouTube => "youtube",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.as_str() == needle)
            .ok_or_else(|| ProviderError::configuration(format!("unknown provider: {}", s)))
    }
}

/// Lifecycle status of one integration instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Disconnected,
    Connecting,
    Connected,
    Syncing,
    Error,
}

impl IntegrationStatus {
    /// Returns the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Syncing => "syncing",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a provider authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// A non-expiring personal or integration token.
    StaticToken,
    /// An API key sent as a query parameter.
    ApiKey,
    /// Authorization code flow with a client secret.
    #[serde(rename = "oauth")]
    OAuth,
    /// Authorization code flow with PKCE, no client secret.
    #[serde(rename = "oauth_pkce")]
    OAuthPkce,
}

/// Capability flags an adapter declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Bulk import via `fetch_items`.
    pub import: bool,
    /// Export via `export_items`.
    pub export: bool,
    /// Single-URL import via `fetch_url`.
    pub url_import: bool,
    /// Authorization-code OAuth.
    pub oauth: bool,
    /// PKCE public-client OAuth.
    pub pkce: bool,
    /// Access tokens expire and are refreshed.
    pub refresh: bool,
}

/// Options for one import.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Category assigned to items that have none.
    pub category: Option<String>,
    /// Calendar window; calendar adapters default to thirty days each way.
    pub time_window: Option<TimeWindow>,
}

impl ImportOptions {
    /// Creates default import options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the category hint.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Builder method to set the time window.
    pub fn with_time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }
}

/// Options for one export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Provider-specific target (project id, calendar id).
    pub target: Option<String>,
    /// Items per batch.
    pub batch_size: usize,
}

impl ExportOptions {
    /// Default batch size for exports.
    pub const DEFAULT_BATCH_SIZE: usize = 10;

    /// Builder method to set the target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            target: None,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }
}

/// Items produced by an adapter, before deduplication.
#[derive(Debug, Default)]
pub struct FetchedItems {
    /// Converted items.
    pub items: Vec<Item>,
    /// Items seen upstream after provider filters.
    pub total_items: usize,
    /// Per-resource errors, as `"{resource}: {error}"`.
    pub errors: Vec<String>,
}

impl FetchedItems {
    /// Records converted items for one resource.
    pub fn extend(&mut self, items: Vec<Item>) {
        self.total_items += items.len();
        self.items.extend(items);
    }

    /// Records a resource-level failure without aborting the import.
    pub fn push_error(&mut self, resource: &str, error: impl fmt::Display) {
        self.errors.push(format!("{}: {}", resource, error));
    }

    /// Records a failed resource listing.
    ///
    /// # Errors
    ///
    /// Credential failures are returned instead of recorded: every later
    /// request would fail the same way.
    pub fn resource_failed(&mut self, resource: &str, error: ProviderError) -> ProviderResult<()> {
        if error.is_credential_failure() {
            return Err(error);
        }
        self.push_error(resource, error);
        Ok(())
    }

    /// Records an upstream object that was seen but could not be fetched.
    ///
    /// It counts toward `total_items`, so it shows up as a failed item.
    ///
    /// # Errors
    ///
    /// As [`FetchedItems::resource_failed`].
    pub fn item_failed(&mut self, resource: &str, error: ProviderError) -> ProviderResult<()> {
        self.resource_failed(resource, error)?;
        self.total_items += 1;
        Ok(())
    }
}

/// An authorization URL and the state that must be kept for the exchange.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// URL to open in a browser.
    pub url: String,
    /// CSRF state echoed back on the redirect.
    pub state: String,
    /// PKCE verifier, to pass to `exchange_code`.
    pub pkce_verifier: Option<String>,
}

/// The contract every provider adapter implements.
///
/// # Implementation Notes
///
/// - Each adapter owns an [`AuthSession`] holding its tokens and status
/// - Requests go through [`Integration::authenticated_request`]
/// - `fetch_items` returns items only; it never persists anything
pub trait Integration: Send + Sync {
    /// Returns the provider kind.
    fn kind(&self) -> ProviderKind;

    /// Returns the session holding tokens and status.
    fn session(&self) -> &AuthSession;

    /// Returns the declared capabilities.
    fn capabilities(&self) -> Capabilities;

    /// Category for items when the caller gives no hint.
    fn default_category(&self) -> &str;

    /// Whether imports also skip items whose title matches an existing one.
    fn dedupe_by_title(&self) -> bool {
        false
    }

    /// Validates or loads tokens and moves to `Connected`.
    ///
    /// # Errors
    ///
    /// `NoCredential` if nothing is held, `InvalidCredential` if the probe
    /// fails. The status is `Error` after any failure.
    fn authenticate(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(session::standard_authenticate(self))
    }

    /// Issues a lightweight authenticated probe.
    fn test_connection(&self) -> BoxFuture<'_, bool>;

    /// Exchanges the held refresh token for a new access token.
    ///
    /// Returns the new record; the caller stores it in the session.
    fn refresh_access_token(&self) -> BoxFuture<'_, ProviderResult<TokenRecord>> {
        let kind = self.kind();
        Box::pin(async move {
            Err(ProviderError::unsupported("tokens for this provider do not expire")
                .with_provider(kind.as_str()))
        })
    }

    /// Fetches and converts all importable content.
    fn fetch_items(&self, options: ImportOptions) -> BoxFuture<'_, ProviderResult<FetchedItems>>;

    /// Fetches and converts the content behind a single URL.
    fn fetch_url<'a>(
        &'a self,
        _url: &'a str,
        _options: ImportOptions,
    ) -> BoxFuture<'a, ProviderResult<FetchedItems>> {
        let kind = self.kind();
        Box::pin(async move {
            Err(ProviderError::unsupported("URL import is not supported")
                .with_provider(kind.as_str()))
        })
    }

    /// Creates items upstream.
    fn export_items(
        &self,
        _items: Vec<Item>,
        _options: ExportOptions,
    ) -> BoxFuture<'_, ProviderResult<ExportResult>> {
        let kind = self.kind();
        Box::pin(async move {
            Err(ProviderError::unsupported("export is not supported").with_provider(kind.as_str()))
        })
    }

    /// Builds the authorization URL for an OAuth flow.
    fn authorization_request(&self, _redirect_uri: &str) -> ProviderResult<AuthorizationRequest> {
        Err(ProviderError::unsupported("OAuth is not supported").with_provider(self.kind().as_str()))
    }

    /// Exchanges an authorization code and stores the tokens in the session.
    fn exchange_code<'a>(
        &'a self,
        _code: &'a str,
        _redirect_uri: &'a str,
        _pkce_verifier: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<TokenRecord>> {
        let kind = self.kind();
        Box::pin(async move {
            Err(ProviderError::unsupported("OAuth is not supported").with_provider(kind.as_str()))
        })
    }

    /// Attaches credentials and provider headers to a request.
    fn authorize_request(
        &self,
        request: HttpRequest,
        token: Option<&TokenRecord>,
    ) -> ProviderResult<HttpRequest> {
        match token {
            Some(token) => Ok(request.bearer(&token.access_token)),
            None => Err(ProviderError::no_credential("not authenticated")),
        }
    }

    /// Sends a request with auth headers, 429 backoff and 401 refresh.
    fn authenticated_request(
        &self,
        request: HttpRequest,
    ) -> BoxFuture<'_, ProviderResult<HttpResponse>> {
        Box::pin(session::authenticated_request(
            self,
            request,
            session::DEFAULT_RETRIES,
        ))
    }

    /// Returns the current status.
    fn status(&self) -> IntegrationStatus {
        self.session().status()
    }

    /// Returns a copy of the current credential record.
    fn credentials(&self) -> Option<TokenRecord> {
        self.session().token()
    }

    /// Clears tokens and moves to `Disconnected`.
    fn disconnect(&self) {
        self.session().disconnect();
    }
}
