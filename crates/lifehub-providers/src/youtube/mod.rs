//! YouTube integration.
//!
//! There is nothing to enumerate: videos are imported one URL at a time as
//! notes carrying the title, description and channel. Requests are signed
//! with an API key (`key=` query parameter) or, when the user went through
//! OAuth, a bearer token.

mod api;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::IntegrationConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::oauth::OAuthClient;
use crate::provider::{
    AuthorizationRequest, BoxFuture, Capabilities, FetchedItems, ImportOptions, Integration,
    IntegrationStatus, ProviderKind,
};
use crate::session::{self, AuthSession, probe};
use crate::tokens::TokenRecord;
use crate::transport::{HttpRequest, HttpTransport};

pub use api::parse_video_id;
use api::VideoListResponse;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/youtube.readonly"];

/// YouTube adapter.
pub struct YouTubeIntegration {
    session: AuthSession,
    oauth: OAuthClient,
    api_key: Option<String>,
    category: String,
}

impl YouTubeIntegration {
    /// Creates a disconnected YouTube integration.
    pub fn new(config: IntegrationConfig, transport: Arc<dyn HttpTransport>) -> ProviderResult<Self> {
        config.validate(ProviderKind::YouTube)?;
        let oauth = OAuthClient::new(
            ProviderKind::YouTube,
            config.client_id_or_empty(),
            AUTHORIZE_URL,
            TOKEN_URL,
        )
        .with_secret(config.client_secret.clone())
        .with_scopes(config.scopes_or(DEFAULT_SCOPES))
        .with_param("access_type", "offline")
        .with_param("prompt", "consent");

        Ok(Self {
            session: AuthSession::new(ProviderKind::YouTube, transport),
            oauth,
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
            category: config.category.unwrap_or_else(|| "Videos".to_string()),
        })
    }

    fn probe_request() -> HttpRequest {
        HttpRequest::get(format!("{}/i18nLanguages", API_BASE)).with_query("part", "snippet")
    }

    /// API-key mode: nothing to refresh, the probe alone decides.
    async fn authenticate_with_key(&self) -> ProviderResult<()> {
        self.session.set_status(IntegrationStatus::Connecting);
        if !self.test_connection().await {
            return Err(self
                .session
                .fail(ProviderError::invalid_credential("API key rejected")));
        }
        self.session.set_status(IntegrationStatus::Connected);
        info!(provider = %ProviderKind::YouTube, "authenticated with API key");
        Ok(())
    }

    async fn authenticate_any(&self) -> ProviderResult<()> {
        if self.session.token().is_none() && self.api_key.is_some() {
            return self.authenticate_with_key().await;
        }
        session::standard_authenticate(self).await
    }

    async fn import_video(&self, url: &str) -> ProviderResult<FetchedItems> {
        let mut fetched = FetchedItems::default();
        let Some(video_id) = parse_video_id(url) else {
            fetched.push_error(url, "not a YouTube video URL");
            return Ok(fetched);
        };

        let request = HttpRequest::get(format!("{}/videos", API_BASE))
            .with_query("part", "snippet,contentDetails")
            .with_query("id", video_id.as_str());
        let response: VideoListResponse = self.authenticated_request(request).await?.json()?;

        match response.items.into_iter().next() {
            Some(video) => {
                debug!(video = %video_id, "fetched video details");
                fetched.extend(vec![video.into_item()]);
            }
            None => fetched.push_error(&video_id, "video not found or private"),
        }
        Ok(fetched)
    }

    async fn refresh(&self) -> ProviderResult<TokenRecord> {
        let current = self.session.require_token()?;
        self.oauth.refresh(self.session.transport(), &current).await
    }
}

impl fmt::Debug for YouTubeIntegration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouTubeIntegration")
            .field("session", &self.session)
            .field("oauth", &self.oauth)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("category", &self.category)
            .finish()
    }
}

impl Integration for YouTubeIntegration {
    fn kind(&self) -> ProviderKind {
        ProviderKind::YouTube
    }

    fn session(&self) -> &AuthSession {
        &self.session
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            url_import: true,
            oauth: true,
            refresh: true,
            ..Default::default()
        }
    }

    fn default_category(&self) -> &str {
        &self.category
    }

    fn authenticate(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(self.authenticate_any())
    }

    fn test_connection(&self) -> BoxFuture<'_, bool> {
        Box::pin(probe(self, Self::probe_request()))
    }

    fn refresh_access_token(&self) -> BoxFuture<'_, ProviderResult<TokenRecord>> {
        Box::pin(self.refresh())
    }

    fn fetch_items(&self, _options: ImportOptions) -> BoxFuture<'_, ProviderResult<FetchedItems>> {
        Box::pin(async {
            Err(ProviderError::unsupported("YouTube imports one video URL at a time")
                .with_provider(ProviderKind::YouTube.as_str()))
        })
    }

    fn fetch_url<'a>(
        &'a self,
        url: &'a str,
        _options: ImportOptions,
    ) -> BoxFuture<'a, ProviderResult<FetchedItems>> {
        Box::pin(self.import_video(url))
    }

    fn authorization_request(&self, redirect_uri: &str) -> ProviderResult<AuthorizationRequest> {
        self.oauth.authorization_request(redirect_uri)
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        redirect_uri: &'a str,
        pkce_verifier: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<TokenRecord>> {
        Box::pin(async move {
            let record = self
                .oauth
                .exchange_code(self.session.transport(), code, redirect_uri, pkce_verifier)
                .await?;
            self.session.set_token(record.clone());
            Ok(record)
        })
    }

    fn authorize_request(
        &self,
        request: HttpRequest,
        token: Option<&TokenRecord>,
    ) -> ProviderResult<HttpRequest> {
        match (token, self.api_key.as_deref()) {
            (Some(token), _) => Ok(request.bearer(&token.access_token)),
            (None, Some(key)) => Ok(request.with_query("key", key)),
            (None, None) => Err(ProviderError::no_credential(
                "no OAuth token or API key configured",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::import::{run_import, run_url_import};
    use crate::store::{ItemStore, MemoryItemStore};
    use crate::testing::FakeTransport;
    use crate::transport::{HttpMethod, HttpResponse};
    use lifehub_core::ItemType;
    use serde_json::json;

    fn video_response() -> HttpResponse {
        HttpResponse::json_body(
            200,
            &json!({"items": [{
                "id": "dQw4w9WgXcQ",
                "snippet": {"title": "Never Gonna Give You Up", "description": "Official video"},
                "contentDetails": {"duration": "PT3M33S"}
            }]}),
        )
    }

    fn with_key(transport: Arc<FakeTransport>) -> YouTubeIntegration {
        YouTubeIntegration::new(IntegrationConfig::new().with_api_key("test-key"), transport).unwrap()
    }

    #[tokio::test]
    async fn api_key_mode_signs_with_query_parameter() {
        let transport = Arc::new(
            FakeTransport::new()
                .on(HttpMethod::Get, "/i18nLanguages", HttpResponse::json_body(200, &json!({"items": []})))
                .on(HttpMethod::Get, "/videos", video_response()),
        );
        let youtube = with_key(transport.clone());

        youtube.authenticate().await.unwrap();
        assert_eq!(youtube.status(), IntegrationStatus::Connected);
        assert!(youtube.credentials().is_none());

        let store = MemoryItemStore::new();
        let result = run_url_import(
            &youtube,
            &store,
            "https://youtu.be/dQw4w9WgXcQ",
            ImportOptions::new(),
        )
        .await
        .unwrap();
        assert_eq!(result.imported_items, 1);
        assert_eq!(result.count_of(ItemType::Note), 1);

        let sent = transport.requests();
        assert!(sent.iter().all(|r| r.query_value("key") == Some("test-key")));
        assert!(sent.iter().all(|r| r.header("Authorization").is_none()));
        assert_eq!(sent[1].query_value("id"), Some("dQw4w9WgXcQ"));

        let items = store.get_all_items().await.unwrap();
        assert_eq!(items[0].category, "Videos");
    }

    #[tokio::test]
    async fn oauth_token_takes_precedence() {
        let transport = Arc::new(FakeTransport::new().on(HttpMethod::Get, "/videos", video_response()));
        let youtube = with_key(transport.clone());
        youtube
            .session
            .set_token(TokenRecord::new(ProviderKind::YouTube, "ya29.token"));

        run_url_import(&youtube, &MemoryItemStore::new(), "dQw4w9WgXcQ", ImportOptions::new())
            .await
            .unwrap();
        let sent = &transport.requests()[0];
        assert_eq!(sent.header("Authorization"), Some("Bearer ya29.token"));
        assert!(sent.query_value("key").is_none());
    }

    #[tokio::test]
    async fn invalid_url_is_reported_not_fatal() {
        let transport = Arc::new(FakeTransport::new());
        let youtube = with_key(transport.clone());

        let result = run_url_import(
            &youtube,
            &MemoryItemStore::new(),
            "https://vimeo.com/1",
            ImportOptions::new(),
        )
        .await
        .unwrap();
        assert_eq!(result.imported_items, 0);
        assert_eq!(result.errors, vec!["https://vimeo.com/1: not a YouTube video URL"]);
        assert!(transport.requests().is_empty());
        assert_ne!(youtube.status(), IntegrationStatus::Error);
    }

    #[tokio::test]
    async fn bulk_import_is_unsupported() {
        let youtube = with_key(Arc::new(FakeTransport::new()));
        let err = run_import(&youtube, &MemoryItemStore::new(), ImportOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::UnsupportedOperation);
    }

    #[tokio::test]
    async fn no_credentials_at_all() {
        let youtube = YouTubeIntegration::new(IntegrationConfig::new(), Arc::new(FakeTransport::new())).unwrap();
        let err = youtube.authenticate().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NoCredential);
        assert_eq!(youtube.status(), IntegrationStatus::Error);
    }
}
