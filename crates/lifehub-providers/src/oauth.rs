//! OAuth 2.0 authorization code flow, with and without PKCE.
//!
//! Two exchange variants are supported:
//!
//! 1. Confidential client: the code is exchanged with a client secret
//!    (`grant_type=authorization_code`).
//! 2. Public client: an S256 `code_challenge` is sent with the authorization
//!    URL and the matching `code_verifier` replaces the secret on exchange.
//!
//! Exactly one of the two must be supplied for a given exchange; anything
//! else is a configuration error raised before any network call.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::Rng as _;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{AuthorizationRequest, ProviderKind};
use crate::tokens::TokenRecord;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// How the token endpoint expects its requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequestStyle {
    /// Form-encoded body carrying `client_id` (and the secret, if any).
    Form,
    /// HTTP basic auth with the client credentials and a JSON body.
    BasicJson,
}

/// Credential used to redeem an authorization code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeExchange<'a> {
    ClientSecret(&'a str),
    Pkce { verifier: &'a str },
}

impl<'a> CodeExchange<'a> {
    /// Picks the exchange variant.
    ///
    /// # Errors
    ///
    /// A configuration error unless exactly one of `client_secret` and
    /// `verifier` is present.
    pub fn select(client_secret: Option<&'a str>, verifier: Option<&'a str>) -> ProviderResult<Self> {
        let client_secret = client_secret.filter(|s| !s.is_empty());
        let verifier = verifier.filter(|v| !v.is_empty());
        match (client_secret, verifier) {
            (Some(secret), None) => Ok(Self::ClientSecret(secret)),
            (None, Some(verifier)) => Ok(Self::Pkce { verifier }),
            (None, None) => Err(ProviderError::configuration(
                "code exchange needs a client secret or a PKCE verifier",
            )),
            (Some(_), Some(_)) => Err(ProviderError::configuration(
                "code exchange takes a client secret or a PKCE verifier, not both",
            )),
        }
    }
}

/// PKCE flow state and utilities (RFC 7636).
#[derive(Debug, Clone)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// SHA-256 of the verifier, base64url encoded.
    pub challenge: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with a random verifier.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// Computes the S256 challenge for a code verifier.
    pub fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from a token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

/// OAuth client settings for one provider.
#[derive(Clone)]
pub struct OAuthClient {
    provider: ProviderKind,
    client_id: String,
    client_secret: Option<String>,
    authorize_url: String,
    token_url: String,
    scopes: Vec<String>,
    scope_separator: &'static str,
    extra_params: Vec<(String, String)>,
    style: TokenRequestStyle,
    pkce: bool,
}

impl OAuthClient {
    /// Creates a form-style client without PKCE.
    pub fn new(
        provider: ProviderKind,
        client_id: impl Into<String>,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            client_id: client_id.into(),
            client_secret: None,
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            scopes: Vec::new(),
            scope_separator: " ",
            extra_params: Vec::new(),
            style: TokenRequestStyle::Form,
            pkce: false,
        }
    }

    /// Builder method to set the client secret.
    pub fn with_secret(mut self, client_secret: Option<String>) -> Self {
        self.client_secret = client_secret.filter(|s| !s.is_empty());
        self
    }

    /// Builder method to set the requested scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Builder method to change how scopes are joined (default: space).
    pub fn with_scope_separator(mut self, separator: &'static str) -> Self {
        self.scope_separator = separator;
        self
    }

    /// Builder method to add an authorization URL parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }

    /// Builder method to set the token request style.
    pub fn with_style(mut self, style: TokenRequestStyle) -> Self {
        self.style = style;
        self
    }

    /// Builder method to enable PKCE.
    pub fn with_pkce(mut self, pkce: bool) -> Self {
        self.pkce = pkce;
        self
    }

    /// Returns the requested scopes.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Returns true when the client uses PKCE.
    pub fn uses_pkce(&self) -> bool {
        self.pkce
    }

    fn require_client_id(&self) -> ProviderResult<&str> {
        if self.client_id.trim().is_empty() {
            return Err(ProviderError::configuration("client_id is not configured")
                .with_provider(self.provider.as_str()));
        }
        Ok(&self.client_id)
    }

    /// Builds the authorization URL, generating state and (for PKCE) a
    /// verifier/challenge pair.
    pub fn authorization_request(&self, redirect_uri: &str) -> ProviderResult<AuthorizationRequest> {
        let client_id = self.require_client_id()?;
        let state = random_token(16);
        let pkce = self.pkce.then(PkceFlow::new);

        let mut params: Vec<(String, String)> = vec![
            ("client_id".into(), client_id.to_string()),
            ("redirect_uri".into(), redirect_uri.to_string()),
            ("response_type".into(), "code".into()),
            ("state".into(), state.clone()),
        ];
        if !self.scopes.is_empty() {
            params.push(("scope".into(), self.scopes.join(self.scope_separator)));
        }
        if let Some(ref flow) = pkce {
            params.push(("code_challenge".into(), flow.challenge.clone()));
            params.push(("code_challenge_method".into(), "S256".into()));
        }
        params.extend(self.extra_params.iter().cloned());

        let url = url::Url::parse_with_params(&self.authorize_url, &params).map_err(|e| {
            ProviderError::configuration(format!("invalid authorization URL: {}", e))
                .with_provider(self.provider.as_str())
        })?;

        debug!(provider = %self.provider, pkce = self.pkce, "built authorization URL");
        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
            pkce_verifier: pkce.map(|f| f.verifier),
        })
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// A configuration error when the secret/verifier pair is not exactly one
    /// of each; `InvalidCredential` when the endpoint rejects the code.
    pub async fn exchange_code(
        &self,
        transport: &dyn HttpTransport,
        code: &str,
        redirect_uri: &str,
        verifier: Option<&str>,
    ) -> ProviderResult<TokenRecord> {
        let provider = self.provider.as_str();
        let exchange = CodeExchange::select(self.client_secret.as_deref(), verifier)
            .map_err(|e| e.with_provider(provider))?;
        let client_id = self.require_client_id()?;

        let request = match (self.style, exchange) {
            (TokenRequestStyle::BasicJson, CodeExchange::ClientSecret(secret)) => {
                HttpRequest::post(&self.token_url)
                    .with_header("Authorization", basic_auth(client_id, secret))
                    .with_json(json!({
                        "grant_type": "authorization_code",
                        "code": code,
                        "redirect_uri": redirect_uri,
                    }))
            }
            (_, exchange) => {
                let mut form = vec![
                    ("client_id", client_id.to_string()),
                    ("grant_type", "authorization_code".to_string()),
                    ("code", code.to_string()),
                    ("redirect_uri", redirect_uri.to_string()),
                ];
                match exchange {
                    CodeExchange::ClientSecret(secret) => form.push(("client_secret", secret.to_string())),
                    CodeExchange::Pkce { verifier } => form.push(("code_verifier", verifier.to_string())),
                }
                HttpRequest::post(&self.token_url).with_form(form)
            }
        };

        let response = transport.send(request).await.map_err(|e| e.with_provider(provider))?;
        if !response.is_success() {
            let err = if matches!(response.status, 400 | 401) {
                ProviderError::invalid_credential(format!("token exchange failed ({})", response.status))
                    .with_status(response.status)
            } else {
                ProviderError::request_failed(response.status, "token exchange failed")
            };
            return Err(err.with_provider(provider).with_details(response.body));
        }

        let token = self.parse_token_response(&response)?;
        info!(provider, "obtained tokens from authorization code");
        Ok(TokenRecord::new(self.provider, token.access_token)
            .with_refresh_token(token.refresh_token)
            .with_expires_in(token.expires_in)
            .with_token_type(token.token_type.unwrap_or_else(|| "Bearer".to_string()))
            .with_scopes(
                token
                    .scope
                    .map(|s| split_scopes(&s))
                    .unwrap_or_else(|| self.scopes.clone()),
            )
            .with_workspace(token.workspace_id, token.workspace_name, token.bot_id))
    }

    /// Exchanges the refresh token held in `current` for a new access token.
    ///
    /// # Errors
    ///
    /// `TokenRefreshFailed` for any failure.
    pub async fn refresh(
        &self,
        transport: &dyn HttpTransport,
        current: &TokenRecord,
    ) -> ProviderResult<TokenRecord> {
        let provider = self.provider.as_str();
        let Some(ref refresh_token) = current.refresh_token else {
            return Err(ProviderError::token_refresh_failed("no refresh token held")
                .with_provider(provider));
        };
        let client_id = self.require_client_id()?;

        let mut form = vec![
            ("client_id", client_id.to_string()),
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.clone()),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret.clone()));
        }
        if self.pkce && !self.scopes.is_empty() {
            form.push(("scope", self.scopes.join(self.scope_separator)));
        }

        let response = transport
            .send(HttpRequest::post(&self.token_url).with_form(form))
            .await
            .map_err(|e| {
                ProviderError::token_refresh_failed(format!("token refresh request failed: {}", e))
                    .with_provider(provider)
                    .with_source(e)
            })?;
        if !response.is_success() {
            return Err(ProviderError::token_refresh_failed(format!(
                "token refresh failed ({})",
                response.status
            ))
            .with_provider(provider)
            .with_status(response.status)
            .with_details(response.body));
        }

        let token = self.parse_token_response(&response).map_err(|e| {
            ProviderError::token_refresh_failed(e.message().to_string()).with_provider(provider)
        })?;
        Ok(current.rotated(token.access_token, token.refresh_token, token.expires_in))
    }

    fn parse_token_response(&self, response: &HttpResponse) -> ProviderResult<TokenResponse> {
        response
            .json::<TokenResponse>()
            .map_err(|e| e.with_provider(self.provider.as_str()))
    }
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("has_secret", &self.client_secret.is_some())
            .field("token_url", &self.token_url)
            .field("pkce", &self.pkce)
            .finish()
    }
}

/// Builds an HTTP basic auth header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
}

fn split_scopes(scope: &str) -> Vec<String> {
    scope
        .split([' ', ','])
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::provider::BoxFuture;
    use crate::testing::FakeTransport;
    use crate::transport::HttpMethod;
    use serde_json::Value;
    use std::sync::Mutex;

    const AUTH_URL: &str = "https://login.example.com/authorize";
    const TOKEN_URL: &str = "https://login.example.com/token";

    fn pkce_client() -> OAuthClient {
        OAuthClient::new(ProviderKind::OneNote, "client-123", AUTH_URL, TOKEN_URL)
            .with_scopes(vec!["offline_access".into(), "Notes.Read".into()])
            .with_pkce(true)
    }

    /// Token endpoint that only accepts a verifier matching the challenge it
    /// was primed with.
    struct PkceTokenEndpoint {
        challenge: Mutex<Option<String>>,
        calls: Mutex<usize>,
    }

    impl HttpTransport for PkceTokenEndpoint {
        fn send(&self, request: HttpRequest) -> BoxFuture<'_, ProviderResult<HttpResponse>> {
            *self.calls.lock().unwrap() += 1;
            let expected = self.challenge.lock().unwrap().clone();
            let verifier = request.form_value("code_verifier").map(str::to_string);
            let has_secret = request.form_value("client_secret").is_some();
            Box::pin(async move {
                let ok = !has_secret
                    && matches!((expected, verifier), (Some(c), Some(v)) if PkceFlow::compute_challenge(&v) == c);
                Ok(if ok {
                    HttpResponse::json_body(
                        200,
                        &json!({"access_token": "at", "refresh_token": "rt", "expires_in": 3600}),
                    )
                } else {
                    HttpResponse::json_body(400, &json!({"error": "invalid_grant"}))
                })
            })
        }
    }

    #[test]
    fn pkce_verifier_and_challenge() {
        let flow = PkceFlow::new();
        // 32 bytes base64url without padding
        assert_eq!(flow.verifier.len(), 43);
        assert_eq!(flow.challenge, PkceFlow::compute_challenge(&flow.verifier));
        assert_ne!(flow.verifier, PkceFlow::new().verifier);
    }

    #[test]
    fn pkce_challenge_matches_rfc_example() {
        // RFC 7636, appendix B
        let challenge = PkceFlow::compute_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn code_exchange_requires_exactly_one() {
        assert_eq!(
            CodeExchange::select(Some("s"), None).unwrap(),
            CodeExchange::ClientSecret("s")
        );
        assert_eq!(
            CodeExchange::select(None, Some("v")).unwrap(),
            CodeExchange::Pkce { verifier: "v" }
        );
        assert_eq!(
            CodeExchange::select(None, Some("")).unwrap_err().code(),
            ProviderErrorCode::Configuration
        );
        assert_eq!(
            CodeExchange::select(Some("s"), Some("v")).unwrap_err().code(),
            ProviderErrorCode::Configuration
        );
    }

    #[test]
    fn authorization_url_contains_challenge() {
        let request = pkce_client()
            .authorization_request("http://127.0.0.1:8080/callback")
            .unwrap();
        let url = url::Url::parse(&request.url).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert!(request.url.starts_with(AUTH_URL));
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "offline_access Notes.Read");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["state"], request.state);
        let verifier = request.pkce_verifier.unwrap();
        assert_eq!(params["code_challenge"], PkceFlow::compute_challenge(&verifier));
    }

    #[test]
    fn authorization_url_without_pkce_has_no_challenge() {
        let client = OAuthClient::new(ProviderKind::Todoist, "id", AUTH_URL, TOKEN_URL)
            .with_scopes(vec!["data:read".into(), "data:read_write".into()])
            .with_scope_separator(",")
            .with_param("access_type", "offline");
        let request = client.authorization_request("https://app/cb").unwrap();

        assert!(request.pkce_verifier.is_none());
        assert!(!request.url.contains("code_challenge"));
        assert!(request.url.contains("scope=data%3Aread%2Cdata%3Aread_write"));
        assert!(request.url.contains("access_type=offline"));
    }

    #[test]
    fn missing_client_id_is_configuration_error() {
        let client = OAuthClient::new(ProviderKind::OneNote, "", AUTH_URL, TOKEN_URL);
        let err = client.authorization_request("https://app/cb").unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Configuration);
    }

    #[tokio::test]
    async fn pkce_exchange_validates_verifier() {
        let client = pkce_client();
        let auth = client.authorization_request("https://app/cb").unwrap();
        let params: std::collections::HashMap<_, _> = url::Url::parse(&auth.url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect();
        let endpoint = PkceTokenEndpoint {
            challenge: Mutex::new(Some(params["code_challenge"].clone())),
            calls: Mutex::new(0),
        };

        let record = client
            .exchange_code(&endpoint, "code", "https://app/cb", auth.pkce_verifier.as_deref())
            .await
            .unwrap();
        assert_eq!(record.access_token, "at");
        assert_eq!(record.refresh_token.as_deref(), Some("rt"));
        assert_eq!(record.scopes, vec!["offline_access", "Notes.Read"]);

        let err = client
            .exchange_code(&endpoint, "code", "https://app/cb", Some("wrong-verifier"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidCredential);
    }

    #[tokio::test]
    async fn exchange_without_secret_or_verifier_never_hits_network() {
        let endpoint = PkceTokenEndpoint {
            challenge: Mutex::new(None),
            calls: Mutex::new(0),
        };
        let err = pkce_client()
            .exchange_code(&endpoint, "code", "https://app/cb", None)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ProviderErrorCode::Configuration);
        assert_eq!(*endpoint.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn basic_json_exchange_keeps_workspace() {
        let transport = FakeTransport::new().on(
            HttpMethod::Post,
            "/token",
            HttpResponse::json_body(
                200,
                &json!({
                    "access_token": "secret_abc",
                    "token_type": "bearer",
                    "workspace_id": "ws-1",
                    "workspace_name": "Home",
                    "bot_id": "bot-9"
                }),
            ),
        );
        let client = OAuthClient::new(ProviderKind::Notion, "id", AUTH_URL, TOKEN_URL)
            .with_secret(Some("shh".into()))
            .with_style(TokenRequestStyle::BasicJson);

        let record = client
            .exchange_code(&transport, "code", "https://app/cb", None)
            .await
            .unwrap();
        assert_eq!(record.workspace_name.as_deref(), Some("Home"));
        assert_eq!(record.bot_id.as_deref(), Some("bot-9"));

        let sent = &transport.requests()[0];
        assert_eq!(sent.header("Authorization"), Some(basic_auth("id", "shh").as_str()));
        let body: &Value = sent.json_body().unwrap();
        assert_eq!(body["grant_type"], "authorization_code");
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let transport = FakeTransport::new().on(
            HttpMethod::Post,
            "/token",
            HttpResponse::json_body(200, &json!({"access_token": "new", "expires_in": 3600})),
        );
        let client = OAuthClient::new(ProviderKind::GoogleCalendar, "id", AUTH_URL, TOKEN_URL)
            .with_secret(Some("shh".into()));
        let current = TokenRecord::new(ProviderKind::GoogleCalendar, "old")
            .with_refresh_token(Some("rt".into()));

        let next = client.refresh(&transport, &current).await.unwrap();
        assert_eq!(next.access_token, "new");
        assert_eq!(next.refresh_token.as_deref(), Some("rt"));

        let sent = &transport.requests()[0];
        assert_eq!(sent.form_value("grant_type"), Some("refresh_token"));
        assert_eq!(sent.form_value("client_secret"), Some("shh"));
    }

    #[tokio::test]
    async fn refresh_failure_is_token_refresh_failed() {
        let transport = FakeTransport::new().on(
            HttpMethod::Post,
            "/token",
            HttpResponse::json_body(400, &json!({"error": "invalid_grant"})),
        );
        let current = TokenRecord::new(ProviderKind::OneNote, "old").with_refresh_token(Some("rt".into()));

        let err = pkce_client().refresh(&transport, &current).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::TokenRefreshFailed);
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn basic_auth_encoding() {
        assert_eq!(basic_auth("user", "pass"), "Basic dXNlcjpwYXNz");
    }
}
