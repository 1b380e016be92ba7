//! Per-integration auth state and the authenticated request loop.
//!
//! An [`AuthSession`] holds the tokens, status and last sync time of one
//! integration instance. [`authenticated_request`] is the single place where
//! rate-limit backoff and transparent token refresh happen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::provider::{Integration, IntegrationStatus, ProviderKind};
use crate::tokens::TokenRecord;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Retry budget for one authenticated request.
pub const DEFAULT_RETRIES: u32 = 3;

/// Wait used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Longest wait honored from a `Retry-After` header.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct SessionState {
    status: IntegrationStatus,
    token: Option<TokenRecord>,
    last_sync_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Tokens, status and transport for one integration instance.
pub struct AuthSession {
    kind: ProviderKind,
    transport: Arc<dyn HttpTransport>,
    state: RwLock<SessionState>,
    /// Serializes token refreshes so concurrent 401s refresh once.
    refresh_lock: tokio::sync::Mutex<()>,
    importing: AtomicBool,
}

impl AuthSession {
    /// Creates a disconnected session.
    pub fn new(kind: ProviderKind, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            kind,
            transport,
            state: RwLock::new(SessionState {
                status: IntegrationStatus::Disconnected,
                token: None,
                last_sync_at: None,
                last_error: None,
            }),
            refresh_lock: tokio::sync::Mutex::new(()),
            importing: AtomicBool::new(false),
        }
    }

    /// Builder method to seed a credential record.
    pub fn with_token(self, token: Option<TokenRecord>) -> Self {
        if let Some(token) = token {
            self.set_token(token);
        }
        self
    }

    /// Returns the provider kind.
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Returns the transport.
    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current status.
    pub fn status(&self) -> IntegrationStatus {
        self.read().status
    }

    /// Sets the status.
    pub fn set_status(&self, status: IntegrationStatus) {
        let mut state = self.write();
        if state.status != status {
            debug!(provider = %self.kind, from = %state.status, to = %status, "status change");
            state.status = status;
        }
        if status != IntegrationStatus::Error {
            state.last_error = None;
        }
    }

    /// Moves to `Error`, remembers the message and hands the error back.
    pub fn fail(&self, error: ProviderError) -> ProviderError {
        let error = error.with_provider(self.kind.as_str());
        let mut state = self.write();
        state.status = IntegrationStatus::Error;
        state.last_error = Some(error.to_string());
        error
    }

    /// Returns the message of the last failure while in `Error`.
    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    /// Returns a copy of the credential record.
    pub fn token(&self) -> Option<TokenRecord> {
        self.read().token.clone()
    }

    /// Returns the credential record or a `NoCredential` error.
    pub fn require_token(&self) -> ProviderResult<TokenRecord> {
        self.token().ok_or_else(|| {
            ProviderError::no_credential("no credential available").with_provider(self.kind.as_str())
        })
    }

    /// Replaces the credential record.
    pub fn set_token(&self, token: TokenRecord) {
        self.write().token = Some(token);
    }

    /// Returns true if a refresh token is held.
    pub fn has_refresh_token(&self) -> bool {
        self.read().token.as_ref().is_some_and(TokenRecord::has_refresh_token)
    }

    /// Returns when the last import finished.
    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.read().last_sync_at
    }

    /// Records a successful sync.
    pub fn mark_synced(&self) {
        let mut state = self.write();
        state.last_sync_at = Some(Utc::now());
        state.status = IntegrationStatus::Connected;
        state.last_error = None;
    }

    /// Clears tokens and moves to `Disconnected`.
    pub fn disconnect(&self) {
        let mut state = self.write();
        state.token = None;
        state.status = IntegrationStatus::Disconnected;
        state.last_error = None;
        info!(provider = %self.kind, "disconnected");
    }

    /// Marks an import as running and moves to `Syncing`.
    ///
    /// # Errors
    ///
    /// `ImportInProgress` if another import holds the session.
    pub fn begin_import(&self) -> ProviderResult<ImportGuard<'_>> {
        if self
            .importing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ProviderError::import_in_progress(
                "an import is already running for this integration",
            )
            .with_provider(self.kind.as_str()));
        }
        self.set_status(IntegrationStatus::Syncing);
        Ok(ImportGuard { session: self })
    }

    /// Returns true while an import is running.
    pub fn is_importing(&self) -> bool {
        self.importing.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("AuthSession")
            .field("kind", &self.kind)
            .field("status", &state.status)
            .field("has_token", &state.token.is_some())
            .field("last_sync_at", &state.last_sync_at)
            .finish()
    }
}

/// Releases the import flag when dropped.
///
/// A guard dropped while the status is still `Syncing` (the import future was
/// dropped) puts the session back to `Connected`.
#[derive(Debug)]
pub struct ImportGuard<'a> {
    session: &'a AuthSession,
}

impl Drop for ImportGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.session.write();
            if state.status == IntegrationStatus::Syncing {
                state.status = IntegrationStatus::Connected;
            }
        }
        self.session.importing.store(false, Ordering::Release);
    }
}

/// Sends a request with auth headers, retrying on 429 and refreshing on 401.
///
/// Each retry, whichever kind, consumes one unit of `retries`; the loop is
/// therefore bounded by `retries + 1` sends.
///
/// # Errors
///
/// - `RateLimited` when a 429 arrives with no retries left
/// - `TokenRefreshFailed` when refreshing after a 401 fails (status `Error`)
/// - `InvalidCredential` for a 401 that cannot be refreshed
/// - `RequestFailed` for any other non-2xx response
pub async fn authenticated_request<I>(
    integration: &I,
    request: HttpRequest,
    retries: u32,
) -> ProviderResult<HttpResponse>
where
    I: Integration + ?Sized,
{
    let session = integration.session();
    let provider = session.kind().as_str();
    let mut retries_remaining = retries;

    loop {
        let token = session.token();
        let outgoing = integration
            .authorize_request(request.clone(), token.as_ref())
            .map_err(|e| e.with_provider(provider))?;

        debug!(provider, method = %outgoing.method, url = %outgoing.url, "sending request");
        let response = session
            .transport()
            .send(outgoing)
            .await
            .map_err(|e| e.with_provider(provider))?;

        match response.status {
            status if (200..300).contains(&status) => return Ok(response),
            429 => {
                if retries_remaining == 0 {
                    return Err(ProviderError::rate_limited("rate limit exceeded, retries exhausted")
                        .with_provider(provider)
                        .with_status(429));
                }
                let requested = response.retry_after().unwrap_or(DEFAULT_RETRY_AFTER);
                let wait = requested.min(MAX_RETRY_AFTER);
                if wait < requested {
                    warn!(provider, requested_secs = requested.as_secs(), wait_secs = wait.as_secs(), "Retry-After too long, clamping");
                }
                warn!(provider, wait_secs = wait.as_secs(), retries_remaining, "rate limited, backing off");
                tokio::time::sleep(wait).await;
                retries_remaining -= 1;
            }
            401 => {
                let Some(token) = token.filter(TokenRecord::has_refresh_token) else {
                    return Err(ProviderError::invalid_credential("credential rejected")
                        .with_provider(provider)
                        .with_status(401)
                        .with_details(response.body));
                };
                if retries_remaining == 0 {
                    return Err(ProviderError::invalid_credential(
                        "credential rejected after refresh",
                    )
                    .with_provider(provider)
                    .with_status(401));
                }
                warn!(provider, "access token rejected, refreshing");
                refresh_session(integration, &token).await?;
                retries_remaining -= 1;
            }
            status => {
                return Err(ProviderError::request_failed(status, error_message(&response))
                    .with_provider(provider)
                    .with_details(response.body));
            }
        }
    }
}

/// Best-effort human message from an error body.
fn error_message(response: &HttpResponse) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(&response.body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("message"))
            .or_else(|| v.get("error_description"))
            .or_else(|| v.get("error"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    from_json.unwrap_or_else(|| format!("request failed with status {}", response.status))
}

/// Refreshes the session's access token, once per stale token.
///
/// Callers that lost the race to the refresh lock find a newer token already
/// in place and return without a second refresh.
///
/// # Errors
///
/// `TokenRefreshFailed`; the session status becomes `Error`.
pub async fn refresh_session<I>(integration: &I, stale: &TokenRecord) -> ProviderResult<()>
where
    I: Integration + ?Sized,
{
    let session = integration.session();
    let _guard = session.refresh_lock.lock().await;

    if let Some(current) = session.token()
        && current.access_token != stale.access_token
    {
        debug!(provider = %session.kind(), "token already refreshed by another caller");
        return Ok(());
    }

    match integration.refresh_access_token().await {
        Ok(record) => {
            session.set_token(record);
            info!(provider = %session.kind(), "refreshed access token");
            Ok(())
        }
        Err(e) => {
            let e = if e.code() == ProviderErrorCode::TokenRefreshFailed {
                e
            } else {
                ProviderError::token_refresh_failed(format!("token refresh failed: {}", e.message()))
                    .with_source(e)
            };
            Err(session.fail(e))
        }
    }
}

/// The shared authentication flow.
///
/// Connecting → (refresh if expired) → probe → Connected, or Error.
pub async fn standard_authenticate<I>(integration: &I) -> ProviderResult<()>
where
    I: Integration + ?Sized,
{
    let session = integration.session();
    let Some(token) = session.token() else {
        return Err(session.fail(ProviderError::no_credential(
            "no credential available; connect or authorize first",
        )));
    };

    session.set_status(IntegrationStatus::Connecting);

    if token.is_expired() {
        if !token.has_refresh_token() {
            return Err(session.fail(ProviderError::invalid_credential(
                "access token expired and no refresh token is held",
            )));
        }
        debug!(provider = %session.kind(), "access token expired, refreshing before probe");
        refresh_session(integration, &token).await?;
    }

    if !integration.test_connection().await {
        return Err(session.fail(ProviderError::invalid_credential("connection probe failed")));
    }

    session.set_status(IntegrationStatus::Connected);
    info!(provider = %session.kind(), "authenticated");
    Ok(())
}

/// Runs a probe request and reports only whether it succeeded.
pub async fn probe<I>(integration: &I, request: HttpRequest) -> bool
where
    I: Integration + ?Sized,
{
    match integration.authenticated_request(request).await {
        Ok(_) => true,
        Err(e) => {
            debug!(provider = %integration.kind(), error = %e, "connection probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{BoxFuture, Capabilities, FetchedItems, ImportOptions};
    use crate::testing::FakeTransport;
    use crate::transport::HttpMethod;
    use std::sync::atomic::AtomicUsize;

    struct ProbeIntegration {
        session: AuthSession,
        refreshes: AtomicUsize,
        refresh_ok: bool,
    }

    impl ProbeIntegration {
        fn new(transport: Arc<FakeTransport>, token: TokenRecord, refresh_ok: bool) -> Self {
            Self {
                session: AuthSession::new(ProviderKind::GoogleCalendar, transport)
                    .with_token(Some(token)),
                refreshes: AtomicUsize::new(0),
                refresh_ok,
            }
        }
    }

    impl Integration for ProbeIntegration {
        fn kind(&self) -> ProviderKind {
            ProviderKind::GoogleCalendar
        }

        fn session(&self) -> &AuthSession {
            &self.session
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::default()
        }

        fn default_category(&self) -> &str {
            "Test"
        }

        fn test_connection(&self) -> BoxFuture<'_, bool> {
            Box::pin(probe(self, HttpRequest::get("https://api.test/ping")))
        }

        fn refresh_access_token(&self) -> BoxFuture<'_, ProviderResult<TokenRecord>> {
            Box::pin(async move {
                self.refreshes.fetch_add(1, Ordering::SeqCst);
                if self.refresh_ok {
                    let current = self.session.require_token()?;
                    Ok(current.rotated("fresh", None, Some(3600)))
                } else {
                    Err(ProviderError::token_refresh_failed("invalid_grant"))
                }
            })
        }

        fn fetch_items(&self, _options: ImportOptions) -> BoxFuture<'_, ProviderResult<FetchedItems>> {
            Box::pin(async { Ok(FetchedItems::default()) })
        }
    }

    fn token() -> TokenRecord {
        TokenRecord::new(ProviderKind::GoogleCalendar, "stale")
            .with_refresh_token(Some("refresh".to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn retries_once_after_429() {
        let transport = Arc::new(
            FakeTransport::new()
                .on(
                    HttpMethod::Get,
                    "/data",
                    HttpResponse::new(429, "").with_header("Retry-After", "1"),
                )
                .on(HttpMethod::Get, "/data", HttpResponse::new(200, "ok")),
        );
        let integration = ProbeIntegration::new(transport.clone(), token(), true);

        let started = tokio::time::Instant::now();
        let response = integration
            .authenticated_request(HttpRequest::get("https://api.test/data"))
            .await
            .unwrap();

        assert_eq!(response.body, "ok");
        assert_eq!(transport.count("/data"), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(integration.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn long_retry_after_is_clamped() {
        let transport = Arc::new(
            FakeTransport::new()
                .on(
                    HttpMethod::Get,
                    "/data",
                    HttpResponse::new(429, "").with_header("Retry-After", "86400"),
                )
                .on(HttpMethod::Get, "/data", HttpResponse::new(200, "ok")),
        );
        let integration = ProbeIntegration::new(transport.clone(), token(), true);

        let started = tokio::time::Instant::now();
        let response = integration
            .authenticated_request(HttpRequest::get("https://api.test/data"))
            .await
            .unwrap();

        assert_eq!(response.body, "ok");
        let elapsed = started.elapsed();
        assert!(elapsed >= MAX_RETRY_AFTER);
        assert!(elapsed < MAX_RETRY_AFTER + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_exhausts_budget() {
        let transport = Arc::new(FakeTransport::new().on(
            HttpMethod::Get,
            "/data",
            HttpResponse::new(429, ""),
        ));
        let integration = ProbeIntegration::new(transport.clone(), token(), true);

        let err = integration
            .authenticated_request(HttpRequest::get("https://api.test/data"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ProviderErrorCode::RateLimited);
        assert!(err.is_retryable());
        assert_eq!(transport.count("/data"), (DEFAULT_RETRIES + 1) as usize);
    }

    #[tokio::test]
    async fn refreshes_once_after_401() {
        let transport = Arc::new(
            FakeTransport::new()
                .on(HttpMethod::Get, "/data", HttpResponse::new(401, ""))
                .on(HttpMethod::Get, "/data", HttpResponse::new(200, "ok")),
        );
        let integration = ProbeIntegration::new(transport.clone(), token(), true);

        let response = integration
            .authenticated_request(HttpRequest::get("https://api.test/data"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(integration.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(transport.count("/data"), 2);

        let requests = transport.requests();
        assert_eq!(requests[0].header("Authorization"), Some("Bearer stale"));
        assert_eq!(requests[1].header("Authorization"), Some("Bearer fresh"));
        assert_eq!(integration.credentials().unwrap().access_token, "fresh");
    }

    #[tokio::test]
    async fn failed_refresh_sets_error_status() {
        let transport = Arc::new(FakeTransport::new().on(
            HttpMethod::Get,
            "/data",
            HttpResponse::new(401, ""),
        ));
        let integration = ProbeIntegration::new(transport.clone(), token(), false);
        integration.session.set_status(IntegrationStatus::Connected);

        let err = integration
            .authenticated_request(HttpRequest::get("https://api.test/data"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ProviderErrorCode::TokenRefreshFailed);
        assert_eq!(integration.status(), IntegrationStatus::Error);
        assert_eq!(integration.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(transport.count("/data"), 1);
    }

    #[tokio::test]
    async fn unauthorized_without_refresh_token_is_invalid_credential() {
        let transport = Arc::new(FakeTransport::new().on(
            HttpMethod::Get,
            "/data",
            HttpResponse::new(401, "{}"),
        ));
        let static_token = TokenRecord::new(ProviderKind::GoogleCalendar, "static");
        let integration = ProbeIntegration::new(transport, static_token, true);

        let err = integration
            .authenticated_request(HttpRequest::get("https://api.test/data"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ProviderErrorCode::InvalidCredential);
        assert_eq!(integration.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn other_statuses_are_not_retried() {
        let transport = Arc::new(FakeTransport::new().on(
            HttpMethod::Get,
            "/data",
            HttpResponse::new(500, r#"{"error":{"message":"backend down"}}"#),
        ));
        let integration = ProbeIntegration::new(transport.clone(), token(), true);

        let err = integration
            .authenticated_request(HttpRequest::get("https://api.test/data"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ProviderErrorCode::RequestFailed);
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.message(), "backend down");
        assert_eq!(err.provider(), Some("google_calendar"));
        assert_eq!(transport.count("/data"), 1);
    }

    #[tokio::test]
    async fn authenticate_transitions_to_connected() {
        let transport = Arc::new(FakeTransport::new().on(
            HttpMethod::Get,
            "/ping",
            HttpResponse::new(200, "{}"),
        ));
        let integration = ProbeIntegration::new(transport, token(), true);

        integration.authenticate().await.unwrap();
        assert_eq!(integration.status(), IntegrationStatus::Connected);
    }

    #[tokio::test]
    async fn authenticate_with_rejected_token_ends_in_error() {
        let transport = Arc::new(FakeTransport::new().on(
            HttpMethod::Get,
            "/ping",
            HttpResponse::new(403, "{}"),
        ));
        let integration = ProbeIntegration::new(transport, token(), true);

        let err = integration.authenticate().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidCredential);
        assert_eq!(integration.status(), IntegrationStatus::Error);
        assert!(integration.session.last_error().is_some());
    }

    #[tokio::test]
    async fn authenticate_without_token_is_no_credential() {
        let transport = Arc::new(FakeTransport::new());
        let integration = ProbeIntegration {
            session: AuthSession::new(ProviderKind::GoogleCalendar, transport),
            refreshes: AtomicUsize::new(0),
            refresh_ok: true,
        };

        let err = integration.authenticate().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NoCredential);
        assert_eq!(integration.status(), IntegrationStatus::Error);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_before_probe() {
        let transport = Arc::new(FakeTransport::new().on(
            HttpMethod::Get,
            "/ping",
            HttpResponse::new(200, "{}"),
        ));
        let expired = token().with_expires_in(Some(0));
        let integration = ProbeIntegration::new(transport.clone(), expired, true);

        integration.authenticate().await.unwrap();
        assert_eq!(integration.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(transport.requests()[0].header("Authorization"), Some("Bearer fresh"));
    }

    #[test]
    fn import_guard_rejects_reentry() {
        let session = AuthSession::new(ProviderKind::Todoist, Arc::new(FakeTransport::new()));
        session.set_status(IntegrationStatus::Connected);

        let guard = session.begin_import().unwrap();
        assert_eq!(session.status(), IntegrationStatus::Syncing);
        let err = session.begin_import().unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ImportInProgress);

        drop(guard);
        assert!(!session.is_importing());
        assert_eq!(session.status(), IntegrationStatus::Connected);
        assert!(session.begin_import().is_ok());
    }
}
