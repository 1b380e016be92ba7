//! Google Calendar integration.
//!
//! Imports events from every calendar in the user's calendar list within the
//! import window (thirty days back and forward unless overridden), expanding
//! recurring events into single occurrences. Exports scheduled items as new
//! events. Authenticates with OAuth and a client secret; access tokens expire
//! and are refreshed with the offline refresh token.

mod api;

use std::sync::Arc;

use chrono::Utc;
use lifehub_core::{ExportResult, Item, TimeWindow};
use tracing::debug;

use crate::config::IntegrationConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::helpers::{Page, export_in_batches, paginate};
use crate::oauth::OAuthClient;
use crate::provider::{
    AuthorizationRequest, BoxFuture, Capabilities, ExportOptions, FetchedItems, ImportOptions,
    Integration, ProviderKind,
};
use crate::session::{AuthSession, probe};
use crate::tokens::TokenRecord;
use crate::transport::{HttpRequest, HttpTransport};

use api::{CalendarListEntry, Event, ListResponse};

/// Google Calendar API base URL.
const API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar.events"];
const MAX_RESULTS: &str = "250";
const DEFAULT_EXPORT_CALENDAR: &str = "primary";

/// Google Calendar adapter.
#[derive(Debug)]
pub struct GoogleCalendarIntegration {
    session: AuthSession,
    oauth: OAuthClient,
    category: String,
    calendar_ids: Vec<String>,
}

impl GoogleCalendarIntegration {
    /// Creates a disconnected Google Calendar integration.
    pub fn new(config: IntegrationConfig, transport: Arc<dyn HttpTransport>) -> ProviderResult<Self> {
        config.validate(ProviderKind::GoogleCalendar)?;
        // offline access + consent makes Google return a refresh token
        let oauth = OAuthClient::new(
            ProviderKind::GoogleCalendar,
            config.client_id_or_empty(),
            AUTHORIZE_URL,
            TOKEN_URL,
        )
        .with_secret(config.client_secret.clone())
        .with_scopes(config.scopes_or(DEFAULT_SCOPES))
        .with_param("access_type", "offline")
        .with_param("prompt", "consent");

        Ok(Self {
            session: AuthSession::new(ProviderKind::GoogleCalendar, transport),
            oauth,
            category: config.category.unwrap_or_else(|| "Calendar".to_string()),
            calendar_ids: config.calendar_ids,
        })
    }

    async fn list_calendars(&self) -> ProviderResult<Vec<CalendarListEntry>> {
        let calendars = paginate(|page_token| async move {
            let mut request = HttpRequest::get(format!("{}/users/me/calendarList", API_BASE));
            if let Some(token) = page_token {
                request = request.with_query("pageToken", token);
            }
            let page: ListResponse<CalendarListEntry> =
                self.authenticated_request(request).await?.json()?;
            Ok(Page::new(page.items, page.next_page_token))
        })
        .await?;

        Ok(calendars
            .into_iter()
            .filter(|c| !c.deleted)
            .filter(|c| self.calendar_ids.is_empty() || self.calendar_ids.contains(&c.id))
            .collect())
    }

    async fn list_events(&self, calendar_id: &str, window: TimeWindow) -> ProviderResult<Vec<Event>> {
        let url = format!(
            "{}/calendars/{}/events",
            API_BASE,
            urlencoding::encode(calendar_id)
        );
        let time_min = api::rfc3339(window.start);
        let time_max = api::rfc3339(window.end);

        paginate(|page_token| {
            let mut request = HttpRequest::get(url.as_str())
                .with_query("timeMin", time_min.as_str())
                .with_query("timeMax", time_max.as_str())
                .with_query("singleEvents", "true")
                .with_query("orderBy", "startTime")
                .with_query("maxResults", MAX_RESULTS);
            if let Some(token) = page_token {
                request = request.with_query("pageToken", token);
            }
            async move {
                let page: ListResponse<Event> = self.authenticated_request(request).await?.json()?;
                Ok(Page::new(page.items, page.next_page_token))
            }
        })
        .await
    }

    async fn import_all(&self, options: ImportOptions) -> ProviderResult<FetchedItems> {
        let window = options
            .time_window
            .unwrap_or_else(|| TimeWindow::import_default(Utc::now()));
        let calendars = self.list_calendars().await?;
        let mut fetched = FetchedItems::default();

        for calendar in &calendars {
            match self.list_events(&calendar.id, window).await {
                Ok(events) => {
                    let items: Vec<Item> = events
                        .into_iter()
                        .filter_map(|e| e.into_item(calendar))
                        .collect();
                    debug!(calendar = %calendar.display_name(), events = items.len(), "fetched calendar events");
                    fetched.extend(items);
                }
                Err(e) => fetched.resource_failed(calendar.display_name(), e)?,
            }
        }

        Ok(fetched)
    }

    async fn create_event(&self, item: &Item, calendar_id: &str) -> ProviderResult<()> {
        let Some(body) = api::export_body(item) else {
            return Err(ProviderError::unsupported("item has no start or due time"));
        };
        let request = HttpRequest::post(format!(
            "{}/calendars/{}/events",
            API_BASE,
            urlencoding::encode(calendar_id)
        ))
        .with_json(body);
        self.authenticated_request(request).await?;
        Ok(())
    }

    async fn export_all(&self, items: Vec<Item>, options: ExportOptions) -> ProviderResult<ExportResult> {
        let calendar_id = options.target.as_deref().unwrap_or(DEFAULT_EXPORT_CALENDAR);
        Ok(export_in_batches(
            ProviderKind::GoogleCalendar,
            items,
            options.batch_size,
            |item| async move { self.create_event(&item, calendar_id).await },
        )
        .await)
    }

    async fn refresh(&self) -> ProviderResult<TokenRecord> {
        let current = self.session.require_token()?;
        self.oauth.refresh(self.session.transport(), &current).await
    }
}

impl Integration for GoogleCalendarIntegration {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleCalendar
    }

    fn session(&self) -> &AuthSession {
        &self.session
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            import: true,
            export: true,
            oauth: true,
            refresh: true,
            ..Default::default()
        }
    }

    fn default_category(&self) -> &str {
        &self.category
    }

    fn test_connection(&self) -> BoxFuture<'_, bool> {
        let request = HttpRequest::get(format!("{}/users/me/calendarList", API_BASE))
            .with_query("maxResults", "1");
        Box::pin(probe(self, request))
    }

    fn refresh_access_token(&self) -> BoxFuture<'_, ProviderResult<TokenRecord>> {
        Box::pin(self.refresh())
    }

    fn fetch_items(&self, options: ImportOptions) -> BoxFuture<'_, ProviderResult<FetchedItems>> {
        Box::pin(self.import_all(options))
    }

    fn export_items(
        &self,
        items: Vec<Item>,
        options: ExportOptions,
    ) -> BoxFuture<'_, ProviderResult<ExportResult>> {
        Box::pin(self.export_all(items, options))
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
}
