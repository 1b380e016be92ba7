//! Outlook calendar integration over Microsoft Graph.
//!
//! Reads every calendar's `calendarView` for the import window, which
//! expands recurrences into occurrences. Times are requested in UTC.
//! Authenticates as a PKCE public client; refresh tokens rotate on use.

mod api;

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use lifehub_core::{Item, TimeWindow};
use tracing::debug;

use crate::config::IntegrationConfig;
use crate::error::ProviderResult;
use crate::graph::{self, GRAPH_BASE};
use crate::oauth::OAuthClient;
use crate::provider::{
    AuthorizationRequest, BoxFuture, Capabilities, FetchedItems, ImportOptions, Integration,
    ProviderKind,
};
use crate::session::{AuthSession, probe};
use crate::tokens::TokenRecord;
use crate::transport::{HttpRequest, HttpTransport};

use api::{Calendar, Event};

const DEFAULT_SCOPES: &[&str] = &["offline_access", "Calendars.Read", "User.Read"];
const PAGE_SIZE: &str = "100";
const UTC_PREFERENCE: &str = "outlook.timezone=\"UTC\"";

/// Outlook calendar adapter.
#[derive(Debug)]
pub struct OutlookCalendarIntegration {
    session: AuthSession,
    oauth: OAuthClient,
    category: String,
    calendar_ids: Vec<String>,
}

impl OutlookCalendarIntegration {
    /// Creates a disconnected Outlook calendar integration.
    pub fn new(config: IntegrationConfig, transport: Arc<dyn HttpTransport>) -> ProviderResult<Self> {
        config.validate(ProviderKind::OutlookCalendar)?;
        Ok(Self {
            session: AuthSession::new(ProviderKind::OutlookCalendar, transport),
            oauth: graph::oauth_client(ProviderKind::OutlookCalendar, &config, DEFAULT_SCOPES),
            category: config.category.unwrap_or_else(|| "Calendar".to_string()),
            calendar_ids: config.calendar_ids,
        })
    }

    async fn list_calendars(&self) -> ProviderResult<Vec<Calendar>> {
        let calendars: Vec<Calendar> =
            graph::list_all(self, HttpRequest::get(format!("{}/me/calendars", GRAPH_BASE))).await?;
        Ok(calendars
            .into_iter()
            .filter(|c| self.calendar_ids.is_empty() || self.calendar_ids.contains(&c.id))
            .collect())
    }

    async fn list_events(&self, calendar: &Calendar, window: TimeWindow) -> ProviderResult<Vec<Event>> {
        let request = HttpRequest::get(format!(
            "{}/me/calendars/{}/calendarView",
            GRAPH_BASE,
            urlencoding::encode(&calendar.id)
        ))
        .with_query("startDateTime", window.start.to_rfc3339_opts(SecondsFormat::Secs, true))
        .with_query("endDateTime", window.end.to_rfc3339_opts(SecondsFormat::Secs, true))
        .with_query("$top", PAGE_SIZE)
        .with_header("Prefer", UTC_PREFERENCE);
        graph::list_all(self, request).await
    }

    async fn import_all(&self, options: ImportOptions) -> ProviderResult<FetchedItems> {
        let window = options
            .time_window
            .unwrap_or_else(|| TimeWindow::import_default(Utc::now()));
        let calendars = self.list_calendars().await?;
        let mut fetched = FetchedItems::default();

        for calendar in &calendars {
            match self.list_events(calendar, window).await {
                Ok(events) => {
                    let items: Vec<Item> = events
                        .into_iter()
                        .filter_map(|e| e.into_item(calendar))
                        .collect();
                    debug!(calendar = %calendar.name, events = items.len(), "fetched calendar view");
                    fetched.extend(items);
                }
                Err(e) => fetched.resource_failed(&calendar.name, e)?,
            }
        }

        Ok(fetched)
    }

    async fn refresh(&self) -> ProviderResult<TokenRecord> {
        let current = self.session.require_token()?;
        self.oauth.refresh(self.session.transport(), &current).await
    }
}

impl Integration for OutlookCalendarIntegration {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OutlookCalendar
    }

    fn session(&self) -> &AuthSession {
        &self.session
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            import: true,
            oauth: true,
            pkce: true,
            refresh: true,
            ..Default::default()
        }
    }

    fn default_category(&self) -> &str {
        &self.category
    }

    fn test_connection(&self) -> BoxFuture<'_, bool> {
        Box::pin(probe(self, HttpRequest::get(format!("{}/me", GRAPH_BASE))))
    }

    fn refresh_access_token(&self) -> BoxFuture<'_, ProviderResult<TokenRecord>> {
        Box::pin(self.refresh())
    }

    fn fetch_items(&self, options: ImportOptions) -> BoxFuture<'_, ProviderResult<FetchedItems>> {
        Box::pin(self.import_all(options))
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
