//! Microsoft Graph plumbing shared by the Outlook and OneNote adapters.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::IntegrationConfig;
use crate::error::ProviderResult;
use crate::helpers::{Page, paginate};
use crate::oauth::OAuthClient;
use crate::provider::{Integration, ProviderKind};
use crate::transport::HttpRequest;

/// Microsoft Graph v1.0 base URL.
pub const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const DEFAULT_TENANT: &str = "common";

/// A Graph collection page; `@odata.nextLink` is the full URL of the next one.
#[derive(Debug, Deserialize)]
pub struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default, rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// A Graph `dateTimeTimeZone` value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeZone {
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl DateTimeZone {
    /// Parses the value, which is UTC when requested with the UTC
    /// `Prefer` header.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        self.date_time.as_deref().and_then(parse_datetime)
    }
}

/// Parses a Graph timestamp. Values without an offset are read as UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Builds the PKCE public-client OAuth settings for a Graph provider.
pub fn oauth_client(
    kind: ProviderKind,
    config: &IntegrationConfig,
    default_scopes: &[&str],
) -> OAuthClient {
    let tenant = config
        .tenant
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_TENANT);
    OAuthClient::new(
        kind,
        config.client_id_or_empty(),
        format!("{}/{}/oauth2/v2.0/authorize", LOGIN_BASE, tenant),
        format!("{}/{}/oauth2/v2.0/token", LOGIN_BASE, tenant),
    )
    .with_scopes(config.scopes_or(default_scopes))
    .with_pkce(true)
    .with_param("response_mode", "query")
}

/// Fetches every page of a Graph collection.
///
/// Headers of `first` are carried to the follow-up requests; their query
/// is already embedded in the next link.
pub async fn list_all<I, T>(integration: &I, first: HttpRequest) -> ProviderResult<Vec<T>>
where
    I: Integration + ?Sized,
    T: DeserializeOwned,
{
    let first = &first;
    paginate(|next_link| async move {
        let request = match next_link {
            Some(url) => HttpRequest {
                url,
                query: Vec::new(),
                ..first.clone()
            },
            None => first.clone(),
        };
        let page: GraphPage<T> = integration.authenticated_request(request).await?.json()?;
        Ok(Page::new(page.value, page.next_link))
    })
    .await
}
