//! Notion integration.
//!
//! Searches everything shared with the integration. Standalone pages become
//! notes with their blocks rendered as text; databases are queried row by
//! row, and rows with a checkbox or status property become tasks.
//! Authenticates with an internal integration token or a public OAuth
//! integration; neither expires.

mod api;

use std::collections::HashSet;
use std::sync::Arc;

use lifehub_core::Item;
use serde_json::json;
use tracing::debug;

use crate::config::IntegrationConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::helpers::{Page, paginate};
use crate::oauth::{OAuthClient, TokenRequestStyle};
use crate::provider::{
    AuthorizationRequest, BoxFuture, Capabilities, FetchedItems, ImportOptions, Integration,
    ProviderKind,
};
use crate::session::{AuthSession, probe};
use crate::tokens::TokenRecord;
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};

use api::{Block, ListResponse, SearchResult};

const API_BASE: &str = "https://api.notion.com/v1";
const AUTHORIZE_URL: &str = "https://api.notion.com/v1/oauth/authorize";
const TOKEN_URL: &str = "https://api.notion.com/v1/oauth/token";
/// Pinned API version sent with every request.
pub const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;

/// Notion adapter.
#[derive(Debug)]
pub struct NotionIntegration {
    session: AuthSession,
    oauth: OAuthClient,
    category: String,
}

impl NotionIntegration {
    /// Creates a disconnected Notion integration.
    pub fn new(config: IntegrationConfig, transport: Arc<dyn HttpTransport>) -> ProviderResult<Self> {
        config.validate(ProviderKind::Notion)?;
        let oauth = OAuthClient::new(
            ProviderKind::Notion,
            config.client_id_or_empty(),
            AUTHORIZE_URL,
            TOKEN_URL,
        )
        .with_secret(config.client_secret.clone())
        .with_style(TokenRequestStyle::BasicJson)
        .with_param("owner", "user");

        Ok(Self {
            session: AuthSession::new(ProviderKind::Notion, transport),
            oauth,
            category: config.category.unwrap_or_else(|| "Notes".to_string()),
        })
    }

    /// Runs a cursor-paginated POST endpoint; the cursor travels in the body.
    async fn post_all<T>(&self, url: &str) -> ProviderResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        paginate(|cursor| async move {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = cursor {
                body["start_cursor"] = json!(cursor);
            }
            let request = HttpRequest::new(HttpMethod::Post, url).with_json(body);
            let page: ListResponse<T> = self.authenticated_request(request).await?.json()?;
            let next = page.continuation();
            Ok(Page::new(page.results, next))
        })
        .await
    }

    async fn search(&self) -> ProviderResult<Vec<SearchResult>> {
        self.post_all(&format!("{}/search", API_BASE)).await
    }

    async fn query_database(&self, database_id: &str) -> ProviderResult<Vec<SearchResult>> {
        let url = format!("{}/databases/{}/query", API_BASE, database_id);
        self.post_all(&url).await
    }

    async fn page_text(&self, page_id: &str) -> ProviderResult<String> {
        let url = format!("{}/blocks/{}/children", API_BASE, page_id);
        let blocks: Vec<Block> = paginate(|cursor| {
            let mut request =
                HttpRequest::get(url.as_str()).with_query("page_size", PAGE_SIZE.to_string());
            if let Some(cursor) = cursor {
                request = request.with_query("start_cursor", cursor);
            }
            async move {
                let page: ListResponse<Block> = self.authenticated_request(request).await?.json()?;
                let next = page.continuation();
                Ok(Page::new(page.results, next))
            }
        })
        .await?;
        Ok(api::render_blocks(&blocks))
    }

    /// Converts pages, collecting per-page failures.
    async fn convert_pages(
        &self,
        pages: Vec<SearchResult>,
        database: Option<&str>,
        seen: &mut HashSet<String>,
        fetched: &mut FetchedItems,
    ) -> ProviderResult<()> {
        let mut items: Vec<Item> = Vec::new();
        for page in pages {
            if !page.is_live() || !seen.insert(page.id.clone()) {
                continue;
            }
            match self.page_text(&page.id).await {
                Ok(body) => items.push(page.into_item(body, database)),
                Err(e) => fetched.item_failed(&page.display_title(), e)?,
            }
        }
        fetched.extend(items);
        Ok(())
    }

    async fn import_all(&self) -> ProviderResult<FetchedItems> {
        let results = self.search().await?;
        let (databases, pages): (Vec<SearchResult>, Vec<SearchResult>) =
            results.into_iter().partition(SearchResult::is_database);
        // rows are picked up through their database query
        let standalone: Vec<SearchResult> = pages.into_iter().filter(|p| !p.is_database_row()).collect();

        let mut seen = HashSet::new();
        let mut fetched = FetchedItems::default();
        debug!(pages = standalone.len(), databases = databases.len(), "notion search finished");
        self.convert_pages(standalone, None, &mut seen, &mut fetched).await?;

        for database in databases.iter().filter(|d| d.is_live()) {
            let title = database.display_title();
            match self.query_database(&database.id).await {
                Ok(rows) => {
                    self.convert_pages(rows, Some(title.as_str()), &mut seen, &mut fetched)
                        .await?
                }
                Err(e) => fetched.resource_failed(&title, e)?,
            }
        }

        Ok(fetched)
    }
}

impl Integration for NotionIntegration {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Notion
    }

    fn session(&self) -> &AuthSession {
        &self.session
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            import: true,
            oauth: true,
            ..Default::default()
        }
    }

    fn default_category(&self) -> &str {
        &self.category
    }

    fn dedupe_by_title(&self) -> bool {
        true
    }

    fn test_connection(&self) -> BoxFuture<'_, bool> {
        Box::pin(probe(self, HttpRequest::get(format!("{}/users/me", API_BASE))))
    }

    fn fetch_items(&self, _options: ImportOptions) -> BoxFuture<'_, ProviderResult<FetchedItems>> {
        Box::pin(self.import_all())
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
        let Some(token) = token else {
            return Err(ProviderError::no_credential("not authenticated"));
        };
        Ok(request
            .bearer(&token.access_token)
            .with_header("Notion-Version", NOTION_VERSION))
    }
}
