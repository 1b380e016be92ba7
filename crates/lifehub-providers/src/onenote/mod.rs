//! OneNote integration over Microsoft Graph.
//!
//! Walks notebooks → sections → pages and downloads each page's HTML content
//! as a plain-text note. Authenticates as a PKCE public client.

mod api;

use std::sync::Arc;

use lifehub_core::Item;
use tracing::{debug, warn};

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

use api::{Notebook, Section};

const DEFAULT_SCOPES: &[&str] = &["offline_access", "Notes.Read", "User.Read"];
const PAGE_SIZE: &str = "100";

/// OneNote adapter.
#[derive(Debug)]
pub struct OneNoteIntegration {
    session: AuthSession,
    oauth: OAuthClient,
    category: String,
}

impl OneNoteIntegration {
    /// Creates a disconnected OneNote integration.
    pub fn new(config: IntegrationConfig, transport: Arc<dyn HttpTransport>) -> ProviderResult<Self> {
        config.validate(ProviderKind::OneNote)?;
        Ok(Self {
            session: AuthSession::new(ProviderKind::OneNote, transport),
            oauth: graph::oauth_client(ProviderKind::OneNote, &config, DEFAULT_SCOPES),
            category: config.category.unwrap_or_else(|| "Notes".to_string()),
        })
    }

    async fn list_notebooks(&self) -> ProviderResult<Vec<Notebook>> {
        graph::list_all(self, HttpRequest::get(format!("{}/me/onenote/notebooks", GRAPH_BASE))).await
    }

    async fn list_sections(&self, notebook: &Notebook) -> ProviderResult<Vec<Section>> {
        let url = format!(
            "{}/me/onenote/notebooks/{}/sections",
            GRAPH_BASE,
            urlencoding::encode(&notebook.id)
        );
        graph::list_all(self, HttpRequest::get(url)).await
    }

    async fn list_pages(&self, section: &Section) -> ProviderResult<Vec<api::Page>> {
        let url = format!(
            "{}/me/onenote/sections/{}/pages",
            GRAPH_BASE,
            urlencoding::encode(&section.id)
        );
        graph::list_all(self, HttpRequest::get(url).with_query("$top", PAGE_SIZE)).await
    }

    async fn page_content(&self, page: &api::Page) -> ProviderResult<String> {
        let url = format!(
            "{}/me/onenote/pages/{}/content",
            GRAPH_BASE,
            urlencoding::encode(&page.id)
        );
        Ok(self.authenticated_request(HttpRequest::get(url)).await?.body)
    }

    async fn import_section(
        &self,
        notebook: &Notebook,
        section: &Section,
        fetched: &mut FetchedItems,
    ) -> ProviderResult<()> {
        let pages = self.list_pages(section).await?;
        let mut items: Vec<Item> = Vec::with_capacity(pages.len());

        for page in pages {
            match self.page_content(&page).await {
                Ok(html) => items.push(page.into_item(notebook, section, &html)),
                Err(e) => {
                    warn!(page = %page.display_title(), error = %e, "failed to fetch page content");
                    fetched.item_failed(page.display_title(), e)?;
                }
            }
        }

        debug!(notebook = %notebook.display_name, section = %section.display_name, pages = items.len(), "fetched section pages");
        fetched.extend(items);
        Ok(())
    }

    async fn import_all(&self) -> ProviderResult<FetchedItems> {
        let notebooks = self.list_notebooks().await?;
        let mut fetched = FetchedItems::default();

        for notebook in &notebooks {
            let sections = match self.list_sections(notebook).await {
                Ok(sections) => sections,
                Err(e) => {
                    fetched.resource_failed(&notebook.display_name, e)?;
                    continue;
                }
            };
            for section in &sections {
                if let Err(e) = self.import_section(notebook, section, &mut fetched).await {
                    let resource = format!("{} / {}", notebook.display_name, section.display_name);
                    fetched.resource_failed(&resource, e)?;
                }
            }
        }

        Ok(fetched)
    }

    async fn refresh(&self) -> ProviderResult<TokenRecord> {
        let current = self.session.require_token()?;
        self.oauth.refresh(self.session.transport(), &current).await
    }
}

impl Integration for OneNoteIntegration {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OneNote
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

    fn dedupe_by_title(&self) -> bool {
        true
    }

    fn test_connection(&self) -> BoxFuture<'_, bool> {
        let request = HttpRequest::get(format!("{}/me/onenote/notebooks", GRAPH_BASE))
            .with_query("$top", "1");
        Box::pin(probe(self, request))
    }

    fn refresh_access_token(&self) -> BoxFuture<'_, ProviderResult<TokenRecord>> {
        Box::pin(self.refresh())
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::run_import;
    use crate::store::{ItemStore, MemoryItemStore};
    use crate::testing::FakeTransport;
    use crate::transport::{HttpMethod, HttpResponse};
    use lifehub_core::ItemType;
    use serde_json::json;

    fn fake_notebooks() -> FakeTransport {
        FakeTransport::new()
            .on(
                HttpMethod::Get,
                "/notebooks/nb-1/sections",
                HttpResponse::json_body(
                    200,
                    &json!({"value": [{"id": "s-1", "displayName": "Lists"}, {"id": "s-2", "displayName": "Locked"}]}),
                ),
            )
            .on(
                HttpMethod::Get,
                "/sections/s-1/pages",
                HttpResponse::json_body(
                    200,
                    &json!({"value": [
                        {"id": "p-1", "title": "Groceries"},
                        {"id": "p-2", "title": "groceries"},
                        {"id": "p-3", "title": "Broken"}
                    ]}),
                ),
            )
            .on(
                HttpMethod::Get,
                "/sections/s-2/pages",
                HttpResponse::json_body(403, &json!({"error": {"code": "40004", "message": "Section is password protected"}})),
            )
            .on(HttpMethod::Get, "/pages/p-1/content", HttpResponse::new(200, "<p>Milk</p>"))
            .on(HttpMethod::Get, "/pages/p-2/content", HttpResponse::new(200, "<p>Eggs</p>"))
            .on(HttpMethod::Get, "/pages/p-3/content", HttpResponse::new(500, "oops"))
            .on(
                HttpMethod::Get,
                "/me/onenote/notebooks",
                HttpResponse::json_body(200, &json!({"value": [{"id": "nb-1", "displayName": "Home"}]})),
            )
    }

    #[tokio::test]
    async fn imports_pages_as_notes() {
        let transport = Arc::new(fake_notebooks());
        let onenote = OneNoteIntegration::new(IntegrationConfig::new(), transport.clone()).unwrap();
        onenote
            .session
            .set_token(TokenRecord::new(ProviderKind::OneNote, "graph-token"));
        onenote.authenticate().await.unwrap();
        let store = MemoryItemStore::new();

        let result = run_import(&onenote, &store, ImportOptions::new()).await.unwrap();

        // "groceries" duplicates "Groceries" by title; "Broken" failed to load
        assert_eq!(result.total_items, 3);
        assert_eq!(result.imported_items, 1);
        assert_eq!(result.failed_items, 2);
        assert_eq!(result.count_of(ItemType::Note), 1);
        assert_eq!(
            result.errors,
            vec![
                "Broken: [onenote] request_failed (HTTP 500): request failed with status 500",
                "Home / Locked: [onenote] request_failed (HTTP 403): Section is password protected",
                "1 duplicates skipped",
            ]
        );

        let items = store.get_all_items().await.unwrap();
        assert_eq!(items[0].body, "Milk");
        assert_eq!(items[0].category, "Notes");
        assert_eq!(items[0].extra_str("section"), Some("Lists"));
    }
}
