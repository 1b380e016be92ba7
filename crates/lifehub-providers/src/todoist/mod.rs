//! Todoist integration.
//!
//! Imports open tasks from every project except the onboarding ones, and
//! exports task items back as new Todoist tasks. Authenticates with a
//! personal API token or an OAuth token; neither expires.

mod api;

use std::sync::Arc;

use lifehub_core::{ExportResult, Item, ItemType};
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
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};

use api::{Paginated, Project, Task};

/// Base URL for the Todoist API v1.
const API_BASE: &str = "https://api.todoist.com/api/v1";
const AUTHORIZE_URL: &str = "https://todoist.com/oauth/authorize";
const TOKEN_URL: &str = "https://todoist.com/oauth/access_token";
const DEFAULT_SCOPES: &[&str] = &["data:read_write"];
const PAGE_LIMIT: &str = "200";

/// Todoist adapter.
#[derive(Debug)]
pub struct TodoistIntegration {
    session: AuthSession,
    oauth: OAuthClient,
    category: String,
}

impl TodoistIntegration {
    /// Creates a disconnected Todoist integration.
    pub fn new(config: IntegrationConfig, transport: Arc<dyn HttpTransport>) -> ProviderResult<Self> {
        config.validate(ProviderKind::Todoist)?;
        let oauth = OAuthClient::new(
            ProviderKind::Todoist,
            config.client_id_or_empty(),
            AUTHORIZE_URL,
            TOKEN_URL,
        )
        .with_secret(config.client_secret.clone())
        .with_scopes(config.scopes_or(DEFAULT_SCOPES))
        .with_scope_separator(",");

        Ok(Self {
            session: AuthSession::new(ProviderKind::Todoist, transport),
            oauth,
            category: config.category.unwrap_or_else(|| "Tasks".to_string()),
        })
    }

    async fn list_projects(&self) -> ProviderResult<Vec<Project>> {
        paginate(|cursor| async move {
            let mut request =
                HttpRequest::get(format!("{}/projects", API_BASE)).with_query("limit", PAGE_LIMIT);
            if let Some(cursor) = cursor {
                request = request.with_query("cursor", cursor);
            }
            let page: Paginated<Project> = self.authenticated_request(request).await?.json()?;
            Ok(Page::new(page.results, page.next_cursor))
        })
        .await
    }

    async fn list_tasks(&self, project_id: &str) -> ProviderResult<Vec<Task>> {
        paginate(|cursor| async move {
            let mut request = HttpRequest::get(format!("{}/tasks", API_BASE))
                .with_query("project_id", project_id)
                .with_query("limit", PAGE_LIMIT);
            if let Some(cursor) = cursor {
                request = request.with_query("cursor", cursor);
            }
            let page: Paginated<Task> = self.authenticated_request(request).await?.json()?;
            Ok(Page::new(page.results, page.next_cursor))
        })
        .await
    }

    async fn import_all(&self) -> ProviderResult<FetchedItems> {
        let projects = self.list_projects().await?;
        let mut fetched = FetchedItems::default();

        for project in projects.iter().filter(|p| !p.is_archived && !p.is_onboarding()) {
            match self.list_tasks(&project.id).await {
                Ok(tasks) => {
                    let items: Vec<Item> = tasks
                        .into_iter()
                        .filter(Task::is_importable)
                        .map(|t| t.into_item(project))
                        .collect();
                    debug!(project = %project.name, tasks = items.len(), "fetched project tasks");
                    fetched.extend(items);
                }
                Err(e) => fetched.resource_failed(&project.name, e)?,
            }
        }

        Ok(fetched)
    }

    async fn create_task(&self, item: &Item, project_id: Option<&str>) -> ProviderResult<()> {
        if item.item_type != ItemType::Task {
            return Err(ProviderError::unsupported(format!(
                "only tasks can be exported, got {}",
                item.item_type
            )));
        }
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/tasks", API_BASE))
            .with_json(api::export_body(item, project_id));
        self.authenticated_request(request).await?;
        Ok(())
    }

    async fn export_all(&self, items: Vec<Item>, options: ExportOptions) -> ProviderResult<ExportResult> {
        let target = options.target.as_deref();
        Ok(export_in_batches(ProviderKind::Todoist, items, options.batch_size, |item| async move {
            self.create_task(&item, target).await
        })
        .await)
    }
}

impl Integration for TodoistIntegration {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Todoist
    }

    fn session(&self) -> &AuthSession {
        &self.session
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            import: true,
            export: true,
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
        Box::pin(probe(self, HttpRequest::get(format!("{}/user", API_BASE))))
    }

    fn fetch_items(&self, _options: ImportOptions) -> BoxFuture<'_, ProviderResult<FetchedItems>> {
        Box::pin(self.import_all())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::import::run_import;
    use crate::provider::IntegrationStatus;
    use crate::store::{ItemStore, MemoryItemStore};
    use crate::testing::FakeTransport;
    use crate::transport::HttpResponse;
    use serde_json::json;

    fn integration(transport: Arc<FakeTransport>) -> TodoistIntegration {
        let integration = TodoistIntegration::new(IntegrationConfig::new(), transport).unwrap();
        integration
            .session
            .set_token(TokenRecord::new(ProviderKind::Todoist, "api-token"));
        integration
    }

    fn fake_account() -> FakeTransport {
        FakeTransport::new()
            .on(HttpMethod::Get, "/user", HttpResponse::json_body(200, &json!({"id": "u1"})))
            .on(
                HttpMethod::Get,
                "/projects",
                HttpResponse::json_body(
                    200,
                    &json!({
                        "results": [
                            {"id": "inbox", "name": "Inbox"},
                            {"id": "gs", "name": "Getting Started"},
                            {"id": "work", "name": "Work"}
                        ],
                        "next_cursor": null
                    }),
                ),
            )
            // the cursor route must win over the first-page route
            .on_query(
                HttpMethod::Get,
                "/tasks",
                ("cursor", "page-2"),
                HttpResponse::json_body(
                    200,
                    &json!({"results": [{"id": "3", "content": "Call plumber"}], "next_cursor": null}),
                ),
            )
            .on_query(
                HttpMethod::Get,
                "/tasks",
                ("project_id", "inbox"),
                HttpResponse::json_body(
                    200,
                    &json!({
                        "results": [
                            {"id": "1", "content": "Buy milk"},
                            {"id": "2", "content": "Done already", "checked": true}
                        ],
                        "next_cursor": "page-2"
                    }),
                ),
            )
            .on_query(
                HttpMethod::Get,
                "/tasks",
                ("project_id", "gs"),
                HttpResponse::json_body(
                    200,
                    &json!({"results": [{"id": "9", "content": "Try boards"}]}),
                ),
            )
            .on_query(
                HttpMethod::Get,
                "/tasks",
                ("project_id", "work"),
                HttpResponse::json_body(500, &json!({"error": "Service unavailable"})),
            )
    }

    #[tokio::test]
    async fn authenticate_with_static_token() {
        let transport = Arc::new(fake_account());
        let todoist = integration(transport.clone());

        todoist.authenticate().await.unwrap();
        assert_eq!(todoist.status(), IntegrationStatus::Connected);
        assert_eq!(
            transport.requests()[0].header("Authorization"),
            Some("Bearer api-token")
        );
    }

    #[tokio::test]
    async fn imports_open_tasks_and_collects_project_errors() {
        let transport = Arc::new(fake_account());
        let todoist = integration(transport.clone());
        todoist.authenticate().await.unwrap();
        let store = MemoryItemStore::new();

        let result = run_import(&todoist, &store, ImportOptions::new()).await.unwrap();

        assert_eq!(result.total_items, 2);
        assert_eq!(result.imported_items, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Work: "));
        // the onboarding project is never queried
        assert!(
            !transport
                .requests()
                .iter()
                .any(|r| r.query_value("project_id") == Some("gs"))
        );

        let items = store.get_all_items().await.unwrap();
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Buy milk", "Call plumber"]);
        assert!(items.iter().all(|i| i.category == "Tasks"));

        let again = run_import(&todoist, &store, ImportOptions::new()).await.unwrap();
        assert_eq!(again.imported_items, 0);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn exports_tasks_in_batches() {
        let transport = Arc::new(FakeTransport::new().on(
            HttpMethod::Post,
            "/tasks",
            HttpResponse::json_body(200, &json!({"id": "new"})),
        ));
        let todoist = integration(transport.clone());
        let items = vec![
            Item::new("lifehub", "a", ItemType::Task, "One"),
            Item::new("lifehub", "b", ItemType::Note, "Not a task"),
            Item::new("lifehub", "c", ItemType::Task, "Two"),
        ];

        let result = todoist
            .export_items(items, ExportOptions::default().with_target("inbox"))
            .await
            .unwrap();

        assert_eq!(result.exported_items, 2);
        assert_eq!(result.failed_items, 1);
        assert!(result.errors[0].starts_with("Not a task: "));
        let posted = transport.requests();
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0].json_body().unwrap()["project_id"], "inbox");
    }

    #[tokio::test]
    async fn oauth_exchange_uses_client_secret() {
        let transport = Arc::new(FakeTransport::new().on(
            HttpMethod::Post,
            "oauth/access_token",
            HttpResponse::json_body(200, &json!({"access_token": "oauth-token", "token_type": "Bearer"})),
        ));
        let config = IntegrationConfig::new().with_client("cid", Some("csecret".into()));
        let todoist = TodoistIntegration::new(config, transport.clone()).unwrap();

        let auth = todoist.authorization_request("https://app/cb").unwrap();
        assert!(auth.url.starts_with(AUTHORIZE_URL));
        assert!(auth.pkce_verifier.is_none());

        let record = todoist.exchange_code("code", "https://app/cb", None).await.unwrap();
        assert_eq!(record.access_token, "oauth-token");
        assert_eq!(todoist.credentials().unwrap().access_token, "oauth-token");
        assert_eq!(transport.requests()[0].form_value("client_secret"), Some("csecret"));
    }

    #[tokio::test]
    async fn refresh_is_unsupported() {
        let todoist = integration(Arc::new(FakeTransport::new()));
        let err = todoist.refresh_access_token().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::UnsupportedOperation);
    }
}
