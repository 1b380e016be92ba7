//! Import and export commands.

use lifehub_core::{ImportResult, Item};
use lifehub_manager::ManagerError;
use lifehub_providers::{ExportOptions, ProviderKind};
use tracing::debug;

use crate::error::CliResult;
use crate::output::{print_json, render_export, render_import};

use super::{Context, connected_id};

fn report(ctx: &Context, result: &ImportResult) -> CliResult<()> {
    if ctx.json {
        print_json(result)
    } else {
        print!("{}", render_import(result));
        Ok(())
    }
}

/// Imports everything from one provider.
pub async fn import(ctx: &Context, provider: ProviderKind, category: Option<String>) -> CliResult<()> {
    let manager = ctx.restored_manager().await?;
    let id = connected_id(&manager, provider).await?;
    let result = manager.import_data(&id, category).await?;
    report(ctx, &result)
}

/// Imports the content behind one URL.
pub async fn import_url(
    ctx: &Context,
    provider: ProviderKind,
    url: &str,
    category: Option<String>,
) -> CliResult<()> {
    let manager = ctx.restored_manager().await?;
    let id = connected_id(&manager, provider).await?;
    let result = manager.import_url(&id, url, category).await?;
    report(ctx, &result)
}

/// Imports from every restored integration that supports bulk import.
pub async fn bulk_import(ctx: &Context, category: Option<String>) -> CliResult<()> {
    let manager = ctx.restored_manager().await?;
    let mut ids = Vec::new();
    for info in manager.list_integrations().await {
        if info.capabilities.import {
            ids.push(info.id);
        } else {
            debug!(provider = %info.provider, "skipping provider without bulk import");
        }
    }

    let results = manager.bulk_import(&ids, category).await;
    if ctx.json {
        return print_json(&results);
    }
    if results.is_empty() {
        println!("No connected providers to import from.");
    }
    for result in &results {
        print!("{}", render_import(result));
    }
    Ok(())
}

/// Items to send to `provider`: never its own, optionally one source only.
fn export_selection(items: Vec<Item>, provider: ProviderKind, from: Option<&str>) -> Vec<Item> {
    items
        .into_iter()
        .filter(|item| item.source() != provider.as_str())
        .filter(|item| from.is_none_or(|source| item.source() == source))
        .collect()
}

/// Creates stored items upstream.
pub async fn export(
    ctx: &Context,
    provider: ProviderKind,
    from: Option<String>,
    target: Option<String>,
) -> CliResult<()> {
    let manager = ctx.restored_manager().await?;
    let id = connected_id(&manager, provider).await?;

    let items = manager
        .item_store()
        .get_all_items()
        .await
        .map_err(ManagerError::from)?;
    let items = export_selection(items, provider, from.as_deref());

    let mut options = ExportOptions {
        batch_size: manager.config().export_batch_size,
        ..Default::default()
    };
    if let Some(target) = target {
        options = options.with_target(target);
    }

    let result = manager.export_data(&id, items, options).await?;
    if ctx.json {
        print_json(&result)
    } else {
        print!("{}", render_export(&result));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::context;
    use lifehub_core::ItemType;
    use lifehub_manager::{FileItemStore, LifehubConfig};
    use lifehub_providers::testing::FakeTransport;
    use lifehub_providers::{HttpMethod, HttpResponse, ItemStore};
    use serde_json::json;

    fn todoist() -> FakeTransport {
        FakeTransport::new()
            .on(HttpMethod::Get, "api/v1/user", HttpResponse::json_body(200, &json!({"id": "u1"})))
            .on(
                HttpMethod::Get,
                "/projects",
                HttpResponse::json_body(
                    200,
                    &json!({"results": [{"id": "inbox", "name": "Inbox"}], "next_cursor": null}),
                ),
            )
            .on(
                HttpMethod::Get,
                "/tasks",
                HttpResponse::json_body(
                    200,
                    &json!({"results": [{"id": "1", "content": "Buy milk"}], "next_cursor": null}),
                ),
            )
    }

    #[test]
    fn export_never_echoes_items_back() {
        let items = vec![
            Item::new("todoist", "1", ItemType::Task, "From todoist"),
            Item::new("notion", "p1", ItemType::Note, "From notion"),
            Item::new("onenote", "n1", ItemType::Note, "From onenote"),
        ];
        let all = export_selection(items.clone(), ProviderKind::Todoist, None);
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|i| i.source() != "todoist"));

        let notion = export_selection(items, ProviderKind::Todoist, Some("notion"));
        assert_eq!(notion.len(), 1);
        assert_eq!(notion[0].title, "From notion");
    }

    #[tokio::test]
    async fn import_requires_a_connected_provider() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), LifehubConfig::default(), todoist());
        let err = import(&ctx, ProviderKind::Todoist, None).await.unwrap_err();
        assert!(matches!(err, crate::error::CliError::NotConnected(ProviderKind::Todoist)));
    }

    #[tokio::test]
    async fn import_restores_and_persists_items() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), LifehubConfig::default(), todoist());
        crate::commands::auth::connect(&ctx, ProviderKind::Todoist, Some("tok".into()))
            .await
            .unwrap();

        import(&ctx, ProviderKind::Todoist, Some("Home".into())).await.unwrap();
        bulk_import(&ctx, None).await.unwrap();

        let items = FileItemStore::new(ctx.items_path()).get_all_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, "Home");
    }
}
