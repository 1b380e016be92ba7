//! Status and provider listing.

use lifehub_manager::catalog;
use serde::Serialize;

use crate::error::CliResult;
use crate::output::{print_json, render_catalog, render_status};

use super::Context;

/// Lists the enabled providers.
pub fn providers(ctx: &Context) -> CliResult<()> {
    let providers: Vec<_> = catalog()
        .into_iter()
        .filter(|info| ctx.config.enabled_providers.contains(&info.provider))
        .collect();
    if ctx.json {
        return print_json(&providers);
    }
    print!("{}", render_catalog(&providers));
    Ok(())
}

#[derive(Serialize)]
struct StatusReport<'a> {
    integrations: &'a [lifehub_manager::IntegrationInfo],
    summary: &'a lifehub_manager::IntegrationSummary,
}

/// Restores integrations and shows where each one stands.
pub async fn status(ctx: &Context) -> CliResult<()> {
    let manager = ctx.restored_manager().await?;
    let integrations = manager.list_integrations().await;
    let summary = manager.integration_summary().await;

    if ctx.json {
        return print_json(&StatusReport {
            integrations: &integrations,
            summary: &summary,
        });
    }
    print!("{}", render_status(&integrations, &summary));
    Ok(())
}
