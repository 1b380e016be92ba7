//! Human-readable and JSON rendering of command results.

use std::fmt::Write as _;

use lifehub_core::{ExportResult, ImportResult};
use lifehub_manager::{IntegrationInfo, IntegrationSummary, ProviderInfo};
use lifehub_providers::{AuthKind, Capabilities};
use serde::Serialize;

use crate::error::CliResult;

/// Prints any serializable value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn auth_label(kind: AuthKind) -> &'static str {
    match kind {
        AuthKind::StaticToken => "token",
        AuthKind::ApiKey => "api key",
        AuthKind::OAuth => "oauth",
        AuthKind::OAuthPkce => "oauth (pkce)",
    }
}

fn capability_labels(capabilities: &Capabilities) -> String {
    let labels: Vec<&str> = [
        (capabilities.import, "import"),
        (capabilities.url_import, "url import"),
        (capabilities.export, "export"),
    ]
    .into_iter()
    .filter_map(|(enabled, label)| enabled.then_some(label))
    .collect();
    if labels.is_empty() {
        "-".to_string()
    } else {
        labels.join(", ")
    }
}

/// Renders the provider catalog as a table.
pub fn render_catalog(providers: &[ProviderInfo]) -> String {
    let mut out = String::new();
    for info in providers {
        let auth: Vec<&str> = info.auth.iter().copied().map(auth_label).collect();
        let _ = writeln!(
            out,
            "{:<18} {:<18} auth: {:<22} {}",
            info.provider.as_str(),
            info.display_name,
            auth.join(", "),
            capability_labels(&info.capabilities)
        );
        let _ = writeln!(out, "{:<18} {}", "", info.description);
    }
    out
}

/// Renders one import result.
pub fn render_import(result: &ImportResult) -> String {
    let mut out = format!(
        "{}: {} imported, {} skipped ({} seen)\n",
        result.provider, result.imported_items, result.failed_items, result.total_items
    );
    if !result.summary.is_empty() {
        let parts: Vec<String> = result
            .summary
            .iter()
            .map(|(item_type, count)| format!("{} {}", count, item_type))
            .collect();
        let _ = writeln!(out, "  {}", parts.join(", "));
    }
    for error in &result.errors {
        let _ = writeln!(out, "  - {}", error);
    }
    out
}

/// Renders one export result.
pub fn render_export(result: &ExportResult) -> String {
    let mut out = format!(
        "{}: {} exported, {} failed\n",
        result.provider, result.exported_items, result.failed_items
    );
    for error in &result.errors {
        let _ = writeln!(out, "  - {}", error);
    }
    out
}

/// Renders the registered integrations and their counts.
pub fn render_status(integrations: &[IntegrationInfo], summary: &IntegrationSummary) -> String {
    if integrations.is_empty() {
        return "No integrations. Run `lifehub providers` to see what can be connected.\n".to_string();
    }

    let mut out = String::new();
    for info in integrations {
        let last_sync = info
            .last_sync_at
            .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let _ = writeln!(
            out,
            "{:<18} {:<13} last sync: {}",
            info.provider.as_str(),
            info.status.as_str(),
            last_sync
        );
        if let Some(ref error) = info.last_error {
            let _ = writeln!(out, "{:<18} error: {}", "", error);
        }
    }

    let counts: Vec<String> = summary
        .by_status
        .iter()
        .map(|(status, count)| format!("{} {}", count, status))
        .collect();
    let _ = writeln!(out, "\n{} integration(s): {}", summary.total, counts.join(", "));
    out
}
