//! Static provider metadata shown before any integration exists.

use lifehub_providers::{AuthKind, Capabilities, ProviderKind};
use serde::Serialize;

/// Display metadata and declared capabilities of a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub provider: ProviderKind,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Icon name from the application's icon set.
    pub icon: &'static str,
    /// Supported auth variants, preferred first.
    pub auth: &'static [AuthKind],
    pub capabilities: Capabilities,
}

impl ProviderInfo {
    /// The preferred auth variant.
    pub fn primary_auth(&self) -> AuthKind {
        self.auth[0]
    }

    /// Returns true if the provider can authenticate with a pasted token.
    pub fn accepts_static_token(&self) -> bool {
        self.auth.contains(&AuthKind::StaticToken)
    }
}

/// Returns the metadata for a provider.
pub fn provider_info(provider: ProviderKind) -> ProviderInfo {
    match provider {
        ProviderKind::Todoist => ProviderInfo {
            provider,
            display_name: "Todoist",
            description: "Import active tasks and create tasks from items",
            icon: "check-square",
            auth: &[AuthKind::StaticToken, AuthKind::OAuth],
            capabilities: Capabilities {
                import: true,
                export: true,
                oauth: true,
                ..Default::default()
            },
        },
        ProviderKind::GoogleCalendar => ProviderInfo {
            provider,
            display_name: "Google Calendar",
            description: "Import events within thirty days of today and create events",
            icon: "calendar",
            auth: &[AuthKind::OAuth],
            capabilities: Capabilities {
                import: true,
                export: true,
                oauth: true,
                refresh: true,
                ..Default::default()
            },
        },
        ProviderKind::OutlookCalendar => ProviderInfo {
            provider,
            display_name: "Outlook Calendar",
            description: "Import events from Microsoft 365 or Outlook.com calendars",
            icon: "calendar-days",
            auth: &[AuthKind::OAuthPkce],
            capabilities: Capabilities {
                import: true,
                oauth: true,
                pkce: true,
                refresh: true,
                ..Default::default()
            },
        },
        ProviderKind::Notion => ProviderInfo {
            provider,
            display_name: "Notion",
            description: "Import pages as notes and database rows as tasks",
            icon: "book-open",
            auth: &[AuthKind::StaticToken, AuthKind::OAuth],
            capabilities: Capabilities {
                import: true,
                oauth: true,
                ..Default::default()
            },
        },
        ProviderKind::OneNote => ProviderInfo {
            provider,
            display_name: "OneNote",
            description: "Import notebook pages as notes",
            icon: "notebook",
            auth: &[AuthKind::OAuthPkce],
            capabilities: Capabilities {
                import: true,
                oauth: true,
                pkce: true,
                refresh: true,
                ..Default::default()
            },
        },
        ProviderKind::YouTube => ProviderInfo {
            provider,
            display_name: "YouTube",
            description: "Save videos as notes, one URL at a time",
            icon: "youtube",
            auth: &[AuthKind::ApiKey, AuthKind::OAuth],
            capabilities: Capabilities {
                url_import: true,
                oauth: true,
                refresh: true,
                ..Default::default()
            },
        },
    }
}

/// Returns the metadata for every provider, in display order.
pub fn catalog() -> Vec<ProviderInfo> {
    ProviderKind::ALL.into_iter().map(provider_info).collect()
}
