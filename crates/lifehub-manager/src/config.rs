//! lifehub configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/lifehub/config.toml` by default:
//!
//! ```toml
//! enabled_providers = ["todoist", "google_calendar", "youtube"]
//!
//! [google_calendar]
//! client_id = "1234.apps.googleusercontent.com"
//! client_secret = "pass::lifehub/google"
//! calendar_ids = ["primary"]
//!
//! [youtube]
//! api_key = "env::YOUTUBE_API_KEY"
//! ```
//!
//! Credential values (`client_id`, `client_secret`, `api_key`) accept secret
//! references (see [`crate::secret`]); they are resolved when the config is
//! turned into a [`ManagerConfig`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lifehub_core::TimeWindow;
use lifehub_providers::{IntegrationConfig, ProviderKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ManagerError, ManagerResult};
use crate::secret;

const APP_NAME: &str = "lifehub";

/// Redirect URI used for OAuth flows unless configured otherwise.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8765/oauth/callback";

// ---------------------------------------------------------------------------
// LifehubConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for lifehub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifehubConfig {
    /// Providers restored by `initialize` and offered by the CLI.
    pub enabled_providers: Vec<ProviderKind>,

    /// Where the file stores keep credentials and items.
    pub data_dir: Option<PathBuf>,

    /// OAuth redirect URI registered with every provider.
    pub redirect_uri: String,

    /// HTTP request timeout in seconds.
    pub timeout: u64,

    /// Import settings.
    pub import: ImportSettings,

    pub todoist: Option<ProviderSettings>,
    pub google_calendar: Option<ProviderSettings>,
    pub outlook_calendar: Option<ProviderSettings>,
    pub notion: Option<ProviderSettings>,
    pub onenote: Option<ProviderSettings>,
    pub youtube: Option<ProviderSettings>,
}

impl Default for LifehubConfig {
    fn default() -> Self {
        Self {
            enabled_providers: ProviderKind::ALL.to_vec(),
            data_dir: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            timeout: 30,
            import: ImportSettings::default(),
            todoist: None,
            google_calendar: None,
            outlook_calendar: None,
            notion: None,
            onenote: None,
            youtube: None,
        }
    }
}

/// Import and export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Calendar imports cover this many days before and after now.
    pub window_days: i64,

    /// Items per export batch.
    pub export_batch_size: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            window_days: TimeWindow::DEFAULT_IMPORT_DAYS,
            export_batch_size: 10,
        }
    }
}

/// Per-provider settings.
///
/// Credentials support secret references (`pass::…`, `env::…`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// OAuth client ID.
    pub client_id: Option<String>,

    /// OAuth client secret (confidential clients only).
    pub client_secret: Option<String>,

    /// API key (YouTube).
    pub api_key: Option<String>,

    /// Microsoft tenant; `common` when unset.
    pub tenant: Option<String>,

    /// Overrides the provider's default OAuth scopes.
    pub scopes: Vec<String>,

    /// Overrides the provider's default item category.
    pub category: Option<String>,

    /// Calendar ids to import; all calendars when empty.
    pub calendar_ids: Vec<String>,
}

impl ProviderSettings {
    /// Resolves secret references into adapter settings.
    pub fn resolve(&self, provider: ProviderKind) -> ManagerResult<IntegrationConfig> {
        let field = |name: &str| format!("{}.{}", provider, name);
        let config = IntegrationConfig {
            client_id: secret::resolve_opt(self.client_id.as_deref(), &field("client_id"))?,
            client_secret: secret::resolve_opt(
                self.client_secret.as_deref(),
                &field("client_secret"),
            )?,
            api_key: secret::resolve_opt(self.api_key.as_deref(), &field("api_key"))?,
            tenant: self.tenant.clone(),
            scopes: self.scopes.clone(),
            category: self.category.clone(),
            calendar_ids: self.calendar_ids.clone(),
        };
        config.validate(provider)?;
        Ok(config)
    }
}

impl LifehubConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> ManagerResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!("no config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ManagerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ManagerError::config(format!("failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> ManagerResult<Self> {
        toml::from_str(content)
            .map_err(|e| ManagerError::config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
    }

    /// Returns the configured data directory, or the default one.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(Self::default_data_dir)
    }

    /// Returns the settings section for a provider, if present.
    pub fn settings(&self, provider: ProviderKind) -> Option<&ProviderSettings> {
        match provider {
            ProviderKind::Todoist => self.todoist.as_ref(),
            ProviderKind::GoogleCalendar => self.google_calendar.as_ref(),
            ProviderKind::OutlookCalendar => self.outlook_calendar.as_ref(),
            ProviderKind::Notion => self.notion.as_ref(),
            ProviderKind::OneNote => self.onenote.as_ref(),
            ProviderKind::YouTube => self.youtube.as_ref(),
        }
    }

    /// Resolves adapter settings for one provider.
    pub fn integration_config(&self, provider: ProviderKind) -> ManagerResult<IntegrationConfig> {
        match self.settings(provider) {
            Some(settings) => settings.resolve(provider),
            None => Ok(IntegrationConfig::default()),
        }
    }

    /// Resolves every enabled provider's secrets into a [`ManagerConfig`].
    pub fn to_manager_config(&self) -> ManagerResult<ManagerConfig> {
        let mut providers = HashMap::new();
        for &provider in &self.enabled_providers {
            providers.insert(provider, self.integration_config(provider)?);
        }
        Ok(ManagerConfig {
            enabled_providers: self.enabled_providers.clone(),
            providers,
            window_days: self.import.window_days,
            export_batch_size: self.import.export_batch_size,
            timeout: Duration::from_secs(self.timeout),
        })
    }
}

// ---------------------------------------------------------------------------
// ManagerConfig (resolved)
// ---------------------------------------------------------------------------

/// Resolved settings the manager runs with. Holds no secret references.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Providers restored by `initialize`.
    pub enabled_providers: Vec<ProviderKind>,
    /// Adapter settings per provider.
    pub providers: HashMap<ProviderKind, IntegrationConfig>,
    /// Calendar import window, in days each way.
    pub window_days: i64,
    /// Items per export batch.
    pub export_batch_size: usize,
    /// HTTP request timeout.
    pub timeout: Duration,
}

impl ManagerConfig {
    /// Returns the adapter settings for a provider, or empty ones.
    pub fn integration_config(&self, provider: ProviderKind) -> IntegrationConfig {
        self.providers.get(&provider).cloned().unwrap_or_default()
    }

    /// Builder method to set a provider's adapter settings.
    pub fn with_provider(mut self, provider: ProviderKind, config: IntegrationConfig) -> Self {
        self.providers.insert(provider, config);
        self
    }

    /// Builder method to set the enabled providers.
    pub fn with_enabled(mut self, providers: Vec<ProviderKind>) -> Self {
        self.enabled_providers = providers;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            enabled_providers: ProviderKind::ALL.to_vec(),
            providers: HashMap::new(),
            window_days: TimeWindow::DEFAULT_IMPORT_DAYS,
            export_batch_size: 10,
            timeout: Duration::from_secs(30),
        }
    }
}
