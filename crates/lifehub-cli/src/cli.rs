//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lifehub_providers::ProviderKind;

/// lifehub - Bring tasks, events and notes from your services together
#[derive(Debug, Parser)]
#[command(name = "lifehub")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "LIFEHUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the data directory (credentials and items)
    #[arg(long, env = "LIFEHUB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List supported providers and how they authenticate
    Providers,

    /// Start an OAuth flow and print the authorization URL
    Auth {
        /// Provider name (e.g. google_calendar, outlook_calendar)
        provider: ProviderKind,

        /// Redirect URI registered with the provider
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Finish an OAuth flow with the code from the redirect
    Exchange {
        provider: ProviderKind,

        /// Authorization code
        code: String,

        /// `state` value from the redirect, checked against the pending flow
        #[arg(long)]
        state: Option<String>,
    },

    /// Connect with a personal or integration token
    Connect {
        provider: ProviderKind,

        /// Token value; accepts `env::VAR` and `pass::path` references.
        /// Omit for API-key providers configured in config.toml.
        #[arg(long, env = "LIFEHUB_TOKEN")]
        token: Option<String>,
    },

    /// Import everything from a connected provider
    Import {
        provider: ProviderKind,

        /// Category for items that have none
        #[arg(long)]
        category: Option<String>,
    },

    /// Import a single URL (e.g. a YouTube video)
    ImportUrl {
        url: String,

        #[arg(long, default_value = "youtube")]
        provider: ProviderKind,

        #[arg(long)]
        category: Option<String>,
    },

    /// Import from every connected provider
    BulkImport {
        #[arg(long)]
        category: Option<String>,
    },

    /// Create stored items upstream
    Export {
        provider: ProviderKind,

        /// Only export items imported from this source
        #[arg(long)]
        from: Option<String>,

        /// Provider-specific target (project id, calendar id)
        #[arg(long)]
        target: Option<String>,
    },

    /// Show integrations and their status
    Status,

    /// Disconnect a provider and forget its credentials
    Disconnect {
        provider: ProviderKind,

        /// Also delete the provider's imported items
        #[arg(long)]
        force_reimport: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration and resolve secret references
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        let cli = Cli::try_parse_from(["lifehub", "import", "google-calendar", "--category", "Work"])
            .unwrap();
        match cli.command {
            Command::Import { provider, category } => {
                assert_eq!(provider, ProviderKind::GoogleCalendar);
                assert_eq!(category.as_deref(), Some("Work"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["lifehub", "import", "dropbox"]).is_err());
    }

    #[test]
    fn import_url_defaults_to_youtube() {
        let cli = Cli::try_parse_from(["lifehub", "--json", "import-url", "https://youtu.be/dQw4w9WgXcQ"])
            .unwrap();
        assert!(cli.json);
        match cli.command {
            Command::ImportUrl { provider, url, .. } => {
                assert_eq!(provider, ProviderKind::YouTube);
                assert_eq!(url, "https://youtu.be/dQw4w9WgXcQ");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn disconnect_flags() {
        let cli = Cli::try_parse_from(["lifehub", "disconnect", "notion", "--force-reimport"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Disconnect {
                provider: ProviderKind::Notion,
                force_reimport: true
            }
        ));
    }
}
