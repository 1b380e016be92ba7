//! lifehub CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use lifehub_cli::cli::{Cli, Command, ConfigAction};
use lifehub_cli::commands::{self, Context};
use lifehub_cli::error::{CliError, CliResult};
use lifehub_core::{TracingConfig, init_tracing};
use lifehub_manager::LifehubConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = match cli.config {
        Some(ref path) => LifehubConfig::load_from(path).map_err(|e| CliError::config(e.to_string()))?,
        None => LifehubConfig::load()?,
    };
    let ctx = Context::new(config, cli.data_dir, cli.json);

    match cli.command {
        Command::Providers => commands::status::providers(&ctx),
        Command::Auth {
            provider,
            redirect_uri,
        } => commands::auth::start(&ctx, provider, redirect_uri).await,
        Command::Exchange {
            provider,
            code,
            state,
        } => commands::auth::exchange(&ctx, provider, &code, state.as_deref()).await,
        Command::Connect { provider, token } => commands::auth::connect(&ctx, provider, token).await,
        Command::Import { provider, category } => {
            commands::import::import(&ctx, provider, category).await
        }
        Command::ImportUrl {
            url,
            provider,
            category,
        } => commands::import::import_url(&ctx, provider, &url, category).await,
        Command::BulkImport { category } => commands::import::bulk_import(&ctx, category).await,
        Command::Export {
            provider,
            from,
            target,
        } => commands::import::export(&ctx, provider, from, target).await,
        Command::Status => commands::status::status(&ctx).await,
        Command::Disconnect {
            provider,
            force_reimport,
        } => commands::auth::disconnect(&ctx, provider, force_reimport).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&ctx),
            ConfigAction::Validate => commands::config::validate(&ctx),
            ConfigAction::Path => commands::config::path(&ctx),
        },
    }
}
