//! Configuration commands.

use lifehub_manager::LifehubConfig;

use crate::error::{CliError, CliResult};

use super::Context;

/// Dump the current configuration to stdout.
///
/// Secret references are printed as written, never resolved.
pub fn dump(ctx: &Context) -> CliResult<()> {
    let toml_str = toml::to_string_pretty(&ctx.config)
        .map_err(|e| CliError::config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", LifehubConfig::default_path().display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration, resolving every secret reference.
pub fn validate(ctx: &Context) -> CliResult<()> {
    if ctx.config.enabled_providers.is_empty() {
        return Err(CliError::config("enabled_providers must not be empty"));
    }
    if ctx.config.timeout == 0 {
        return Err(CliError::config("timeout must be greater than zero"));
    }
    if ctx.config.import.window_days <= 0 {
        return Err(CliError::config("import.window_days must be positive"));
    }

    for &provider in &ctx.config.enabled_providers {
        if ctx.config.settings(provider).is_some() {
            ctx.config.integration_config(provider).map_err(|e| {
                CliError::config(format!("invalid [{}] settings: {}", provider, e))
            })?;
            println!("{} settings are valid.", provider);
        }
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file and data directory paths.
pub fn path(ctx: &Context) -> CliResult<()> {
    println!("config: {}", LifehubConfig::default_path().display());
    println!("data:   {}", ctx.data_dir.display());
    Ok(())
}
