//! Authentication commands.

use lifehub_manager::{provider_info, secret};
use lifehub_providers::{AuthKind, ProviderKind, TokenRecord};
use tracing::info;

use crate::error::{CliError, CliResult};
use crate::output::print_json;
use crate::pending::{PendingAuth, PendingStore};

use super::Context;

/// Starts an OAuth flow and prints the URL to open.
///
/// The state and PKCE verifier are kept on disk until `exchange`.
pub async fn start(ctx: &Context, provider: ProviderKind, redirect_uri: Option<String>) -> CliResult<()> {
    ctx.ensure_enabled(provider)?;
    let redirect_uri = redirect_uri.unwrap_or_else(|| ctx.config.redirect_uri.clone());

    let manager = ctx.manager()?;
    let id = manager.create_integration(provider, None, None).await?;
    let request = manager.authorization_request(&id, &redirect_uri).await?;

    PendingStore::new(&ctx.data_dir)
        .save(&PendingAuth::new(provider, &request, &redirect_uri))
        .await?;
    info!(provider = %provider, "authorization started");

    if ctx.json {
        return print_json(&serde_json::json!({
            "provider": provider,
            "url": request.url,
            "state": request.state,
            "redirect_uri": redirect_uri,
        }));
    }

    println!("Open this URL to authorize {}:", provider_info(provider).display_name);
    println!();
    println!("  {}", request.url);
    println!();
    println!("Then pass the `code` from the redirect to:");
    println!("  lifehub exchange {} <CODE> --state {}", provider, request.state);
    Ok(())
}

/// Completes a started OAuth flow with the authorization code.
pub async fn exchange(
    ctx: &Context,
    provider: ProviderKind,
    code: &str,
    state: Option<&str>,
) -> CliResult<()> {
    let pending = PendingStore::new(&ctx.data_dir).take(provider).await?;
    pending.check_state(state)?;

    let manager = ctx.manager()?;
    let id = manager.create_integration(provider, None, None).await?;
    manager
        .complete_authorization(&id, code, &pending.redirect_uri, pending.pkce_verifier.as_deref())
        .await?;

    println!("Connected {}.", provider_info(provider).display_name);
    Ok(())
}

/// Connects with a pasted token, or with the configured API key.
///
/// `token` accepts secret references; it is resolved here and never stored
/// anywhere but the credential store.
pub async fn connect(ctx: &Context, provider: ProviderKind, token: Option<String>) -> CliResult<()> {
    ctx.ensure_enabled(provider)?;
    let info = provider_info(provider);

    let record = match token {
        Some(ref value) => {
            if !info.accepts_static_token() {
                return Err(CliError::Auth(format!(
                    "{} does not accept pasted tokens; run `lifehub auth {}`",
                    info.display_name, provider
                )));
            }
            Some(TokenRecord::new(provider, secret::resolve(value)?))
        }
        None if info.auth.contains(&AuthKind::ApiKey) => {
            if ctx.config.integration_config(provider)?.api_key.is_none() {
                return Err(CliError::config(format!(
                    "set api_key in the [{provider}] section to connect without a token"
                )));
            }
            None
        }
        None => {
            return Err(CliError::Auth(format!(
                "{} needs --token or `lifehub auth {}`",
                info.display_name, provider
            )));
        }
    };

    let manager = ctx.manager()?;
    let id = manager.create_integration(provider, None, record).await?;
    manager.authenticate_integration(&id).await?;

    println!("Connected {}.", info.display_name);
    Ok(())
}

/// Disconnects a provider and deletes its stored credentials.
pub async fn disconnect(ctx: &Context, provider: ProviderKind, force_reimport: bool) -> CliResult<()> {
    let manager = ctx.restored_manager().await?;
    let id = match manager.ids_for(provider).await.into_iter().next() {
        Some(id) => id,
        // Nothing restored (no or stale credentials); still clear what is stored.
        None => manager.create_integration(provider, None, None).await?,
    };
    let removed = manager.disconnect_integration(&id, force_reimport).await?;

    println!("Disconnected {}.", provider_info(provider).display_name);
    if force_reimport {
        println!("Deleted {} imported item(s).", removed);
    }
    Ok(())
}
