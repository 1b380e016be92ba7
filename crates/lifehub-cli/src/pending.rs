//! OAuth flows waiting for their authorization code.
//!
//! `lifehub auth` and `lifehub exchange` run as separate processes, so the
//! state, PKCE verifier and redirect URI are kept in
//! `{data_dir}/pending/{provider}.json` in between.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use lifehub_providers::{AuthorizationRequest, ProviderKind};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// How long a started flow stays valid.
const PENDING_TTL_MINUTES: i64 = 15;

/// A started OAuth flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAuth {
    pub provider: ProviderKind,
    pub state: String,
    pub pkce_verifier: Option<String>,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAuth {
    pub fn new(provider: ProviderKind, request: &AuthorizationRequest, redirect_uri: &str) -> Self {
        Self {
            provider,
            state: request.state.clone(),
            pkce_verifier: request.pkce_verifier.clone(),
            redirect_uri: redirect_uri.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Returns true once the flow is too old to complete.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::minutes(PENDING_TTL_MINUTES)
    }

    /// Checks the `state` echoed back by the provider, when given.
    pub fn check_state(&self, state: Option<&str>) -> CliResult<()> {
        match state {
            Some(state) if state != self.state => Err(CliError::Auth(
                "state mismatch; the redirect does not belong to this flow".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Pending flows under one directory.
#[derive(Debug, Clone)]
pub struct PendingStore {
    dir: PathBuf,
}

impl PendingStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("pending"),
        }
    }

    fn path_for(&self, provider: ProviderKind) -> PathBuf {
        self.dir.join(format!("{}.json", provider))
    }

    /// Saves a flow, replacing any earlier one for the provider.
    pub async fn save(&self, pending: &PendingAuth) -> CliResult<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(pending.provider);
        fs::write(&path, serde_json::to_vec_pretty(pending)?).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        debug!("saved pending authorization to {:?}", path);
        Ok(())
    }

    /// Removes and returns the provider's flow.
    ///
    /// # Errors
    ///
    /// `Auth` if no flow was started or it has expired.
    pub async fn take(&self, provider: ProviderKind) -> CliResult<PendingAuth> {
        let path = self.path_for(provider);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CliError::Auth(format!(
                    "no pending authorization for {provider}; run `lifehub auth {provider}` first"
                )));
            }
            Err(e) => return Err(e.into()),
        };
        fs::remove_file(&path).await?;

        let pending: PendingAuth = serde_json::from_str(&content)?;
        if pending.is_expired(Utc::now()) {
            return Err(CliError::Auth(format!(
                "the pending authorization for {provider} has expired; run `lifehub auth {provider}` again"
            )));
        }
        Ok(pending)
    }
}
