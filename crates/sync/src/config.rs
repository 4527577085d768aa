//! Repository configuration resolution.
//!
//! Precedence: environment variables win over the persisted `repo_config`
//! row. Tokens are sealed the moment they are read and resealed on every
//! store-sourced load, so legacy plaintext rows and pre-rotation ciphertexts
//! normalize to the current sealed form as a side effect of normal reads.

use gitmemo_core::{DEFAULT_ISSUES_PER_PAGE, RepoConfig, crypto};
use gitmemo_store::Store;
use tracing::warn;

use crate::SyncError;

/// Environment-sourced configuration fields.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub issues_per_page: Option<u32>,
}

impl EnvOverrides {
    /// Read `GITMEMO_OWNER`, `GITMEMO_REPO`, `GITMEMO_TOKEN`, and
    /// `GITMEMO_ISSUES_PER_PAGE`. Empty values count as unset.
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|s| !s.is_empty())
        }
        Self {
            owner: var("GITMEMO_OWNER"),
            repo: var("GITMEMO_REPO"),
            token: var("GITMEMO_TOKEN"),
            issues_per_page: var("GITMEMO_ISSUES_PER_PAGE").and_then(|s| s.parse().ok()),
        }
    }
}

/// Resolve the active repository configuration.
///
/// Environment variables take precedence; otherwise the persisted row is
/// used. The returned token is always freshly sealed: never plaintext, and
/// never a stale ciphertext carried through unchanged.
pub fn resolve_config(
    store: &Store,
    secret_key: &str,
    env: &EnvOverrides,
) -> Result<RepoConfig, SyncError> {
    if let (Some(owner), Some(repo)) = (env.owner.clone(), env.repo.clone()) {
        let token = env
            .token
            .as_deref()
            .map(|t| crypto::seal(secret_key, t))
            .transpose()
            .map_err(|e| SyncError::Config(format!("seal token: {e}")))?;
        return Ok(RepoConfig {
            owner,
            repo,
            issues_per_page: env.issues_per_page.unwrap_or(DEFAULT_ISSUES_PER_PAGE),
            token,
        });
    }

    let Some(mut config) = store.get_default_config().map_err(SyncError::Store)? else {
        return Err(SyncError::Config(
            "no repository configured: set GITMEMO_OWNER/GITMEMO_REPO or persist a repo config"
                .into(),
        ));
    };

    if let Some(stored) = config.token.take() {
        let resealed = crypto::reseal(secret_key, &stored)
            .map_err(|e| SyncError::Config(format!("reseal token: {e}")))?;
        config.token = Some(resealed);
        // Write the normalized form back so the row converges on the
        // current sealing. Failure here only delays normalization.
        if let Err(e) = store.save_config(&config) {
            warn!(
                "persist resealed token for {}/{}: {e:#}",
                config.owner, config.repo
            );
        }
    }

    Ok(config)
}
