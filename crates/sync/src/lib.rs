//! Reconciliation orchestrator for the gitmemo mirror.
//!
//! Decides, per request, whether to serve issues and labels from the
//! in-memory cache, the persisted SQLite mirror, or the upstream tracker,
//! and keeps the three tiers consistent: store writes happen before cache
//! writes, which happen before the sync record, which happens before the
//! response. The orchestrator owns no persistent state of its own.

mod config;
mod reconciler;
#[cfg(test)]
mod testing;

pub use config::{EnvOverrides, resolve_config};
pub use reconciler::{IssueListRequest, IssueListResponse, Reconciler};

use gitmemo_github::RemoteError;

/// Orchestrator-level failure taxonomy.
///
/// Cache-tier failures never appear here: they are absorbed where they
/// happen and degrade to cache misses. Store and remote failures propagate
/// because callers must know when durability or freshness is in question.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("store error: {0}")]
    Store(anyhow::Error),
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}
