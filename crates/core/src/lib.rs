//! Shared domain types for gitmemo.
//!
//! This crate is the **single source of truth** for the entities every tier
//! (cache, store, remote adapter, server) agrees on: issues, labels, sync
//! history, and repository configuration.

pub mod crypto;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Shared Enums ────────────────────────────────────────────────────────────

/// Upstream state of a mirrored issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    /// Parse a stored state string. Unknown values normalize to `Open`.
    pub fn parse(s: &str) -> Self {
        match s {
            "closed" => Self::Closed,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a synchronization attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            _ => Self::Failed,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope of a synchronization pass.
///
/// `Full` treats the remote as authoritative for the whole requested page;
/// `Add` (incremental) is scoped to changes since the last successful sync.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Full,
    Add,
}

impl SyncType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Full => "full",
            Self::Add => "add",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "full" => Self::Full,
            _ => Self::Add,
        }
    }
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Issues & Labels ─────────────────────────────────────────────────────────

/// A mirrored label.
///
/// `(owner, repo, name)` is the natural key; upserting by name overwrites
/// `color` and `description`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    /// Hex color without the leading `#`.
    pub color: String,
    pub description: Option<String>,
}

/// Neutral color used when an issue references a label name that has no row
/// in the label table.
pub const PLACEHOLDER_LABEL_COLOR: &str = "ededed";

impl Label {
    /// Synthetic stand-in for a label name with no matching row.
    pub fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            color: PLACEHOLDER_LABEL_COLOR.to_string(),
            description: None,
        }
    }
}

/// A mirrored issue.
///
/// `(owner, repo, number)` is the natural key. `created_at` is the
/// mirror-local first-insert timestamp and is never overwritten by later
/// upserts; `github_created_at` is the upstream authoritative creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    pub state: IssueState,
    /// Full label objects, in the order upstream reports them.
    pub labels: Vec<Label>,
    pub github_created_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }
}

/// One page of issues from the persisted mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuePage {
    pub issues: Vec<Issue>,
    /// Total matching rows across all pages.
    pub total: i64,
}

// ─── Sync history ────────────────────────────────────────────────────────────

/// One row of sync history.
///
/// Append-only; the store retains at most the 20 most recent rows per
/// `(owner, repo)` and prunes older rows after each insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    pub owner: String,
    pub repo: String,
    pub status: SyncStatus,
    pub issues_synced: i64,
    pub error_message: Option<String>,
    pub sync_type: SyncType,
    pub last_sync_at: DateTime<Utc>,
}

/// Current sync state, derived from the latest [`SyncRecord`].
///
/// `needs_sync` is true when no record exists or the latest attempt failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub needs_sync: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub status: Option<SyncStatus>,
    pub issues_synced: Option<i64>,
}

/// Sync outcome reported to callers alongside an issue listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub total_synced: i64,
    pub last_sync_at: DateTime<Utc>,
}

// ─── Configuration ───────────────────────────────────────────────────────────

pub const DEFAULT_ISSUES_PER_PAGE: u32 = 50;

/// Server-side repository configuration.
///
/// The token is sensitive: it is persisted and carried only in sealed
/// (`enc:v1:`) form (see [`crypto::seal`]) and is absent entirely from the
/// client-facing [`ClientConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub owner: String,
    pub repo: String,
    pub issues_per_page: u32,
    /// Sealed upstream API token, if one is configured.
    pub token: Option<String>,
}

impl RepoConfig {
    pub fn client_view(&self) -> ClientConfig {
        ClientConfig {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            issues_per_page: self.issues_per_page,
        }
    }
}

/// Client-facing configuration. Deliberately has no token field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub owner: String,
    pub repo: String,
    pub issues_per_page: u32,
}
