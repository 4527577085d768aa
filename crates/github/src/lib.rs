//! Remote source adapter for the upstream issue tracker.
//!
//! [`RemoteSource`] is the complete allow-list of remote operations the
//! reconciliation core may invoke; request-supplied method names are never
//! dispatched upstream. [`GithubClient`] is the production implementation
//! over the GitHub REST API; tests substitute their own implementations.

mod client;
mod retry;

pub use client::GithubClient;
pub use retry::{RetryConfig, retry_get};

use chrono::{DateTime, Utc};
use gitmemo_core::{Issue, Label};
use serde::{Deserialize, Serialize};

/// Typed failure from the remote tier.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited: {0}")]
    RateLimit(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
}

/// Payload for creating an issue upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub body: Option<String>,
    pub labels: Vec<String>,
}

/// Partial update for an existing issue. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssuePatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub labels: Option<Vec<String>>,
}

/// Payload for creating a label upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLabel {
    pub name: String,
    /// Hex color without the leading `#`.
    pub color: String,
    pub description: Option<String>,
}

/// The supported remote operations.
///
/// `list_issues` with `since` returns only issues updated after that
/// timestamp; an empty result is a valid response, not an error.
#[allow(async_fn_in_trait)]
pub trait RemoteSource: Send + Sync {
    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
        labels: &[String],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Issue>, RemoteError>;

    async fn get_issue(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Issue, RemoteError>;

    async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        new: &NewIssue,
    ) -> Result<Issue, RemoteError>;

    async fn update_issue(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        patch: &IssuePatch,
    ) -> Result<Issue, RemoteError>;

    async fn list_labels(&self, owner: &str, repo: &str) -> Result<Vec<Label>, RemoteError>;

    async fn create_label(
        &self,
        owner: &str,
        repo: &str,
        new: &NewLabel,
    ) -> Result<Label, RemoteError>;
}
