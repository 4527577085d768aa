use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gitmemo_core::{Issue, IssueState, Label};

use crate::retry::{RetryConfig, retry_get};
use crate::{IssuePatch, NewIssue, NewLabel, RemoteError, RemoteSource};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("gitmemo/", env!("CARGO_PKG_VERSION"));

/// Typed HTTP client for the GitHub REST API.
///
/// The token is optional: read operations against public repositories work
/// without one, while create/update operations fail fast with
/// [`RemoteError::Auth`].
pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry: RetryConfig,
}

impl GithubClient {
    /// Create a new client with the given token and timeout.
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
            retry: RetryConfig::default(),
        })
    }

    /// Point the client at a different API root (e.g. a test server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn token_or_auth_err(&self) -> Result<&str, RemoteError> {
        self.token
            .as_deref()
            .ok_or_else(|| RemoteError::Auth("no write-capable token configured".into()))
    }
}

impl RemoteSource for GithubClient {
    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
        labels: &[String],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Issue>, RemoteError> {
        let mut params = vec![
            "state=all".to_string(),
            format!("page={page}"),
            format!("per_page={per_page}"),
        ];
        if !labels.is_empty() {
            params.push(format!("labels={}", urlencoding::encode(&labels.join(","))));
        }
        if let Some(since) = since {
            params.push(format!(
                "since={}",
                urlencoding::encode(&since.to_rfc3339())
            ));
        }
        let url = format!(
            "{}?{}",
            self.url(&format!("/repos/{owner}/{repo}/issues")),
            params.join("&")
        );

        let resp = retry_get(&self.client, &url, self.token.as_deref(), &self.retry).await?;
        let wire: Vec<WireIssue> = parse_response(resp).await?;
        // The issues endpoint also lists pull requests; the mirror only
        // carries real issues.
        Ok(wire
            .into_iter()
            .filter(|w| w.pull_request.is_none())
            .map(WireIssue::into_issue)
            .collect())
    }

    async fn get_issue(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Issue, RemoteError> {
        let url = self.url(&format!("/repos/{owner}/{repo}/issues/{number}"));
        let resp = retry_get(&self.client, &url, self.token.as_deref(), &self.retry).await?;
        let wire: WireIssue = parse_response(resp).await?;
        Ok(wire.into_issue())
    }

    async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        new: &NewIssue,
    ) -> Result<Issue, RemoteError> {
        let token = self.token_or_auth_err()?;
        let resp = self
            .client
            .post(self.url(&format!("/repos/{owner}/{repo}/issues")))
            .bearer_auth(token)
            .json(new)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let wire: WireIssue = parse_response(resp).await?;
        Ok(wire.into_issue())
    }

    async fn update_issue(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        patch: &IssuePatch,
    ) -> Result<Issue, RemoteError> {
        let token = self.token_or_auth_err()?;
        let resp = self
            .client
            .patch(self.url(&format!("/repos/{owner}/{repo}/issues/{number}")))
            .bearer_auth(token)
            .json(&WirePatch::from(patch))
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let wire: WireIssue = parse_response(resp).await?;
        Ok(wire.into_issue())
    }

    async fn list_labels(&self, owner: &str, repo: &str) -> Result<Vec<Label>, RemoteError> {
        let url = format!(
            "{}?per_page=100",
            self.url(&format!("/repos/{owner}/{repo}/labels"))
        );
        let resp = retry_get(&self.client, &url, self.token.as_deref(), &self.retry).await?;
        let wire: Vec<WireLabel> = parse_response(resp).await?;
        Ok(wire.into_iter().map(WireLabel::into_label).collect())
    }

    async fn create_label(
        &self,
        owner: &str,
        repo: &str,
        new: &NewLabel,
    ) -> Result<Label, RemoteError> {
        let token = self.token_or_auth_err()?;
        let resp = self
            .client
            .post(self.url(&format!("/repos/{owner}/{repo}/labels")))
            .bearer_auth(token)
            .json(new)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let wire: WireLabel = parse_response(resp).await?;
        Ok(wire.into_label())
    }
}

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireIssue {
    number: i64,
    title: String,
    body: Option<String>,
    state: String,
    #[serde(default)]
    labels: Vec<WireLabel>,
    created_at: DateTime<Utc>,
    /// Present only when the entry is actually a pull request.
    pull_request: Option<serde_json::Value>,
}

impl WireIssue {
    /// Mirror-local `created_at`/`updated_at` are assigned by the store on
    /// upsert; the values set here are transient.
    fn into_issue(self) -> Issue {
        let now = Utc::now();
        Issue {
            number: self.number,
            title: self.title,
            body: self.body,
            state: IssueState::parse(&self.state),
            labels: self.labels.into_iter().map(WireLabel::into_label).collect(),
            github_created_at: self.created_at,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireLabel {
    name: String,
    color: String,
    description: Option<String>,
}

impl WireLabel {
    fn into_label(self) -> Label {
        Label {
            name: self.name,
            color: self.color,
            description: self.description,
        }
    }
}

/// PATCH body with absent (not null) fields for anything left untouched.
#[derive(Debug, Serialize)]
struct WirePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<String>>,
}

impl From<&IssuePatch> for WirePatch {
    fn from(patch: &IssuePatch) -> Self {
        Self {
            title: patch.title.clone(),
            body: patch.body.clone(),
            labels: patch.labels.clone(),
        }
    }
}

/// Parse an HTTP response: deserialize the body on 2xx, otherwise map the
/// status to a typed [`RemoteError`].
async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, RemoteError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(error_for_status(status.as_u16(), body));
    }
    resp.json()
        .await
        .map_err(|e| RemoteError::Network(format!("invalid response body: {e}")))
}

fn error_for_status(status: u16, body: String) -> RemoteError {
    match status {
        401 => RemoteError::Auth(body),
        403 | 429 => RemoteError::RateLimit(body),
        404 => RemoteError::NotFound(body),
        _ => RemoteError::Api {
            status,
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_typed_errors() {
        assert!(matches!(
            error_for_status(401, String::new()),
            RemoteError::Auth(_)
        ));
        assert!(matches!(
            error_for_status(403, String::new()),
            RemoteError::RateLimit(_)
        ));
        assert!(matches!(
            error_for_status(429, String::new()),
            RemoteError::RateLimit(_)
        ));
        assert!(matches!(
            error_for_status(404, String::new()),
            RemoteError::NotFound(_)
        ));
        assert!(matches!(
            error_for_status(502, String::new()),
            RemoteError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn wire_issue_deserializes_and_filters_pull_requests() {
        let json = r#"[
            {
                "number": 7,
                "title": "Broken search",
                "body": "details",
                "state": "open",
                "labels": [{"name": "bug", "color": "f29513", "description": null}],
                "created_at": "2024-03-01T10:00:00Z",
                "updated_at": "2024-03-02T10:00:00Z"
            },
            {
                "number": 8,
                "title": "A pull request",
                "body": null,
                "state": "open",
                "labels": [],
                "created_at": "2024-03-01T10:00:00Z",
                "updated_at": "2024-03-01T10:00:00Z",
                "pull_request": {"url": "https://example.invalid/pr/8"}
            }
        ]"#;
        let wire: Vec<WireIssue> = serde_json::from_str(json).unwrap();
        let issues: Vec<Issue> = wire
            .into_iter()
            .filter(|w| w.pull_request.is_none())
            .map(WireIssue::into_issue)
            .collect();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 7);
        assert_eq!(issues[0].state, IssueState::Open);
        assert_eq!(issues[0].labels[0].name, "bug");
        assert_eq!(
            issues[0].github_created_at,
            "2024-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = IssuePatch {
            title: Some("new title".into()),
            body: None,
            labels: None,
        };
        let json = serde_json::to_value(WirePatch::from(&patch)).unwrap();
        assert_eq!(json, serde_json::json!({"title": "new title"}));
    }
}
