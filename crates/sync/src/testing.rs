//! Test doubles for the remote tier.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};

use gitmemo_core::{Issue, IssueState, Label};
use gitmemo_github::{IssuePatch, NewIssue, NewLabel, RemoteError, RemoteSource};

/// Scriptable [`RemoteSource`] that counts calls and records the `since`
/// cursor it was handed, so tests can assert the tiered-lookup contract
/// ("a warm cache means zero remote calls").
#[derive(Default)]
pub struct MockRemote {
    issues: Mutex<Vec<Issue>>,
    labels: Mutex<Vec<Label>>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    label_calls: AtomicUsize,
    last_since: Mutex<Option<Option<DateTime<Utc>>>>,
    next_list_failure: Mutex<Option<String>>,
}

impl MockRemote {
    pub fn with_issues(issues: Vec<Issue>) -> Self {
        Self {
            issues: Mutex::new(issues),
            ..Default::default()
        }
    }

    pub fn set_labels(&self, labels: Vec<Label>) {
        *self.labels.lock().unwrap() = labels;
    }

    /// Make the next `list_issues` call fail with a network error.
    pub fn fail_next_list(&self, message: &str) {
        *self.next_list_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn label_calls(&self) -> usize {
        self.label_calls.load(Ordering::SeqCst)
    }

    /// The `since` cursor of the most recent `list_issues` call:
    /// `None` = never called, `Some(None)` = full, `Some(Some(_))` = incremental.
    pub fn last_since(&self) -> Option<Option<DateTime<Utc>>> {
        *self.last_since.lock().unwrap()
    }
}

impl RemoteSource for MockRemote {
    async fn list_issues(
        &self,
        _owner: &str,
        _repo: &str,
        _page: u32,
        _per_page: u32,
        labels: &[String],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Issue>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_since.lock().unwrap() = Some(since);

        if let Some(message) = self.next_list_failure.lock().unwrap().take() {
            return Err(RemoteError::Network(message));
        }

        let issues = self.issues.lock().unwrap().clone();
        if labels.is_empty() {
            return Ok(issues);
        }
        Ok(issues
            .into_iter()
            .filter(|issue| {
                labels
                    .iter()
                    .all(|want| issue.labels.iter().any(|l| &l.name == want))
            })
            .collect())
    }

    async fn get_issue(
        &self,
        _owner: &str,
        _repo: &str,
        number: i64,
    ) -> Result<Issue, RemoteError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.issues
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.number == number)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("issue #{number}")))
    }

    async fn create_issue(
        &self,
        _owner: &str,
        _repo: &str,
        new: &NewIssue,
    ) -> Result<Issue, RemoteError> {
        let mut issues = self.issues.lock().unwrap();
        let number = issues.iter().map(|i| i.number).max().unwrap_or(0) + 1;
        let mut issue = sample_issue(number, &new.title);
        issue.body = new.body.clone();
        issue.labels = new.labels.iter().map(|n| sample_label(n)).collect();
        issues.push(issue.clone());
        Ok(issue)
    }

    async fn update_issue(
        &self,
        _owner: &str,
        _repo: &str,
        number: i64,
        patch: &IssuePatch,
    ) -> Result<Issue, RemoteError> {
        let mut issues = self.issues.lock().unwrap();
        let issue = issues
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or_else(|| RemoteError::NotFound(format!("issue #{number}")))?;
        if let Some(title) = &patch.title {
            issue.title = title.clone();
        }
        if let Some(body) = &patch.body {
            issue.body = Some(body.clone());
        }
        if let Some(labels) = &patch.labels {
            issue.labels = labels.iter().map(|n| sample_label(n)).collect();
        }
        Ok(issue.clone())
    }

    async fn list_labels(&self, _owner: &str, _repo: &str) -> Result<Vec<Label>, RemoteError> {
        self.label_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn create_label(
        &self,
        _owner: &str,
        _repo: &str,
        new: &NewLabel,
    ) -> Result<Label, RemoteError> {
        let label = Label {
            name: new.name.clone(),
            color: new.color.clone(),
            description: new.description.clone(),
        };
        self.labels.lock().unwrap().push(label.clone());
        Ok(label)
    }
}

/// An upstream-shaped issue fixture. Mirror timestamps are transient; the
/// store assigns authoritative ones on upsert.
pub fn sample_issue(number: i64, title: &str) -> Issue {
    let at = Utc
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(number);
    Issue {
        number,
        title: title.to_string(),
        body: Some(format!("memo body {number}")),
        state: IssueState::Open,
        labels: Vec::new(),
        github_created_at: at,
        created_at: at,
        updated_at: at,
    }
}

pub fn sample_label(name: &str) -> Label {
    Label {
        name: name.to_string(),
        color: "f29513".to_string(),
        description: Some(format!("{name} label")),
    }
}
