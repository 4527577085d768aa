use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gitmemo_cache::{CacheOptions, ISSUES_TTL_MS, LABELS_TTL_MS, MemoryCache, keys};
use gitmemo_core::{Issue, IssuePage, Label, SyncOutcome, SyncState, SyncStatus, SyncType};
use gitmemo_github::{IssuePatch, NewIssue, NewLabel, RemoteSource};
use gitmemo_store::Store;

use crate::SyncError;

/// Parameters of one issue-listing request.
#[derive(Debug, Clone, Default)]
pub struct IssueListRequest {
    pub page: u32,
    pub labels: Vec<String>,
    pub force_full_sync: bool,
}

/// Listing response: the issues plus the outcome of the sync pass that
/// produced or revalidated them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueListResponse {
    pub issues: Vec<Issue>,
    pub total: i64,
    pub sync_status: Option<SyncOutcome>,
}

/// The reconciliation engine.
///
/// Per listing request the state machine is: check sync status → decide
/// mode → (incremental only) try cache, try store → fetch remote → persist
/// → respond. Writes land store-first, then cache, then the sync record; if
/// the process dies mid-sequence the disposable cache is never ahead of the
/// durable store, and a fresh sync record guarantees the corresponding rows
/// are already durable.
///
/// There is no per-repo lock: overlapping reconciliations for the same
/// `(owner, repo)` converge because every write is an idempotent upsert by
/// natural key.
pub struct Reconciler<R: RemoteSource> {
    store: Arc<Store>,
    cache: Arc<MemoryCache>,
    remote: R,
    issues_per_page: u32,
}

impl<R: RemoteSource> Reconciler<R> {
    pub fn new(store: Arc<Store>, cache: Arc<MemoryCache>, remote: R, issues_per_page: u32) -> Self {
        Self {
            store,
            cache,
            remote,
            issues_per_page,
        }
    }

    // ── Issue listing ──────────────────────────────────────────────────

    pub async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        req: &IssueListRequest,
    ) -> Result<IssueListResponse, SyncError> {
        let state = self
            .store
            .check_sync_status(owner, repo)
            .map_err(SyncError::Store)?;
        let is_full = req.force_full_sync || state.last_sync_at.is_none();
        let sync_type = if is_full { SyncType::Full } else { SyncType::Add };

        match self
            .drive_listing(owner, repo, req, &state, is_full, sync_type)
            .await
        {
            Ok(resp) => Ok(resp),
            Err(e) => {
                // Best-effort failure record; the original error always wins.
                let message = e.to_string();
                if let Err(rec) = self.store.record_sync(
                    owner,
                    repo,
                    SyncStatus::Failed,
                    0,
                    Some(&message),
                    sync_type,
                ) {
                    warn!("record failed sync for {owner}/{repo}: {rec:#}");
                }
                Err(e)
            }
        }
    }

    async fn drive_listing(
        &self,
        owner: &str,
        repo: &str,
        req: &IssueListRequest,
        state: &SyncState,
        is_full: bool,
        sync_type: SyncType,
    ) -> Result<IssueListResponse, SyncError> {
        let page = req.page.max(1);
        let key = keys::issue_list(owner, repo, page, &req.labels);

        // A clean incremental state may be served locally. A forced sync, a
        // first-ever sync, or a last-known failure goes straight upstream:
        // a stale cache must not win over a known failure.
        if !is_full && !state.needs_sync {
            if let Some(hit) = self.cache.get::<IssuePage>(&key) {
                debug!("cache hit for {key}");
                let at = self.record_checked(owner, repo)?;
                return Ok(respond(hit, zero_outcome(at)));
            }

            let stored = self
                .store
                .get_issues(owner, repo, page, self.issues_per_page, &req.labels)
                .map_err(SyncError::Store)?;
            if !stored.issues.is_empty() {
                self.cache
                    .set(&key, &stored, CacheOptions::with_ttl(ISSUES_TTL_MS));
                let at = self.record_checked(owner, repo)?;
                return Ok(respond(stored, zero_outcome(at)));
            }
        }

        let since = if is_full { None } else { state.last_sync_at };
        let fetched = self
            .remote
            .list_issues(owner, repo, page, self.issues_per_page, &req.labels, since)
            .await?;

        if fetched.is_empty() {
            // Zero upstream changes is a successful sync, not a reason to
            // fall back to a full pass.
            let at = self
                .store
                .record_sync(owner, repo, SyncStatus::Success, 0, None, sync_type)
                .map_err(SyncError::Store)?;
            return Ok(IssueListResponse {
                issues: Vec::new(),
                total: 0,
                sync_status: Some(zero_outcome(at)),
            });
        }

        let count = self
            .store
            .upsert_issues(owner, repo, &fetched)
            .map_err(SyncError::Store)?;
        self.persist_issue_labels(owner, repo, &fetched)?;

        let page_data = IssuePage {
            total: fetched.len() as i64,
            issues: fetched,
        };
        self.cache
            .set(&key, &page_data, CacheOptions::with_ttl(ISSUES_TTL_MS));

        let at = self
            .store
            .record_sync(
                owner,
                repo,
                SyncStatus::Success,
                count as i64,
                None,
                sync_type,
            )
            .map_err(SyncError::Store)?;

        Ok(IssueListResponse {
            issues: page_data.issues,
            total: page_data.total,
            sync_status: Some(SyncOutcome {
                success: true,
                total_synced: count as i64,
                last_sync_at: at,
            }),
        })
    }

    /// Record that a check happened without claiming new data was synced:
    /// keeps the last-checked clock moving on cache/store hits.
    fn record_checked(&self, owner: &str, repo: &str) -> Result<chrono::DateTime<chrono::Utc>, SyncError> {
        self.store
            .record_sync(owner, repo, SyncStatus::Success, 0, None, SyncType::Add)
            .map_err(SyncError::Store)
    }

    // ── Single issue ───────────────────────────────────────────────────

    /// Tiered single-issue fetch: cache → remote → store upsert. There is no
    /// full/incremental distinction for a single resource.
    pub async fn get_issue(&self, owner: &str, repo: &str, number: i64) -> Result<Issue, SyncError> {
        let key = keys::issue(owner, repo, number);
        if let Some(issue) = self.cache.get::<Issue>(&key) {
            return Ok(issue);
        }

        let fetched = self.remote.get_issue(owner, repo, number).await?;
        self.store
            .upsert_issue(owner, repo, &fetched)
            .map_err(SyncError::Store)?;
        self.persist_issue_labels(owner, repo, std::slice::from_ref(&fetched))?;

        // Serve the store's view so mirror timestamps are authoritative.
        let issue = self
            .store
            .get_issue(owner, repo, number)
            .map_err(SyncError::Store)?
            .unwrap_or(fetched);
        self.cache
            .set(&key, &issue, CacheOptions::with_ttl(ISSUES_TTL_MS));
        Ok(issue)
    }

    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        new: &NewIssue,
    ) -> Result<Issue, SyncError> {
        let created = self.remote.create_issue(owner, repo, new).await?;
        self.finish_issue_write(owner, repo, created).await
    }

    pub async fn update_issue(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        patch: &IssuePatch,
    ) -> Result<Issue, SyncError> {
        let updated = self.remote.update_issue(owner, repo, number, patch).await?;
        self.finish_issue_write(owner, repo, updated).await
    }

    /// Persist a remotely written issue and invalidate derived cache state.
    async fn finish_issue_write(
        &self,
        owner: &str,
        repo: &str,
        written: Issue,
    ) -> Result<Issue, SyncError> {
        self.store
            .upsert_issue(owner, repo, &written)
            .map_err(SyncError::Store)?;
        self.persist_issue_labels(owner, repo, std::slice::from_ref(&written))?;

        let issue = self
            .store
            .get_issue(owner, repo, written.number)
            .map_err(SyncError::Store)?
            .unwrap_or(written);

        // Listings are stale now; drop them rather than patching per key.
        self.cache
            .remove_prefix(&keys::issue_list_prefix(owner, repo));
        self.cache.set(
            &keys::issue(owner, repo, issue.number),
            &issue,
            CacheOptions::with_ttl(ISSUES_TTL_MS),
        );
        Ok(issue)
    }

    // ── Labels ─────────────────────────────────────────────────────────

    pub async fn list_labels(&self, owner: &str, repo: &str) -> Result<Vec<Label>, SyncError> {
        let key = keys::labels(owner, repo);
        if let Some(labels) = self.cache.get::<Vec<Label>>(&key) {
            return Ok(labels);
        }

        let stored = self.store.get_labels(owner, repo).map_err(SyncError::Store)?;
        if !stored.is_empty() {
            self.cache
                .set(&key, &stored, CacheOptions::with_ttl(LABELS_TTL_MS));
            return Ok(stored);
        }

        let fetched = self.remote.list_labels(owner, repo).await?;
        self.store
            .upsert_labels(owner, repo, &fetched)
            .map_err(SyncError::Store)?;
        let labels = self.store.get_labels(owner, repo).map_err(SyncError::Store)?;
        self.cache
            .set(&key, &labels, CacheOptions::with_ttl(LABELS_TTL_MS));
        Ok(labels)
    }

    pub async fn create_label(
        &self,
        owner: &str,
        repo: &str,
        new: &NewLabel,
    ) -> Result<Label, SyncError> {
        let created = self.remote.create_label(owner, repo, new).await?;
        self.store
            .upsert_label(owner, repo, &created)
            .map_err(SyncError::Store)?;
        self.cache.remove(&keys::labels(owner, repo));
        Ok(created)
    }

    // ── Internal ───────────────────────────────────────────────────────

    /// Labels arriving attached to fetched issues are folded into the label
    /// table so later joins resolve them without placeholders.
    fn persist_issue_labels(
        &self,
        owner: &str,
        repo: &str,
        issues: &[Issue],
    ) -> Result<(), SyncError> {
        let mut seen = std::collections::HashSet::new();
        let labels: Vec<Label> = issues
            .iter()
            .flat_map(|i| i.labels.iter())
            .filter(|l| seen.insert(l.name.clone()))
            .cloned()
            .collect();
        self.store
            .upsert_labels(owner, repo, &labels)
            .map_err(SyncError::Store)?;
        Ok(())
    }
}

fn respond(page: IssuePage, outcome: SyncOutcome) -> IssueListResponse {
    IssueListResponse {
        issues: page.issues,
        total: page.total,
        sync_status: Some(outcome),
    }
}

fn zero_outcome(at: chrono::DateTime<chrono::Utc>) -> SyncOutcome {
    SyncOutcome {
        success: true,
        total_synced: 0,
        last_sync_at: at,
    }
}
