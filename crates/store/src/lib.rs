//! SQLite persisted mirror of issues, labels, and sync history.
//!
//! The store is the durable owner of the mirrored data: the cache tier in
//! front of it is disposable, and the remote source behind it is only
//! consulted when a sync pass decides the mirror is stale. Every write is an
//! upsert keyed by the natural key (`(owner, repo, issue_number)` for issues,
//! `(owner, repo, name)` for labels) so overlapping syncs converge instead of
//! corrupting rows.
//!
//! Thread-safe: wraps the connection in a Mutex so it can be shared via
//! `Arc<Store>`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use gitmemo_core::{
    Issue, IssuePage, IssueState, Label, RepoConfig, SyncRecord, SyncState, SyncStatus, SyncType,
};

/// At most this many sync-history rows are retained per `(owner, repo)`.
pub const SYNC_HISTORY_RETAIN: usize = 20;

/// Durable mirror over SQLite.
pub struct Store {
    conn: Mutex<Connection>,
}

/// Raw issue row before labels are attached and timestamps parsed.
struct IssueRow {
    number: i64,
    title: String,
    body: Option<String>,
    state: String,
    labels: String,
    github_created_at: String,
    created_at: String,
    updated_at: String,
}

impl Store {
    /// Open (or create) the mirror database at `path`.
    pub fn open_path(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir for {}", path.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open db {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database. Intended for tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    // ── Issues ─────────────────────────────────────────────────────────

    pub fn upsert_issue(&self, owner: &str, repo: &str, issue: &Issue) -> Result<()> {
        self.upsert_issues(owner, repo, std::slice::from_ref(issue))?;
        Ok(())
    }

    /// Batch upsert keyed on `(owner, repo, issue_number)`.
    ///
    /// Invariant: `created_at` is set on first insert and never overwritten.
    /// The batch runs as one existence-check query (collecting the original
    /// `created_at` per conflicting row) followed by one multi-row
    /// `INSERT .. ON CONFLICT DO UPDATE`, so round-trips stay constant in the
    /// batch size. The update set deliberately excludes `created_at`.
    pub fn upsert_issues(&self, owner: &str, repo: &str, issues: &[Issue]) -> Result<usize> {
        if issues.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let conn = self.conn();

        // Step 1: one lookup for the original created_at of every existing row.
        let placeholders = vec!["?"; issues.len()].join(",");
        let sql = format!(
            "SELECT issue_number, created_at FROM issues \
             WHERE owner = ?1 AND repo = ?2 AND issue_number IN ({placeholders})"
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(owner.to_string()), Box::new(repo.to_string())];
        for issue in issues {
            param_values.push(Box::new(issue.number));
        }
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let existing: HashMap<i64, String> = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);

        // Step 2: one multi-row upsert carrying the found created_at forward.
        let row_placeholders = vec!["(?,?,?,?,?,?,?,?,?,?)"; issues.len()].join(",");
        let sql = format!(
            "INSERT INTO issues \
             (owner, repo, issue_number, title, body, state, labels, \
              github_created_at, created_at, updated_at) \
             VALUES {row_placeholders} \
             ON CONFLICT(owner, repo, issue_number) DO UPDATE SET \
              title=excluded.title, body=excluded.body, state=excluded.state, \
              labels=excluded.labels, \
              github_created_at=excluded.github_created_at, \
              updated_at=excluded.updated_at"
        );

        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            Vec::with_capacity(issues.len() * 10);
        for issue in issues {
            let labels_json = serde_json::to_string(&issue.label_names())?;
            let created_at = existing
                .get(&issue.number)
                .cloned()
                .unwrap_or_else(|| now.clone());
            param_values.push(Box::new(owner.to_string()));
            param_values.push(Box::new(repo.to_string()));
            param_values.push(Box::new(issue.number));
            param_values.push(Box::new(issue.title.clone()));
            param_values.push(Box::new(issue.body.clone()));
            param_values.push(Box::new(issue.state.as_str().to_string()));
            param_values.push(Box::new(labels_json));
            param_values.push(Box::new(issue.github_created_at.to_rfc3339()));
            param_values.push(Box::new(created_at));
            param_values.push(Box::new(now.clone()));
        }
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        conn.execute(&sql, param_refs.as_slice())
            .context("batch upsert issues")?;

        Ok(issues.len())
    }

    pub fn get_issue(&self, owner: &str, repo: &str, number: i64) -> Result<Option<Issue>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT issue_number, title, body, state, labels, \
                        github_created_at, created_at, updated_at \
                 FROM issues WHERE owner = ?1 AND repo = ?2 AND issue_number = ?3",
                params![owner, repo, number],
                row_to_issue_row,
            )
            .optional()
            .context("query issue")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let label_map = load_label_map(&conn, owner, repo)?;
        Ok(Some(attach_labels(row, &label_map)?))
    }

    /// Paginated listing ordered by `github_created_at` descending.
    ///
    /// `label_filter` is a superset match: a row qualifies only if its label
    /// set contains every requested name. Label names are joined against the
    /// labels table; names with no matching row get a synthetic placeholder
    /// instead of failing the query.
    pub fn get_issues(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
        label_filter: &[String],
    ) -> Result<IssuePage> {
        let conn = self.conn();

        let mut where_clauses = vec!["owner = ?1".to_string(), "repo = ?2".to_string()];
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(owner.to_string()), Box::new(repo.to_string())];
        let mut idx = 3u32;

        for name in label_filter {
            where_clauses.push(format!("labels LIKE ?{idx}"));
            // Label names are stored as a JSON string array, so the quoted
            // form matches whole names only.
            param_values.push(Box::new(format!(
                "%{}%",
                serde_json::to_string(name).expect("string serializes")
            )));
            idx += 1;
        }

        let where_str = where_clauses.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM issues WHERE {where_str}");
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: i64 = conn
            .query_row(&count_sql, param_refs.as_slice(), |row| row.get(0))
            .context("count issues")?;

        let page = page.max(1);
        let sql = format!(
            "SELECT issue_number, title, body, state, labels, \
                    github_created_at, created_at, updated_at \
             FROM issues WHERE {where_str} \
             ORDER BY github_created_at DESC, issue_number DESC \
             LIMIT ?{idx} OFFSET ?{}",
            idx + 1
        );
        param_values.push(Box::new(per_page as i64));
        param_values.push(Box::new(((page - 1) * per_page) as i64));
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<IssueRow> = stmt
            .query_map(param_refs.as_slice(), row_to_issue_row)?
            .collect::<rusqlite::Result<_>>()
            .context("list issues")?;
        drop(stmt);

        let label_map = load_label_map(&conn, owner, repo)?;
        let issues = rows
            .into_iter()
            .map(|row| attach_labels(row, &label_map))
            .collect::<Result<Vec<_>>>()?;

        Ok(IssuePage { issues, total })
    }

    // ── Labels ─────────────────────────────────────────────────────────

    /// Upsert keyed on `(owner, repo, name)`; color and description are
    /// always overwritten.
    pub fn upsert_label(&self, owner: &str, repo: &str, label: &Label) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO labels (owner, repo, name, color, description, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) \
             ON CONFLICT(owner, repo, name) DO UPDATE SET \
              color=excluded.color, description=excluded.description, \
              updated_at=excluded.updated_at",
            params![owner, repo, &label.name, &label.color, &label.description, &now],
        )?;
        Ok(())
    }

    pub fn upsert_labels(&self, owner: &str, repo: &str, labels: &[Label]) -> Result<usize> {
        for label in labels {
            self.upsert_label(owner, repo, label)?;
        }
        Ok(labels.len())
    }

    pub fn get_labels(&self, owner: &str, repo: &str) -> Result<Vec<Label>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, color, description FROM labels \
             WHERE owner = ?1 AND repo = ?2 ORDER BY name ASC",
        )?;
        let labels = stmt
            .query_map(params![owner, repo], |row| {
                Ok(Label {
                    name: row.get(0)?,
                    color: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()
            .context("list labels")?;
        Ok(labels)
    }

    // ── Sync history ───────────────────────────────────────────────────

    /// Append a sync record, then prune to the most recent
    /// [`SYNC_HISTORY_RETAIN`] rows for this repo. Pruning failure is logged
    /// but never fails the record write.
    pub fn record_sync(
        &self,
        owner: &str,
        repo: &str,
        status: SyncStatus,
        issues_synced: i64,
        error_message: Option<&str>,
        sync_type: SyncType,
    ) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO sync_history \
             (owner, repo, status, issues_synced, error_message, sync_type, last_sync_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                owner,
                repo,
                status.as_str(),
                issues_synced,
                error_message,
                sync_type.as_str(),
                now.to_rfc3339(),
            ],
        )?;

        if let Err(e) = self.prune_sync_history(owner, repo) {
            tracing::warn!("prune sync history for {owner}/{repo}: {e:#}");
        }

        Ok(now)
    }

    fn prune_sync_history(&self, owner: &str, repo: &str) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM sync_history \
             WHERE owner = ?1 AND repo = ?2 AND id NOT IN ( \
                SELECT id FROM sync_history WHERE owner = ?1 AND repo = ?2 \
                ORDER BY last_sync_at DESC, id DESC LIMIT ?3)",
            params![owner, repo, SYNC_HISTORY_RETAIN as i64],
        )?;
        Ok(deleted)
    }

    /// Current sync state from the single most recent record.
    ///
    /// `needs_sync` is true when no record exists or the latest attempt
    /// failed; a recorded success, even one that synced zero issues, means
    /// the mirror is considered current.
    pub fn check_sync_status(&self, owner: &str, repo: &str) -> Result<SyncState> {
        let row = self
            .conn()
            .query_row(
                "SELECT status, issues_synced, last_sync_at FROM sync_history \
                 WHERE owner = ?1 AND repo = ?2 \
                 ORDER BY last_sync_at DESC, id DESC LIMIT 1",
                params![owner, repo],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .context("query sync status")?;

        let Some((status, issues_synced, last_sync_at)) = row else {
            return Ok(SyncState {
                needs_sync: true,
                last_sync_at: None,
                status: None,
                issues_synced: None,
            });
        };

        let status = SyncStatus::parse(&status);
        Ok(SyncState {
            needs_sync: status == SyncStatus::Failed,
            last_sync_at: Some(parse_rfc3339(&last_sync_at)?),
            status: Some(status),
            issues_synced: Some(issues_synced),
        })
    }

    /// Full retained history for a repo, most recent first.
    pub fn sync_history(&self, owner: &str, repo: &str) -> Result<Vec<SyncRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT owner, repo, status, issues_synced, error_message, sync_type, last_sync_at \
             FROM sync_history WHERE owner = ?1 AND repo = ?2 \
             ORDER BY last_sync_at DESC, id DESC",
        )?;
        let raw: Vec<(String, String, String, i64, Option<String>, String, String)> = stmt
            .query_map(params![owner, repo], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<rusqlite::Result<_>>()
            .context("list sync history")?;

        raw.into_iter()
            .map(|(owner, repo, status, issues_synced, error_message, sync_type, at)| {
                Ok(SyncRecord {
                    owner,
                    repo,
                    status: SyncStatus::parse(&status),
                    issues_synced,
                    error_message,
                    sync_type: SyncType::parse(&sync_type),
                    last_sync_at: parse_rfc3339(&at)?,
                })
            })
            .collect()
    }

    // ── Repo config ────────────────────────────────────────────────────

    pub fn get_config(&self, owner: &str, repo: &str) -> Result<Option<RepoConfig>> {
        let row = self
            .conn()
            .query_row(
                "SELECT owner, repo, issues_per_page, token_cipher FROM repo_config \
                 WHERE owner = ?1 AND repo = ?2",
                params![owner, repo],
                |row| {
                    Ok(RepoConfig {
                        owner: row.get(0)?,
                        repo: row.get(1)?,
                        issues_per_page: row.get::<_, i64>(2)? as u32,
                        token: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("query repo config")?;
        Ok(row)
    }

    /// The most recently updated config row, if any. Used when no
    /// environment override names a repository.
    pub fn get_default_config(&self) -> Result<Option<RepoConfig>> {
        let row = self
            .conn()
            .query_row(
                "SELECT owner, repo, issues_per_page, token_cipher FROM repo_config \
                 ORDER BY updated_at DESC LIMIT 1",
                [],
                |row| {
                    Ok(RepoConfig {
                        owner: row.get(0)?,
                        repo: row.get(1)?,
                        issues_per_page: row.get::<_, i64>(2)? as u32,
                        token: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("query default repo config")?;
        Ok(row)
    }

    /// Persist the config row. The token must already be sealed by the
    /// caller; the store never sees plaintext credentials.
    pub fn save_config(&self, config: &RepoConfig) -> Result<()> {
        self.conn().execute(
            "INSERT INTO repo_config (owner, repo, issues_per_page, token_cipher, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(owner, repo) DO UPDATE SET \
              issues_per_page=excluded.issues_per_page, \
              token_cipher=excluded.token_cipher, \
              updated_at=excluded.updated_at",
            params![
                &config.owner,
                &config.repo,
                config.issues_per_page as i64,
                &config.token,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

// ── Row conversion ─────────────────────────────────────────────────────

fn row_to_issue_row(row: &rusqlite::Row) -> rusqlite::Result<IssueRow> {
    Ok(IssueRow {
        number: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        state: row.get(3)?,
        labels: row.get(4)?,
        github_created_at: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn attach_labels(row: IssueRow, label_map: &HashMap<String, Label>) -> Result<Issue> {
    let names: Vec<String> =
        serde_json::from_str(&row.labels).context("parse stored label names")?;
    let labels = names
        .iter()
        .map(|name| {
            label_map
                .get(name)
                .cloned()
                .unwrap_or_else(|| Label::placeholder(name))
        })
        .collect();

    Ok(Issue {
        number: row.number,
        title: row.title,
        body: row.body,
        state: IssueState::parse(&row.state),
        labels,
        github_created_at: parse_rfc3339(&row.github_created_at)?,
        created_at: parse_rfc3339(&row.created_at)?,
        updated_at: parse_rfc3339(&row.updated_at)?,
    })
}

fn load_label_map(conn: &Connection, owner: &str, repo: &str) -> Result<HashMap<String, Label>> {
    let mut stmt = conn.prepare(
        "SELECT name, color, description FROM labels WHERE owner = ?1 AND repo = ?2",
    )?;
    let labels: Vec<Label> = stmt
        .query_map(params![owner, repo], |row| {
            Ok(Label {
                name: row.get(0)?,
                color: row.get(1)?,
                description: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()
        .context("load label map")?;
    Ok(labels.into_iter().map(|l| (l.name.clone(), l)).collect())
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("parse timestamp {s:?}"))?
        .with_timezone(&Utc))
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let migrations = vec![("0001_init", include_str!("../migrations/0001_init.sql"))];

    for (name, sql) in migrations {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_store() -> Store {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.keep().join("test.db");
        Store::open_path(&path).unwrap()
    }

    fn issue(number: i64, title: &str, label_names: &[&str]) -> Issue {
        let at = Utc.with_ymd_and_hms(2024, 1, number as u32, 0, 0, 0).unwrap();
        Issue {
            number,
            title: title.to_string(),
            body: Some(format!("body {number}")),
            state: IssueState::Open,
            labels: label_names
                .iter()
                .map(|n| Label {
                    name: n.to_string(),
                    color: "f29513".to_string(),
                    description: None,
                })
                .collect(),
            github_created_at: at,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn open_and_schema() {
        let _store = test_store();
    }

    #[test]
    fn upsert_preserves_created_at() {
        let store = test_store();
        store.upsert_issue("octo", "memos", &issue(1, "first", &[])).unwrap();
        let original = store.get_issue("octo", "memos", 1).unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));

        let mut changed = issue(1, "first (edited)", &[]);
        changed.state = IssueState::Closed;
        store.upsert_issue("octo", "memos", &changed).unwrap();

        let after = store.get_issue("octo", "memos", 1).unwrap().unwrap();
        assert_eq!(after.title, "first (edited)");
        assert_eq!(after.state, IssueState::Closed);
        assert_eq!(after.created_at, original.created_at);
        assert!(after.updated_at >= original.updated_at);

        // Still exactly one row.
        let page = store.get_issues("octo", "memos", 1, 50, &[]).unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn identical_reupsert_is_idempotent() {
        let store = test_store();
        let i = issue(3, "same", &["bug"]);
        store.upsert_issue("octo", "memos", &i).unwrap();
        let first = store.get_issue("octo", "memos", 3).unwrap().unwrap();

        store.upsert_issue("octo", "memos", &i).unwrap();
        let second = store.get_issue("octo", "memos", 3).unwrap().unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(store.get_issues("octo", "memos", 1, 50, &[]).unwrap().total, 1);
    }

    #[test]
    fn batch_upsert_mixes_new_and_existing() {
        let store = test_store();
        store.upsert_issue("octo", "memos", &issue(1, "one", &[])).unwrap();
        let original = store.get_issue("octo", "memos", 1).unwrap().unwrap();

        let batch = vec![issue(1, "one (renamed)", &[]), issue(2, "two", &[])];
        let written = store.upsert_issues("octo", "memos", &batch).unwrap();
        assert_eq!(written, 2);

        let one = store.get_issue("octo", "memos", 1).unwrap().unwrap();
        assert_eq!(one.title, "one (renamed)");
        assert_eq!(one.created_at, original.created_at);
        assert!(store.get_issue("octo", "memos", 2).unwrap().is_some());
    }

    #[test]
    fn issues_are_scoped_by_owner_and_repo() {
        let store = test_store();
        store.upsert_issue("octo", "memos", &issue(1, "a", &[])).unwrap();
        store.upsert_issue("octo", "other", &issue(1, "b", &[])).unwrap();

        assert_eq!(
            store.get_issue("octo", "memos", 1).unwrap().unwrap().title,
            "a"
        );
        assert_eq!(
            store.get_issue("octo", "other", 1).unwrap().unwrap().title,
            "b"
        );
    }

    #[test]
    fn listing_orders_by_github_created_at_desc_and_paginates() {
        let store = test_store();
        let batch: Vec<Issue> = (1..=5).map(|n| issue(n, &format!("i{n}"), &[])).collect();
        store.upsert_issues("octo", "memos", &batch).unwrap();

        let page1 = store.get_issues("octo", "memos", 1, 2, &[]).unwrap();
        assert_eq!(page1.total, 5);
        let numbers: Vec<i64> = page1.issues.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![5, 4]);

        let page3 = store.get_issues("octo", "memos", 3, 2, &[]).unwrap();
        let numbers: Vec<i64> = page3.issues.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1]);
    }

    #[test]
    fn label_filter_is_a_superset_match() {
        let store = test_store();
        store.upsert_issue("octo", "memos", &issue(1, "both", &["bug", "ui"])).unwrap();
        store.upsert_issue("octo", "memos", &issue(2, "bug only", &["bug"])).unwrap();
        store.upsert_issue("octo", "memos", &issue(3, "neither", &[])).unwrap();

        let filter = vec!["bug".to_string(), "ui".to_string()];
        let page = store.get_issues("octo", "memos", 1, 50, &filter).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.issues[0].number, 1);

        let filter = vec!["bug".to_string()];
        let page = store.get_issues("octo", "memos", 1, 50, &filter).unwrap();
        assert_eq!(page.total, 2);
    }

    #[test]
    fn unknown_label_names_get_placeholders() {
        let store = test_store();
        store.upsert_issue("octo", "memos", &issue(1, "x", &["known", "ghost"])).unwrap();
        store
            .upsert_label(
                "octo",
                "memos",
                &Label {
                    name: "known".to_string(),
                    color: "ff0000".to_string(),
                    description: Some("a real label".to_string()),
                },
            )
            .unwrap();

        let got = store.get_issue("octo", "memos", 1).unwrap().unwrap();
        assert_eq!(got.labels.len(), 2);
        assert_eq!(got.labels[0].color, "ff0000");
        assert_eq!(got.labels[1].name, "ghost");
        assert_eq!(got.labels[1].color, gitmemo_core::PLACEHOLDER_LABEL_COLOR);
        assert!(got.labels[1].description.is_none());
    }

    #[test]
    fn label_upsert_overwrites_color_and_description() {
        let store = test_store();
        let mut label = Label {
            name: "bug".to_string(),
            color: "f29513".to_string(),
            description: None,
        };
        store.upsert_label("octo", "memos", &label).unwrap();

        label.color = "00ff00".to_string();
        label.description = Some("something broken".to_string());
        store.upsert_label("octo", "memos", &label).unwrap();

        let labels = store.get_labels("octo", "memos").unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].color, "00ff00");
        assert_eq!(labels[0].description.as_deref(), Some("something broken"));
    }

    #[test]
    fn labels_list_is_ordered_by_name() {
        let store = test_store();
        for name in ["zeta", "alpha", "mid"] {
            store
                .upsert_label(
                    "octo",
                    "memos",
                    &Label {
                        name: name.to_string(),
                        color: "cccccc".to_string(),
                        description: None,
                    },
                )
                .unwrap();
        }
        let names: Vec<String> = store
            .get_labels("octo", "memos")
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn sync_status_reflects_latest_record() {
        let store = test_store();

        let state = store.check_sync_status("octo", "memos").unwrap();
        assert!(state.needs_sync);
        assert!(state.last_sync_at.is_none());

        store
            .record_sync("octo", "memos", SyncStatus::Success, 3, None, SyncType::Full)
            .unwrap();
        let state = store.check_sync_status("octo", "memos").unwrap();
        assert!(!state.needs_sync);
        assert_eq!(state.issues_synced, Some(3));

        store
            .record_sync(
                "octo",
                "memos",
                SyncStatus::Failed,
                0,
                Some("rate limited"),
                SyncType::Add,
            )
            .unwrap();
        let state = store.check_sync_status("octo", "memos").unwrap();
        assert!(state.needs_sync);
        assert_eq!(state.status, Some(SyncStatus::Failed));
    }

    #[test]
    fn sync_history_retains_twenty_most_recent() {
        let store = test_store();
        for n in 0..25 {
            store
                .record_sync(
                    "octo",
                    "memos",
                    SyncStatus::Success,
                    n,
                    None,
                    SyncType::Add,
                )
                .unwrap();
        }

        let history = store.sync_history("octo", "memos").unwrap();
        assert_eq!(history.len(), SYNC_HISTORY_RETAIN);
        // Most recent first: counts 24 down to 5.
        assert_eq!(history.first().unwrap().issues_synced, 24);
        assert_eq!(history.last().unwrap().issues_synced, 5);
    }

    #[test]
    fn sync_history_retention_is_per_repo() {
        let store = test_store();
        for n in 0..22 {
            store
                .record_sync("octo", "memos", SyncStatus::Success, n, None, SyncType::Add)
                .unwrap();
        }
        store
            .record_sync("octo", "other", SyncStatus::Success, 99, None, SyncType::Full)
            .unwrap();

        assert_eq!(store.sync_history("octo", "memos").unwrap().len(), 20);
        assert_eq!(store.sync_history("octo", "other").unwrap().len(), 1);
    }

    #[test]
    fn config_round_trips_without_plaintext_expectations() {
        let store = test_store();
        assert!(store.get_config("octo", "memos").unwrap().is_none());

        let config = RepoConfig {
            owner: "octo".to_string(),
            repo: "memos".to_string(),
            issues_per_page: 25,
            token: Some("enc:v1:deadbeef".to_string()),
        };
        store.save_config(&config).unwrap();

        let got = store.get_config("octo", "memos").unwrap().unwrap();
        assert_eq!(got.issues_per_page, 25);
        assert_eq!(got.token.as_deref(), Some("enc:v1:deadbeef"));

        // Upsert replaces the row.
        let config = RepoConfig {
            issues_per_page: 50,
            ..config
        };
        store.save_config(&config).unwrap();
        let got = store.get_config("octo", "memos").unwrap().unwrap();
        assert_eq!(got.issues_per_page, 50);
    }
}
