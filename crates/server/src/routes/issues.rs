use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use gitmemo_core::Issue;
use gitmemo_github::{IssuePatch, NewIssue};
use gitmemo_sync::{IssueListRequest, IssueListResponse};

use crate::AppState;
use crate::error::ApiErr;
use crate::routes::auth::Capability;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    /// Comma-separated label names; issues must carry all of them.
    pub labels: Option<String>,
    /// `sync=full` forces a full sync regardless of history.
    pub sync: Option<String>,
}

/// GET /api/issues — reconciled listing (cache → store → upstream).
pub async fn list_issues(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<IssueListResponse>, ApiErr> {
    let req = IssueListRequest {
        page: q.page.unwrap_or(1),
        labels: parse_labels(q.labels.as_deref()),
        force_full_sync: q.sync.as_deref() == Some("full"),
    };

    let resp = state
        .svc
        .reconciler
        .list_issues(&state.svc.owner, &state.svc.repo, &req)
        .await?;
    Ok(Json(resp))
}

/// GET /api/issues/{number}
pub async fn get_issue(
    State(state): State<AppState>,
    Path(number): Path<i64>,
) -> Result<Json<Issue>, ApiErr> {
    let issue = state
        .svc
        .reconciler
        .get_issue(&state.svc.owner, &state.svc.repo, number)
        .await?;
    Ok(Json(issue))
}

#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// POST /api/issues — create upstream, then mirror (capability required).
pub async fn create_issue(
    State(state): State<AppState>,
    _cap: Capability,
    Json(req): Json<CreateIssueRequest>,
) -> Result<(StatusCode, Json<Issue>), ApiErr> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiErr::bad_request("title must not be empty"));
    }

    let new = NewIssue {
        title,
        body: req.body,
        labels: req.labels,
    };
    let issue = state
        .svc
        .reconciler
        .create_issue(&state.svc.owner, &state.svc.repo, &new)
        .await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateIssueRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub labels: Option<Vec<String>>,
}

/// PATCH /api/issues/{number} — update upstream, then mirror (capability required).
pub async fn update_issue(
    State(state): State<AppState>,
    _cap: Capability,
    Path(number): Path<i64>,
    Json(req): Json<UpdateIssueRequest>,
) -> Result<Json<Issue>, ApiErr> {
    if req.title.is_none() && req.body.is_none() && req.labels.is_none() {
        return Err(ApiErr::bad_request("nothing to update"));
    }

    let patch = IssuePatch {
        title: req.title,
        body: req.body,
        labels: req.labels,
    };
    let issue = state
        .svc
        .reconciler
        .update_issue(&state.svc.owner, &state.svc.repo, number, &patch)
        .await?;
    Ok(Json(issue))
}

fn parse_labels(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_trims_and_drops_empties() {
        assert_eq!(
            parse_labels(Some("bug, ui,,  idea ")),
            vec!["bug", "ui", "idea"]
        );
        assert!(parse_labels(Some("")).is_empty());
        assert!(parse_labels(None).is_empty());
    }
}
