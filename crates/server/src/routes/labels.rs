use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use gitmemo_core::Label;
use gitmemo_github::NewLabel;

use crate::AppState;
use crate::error::ApiErr;
use crate::routes::auth::Capability;

/// GET /api/labels — all labels for the mirrored repo, ordered by name.
pub async fn list_labels(State(state): State<AppState>) -> Result<Json<Vec<Label>>, ApiErr> {
    let labels = state
        .svc
        .reconciler
        .list_labels(&state.svc.owner, &state.svc.repo)
        .await?;
    Ok(Json(labels))
}

#[derive(Debug, Deserialize)]
pub struct CreateLabelRequest {
    pub name: String,
    pub color: String,
    pub description: Option<String>,
}

/// POST /api/labels — create upstream, then mirror (capability required).
pub async fn create_label(
    State(state): State<AppState>,
    _cap: Capability,
    Json(req): Json<CreateLabelRequest>,
) -> Result<(StatusCode, Json<Label>), ApiErr> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiErr::bad_request("label name must not be empty"));
    }
    let color = req.color.trim_start_matches('#').to_lowercase();
    if color.len() != 6 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiErr::bad_request("color must be a 6-digit hex string"));
    }

    let new = NewLabel {
        name,
        color,
        description: req.description,
    };
    let label = state
        .svc
        .reconciler
        .create_label(&state.svc.owner, &state.svc.repo, &new)
        .await?;
    Ok((StatusCode::CREATED, Json(label)))
}
