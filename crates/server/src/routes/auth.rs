use axum::{
    Json,
    extract::{FromRef, FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use gitmemo_core::crypto;

use crate::{AppConfig, AppState};
use crate::error::ApiErr;

// ---------------------------------------------------------------------------
// Capability extractor
// ---------------------------------------------------------------------------

/// Write capability extracted from the `Authorization: Bearer <token>` header.
///
/// The token is the explicit artifact returned by [`verify`]; there is no
/// ambient "verified" flag anywhere. Every write route demands this value.
pub struct Capability;

impl<S> FromRequestParts<S> for Capability
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({"error": "missing or invalid Authorization header"})),
                )
                    .into_response()
            })?;

        match crypto::verify_capability(&config.secret_key, token, now_unix()) {
            Ok(_expires_at) => Ok(Capability),
            Err(e) => Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()),
        }
    }
}

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub token: String,
    pub expires_at: u64,
}

/// POST /api/auth/verify — exchange the admin password for a write capability.
pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiErr> {
    let Some(admin_password) = &state.config.admin_password else {
        return Err(ApiErr::forbidden("write access is not configured"));
    };

    if !crypto::verify_password(admin_password, &req.password) {
        return Err(ApiErr::unauthorized("invalid password"));
    }

    let now = now_unix();
    let token = crypto::issue_capability(&state.config.secret_key, now);
    Ok(Json(VerifyResponse {
        token,
        expires_at: now + crypto::CAPABILITY_EXPIRY_SECS,
    }))
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
