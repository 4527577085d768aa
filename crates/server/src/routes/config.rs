use axum::{Json, extract::State};

use gitmemo_core::ClientConfig;
use gitmemo_sync::{EnvOverrides, resolve_config};

use crate::AppState;
use crate::error::ApiErr;

/// GET /api/config — client-facing configuration.
///
/// Resolution runs on every read so a store-sourced token is resealed each
/// time; the response itself carries no token field at all.
pub async fn get_config(State(state): State<AppState>) -> Result<Json<ClientConfig>, ApiErr> {
    let config = resolve_config(
        &state.svc.store,
        &state.config.secret_key,
        &EnvOverrides::from_env(),
    )?;
    Ok(Json(config.client_view()))
}
