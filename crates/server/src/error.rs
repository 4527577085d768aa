use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use gitmemo_github::RemoteError;
use gitmemo_sync::SyncError;

/// Unified API error type.
///
/// Produces `{"error": "<message>"}` JSON responses. Callers always receive
/// either a well-formed success payload or one of these, never a partial
/// result.
pub struct ApiErr {
    status: StatusCode,
    message: String,
}

impl ApiErr {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.into(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<SyncError> for ApiErr {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Config(msg) => Self::bad_request(msg),
            SyncError::Store(err) => {
                tracing::error!("store error: {err:#}");
                Self::internal("internal server error")
            }
            SyncError::Remote(RemoteError::Auth(msg)) => Self::unauthorized(msg),
            SyncError::Remote(RemoteError::NotFound(msg)) => Self::not_found(msg),
            SyncError::Remote(err) => {
                tracing::error!("remote error: {err}");
                Self::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}
