use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use wi_domain::Error as DomainError;

/// Errors surfaced to HTTP and WebSocket-upgrade callers.
///
/// Resolution failures abort only the interaction that hit them; the
/// store is never left half-updated.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] DomainError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Session(DomainError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Session(DomainError::VariantMismatch { .. }) => StatusCode::CONFLICT,
            Self::Session(DomainError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
