//! API error types and the uniform response envelope.
//!
//! Every error renders as `{"success": false, "error": ..., "hint": ...}`
//! so agent clients can branch on one shape.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("quota exceeded, retry after {retry_after_secs}s")]
    QuotaExceeded { retry_after_secs: u64 },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] pavilion_metadata::MetadataError),

    #[error("core error: {0}")]
    Core(#[from] pavilion_core::Error),

    #[error("catalog error: {0}")]
    Catalog(#[from] pavilion_catalog::CatalogError),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Metadata(e) => match e {
                pavilion_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                pavilion_metadata::MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
                pavilion_metadata::MetadataError::Constraint(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(_) => StatusCode::BAD_REQUEST,
            Self::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A short, actionable hint for well-behaved clients.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Unauthorized(_) => Some("provide a valid bearer API key"),
            Self::QuotaExceeded { .. } => {
                Some("rate limited; back off until the current window resets")
            }
            Self::Forbidden(_) => Some("this key lacks the required scope"),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });
        if let Some(hint) = self.hint() {
            body["hint"] = serde_json::Value::String(hint.to_string());
        }

        if let Self::QuotaExceeded { retry_after_secs } = &self {
            return (
                status,
                [("Retry-After", retry_after_secs.to_string())],
                Json(body),
            )
                .into_response();
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
