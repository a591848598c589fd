//! API error type with HTTP status code mapping.
//!
//! [`ApiError`] implements `axum::response::IntoResponse`; non-2xx bodies
//! carry `{"detail": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use preflight_store::StoreError;

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity not found (404).
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400).
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error (500).
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "detail": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::IndexOutOfRange { .. } => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
