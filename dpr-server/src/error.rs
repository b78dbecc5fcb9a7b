//! Error types for dpr-server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;
use crate::store::StoreError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Graph store failure (502)
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Saved items could not be written (500)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Engine error
    #[error(transparent)]
    Engine(#[from] dpr_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use dpr_common::Error as E;

        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Backend(ref err) => (StatusCode::BAD_GATEWAY, "BACKEND_ERROR", err.to_string()),
            ApiError::Store(ref err) => {
                tracing::error!("Saved items store failed: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", err.to_string())
            }
            ApiError::Engine(err) => match err {
                E::MalformedTree(ref detail) => {
                    tracing::error!("Malformed taxonomy: {}", detail);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "MALFORMED_TREE",
                        "Cannot load classification".to_string(),
                    )
                }
                E::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION", err.to_string())
                }
                E::UnknownNode(_) => (StatusCode::NOT_FOUND, "UNKNOWN_NODE", err.to_string()),
                E::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string()),
                E::IncompleteAnswer(_) => {
                    tracing::error!("Engine invariant violated: {}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
                }
                E::Config(_) | E::Io(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
                }
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
