//! Error types for kiosk-ci HTTP handlers
//!
//! Request-level failures are answered with a plain-text body. Per-item
//! download failures never reach this type; they are reported in-band by the
//! ingestion result.

use crate::services::IngestError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Method other than the one the route accepts (405)
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Storage could not be prepared (500)
    #[error("{0}")]
    Storage(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::InvalidProject(_) => ApiError::BadRequest(err.to_string()),
            IngestError::Storage { .. } => {
                ApiError::Storage("Failed to create project directory".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
