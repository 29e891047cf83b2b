//! Error types for the plan API
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == App Error Enum ==
/// Unified error type for the cache and its request handlers.
///
/// `Clone` so that one loader failure can be handed to every caller waiting
/// on the same in-flight read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Row or route target does not exist
    #[error("{0}")]
    NotFound(String),

    /// Missing required field, empty update, malformed input
    #[error("{0}")]
    InvalidRequest(String),

    /// Invalid cache construction parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reported by the row backend
    #[error("Database operation failed: {0}")]
    Backend(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidConfig(_) | AppError::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
pub type Result<T> = std::result::Result<T, AppError>;
