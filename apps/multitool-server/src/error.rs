//! Error types for the MultiTool server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use multitool_core::ToolError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Request-level failures. Processing failures inside a tool never reach
/// this type; they come back as an unsuccessful result envelope instead.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotImplemented(String),

    /// The tool could not be constructed (input vanished or unreadable)
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Internal server error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::NotImplemented(_) => (StatusCode::NOT_IMPLEMENTED, "NOT_IMPLEMENTED"),
            ApiError::Tool(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TOOL_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            error!("{}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code,
        };

        (status, Json(body)).into_response()
    }
}
