//! Handlers for /api/video. None of these operations exist yet; every
//! route answers 501.

use axum::{routing::post, Router};

use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/download", post(handle_download))
        .route("/extract-audio", post(handle_extract_audio))
        .route("/trim", post(handle_trim))
        .route("/convert-format", post(handle_convert_format))
}

fn coming_soon(feature: &str) -> ApiError {
    ApiError::NotImplemented(format!("{} endpoint - coming soon", feature))
}

/// Handler: POST /api/video/download
pub async fn handle_download() -> ApiError {
    coming_soon("Video download")
}

/// Handler: POST /api/video/extract-audio
pub async fn handle_extract_audio() -> ApiError {
    coming_soon("Audio extraction")
}

/// Handler: POST /api/video/trim
pub async fn handle_trim() -> ApiError {
    coming_soon("Video trimming")
}

/// Handler: POST /api/video/convert-format
pub async fn handle_convert_format() -> ApiError {
    coming_soon("Video format conversion")
}
