//! HTTP routes for the MultiTool server
//!
//! - `/api/image/*`: resize, crop, rotate, enhance, background removal,
//!   format conversion and output file info
//! - `/api/pdf/*`: split, merge, rearrange, convert-to-PDF, text extraction
//! - `/api/video/*`: reserved, always 501
//! - `/output/*`: processed files

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use multitool_core::{ProcessingResult, ToolError};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::error::ApiError;
use crate::AppState;

pub mod imaging;
pub mod pdf;
pub mod video;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handle_health))
        .nest("/api/image", imaging::routes())
        .nest("/api/pdf", pdf::routes())
        .nest("/api/video", video::routes())
        .nest_service("/output", ServeDir::new(&state.config.output_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .with_state(state)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
}

/// Handler: GET /api/health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "MultiTool API is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// 200 with the envelope on success, 500 with the envelope otherwise.
pub(crate) fn envelope(result: ProcessingResult) -> Response {
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(result)).into_response()
}

/// Run a tool on the blocking pool and wrap its result.
///
/// `job` returns `Err` only when the tool cannot be constructed; processing
/// failures arrive as an unsuccessful [`ProcessingResult`].
pub(crate) async fn run_tool<F>(job: F) -> Result<Response, ApiError>
where
    F: FnOnce() -> Result<ProcessingResult, ToolError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(job)
        .await
        .context("Processing task failed")??;
    Ok(envelope(result))
}
