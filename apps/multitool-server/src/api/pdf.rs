//! Handlers for /api/pdf

use axum::{
    extract::{Multipart, State},
    response::Response,
    routing::post,
    Router,
};
use multitool_core::pdf::{
    ConvertToPdf, MergeParams, PdfMerger, PdfRearranger, PdfSplitter, PdfTextExtractor,
    RearrangeParams, SplitParams, TextParams,
};
use multitool_core::validation::PDF_EXTENSIONS;
use multitool_core::{Tool, ToolInput};
use serde_json::Value;
use tracing::info;

use super::run_tool;
use crate::error::ApiError;
use crate::upload::{check_extension, output_path, save_upload, UploadForm};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/split", post(handle_split))
        .route("/merge", post(handle_merge))
        .route("/rearrange", post(handle_rearrange))
        .route("/convert-to-pdf", post(handle_convert_to_pdf))
        .route("/extract-text", post(handle_extract_text))
}

/// Parse a JSON array of integers, distinguishing malformed JSON from a
/// well-formed value of the wrong shape.
fn parse_int_array(raw: &str, bad_json: &str, bad_shape: &str) -> Result<Vec<i64>, ApiError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|_| ApiError::Validation(bad_json.to_string()))?;
    value
        .as_array()
        .and_then(|items| items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>())
        .ok_or_else(|| ApiError::Validation(bad_shape.to_string()))
}

/// Handler: POST /api/pdf/split
pub async fn handle_split(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let file = form.file_with_extension("file", PDF_EXTENSIONS)?;
    let params = SplitParams {
        pages: form.text("pages").map(str::to_owned),
    };
    info!("Split {} (pages: {:?})", file.filename, params.pages);

    let upload = save_upload(&state.config.upload_dir, file, "pdf_split_input").await?;
    let output = output_path(&state.config.output_dir, upload.path(), "split", Some(".pdf"));
    let locator = state.locator.clone();

    run_tool(move || {
        let input = ToolInput::new(upload.path(), Some(output))?.with_locator(locator);
        Ok(PdfSplitter::new(input).process(&params))
    })
    .await
}

/// Handler: POST /api/pdf/merge
pub async fn handle_merge(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let files = form.files("files");
    if files.is_empty() {
        return Err(ApiError::Validation("No files provided".into()));
    }
    if files.len() < 2 {
        return Err(ApiError::Validation(
            "At least two PDF files are required".into(),
        ));
    }

    let order = form
        .value("order")
        .map(|raw| {
            parse_int_array(
                raw,
                "Invalid order JSON",
                "order must be an array of integers",
            )
        })
        .transpose()?;
    if let Some(bad) = order
        .iter()
        .flatten()
        .find(|&&i| usize::try_from(i).map_or(true, |i| i >= files.len()))
    {
        return Err(ApiError::Validation(format!(
            "order index out of range: {}",
            bad
        )));
    }
    for file in files {
        check_extension(file, PDF_EXTENSIONS)?;
    }
    info!("Merge {} files (order: {:?})", files.len(), order);

    let mut uploads = Vec::with_capacity(files.len());
    for file in files {
        uploads.push(save_upload(&state.config.upload_dir, file, "pdf_merge_input").await?);
    }
    let output = output_path(&state.config.output_dir, uploads[0].path(), "merged", Some(".pdf"));
    let locator = state.locator.clone();
    let params = MergeParams { order };

    run_tool(move || {
        let inputs = uploads.iter().map(|u| u.path().to_path_buf()).collect();
        let merger = PdfMerger::new(inputs, Some(output))?.with_locator(locator);
        Ok(merger.process(&params))
    })
    .await
}

/// Handler: POST /api/pdf/rearrange
pub async fn handle_rearrange(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let file = form.file_with_extension("file", PDF_EXTENSIONS)?;

    let raw = form
        .value("page_order")
        .ok_or_else(|| ApiError::Validation("page_order is required".into()))?;
    let page_order = parse_int_array(
        raw,
        "Invalid page_order JSON",
        "page_order must be an array of 1-based integers",
    )?;
    info!("Rearrange {} to {:?}", file.filename, page_order);
    let params = RearrangeParams { page_order };

    let upload = save_upload(&state.config.upload_dir, file, "pdf_rearrange_input").await?;
    let output = output_path(
        &state.config.output_dir,
        upload.path(),
        "rearranged",
        Some(".pdf"),
    );
    let locator = state.locator.clone();

    run_tool(move || {
        let input = ToolInput::new(upload.path(), Some(output))?.with_locator(locator);
        Ok(PdfRearranger::new(input).process(&params))
    })
    .await
}

/// Handler: POST /api/pdf/convert-to-pdf
///
/// Accepts images and PDFs; the tool itself rejects other formats.
pub async fn handle_convert_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let file = form.file("file")?;
    info!("Convert {} to PDF", file.filename);

    let upload = save_upload(&state.config.upload_dir, file, "convert_to_pdf_input").await?;
    let output = output_path(
        &state.config.output_dir,
        upload.path(),
        "converted",
        Some(".pdf"),
    );
    let locator = state.locator.clone();

    run_tool(move || {
        let input = ToolInput::new(upload.path(), Some(output))?.with_locator(locator);
        Ok(ConvertToPdf::new(input).process(&()))
    })
    .await
}

/// Handler: POST /api/pdf/extract-text
pub async fn handle_extract_text(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let file = form.file_with_extension("file", PDF_EXTENSIONS)?;
    let params = TextParams {
        pages: form.text("pages").map(str::to_owned),
    };
    info!("Extract text from {} (pages: {:?})", file.filename, params.pages);

    let upload = save_upload(&state.config.upload_dir, file, "pdf_text_input").await?;
    let locator = state.locator.clone();

    run_tool(move || {
        let input = ToolInput::new(upload.path(), None)?.with_locator(locator);
        Ok(PdfTextExtractor::new(input).process(&params))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_int_array() {
        let parse = |raw: &str| parse_int_array(raw, "json", "shape").map_err(|e| e.to_string());

        assert_eq!(parse("[3, 1, 2]"), Ok(vec![3, 1, 2]));
        assert_eq!(parse("[]"), Ok(vec![]));
        assert_eq!(parse("[1,"), Err("json".to_string()));
        assert_eq!(parse("{\"a\": 1}"), Err("shape".to_string()));
        assert_eq!(parse("[1, \"2\"]"), Err("shape".to_string()));
        assert_eq!(parse("[1.5]"), Err("shape".to_string()));
    }
}
