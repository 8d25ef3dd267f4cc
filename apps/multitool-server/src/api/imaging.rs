//! Handlers for /api/image

use axum::{
    extract::{Multipart, Path, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use multitool_core::imaging::{
    BackgroundParams, BackgroundRemover, ConvertParams, CropParams, EnhanceParams, FormatConverter,
    ImageCropper, ImageEnhancer, ImageResizer, ImageRotator, ImageTarget, ResizeParams,
    RotateParams, DEFAULT_CONVERT_QUALITY,
};
use multitool_core::validation::{secure_filename, IMAGE_EXTENSIONS};
use multitool_core::{FileInfo, Tool, ToolError, ToolInput};
use tracing::{debug, info};

use super::run_tool;
use crate::error::ApiError;
use crate::upload::{output_path, save_upload, UploadForm};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/resize", post(handle_resize))
        .route("/crop", post(handle_crop))
        .route("/rotate", post(handle_rotate))
        .route("/enhance", post(handle_enhance))
        .route("/remove-background", post(handle_remove_background))
        .route("/remove-bg", post(handle_remove_background))
        .route("/convert-format", post(handle_convert_format))
        .route("/convert", post(handle_convert_format))
        .route("/info/:filename", get(handle_info))
}

fn invalid(message: &str) -> ApiError {
    ApiError::Validation(message.to_string())
}

/// Strictly positive value that fits the image API's `u32`
fn positive(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|&v| v > 0)
}

/// Handler: POST /api/image/resize
pub async fn handle_resize(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let file = form.file_with_extension("file", IMAGE_EXTENSIONS)?;

    const BAD_VALUE: &str = "Invalid width or height values";
    let width: i64 = form.parse_or("width", 0, BAD_VALUE)?;
    let height: i64 = form.parse_or("height", 0, BAD_VALUE)?;
    let (Some(width), Some(height)) = (positive(width), positive(height)) else {
        return Err(invalid("Width and height must be positive integers"));
    };
    let params = ResizeParams {
        width,
        height,
        maintain_aspect: form.flag("maintain_aspect", true),
    };
    info!("Resize {} to {}x{}", file.filename, width, height);

    let upload = save_upload(&state.config.upload_dir, file, "resize_input").await?;
    let output = output_path(&state.config.output_dir, upload.path(), "resized", None);
    let locator = state.locator.clone();

    run_tool(move || {
        let input = ToolInput::new(upload.path(), Some(output))?.with_locator(locator);
        Ok(ImageResizer::new(input).process(&params))
    })
    .await
}

/// Handler: POST /api/image/crop
pub async fn handle_crop(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let file = form.file_with_extension("file", IMAGE_EXTENSIONS)?;

    const BAD_VALUE: &str = "Invalid coordinate or dimension values";
    const BAD_AREA: &str = "Invalid crop coordinates or dimensions";
    let x: i64 = form.parse_or("x", 0, BAD_VALUE)?;
    let y: i64 = form.parse_or("y", 0, BAD_VALUE)?;
    let width: i64 = form.parse_or("width", 0, BAD_VALUE)?;
    let height: i64 = form.parse_or("height", 0, BAD_VALUE)?;

    let coordinate = |v: i64| u32::try_from(v).map_err(|_| invalid(BAD_AREA));
    let params = CropParams {
        x: coordinate(x)?,
        y: coordinate(y)?,
        width: positive(width).ok_or_else(|| invalid(BAD_AREA))?,
        height: positive(height).ok_or_else(|| invalid(BAD_AREA))?,
    };
    info!("Crop {} to {:?}", file.filename, params);

    let upload = save_upload(&state.config.upload_dir, file, "crop_input").await?;
    let output = output_path(&state.config.output_dir, upload.path(), "cropped", None);
    let locator = state.locator.clone();

    run_tool(move || {
        let input = ToolInput::new(upload.path(), Some(output))?.with_locator(locator);
        Ok(ImageCropper::new(input).process(&params))
    })
    .await
}

/// Handler: POST /api/image/rotate
pub async fn handle_rotate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let file = form.file_with_extension("file", IMAGE_EXTENSIONS)?;

    let params = RotateParams {
        angle: form.parse_or("angle", 0.0, "Invalid angle value")?,
        expand: form.flag("expand", true),
    };
    info!("Rotate {} by {} degrees", file.filename, params.angle);

    let upload = save_upload(&state.config.upload_dir, file, "rotate_input").await?;
    let output = output_path(&state.config.output_dir, upload.path(), "rotated", None);
    let locator = state.locator.clone();

    run_tool(move || {
        let input = ToolInput::new(upload.path(), Some(output))?.with_locator(locator);
        Ok(ImageRotator::new(input).process(&params))
    })
    .await
}

/// Handler: POST /api/image/enhance
pub async fn handle_enhance(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let file = form.file_with_extension("file", IMAGE_EXTENSIONS)?;

    const BAD_VALUE: &str = "Invalid enhancement parameter values";
    let params = EnhanceParams {
        brightness: form.parse_or("brightness", 1.0, BAD_VALUE)?,
        contrast: form.parse_or("contrast", 1.0, BAD_VALUE)?,
        saturation: form.parse_or("saturation", 1.0, BAD_VALUE)?,
        sharpness: form.parse_or("sharpness", 1.0, BAD_VALUE)?,
    };
    params.validate().map_err(|e| match e {
        ToolError::InvalidParameter(msg) => ApiError::Validation(msg),
        other => ApiError::Tool(other),
    })?;
    debug!("Enhance {} with {:?}", file.filename, params);

    let upload = save_upload(&state.config.upload_dir, file, "enhance_input").await?;
    let output = output_path(&state.config.output_dir, upload.path(), "enhanced", None);
    let locator = state.locator.clone();

    run_tool(move || {
        let input = ToolInput::new(upload.path(), Some(output))?.with_locator(locator);
        Ok(ImageEnhancer::new(input).process(&params))
    })
    .await
}

/// Handler: POST /api/image/remove-background (alias /remove-bg)
pub async fn handle_remove_background(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let file = form.file_with_extension("file", IMAGE_EXTENSIONS)?;

    let foreground_points = form
        .value("foreground_points")
        .map(|raw| serde_json::from_str::<Vec<(i64, i64)>>(raw))
        .transpose()
        .map_err(|_| invalid("Invalid foreground_points JSON"))?;
    let params = BackgroundParams { foreground_points };
    info!(
        "Remove background from {} ({} foreground points)",
        file.filename,
        params.foreground_points.as_ref().map_or(0, Vec::len)
    );

    let upload = save_upload(&state.config.upload_dir, file, "bg_remove_input").await?;
    let output = output_path(&state.config.output_dir, upload.path(), "no_bg", Some(".png"));
    let locator = state.locator.clone();
    let models = state.models.clone();
    let model_name = state.config.model_name.clone();

    run_tool(move || {
        let input = ToolInput::new(upload.path(), Some(output))?.with_locator(locator);
        Ok(BackgroundRemover::new(input, models, model_name).process(&params))
    })
    .await
}

/// Handler: POST /api/image/convert-format (alias /convert)
pub async fn handle_convert_format(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(multipart).await?;
    let file = form.file_with_extension("file", IMAGE_EXTENSIONS)?;

    let target: ImageTarget = form
        .value("target_format")
        .ok_or_else(|| invalid("Target format is required"))?
        .parse()
        .map_err(|_| {
            let allowed: Vec<_> = ImageTarget::ALL.iter().map(|t| t.name()).collect();
            ApiError::Validation(format!("Unsupported format. Allowed: {}", allowed.join(", ")))
        })?;
    let quality: i64 = form.parse_or(
        "quality",
        i64::from(DEFAULT_CONVERT_QUALITY),
        "Invalid quality value",
    )?;
    let quality = u8::try_from(quality)
        .ok()
        .filter(|q| (1..=100).contains(q))
        .ok_or_else(|| invalid("Quality must be between 1 and 100"))?;
    let params = ConvertParams { target, quality };
    info!("Convert {} to {} (quality {})", file.filename, target, quality);

    let upload = save_upload(&state.config.upload_dir, file, "convert_input").await?;
    let output = output_path(
        &state.config.output_dir,
        upload.path(),
        "converted",
        Some(target.extension()),
    );
    let locator = state.locator.clone();

    run_tool(move || {
        let input = ToolInput::new(upload.path(), Some(output))?.with_locator(locator);
        Ok(FormatConverter::new(input).process(&params))
    })
    .await
}

/// Handler: GET /api/image/info/:filename
///
/// Looks the name up in the output directory only.
pub async fn handle_info(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<FileInfo>, ApiError> {
    let name = secure_filename(&filename);
    let path = state.config.output_dir.join(&name);
    if name.is_empty() || !path.is_file() {
        return Err(ApiError::NotFound("File not found".into()));
    }

    let info = ToolInput::new(path, None)?.file_info()?;
    Ok(Json(info))
}
