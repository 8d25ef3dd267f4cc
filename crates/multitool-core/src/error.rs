use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Cannot read input file: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No objects detected for segmentation")]
    NoDetections,

    #[error("Segmentation model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Output path is required")]
    MissingOutput,

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Errors raised while constructing a tool, before any processing.
    pub fn is_construction(&self) -> bool {
        matches!(self, ToolError::NotFound(_) | ToolError::PermissionDenied(_))
    }
}
