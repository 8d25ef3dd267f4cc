use image::imageops::FilterType;
use image::GenericImageView;
use tracing::debug;

use super::{open_image, save_image, size_json};
use crate::error::ToolError;
use crate::result::ProcessingResult;
use crate::tool::{Tool, ToolInput};

#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
    /// Fit inside the box keeping the aspect ratio, never enlarging
    pub maintain_aspect: bool,
}

impl ResizeParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            maintain_aspect: true,
        }
    }
}

pub struct ImageResizer {
    input: ToolInput,
}

impl ImageResizer {
    pub fn new(input: ToolInput) -> Self {
        Self { input }
    }
}

/// Largest size that fits in `bound_w` x `bound_h` with the same aspect
/// ratio as `width` x `height`, without upscaling.
fn fit_within(width: u32, height: u32, bound_w: u32, bound_h: u32) -> (u32, u32) {
    if width <= bound_w && height <= bound_h {
        return (width, height);
    }
    let scale = f64::min(
        bound_w as f64 / width as f64,
        bound_h as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).clamp(1, bound_w);
    let h = ((height as f64 * scale).round() as u32).clamp(1, bound_h);
    (w, h)
}

impl Tool for ImageResizer {
    type Params = ResizeParams;
    const ACTION: &'static str = "resize image";

    fn run(&self, params: &ResizeParams) -> Result<ProcessingResult, ToolError> {
        if params.width == 0 || params.height == 0 {
            return Err(ToolError::InvalidParameter(
                "Width and height must be positive integers".into(),
            ));
        }

        let img = open_image(self.input.input_path())?;
        let (orig_w, orig_h) = img.dimensions();

        let (w, h) = if params.maintain_aspect {
            fit_within(orig_w, orig_h, params.width, params.height)
        } else {
            (params.width, params.height)
        };
        debug!("Resizing {}x{} -> {}x{}", orig_w, orig_h, w, h);

        let resized = if (w, h) == (orig_w, orig_h) {
            img.clone()
        } else {
            img.resize_exact(w, h, FilterType::Lanczos3)
        };

        let Some(output) = self.input.output_path() else {
            return Ok(ProcessingResult::success("Image resized in memory")
                .with_meta("new_size", size_json(&resized)));
        };

        save_image(&resized, output)?;

        Ok(
            ProcessingResult::success(format!("Image resized to {}x{}", w, h))
                .with_output(output, self.input.locator())
                .with_meta("new_size", size_json(&resized))
                .with_meta("original_size", size_json(&img)),
        )
    }
}
