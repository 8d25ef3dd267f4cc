use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat};
use tracing::{debug, info};

use super::{open_image, save_image_as};
use crate::error::ToolError;
use crate::result::ProcessingResult;
use crate::segmentation::ModelRegistry;
use crate::tool::{Tool, ToolInput};

/// Probability above which a mask pixel counts as foreground
const MASK_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackgroundParams {
    /// Pixel coordinates on the subject to keep. When absent every detected
    /// object is kept.
    pub foreground_points: Option<Vec<(i64, i64)>>,
}

pub struct BackgroundRemover {
    input: ToolInput,
    registry: Arc<ModelRegistry>,
    model_name: String,
}

impl BackgroundRemover {
    pub fn new(input: ToolInput, registry: Arc<ModelRegistry>, model_name: impl Into<String>) -> Self {
        Self {
            input,
            registry,
            model_name: model_name.into(),
        }
    }
}

impl Tool for BackgroundRemover {
    type Params = BackgroundParams;
    const ACTION: &'static str = "remove background";

    fn run(&self, params: &BackgroundParams) -> Result<ProcessingResult, ToolError> {
        let segmenter = self.registry.get(&self.model_name)?;

        let img = open_image(self.input.input_path())?;
        let (width, height) = img.dimensions();

        let masks = segmenter.segment(&img.to_rgb8())?;
        if masks.is_empty() {
            return Err(ToolError::NoDetections);
        }
        info!("Detected {} segments", masks.len());

        let masks: Vec<GrayImage> = masks
            .iter()
            .map(|m| {
                imageops::resize(
                    &m.binarize(MASK_THRESHOLD),
                    width,
                    height,
                    FilterType::Nearest,
                )
            })
            .collect();

        let points = params.foreground_points.as_deref().unwrap_or_default();
        let foreground = select_foreground(&masks, points, width, height);

        let mut rgba = img.to_rgba8();
        for (px, m) in rgba.pixels_mut().zip(foreground.pixels()) {
            px[3] = if m[0] > 0 { 255 } else { 0 };
        }
        let cutout = DynamicImage::ImageRgba8(rgba);

        let Some(output) = self.input.output_path() else {
            return Ok(ProcessingResult::success("Background removed in memory")
                .with_meta("segments_detected", masks.len()));
        };

        save_image_as(&cutout, output, ImageFormat::Png, None)?;

        Ok(ProcessingResult::success("Background removed successfully")
            .with_output(output, self.input.locator())
            .with_meta("segments_detected", masks.len())
            .with_meta("foreground_points_used", !points.is_empty()))
    }
}

/// Union of the masks under any in-bounds point, or of every mask when no
/// points were given.
fn select_foreground(masks: &[GrayImage], points: &[(i64, i64)], width: u32, height: u32) -> GrayImage {
    let in_bounds: Vec<(u32, u32)> = points
        .iter()
        .filter(|&&(x, y)| x >= 0 && y >= 0 && x < width as i64 && y < height as i64)
        .map(|&(x, y)| (x as u32, y as u32))
        .collect();

    let mut combined = GrayImage::new(width, height);
    for (i, mask) in masks.iter().enumerate() {
        let selected = points.is_empty() || in_bounds.iter().any(|&(x, y)| mask.get_pixel(x, y)[0] > 0);
        if !selected {
            continue;
        }
        debug!("Keeping segment {}", i);
        for (dst, src) in combined.pixels_mut().zip(mask.pixels()) {
            dst[0] = dst[0].max(src[0]);
        }
    }
    combined
}
