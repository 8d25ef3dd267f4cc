//! Instance segmentation used by background removal.
//!
//! A [`Segmenter`] turns an RGB image into per-object probability masks.
//! Models are loaded once into a [`ModelRegistry`] and shared between
//! requests; the ONNX Runtime backend lives behind the `onnx` feature.

#[cfg(feature = "onnx")]
mod onnx;
mod registry;
pub mod yolo;

#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;
pub use registry::{ModelLoader, ModelRegistry};

use image::{GrayImage, Luma, RgbImage};

use crate::error::ToolError;

/// Per-pixel foreground probability for one detected object.
///
/// The grid covers the whole model input frame, so it may be at a lower
/// resolution than the source image and must be scaled to it.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMask {
    pub width: u32,
    pub height: u32,
    /// Detection confidence
    pub score: f32,
    /// Row-major probabilities in `[0, 1]`
    pub data: Vec<f32>,
}

impl SegmentMask {
    pub fn new(width: u32, height: u32, score: f32, data: Vec<f32>) -> Result<Self, ToolError> {
        if data.len() != width as usize * height as usize {
            return Err(ToolError::Inference(format!(
                "mask of {}x{} needs {} values, got {}",
                width,
                height,
                width as usize * height as usize,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            score,
            data,
        })
    }

    /// 255 where the probability exceeds `threshold`, 0 elsewhere.
    pub fn binarize(&self, threshold: f32) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let p = self.data[(y * self.width + x) as usize];
            Luma([if p > threshold { 255 } else { 0 }])
        })
    }
}

pub trait Segmenter: Send + Sync {
    /// Detect objects in `image` and return one mask per instance, best
    /// first. An empty list means nothing was found.
    fn segment(&self, image: &RgbImage) -> Result<Vec<SegmentMask>, ToolError>;
}
