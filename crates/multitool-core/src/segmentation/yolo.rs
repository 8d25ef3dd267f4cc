//! Pre- and post-processing for YOLO-style instance segmentation models.
//!
//! The model takes a `[1, 3, S, S]` float image and produces
//! - detections `[1, 4 + classes + coeffs, anchors]` with boxes as
//!   centre-x, centre-y, width, height in input pixels
//! - prototypes `[1, coeffs, mh, mw]` combined per detection into a mask

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array4, ArrayView3, ArrayView4};

use super::SegmentMask;
use crate::error::ToolError;

#[derive(Debug, Clone, PartialEq)]
pub struct DecodeConfig {
    /// Minimum class score for a detection to be kept
    pub confidence: f32,
    /// Overlap above which the weaker of two detections is dropped
    pub iou: f32,
    /// Square model input edge in pixels
    pub input_size: u32,
    pub max_detections: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou: 0.7,
            input_size: 640,
            max_detections: 300,
        }
    }
}

/// Stretch `image` to `size` x `size` and lay it out as a normalised NCHW
/// tensor.
pub fn preprocess(image: &RgbImage, size: u32) -> Array4<f32> {
    let resized = imageops::resize(image, size, size, FilterType::Triangle);
    let edge = size as usize;
    Array4::from_shape_fn((1, 3, edge, edge), |(_, c, y, x)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

#[derive(Debug, Clone)]
struct Candidate {
    /// x0, y0, x1, y1 in input pixels
    bbox: [f32; 4],
    score: f32,
    coeffs: Vec<f32>,
}

/// Turn raw model outputs into masks, best detection first.
pub fn decode_instances(
    detections: ArrayView3<f32>,
    protos: ArrayView4<f32>,
    config: &DecodeConfig,
) -> Result<Vec<SegmentMask>, ToolError> {
    let &[_, channels, anchors] = detections.shape() else {
        return Err(ToolError::Inference("detections must be 3-D".into()));
    };
    let &[_, num_coeffs, mh, mw] = protos.shape() else {
        return Err(ToolError::Inference("prototypes must be 4-D".into()));
    };
    if channels <= 4 + num_coeffs {
        return Err(ToolError::Inference(format!(
            "detections have {} channels but {} mask coefficients",
            channels, num_coeffs
        )));
    }
    let num_classes = channels - 4 - num_coeffs;

    let mut candidates: Vec<Candidate> = (0..anchors)
        .filter_map(|a| {
            let score = (4..4 + num_classes)
                .map(|c| detections[[0, c, a]])
                .fold(f32::NEG_INFINITY, f32::max);
            if score.is_nan() || score <= config.confidence {
                return None;
            }

            let (cx, cy) = (detections[[0, 0, a]], detections[[0, 1, a]]);
            let (w, h) = (detections[[0, 2, a]], detections[[0, 3, a]]);
            let coeffs = (0..num_coeffs)
                .map(|k| detections[[0, 4 + num_classes + k, a]])
                .collect();

            Some(Candidate {
                bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
                score,
                coeffs,
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= config.max_detections {
            break;
        }
        if kept.iter().all(|k| iou(&k.bbox, &candidate.bbox) <= config.iou) {
            kept.push(candidate);
        }
    }

    let scale_x = mw as f32 / config.input_size as f32;
    let scale_y = mh as f32 / config.input_size as f32;

    kept.into_iter()
        .map(|det| {
            let [x0, y0, x1, y1] = det.bbox;
            let (bx0, bx1) = (x0 * scale_x, x1 * scale_x);
            let (by0, by1) = (y0 * scale_y, y1 * scale_y);

            let mut data = Vec::with_capacity(mw * mh);
            for y in 0..mh {
                for x in 0..mw {
                    let (fx, fy) = (x as f32, y as f32);
                    if fx < bx0 || fx >= bx1 || fy < by0 || fy >= by1 {
                        data.push(0.0);
                        continue;
                    }
                    let logit: f32 = det
                        .coeffs
                        .iter()
                        .enumerate()
                        .map(|(k, c)| c * protos[[0, k, y, x]])
                        .sum();
                    data.push(sigmoid(logit));
                }
            }
            SegmentMask::new(mw as u32, mh as u32, det.score, data)
        })
        .collect()
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let iw = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let ih = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = iw * ih;
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
