//! ONNX Runtime backend for YOLO segmentation models.

use std::path::Path;

use image::RgbImage;
use ndarray::{ArrayD, Ix3, Ix4, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;
use parking_lot::Mutex;
use tracing::debug;

use super::yolo::{self, DecodeConfig};
use super::{SegmentMask, Segmenter};
use crate::error::ToolError;

pub struct OnnxSegmenter {
    session: Mutex<Session>,
    input_name: String,
    config: DecodeConfig,
}

impl OnnxSegmenter {
    pub fn from_file(path: &Path) -> Result<Self, ToolError> {
        if !path.exists() {
            return Err(ToolError::ModelUnavailable(format!(
                "model file not found: {}",
                path.display()
            )));
        }
        debug!("Loading ONNX model from: {}", path.display());

        let bytes = std::fs::read(path)?;
        let session = Session::builder()
            .map_err(|e| ToolError::ModelUnavailable(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ToolError::ModelUnavailable(e.to_string()))?
            .commit_from_memory(&bytes)
            .map_err(|e| ToolError::ModelUnavailable(e.to_string()))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| ToolError::ModelUnavailable("model has no inputs".into()))?;
        debug!("Model input: {}", input_name);

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            config: DecodeConfig::default(),
        })
    }
}

impl Segmenter for OnnxSegmenter {
    fn segment(&self, image: &RgbImage) -> Result<Vec<SegmentMask>, ToolError> {
        let input = yolo::preprocess(image, self.config.input_size);
        let shape: Vec<i64> = input.shape().iter().map(|&s| s as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();
        let value: SessionInputValue<'static> = Tensor::from_array((shape, data))
            .map(Into::into)
            .map_err(|e| ToolError::Inference(e.to_string()))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(vec![(self.input_name.as_str(), value)])
            .map_err(|e| ToolError::Inference(e.to_string()))?;

        // Detections are the 3-D output and prototypes the 4-D one
        let mut detections = None;
        let mut protos = None;
        for (name, value) in outputs.iter() {
            let (shape_ref, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| ToolError::Inference(format!("output '{}': {}", name, e)))?;
            let shape: Vec<usize> = shape_ref.iter().map(|&s| s as usize).collect();
            let arr = ArrayD::from_shape_vec(IxDyn(&shape), data.to_vec())
                .map_err(|e| ToolError::Inference(e.to_string()))?;
            match shape.len() {
                3 if detections.is_none() => detections = Some(arr),
                4 if protos.is_none() => protos = Some(arr),
                _ => {}
            }
        }

        let (Some(detections), Some(protos)) = (detections, protos) else {
            return Err(ToolError::Inference(
                "model did not produce detection and prototype outputs".into(),
            ));
        };
        let detections = detections
            .into_dimensionality::<Ix3>()
            .map_err(|e| ToolError::Inference(e.to_string()))?;
        let protos = protos
            .into_dimensionality::<Ix4>()
            .map_err(|e| ToolError::Inference(e.to_string()))?;

        yolo::decode_instances(detections.view(), protos.view(), &self.config)
    }
}
