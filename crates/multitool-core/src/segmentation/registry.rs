use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::Segmenter;
use crate::error::ToolError;

/// Builds a segmenter from a model file
pub type ModelLoader = Box<dyn Fn(&Path) -> Result<Arc<dyn Segmenter>, ToolError> + Send + Sync>;

/// Process-wide cache of loaded segmentation models, keyed by model file
/// name.
///
/// Models are loaded explicitly (normally at startup). A request asking for
/// a model that was never loaded fails with `ModelUnavailable` unless lazy
/// loading was enabled.
pub struct ModelRegistry {
    model_dir: PathBuf,
    loader: ModelLoader,
    lazy: bool,
    models: Mutex<HashMap<String, Arc<dyn Segmenter>>>,
}

impl ModelRegistry {
    /// Registry backed by the default runtime for `model_dir`.
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self::with_loader(model_dir, default_loader)
    }

    pub fn with_loader<F>(model_dir: impl Into<PathBuf>, loader: F) -> Self
    where
        F: Fn(&Path) -> Result<Arc<dyn Segmenter>, ToolError> + Send + Sync + 'static,
    {
        Self {
            model_dir: model_dir.into(),
            loader: Box::new(loader),
            lazy: false,
            models: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow_lazy_load(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Register an already constructed segmenter under `name`.
    pub fn insert(&self, name: &str, segmenter: Arc<dyn Segmenter>) {
        self.models.lock().insert(name.to_string(), segmenter);
    }

    /// Load `name` from the model directory unless it is already cached.
    pub fn load(&self, name: &str) -> Result<Arc<dyn Segmenter>, ToolError> {
        let mut models = self.models.lock();
        if let Some(model) = models.get(name) {
            return Ok(Arc::clone(model));
        }

        let path = self.model_dir.join(name);
        info!("Loading segmentation model {}", path.display());
        let model = (self.loader)(&path)?;
        models.insert(name.to_string(), Arc::clone(&model));
        Ok(model)
    }

    /// Fetch a loaded model.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Segmenter>, ToolError> {
        if let Some(model) = self.models.lock().get(name) {
            return Ok(Arc::clone(model));
        }
        if self.lazy {
            debug!("Model {} not preloaded, loading on demand", name);
            return self.load(name);
        }
        Err(ToolError::ModelUnavailable(format!(
            "{} has not been loaded",
            name
        )))
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.models.lock().contains_key(name)
    }
}

#[cfg(feature = "onnx")]
fn default_loader(path: &Path) -> Result<Arc<dyn Segmenter>, ToolError> {
    Ok(Arc::new(super::OnnxSegmenter::from_file(path)?))
}

#[cfg(not(feature = "onnx"))]
fn default_loader(path: &Path) -> Result<Arc<dyn Segmenter>, ToolError> {
    Err(ToolError::ModelUnavailable(format!(
        "{}: built without a model runtime",
        path.display()
    )))
}
