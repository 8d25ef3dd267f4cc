//! Runtime configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Default request body cap (500 MiB)
pub const DEFAULT_MAX_UPLOAD_MB: usize = 500;

/// Segmentation model used for background removal
pub const DEFAULT_MODEL_NAME: &str = "yolo11n-seg.onnx";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Scratch space for uploaded inputs; files are removed after each request
    pub upload_dir: PathBuf,
    /// Processed files, served under `/output`
    pub output_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub model_dir: PathBuf,
    pub model_name: String,
    pub preload_model: bool,
    pub lazy_model_load: bool,
    /// Origin prepended to `output_url`s; empty gives root-relative URLs
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            model_dir: PathBuf::from("models"),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            preload_model: true,
            lazy_model_load: false,
            public_url: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    /// Create the upload and output directories if missing.
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        for dir in [&self.upload_dir, &self.output_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}
