//! MultiTool Server
//!
//! HTTP front end for the file-processing tools in `multitool-core`:
//!
//! - Image resize, crop, rotate, enhance, format conversion and
//!   segmentation-based background removal
//! - PDF split, merge, rearrange, convert-to-PDF and text extraction
//! - Video endpoints (reserved, 501)
//!
//! Uploaded inputs are written to the upload directory, processed on the
//! blocking pool and deleted afterwards. Results are written to the output
//! directory and served under `/output`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use multitool_core::{ModelRegistry, OutputLocator};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod config;
mod error;
mod upload;

use config::{ServerConfig, DEFAULT_MAX_UPLOAD_MB, DEFAULT_MODEL_NAME};

/// Command-line arguments for the MultiTool server
#[derive(Parser, Debug)]
#[command(name = "multitool-server")]
#[command(about = "Image, PDF and video processing API")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "MULTITOOL_PORT", default_value = "5000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "MULTITOOL_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory for uploaded inputs
    #[arg(long, env = "MULTITOOL_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory for processed outputs
    #[arg(long, env = "MULTITOOL_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Maximum request body size in MiB
    #[arg(long, env = "MULTITOOL_MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    max_upload_mb: usize,

    /// Directory holding segmentation models
    #[arg(long, env = "MULTITOOL_MODEL_DIR", default_value = "models")]
    model_dir: PathBuf,

    /// Model file used for background removal
    #[arg(long, env = "MULTITOOL_MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    model_name: String,

    /// Load the segmentation model at startup
    #[arg(long, env = "MULTITOOL_PRELOAD_MODEL", default_value_t = true, action = clap::ArgAction::Set)]
    preload_model: bool,

    /// Load the model on first use when it was not preloaded
    #[arg(long, env = "MULTITOOL_LAZY_MODEL_LOAD")]
    lazy_model_load: bool,

    /// Public origin used in output URLs, e.g. https://tools.example.com
    #[arg(long, env = "MULTITOOL_PUBLIC_URL", default_value = "")]
    public_url: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            upload_dir: args.upload_dir,
            output_dir: args.output_dir,
            max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
            model_dir: args.model_dir,
            model_name: args.model_name,
            preload_model: args.preload_model,
            lazy_model_load: args.lazy_model_load,
            public_url: args.public_url,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Turns output paths into public URLs
    pub locator: OutputLocator,
    pub models: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(config: ServerConfig, models: Arc<ModelRegistry>) -> Self {
        Self {
            locator: OutputLocator::new(config.public_url.clone()),
            config: Arc::new(config),
            models,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from(args);
    config.ensure_dirs()?;
    let addr = config.addr()?;

    let models = Arc::new(
        ModelRegistry::new(config.model_dir.clone()).allow_lazy_load(config.lazy_model_load),
    );
    if config.preload_model {
        let registry = Arc::clone(&models);
        let name = config.model_name.clone();
        match tokio::task::spawn_blocking(move || registry.load(&name)).await? {
            Ok(_) => info!("Segmentation model {} ready", config.model_name),
            Err(e) => warn!("Background removal unavailable: {}", e),
        }
    }

    info!("Upload directory: {}", config.upload_dir.display());
    info!("Output directory: {}", config.output_dir.display());
    info!("Max upload size: {} bytes", config.max_upload_bytes);

    let app = api::router(AppState::new(config, models));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
