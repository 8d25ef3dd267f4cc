//! Shared lifecycle for every processing tool.
//!
//! A tool is constructed from an input path that must already exist and be
//! readable, plus an optional output path it is responsible for creating.
//! Construction errors are returned to the caller; everything that goes
//! wrong afterwards is folded into a failed [`ProcessingResult`] by
//! [`Tool::process`].

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::error::ToolError;
use crate::result::{OutputLocator, ProcessingResult};

/// Snapshot of the input file's filesystem metadata
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    /// Lowercased extension including the leading dot, empty when absent
    pub extension: String,
    /// Not every filesystem records a creation time
    pub created: Option<DateTime<Utc>>,
    pub modified: DateTime<Utc>,
}

/// Validated input/output paths of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolInput {
    input_path: PathBuf,
    output_path: Option<PathBuf>,
    locator: OutputLocator,
}

impl ToolInput {
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: Option<PathBuf>,
    ) -> Result<Self, ToolError> {
        let input_path = input_path.into();
        ensure_readable(&input_path)?;
        Ok(Self {
            input_path,
            output_path,
            locator: OutputLocator::default(),
        })
    }

    pub fn with_locator(mut self, locator: OutputLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn locator(&self) -> &OutputLocator {
        &self.locator
    }

    /// Lowercased input extension without the dot
    pub fn input_extension(&self) -> String {
        self.input_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    pub fn file_info(&self) -> Result<FileInfo, ToolError> {
        let metadata = std::fs::metadata(&self.input_path)?;
        let extension = match self.input_extension() {
            ext if ext.is_empty() => ext,
            ext => format!(".{}", ext),
        };

        Ok(FileInfo {
            filename: self
                .input_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: metadata.len(),
            extension,
            created: metadata.created().ok().map(DateTime::<Utc>::from),
            modified: DateTime::<Utc>::from(metadata.modified()?),
        })
    }
}

/// Fail with `NotFound` or `PermissionDenied` unless `path` can be opened.
pub fn ensure_readable(path: &Path) -> Result<(), ToolError> {
    if !path.exists() {
        return Err(ToolError::NotFound(path.to_path_buf()));
    }
    match File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            Err(ToolError::PermissionDenied(path.to_path_buf()))
        }
        Err(e) => Err(ToolError::Io(e)),
    }
}

/// A single file-processing operation.
pub trait Tool {
    /// Operation parameters
    type Params;

    /// Verb phrase used in failure messages, e.g. "resize image"
    const ACTION: &'static str;

    /// Perform the operation, propagating every failure.
    fn run(&self, params: &Self::Params) -> Result<ProcessingResult, ToolError>;

    /// Perform the operation; failures come back as an unsuccessful result.
    fn process(&self, params: &Self::Params) -> ProcessingResult {
        match self.run(params) {
            Ok(result) => result,
            Err(err) => {
                error!("Failed to {}: {}", Self::ACTION, err);
                ProcessingResult::failure(format!("Failed to {}: {}", Self::ACTION, err))
            }
        }
    }
}
