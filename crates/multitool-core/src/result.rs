//! Uniform result envelope returned by every tool.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

/// Builds the public locator for an output file from its base name only,
/// so server-side directory layout never leaks into responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocator {
    base_url: String,
}

impl Default for OutputLocator {
    fn default() -> Self {
        Self::new("")
    }
}

impl OutputLocator {
    /// `base_url` is the externally visible origin (e.g. `http://host:5000`);
    /// an empty base yields root-relative URLs.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, output_path: &Path) -> String {
        let name = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/output/{}", self.base_url, name)
    }
}

/// Result of one tool invocation.
///
/// `output_url` is only ever set together with `output_path`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub message: String,
    pub output_path: Option<String>,
    pub output_url: Option<String>,
    pub metadata: Map<String, Value>,
}

impl ProcessingResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            output_path: None,
            output_url: None,
            metadata: Map::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(message)
        }
    }

    /// Attach the produced output file.
    pub fn with_output(mut self, path: &Path, locator: &OutputLocator) -> Self {
        self.output_path = Some(path.display().to_string());
        self.output_url = Some(locator.url_for(path));
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_failure_serializes_empty_metadata() {
        let result = ProcessingResult::failure("Failed to crop image: boom");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "message": "Failed to crop image: boom",
                "output_path": null,
                "output_url": null,
                "metadata": {}
            })
        );
    }

    #[test]
    fn test_output_url_uses_base_name_only() {
        let locator = OutputLocator::new("http://localhost:5000/");
        let path = PathBuf::from("/srv/multitool/output/photo_resized_1234.png");
        let result = ProcessingResult::success("ok").with_output(&path, &locator);

        assert_eq!(
            result.output_url.as_deref(),
            Some("http://localhost:5000/output/photo_resized_1234.png")
        );
        assert_eq!(
            result.output_path.as_deref(),
            Some("/srv/multitool/output/photo_resized_1234.png")
        );
    }

    #[test]
    fn test_default_locator_is_root_relative() {
        let url = OutputLocator::default().url_for(Path::new("out/a.pdf"));
        assert_eq!(url, "/output/a.pdf");
    }

    #[test]
    fn test_metadata_accumulates() {
        let result = ProcessingResult::success("ok")
            .with_meta("total_pages", 3)
            .with_meta("new_size", json!([10, 20]));
        assert_eq!(result.meta("total_pages"), Some(&json!(3)));
        assert_eq!(result.meta("new_size"), Some(&json!([10, 20])));
    }
}
