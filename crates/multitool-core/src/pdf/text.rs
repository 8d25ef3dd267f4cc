use tracing::{debug, warn};

use super::{load_document, page_ids};
use crate::error::ToolError;
use crate::page_ranges::parse_page_ranges;
use crate::result::ProcessingResult;
use crate::tool::{Tool, ToolInput};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextParams {
    /// Page range string; absent means every page
    pub pages: Option<String>,
}

/// Pulls the text layer out of a PDF. Produces no output file; the text is
/// returned in the result metadata.
pub struct PdfTextExtractor {
    input: ToolInput,
}

impl PdfTextExtractor {
    pub fn new(input: ToolInput) -> Self {
        Self { input }
    }
}

impl Tool for PdfTextExtractor {
    type Params = TextParams;
    const ACTION: &'static str = "extract text";

    fn run(&self, params: &TextParams) -> Result<ProcessingResult, ToolError> {
        let doc = load_document(self.input.input_path())?;
        let total = page_ids(&doc).len();
        let indices = parse_page_ranges(params.pages.as_deref(), total)?;

        let mut sections = Vec::with_capacity(indices.len());
        let mut extracted = Vec::with_capacity(indices.len());
        for i in indices {
            let number = i as u32 + 1;
            // Pages whose text cannot be decoded count as empty
            let text = doc.extract_text(&[number]).unwrap_or_else(|e| {
                warn!("No text on page {}: {}", number, e);
                String::new()
            });
            debug!("Page {}: {} chars", number, text.len());
            sections.push(format!("--- Page {} ---\n{}", number, text));
            extracted.push(number);
        }

        Ok(ProcessingResult::success("Text extracted successfully")
            .with_meta("pages_extracted", extracted)
            .with_meta("total_pages", total)
            .with_meta("text", sections.join("\n\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testutil::write_test_pdf;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn extractor(dir: &std::path::Path, pages: u32) -> PdfTextExtractor {
        let input = write_test_pdf(dir, "in.pdf", pages, "Doc");
        PdfTextExtractor::new(ToolInput::new(input, None).unwrap())
    }

    #[test]
    fn test_extract_selected_pages_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let result = extractor(dir.path(), 4).process(&TextParams {
            pages: Some("3,1".into()),
        });

        assert!(result.success, "{}", result.message);
        assert!(result.output_path.is_none());
        assert_eq!(result.meta("pages_extracted"), Some(&json!([3, 1])));
        assert_eq!(result.meta("total_pages"), Some(&json!(4)));

        let text = result.meta("text").unwrap().as_str().unwrap();
        assert!(text.starts_with("--- Page 3 ---\n"));
        let second = text.find("\n\n--- Page 1 ---\n").unwrap();
        let (page_three, page_one) = text.split_at(second);
        assert!(page_three.contains("Doc 3"), "{:?}", text);
        assert!(page_one.contains("Doc 1"), "{:?}", text);
        assert!(!text.contains("Doc 2"));
        assert!(!text.contains("Doc 4"));
    }

    #[test]
    fn test_extract_defaults_to_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let result = extractor(dir.path(), 3).process(&TextParams::default());
        assert_eq!(result.meta("pages_extracted"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn test_extract_invalid_range_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = extractor(dir.path(), 2).process(&TextParams {
            pages: Some("3-1".into()),
        });
        assert!(!result.success);
        assert!(result.message.starts_with("Failed to extract text"));
    }
}
