//! PDF split: extract a page selection into one document, or break every
//! page out into its own file.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::info;

use super::{assemble_pages, load_document, page_ids, save_document};
use crate::error::ToolError;
use crate::page_ranges::parse_page_ranges;
use crate::result::ProcessingResult;
use crate::tool::{Tool, ToolInput};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitParams {
    /// Page range string such as `"1-3,5"`. Absent or selecting nothing
    /// means one file per page.
    pub pages: Option<String>,
}

pub struct PdfSplitter {
    input: ToolInput,
}

impl PdfSplitter {
    pub fn new(input: ToolInput) -> Self {
        Self { input }
    }
}

/// `<dir>/<stem>_page_<n>.pdf` next to `base`
fn page_file(base: &Path, page: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{}_page_{}.pdf", stem, page))
}

impl Tool for PdfSplitter {
    type Params = SplitParams;
    const ACTION: &'static str = "split PDF";

    fn run(&self, params: &SplitParams) -> Result<ProcessingResult, ToolError> {
        let doc = load_document(self.input.input_path())?;
        let ids = page_ids(&doc);
        let total = ids.len();

        let selection = match params.pages.as_deref() {
            Some(pages) if !pages.trim().is_empty() => parse_page_ranges(Some(pages), total)?,
            _ => Vec::new(),
        };

        let Some(output) = self.input.output_path() else {
            let pages = if selection.is_empty() {
                (0..total).collect()
            } else {
                selection
            };
            return Ok(ProcessingResult::success("Split in memory").with_meta("pages", pages));
        };
        let locator = self.input.locator();

        if !selection.is_empty() {
            let mut selected = doc;
            let keep: Vec<_> = selection.iter().map(|&i| ids[i]).collect();
            assemble_pages(&mut selected, &keep)?;
            save_document(&mut selected, output)?;

            let numbers: Vec<usize> = selection.iter().map(|i| i + 1).collect();
            info!("Extracted pages {:?} of {}", numbers, total);
            let outputs = json!([{
                "output_path": output.display().to_string(),
                "output_url": locator.url_for(output),
                "pages": numbers,
            }]);

            return Ok(ProcessingResult::success("PDF split successfully")
                .with_output(output, locator)
                .with_meta("outputs", outputs)
                .with_meta("total_pages", total));
        }

        let mut outputs: Vec<Value> = Vec::with_capacity(total);
        for (i, &id) in ids.iter().enumerate() {
            let path = page_file(output, i + 1);
            let mut single = doc.clone();
            assemble_pages(&mut single, &[id])?;
            save_document(&mut single, &path)?;

            outputs.push(json!({
                "output_path": path.display().to_string(),
                "output_url": locator.url_for(&path),
                "page": i + 1,
            }));
        }
        info!("Split {} pages into separate files", total);

        Ok(ProcessingResult::success("PDF split successfully")
            .with_meta("outputs", outputs)
            .with_meta("total_pages", total))
    }
}
