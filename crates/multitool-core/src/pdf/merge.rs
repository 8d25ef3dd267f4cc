//! PDF merge: concatenate the pages of several documents.

use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::{debug, info};

use super::{assemble_pages, load_document, page_ids, remap_object_refs, save_document};
use crate::error::ToolError;
use crate::result::{OutputLocator, ProcessingResult};
use crate::tool::{ensure_readable, Tool};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeParams {
    /// Zero-based indices into the input list. Absent means input order;
    /// an index may repeat.
    pub order: Option<Vec<i64>>,
}

pub struct PdfMerger {
    inputs: Vec<PathBuf>,
    output_path: Option<PathBuf>,
    locator: OutputLocator,
}

impl PdfMerger {
    /// Every input must exist and be readable.
    pub fn new(inputs: Vec<PathBuf>, output_path: Option<PathBuf>) -> Result<Self, ToolError> {
        for path in &inputs {
            ensure_readable(path)?;
        }
        Ok(Self {
            inputs,
            output_path,
            locator: OutputLocator::default(),
        })
    }

    pub fn with_locator(mut self, locator: OutputLocator) -> Self {
        self.locator = locator;
        self
    }

    fn resolve_order(&self, order: Option<&[i64]>) -> Result<Vec<usize>, ToolError> {
        let Some(order) = order else {
            return Ok((0..self.inputs.len()).collect());
        };
        if order.is_empty() {
            return Err(ToolError::InvalidOrder("order must not be empty".into()));
        }
        order
            .iter()
            .map(|&i| {
                usize::try_from(i)
                    .ok()
                    .filter(|&i| i < self.inputs.len())
                    .ok_or_else(|| {
                        ToolError::InvalidOrder(format!("order index out of range: {}", i))
                    })
            })
            .collect()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Tool for PdfMerger {
    type Params = MergeParams;
    const ACTION: &'static str = "merge PDFs";

    fn run(&self, params: &MergeParams) -> Result<ProcessingResult, ToolError> {
        if self.inputs.len() < 2 {
            return Err(ToolError::InvalidOrder(
                "At least two PDF files are required".into(),
            ));
        }
        let order = self.resolve_order(params.order.as_deref())?;
        let files: Vec<String> = order.iter().map(|&i| file_name(&self.inputs[i])).collect();

        let sources = self
            .inputs
            .iter()
            .map(|p| load_document(p))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(output) = self.output_path.as_deref() else {
            return Ok(ProcessingResult::success("Merged in memory").with_meta("files", files));
        };

        let mut merged = merge_documents(&sources, &order)?;
        let total_pages = page_ids(&merged).len();
        save_document(&mut merged, output)?;
        info!("Merged {} documents into {} pages", order.len(), total_pages);

        Ok(ProcessingResult::success("PDFs merged successfully")
            .with_output(output, &self.locator)
            .with_meta("files", files)
            .with_meta("total_pages", total_pages))
    }
}

/// Concatenate `sources` in `order`.
///
/// The first document is the base; every later one is imported with its
/// object IDs shifted past the current maximum so nothing collides.
fn merge_documents(sources: &[Document], order: &[usize]) -> Result<Document, ToolError> {
    let Some((&first, rest)) = order.split_first() else {
        return Err(ToolError::InvalidOrder("order must not be empty".into()));
    };

    let mut dest = sources[first].clone();
    let mut pages = page_ids(&dest);

    for &index in rest {
        let source = &sources[index];
        let offset = dest.max_id;
        debug!("Importing document {} at object offset {}", index, offset);

        pages.extend(
            page_ids(source)
                .into_iter()
                .map(|(num, gen)| (num + offset, gen)),
        );
        for (&(num, gen), object) in &source.objects {
            dest.objects
                .insert((num + offset, gen), remap_object_refs(object.clone(), offset));
        }
        dest.max_id = dest.max_id.max(source.max_id + offset);
    }

    assemble_pages(&mut dest, &pages)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testutil::{page_labels, write_test_pdf};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn merger(dir: &Path, docs: &[(&str, u32)]) -> PdfMerger {
        let inputs = docs
            .iter()
            .map(|(label, pages)| write_test_pdf(dir, &format!("{}.pdf", label), *pages, label))
            .collect();
        PdfMerger::new(inputs, Some(dir.join("merged.pdf"))).unwrap()
    }

    #[test]
    fn test_merge_concatenates_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let result = merger(dir.path(), &[("A", 2), ("B", 3)]).process(&MergeParams::default());

        assert!(result.success, "{}", result.message);
        assert_eq!(result.meta("total_pages"), Some(&json!(5)));
        assert_eq!(result.meta("files"), Some(&json!(["A.pdf", "B.pdf"])));
        assert_eq!(
            page_labels(&dir.path().join("merged.pdf")),
            vec!["A 1", "A 2", "B 1", "B 2", "B 3"]
        );
    }

    #[test]
    fn test_merge_order_reverses_documents() {
        let dir = tempfile::tempdir().unwrap();
        let params = MergeParams {
            order: Some(vec![1, 0]),
        };
        let result = merger(dir.path(), &[("A", 1), ("B", 2)]).process(&params);

        assert!(result.success, "{}", result.message);
        assert_eq!(result.meta("files"), Some(&json!(["B.pdf", "A.pdf"])));
        assert_eq!(
            page_labels(&dir.path().join("merged.pdf")),
            vec!["B 1", "B 2", "A 1"]
        );
    }

    #[test]
    fn test_merge_allows_repeated_documents() {
        let dir = tempfile::tempdir().unwrap();
        let params = MergeParams {
            order: Some(vec![0, 1, 0]),
        };
        let result = merger(dir.path(), &[("A", 1), ("B", 1)]).process(&params);

        assert!(result.success, "{}", result.message);
        assert_eq!(result.meta("total_pages"), Some(&json!(3)));
        assert_eq!(
            page_labels(&dir.path().join("merged.pdf")),
            vec!["A 1", "B 1", "A 1"]
        );
    }

    #[test]
    fn test_merge_rejects_bad_order() {
        let dir = tempfile::tempdir().unwrap();
        let tool = merger(dir.path(), &[("A", 1), ("B", 1)]);

        for order in [vec![2], vec![-1, 0], vec![]] {
            let err = tool
                .run(&MergeParams {
                    order: Some(order.clone()),
                })
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidOrder(_)), "{:?}", order);
        }
        assert!(!dir.path().join("merged.pdf").exists());
    }

    #[test]
    fn test_merge_needs_two_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let result = merger(dir.path(), &[("A", 1)]).process(&MergeParams::default());
        assert!(!result.success);
        assert!(result.message.contains("At least two PDF files are required"));
    }

    #[test]
    fn test_missing_input_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_test_pdf(dir.path(), "A.pdf", 1, "A");
        let err = PdfMerger::new(vec![a, dir.path().join("nope.pdf")], None)
            .err()
            .unwrap();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
