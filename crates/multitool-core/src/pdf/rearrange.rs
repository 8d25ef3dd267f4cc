use serde_json::json;

use super::{assemble_pages, load_document, page_ids, save_document};
use crate::error::ToolError;
use crate::result::ProcessingResult;
use crate::tool::{Tool, ToolInput};

#[derive(Debug, Clone, PartialEq)]
pub struct RearrangeParams {
    /// New order as 1-based page numbers; must use every page exactly once
    pub page_order: Vec<i64>,
}

pub struct PdfRearranger {
    input: ToolInput,
}

impl PdfRearranger {
    pub fn new(input: ToolInput) -> Self {
        Self { input }
    }
}

/// Convert a 1-based page order into zero-based indices, requiring a
/// permutation of `0..total`.
fn validate_order(order: &[i64], total: usize) -> Result<Vec<usize>, ToolError> {
    if order.is_empty() {
        return Err(ToolError::InvalidOrder("page_order is required".into()));
    }

    let indices = order
        .iter()
        .map(|&p| match usize::try_from(p) {
            Ok(n) if n >= 1 && n <= total => Ok(n - 1),
            _ => Err(ToolError::InvalidOrder(
                "page_order contains out-of-bounds indices".into(),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut sorted = indices.clone();
    sorted.sort_unstable();
    if !sorted.iter().copied().eq(0..total) {
        return Err(ToolError::InvalidOrder(
            "page_order must be a permutation of all pages".into(),
        ));
    }
    Ok(indices)
}

impl Tool for PdfRearranger {
    type Params = RearrangeParams;
    const ACTION: &'static str = "rearrange PDF";

    fn run(&self, params: &RearrangeParams) -> Result<ProcessingResult, ToolError> {
        let mut doc = load_document(self.input.input_path())?;
        let ids = page_ids(&doc);
        let total = ids.len();
        let indices = validate_order(&params.page_order, total)?;

        let Some(output) = self.input.output_path() else {
            return Ok(ProcessingResult::success("Reordered in memory")
                .with_meta("page_order", json!(params.page_order)));
        };

        let ordered: Vec<_> = indices.iter().map(|&i| ids[i]).collect();
        assemble_pages(&mut doc, &ordered)?;
        save_document(&mut doc, output)?;

        Ok(ProcessingResult::success("PDF pages rearranged successfully")
            .with_output(output, self.input.locator())
            .with_meta("page_order", json!(params.page_order))
            .with_meta("total_pages", total))
    }
}
