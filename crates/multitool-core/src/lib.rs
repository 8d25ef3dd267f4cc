//! File processing operations behind the MultiTool server
//!
//! Each operation is a [`Tool`]: it is built from a validated input path and
//! an optional output path, and produces a [`ProcessingResult`] envelope.
//!
//! - `imaging`: resize, crop, rotate, enhance, format conversion and
//!   segmentation-based background removal
//! - `pdf`: split, merge, rearrange, convert-to-PDF and text extraction
//! - `segmentation`: model registry and YOLO-style mask decoding

pub mod error;
pub mod imaging;
pub mod page_ranges;
pub mod pdf;
pub mod result;
pub mod segmentation;
pub mod tool;
pub mod validation;

pub use error::ToolError;
pub use page_ranges::parse_page_ranges;
pub use result::{OutputLocator, ProcessingResult};
pub use segmentation::{ModelRegistry, SegmentMask, Segmenter};
pub use tool::{FileInfo, Tool, ToolInput};
