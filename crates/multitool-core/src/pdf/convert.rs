//! Conversion of images (and PDFs, trivially) into single-page PDF files.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbImage;
use lopdf::{dictionary, Document, Object, Stream};
use tracing::info;

use super::save_document;
use crate::error::ToolError;
use crate::imaging::open_image;
use crate::result::ProcessingResult;
use crate::tool::{Tool, ToolInput};

/// Image extensions that can be embedded as a PDF page
pub const PDF_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "webp"];

/// Resolution at which image pixels are laid out on the page
const PAGE_DPI: f32 = 150.0;

pub struct ConvertToPdf {
    input: ToolInput,
}

impl ConvertToPdf {
    pub fn new(input: ToolInput) -> Self {
        Self { input }
    }
}

impl Tool for ConvertToPdf {
    type Params = ();
    const ACTION: &'static str = "convert to PDF";

    fn run(&self, _: &()) -> Result<ProcessingResult, ToolError> {
        let ext = self.input.input_extension();

        if ext == "pdf" {
            let Some(output) = self.input.output_path() else {
                return Ok(ProcessingResult::success(
                    "Already a PDF; no output path provided",
                ));
            };
            std::fs::copy(self.input.input_path(), output)?;
            return Ok(ProcessingResult::success("File was already PDF; copied")
                .with_output(output, self.input.locator())
                .with_meta("source_format", ext));
        }

        if !PDF_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ToolError::UnsupportedFormat(format!(
                "Unsupported input format for PDF conversion: .{}",
                ext
            )));
        }

        let output = self.input.output_path().ok_or(ToolError::MissingOutput)?;

        let rgb = open_image(self.input.input_path())?.to_rgb8();
        let mut doc = image_document(&rgb)?;
        save_document(&mut doc, output)?;
        info!(
            "Embedded {}x{} image as a PDF page",
            rgb.width(),
            rgb.height()
        );

        Ok(ProcessingResult::success("Converted to PDF successfully")
            .with_output(output, self.input.locator())
            .with_meta("source_format", ext))
    }
}

/// One-page document showing `img` edge to edge at [`PAGE_DPI`].
fn image_document(img: &RgbImage) -> Result<Document, ToolError> {
    let (px_w, px_h) = img.dimensions();
    let width = px_w as f32 * 72.0 / PAGE_DPI;
    let height = px_h as f32 * 72.0 / PAGE_DPI;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(img.as_raw())?;
    let pixels = encoder.finish()?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => px_w as i64,
            "Height" => px_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        pixels,
    ));

    let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im0 Do\nQ\n", width, height);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width),
            Object::Real(height),
        ],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}
