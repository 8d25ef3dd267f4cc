//! Image operations on top of the `image` crate.
//!
//! Each tool decodes its input, applies one transform and re-encodes in the
//! format implied by the output path, normalising the colour model to what
//! that encoder accepts.

mod background;
mod convert;
mod crop;
mod enhance;
mod resize;
mod rotate;

pub use background::{BackgroundParams, BackgroundRemover};
pub use convert::{ConvertParams, FormatConverter, ImageTarget, DEFAULT_CONVERT_QUALITY};
pub use crop::{CropParams, ImageCropper};
pub use enhance::{EnhanceParams, ImageEnhancer, ENHANCE_RANGE};
pub use resize::{ImageResizer, ResizeParams};
pub use rotate::{rotate_counter_clockwise, ImageRotator, RotateParams};

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, ImageReader, RgbImage};
use serde_json::{json, Value};

use crate::error::ToolError;

/// Quality used when a JPEG is written without an explicit setting
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Quality used when a WebP is written without an explicit setting
pub const DEFAULT_WEBP_QUALITY: u8 = 80;

/// Decode an image, trusting its content over its extension.
pub(crate) fn open_image(path: &Path) -> Result<DynamicImage, ToolError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// Encode `img` to `path` using the format implied by the path's extension.
pub(crate) fn save_image(img: &DynamicImage, path: &Path) -> Result<(), ToolError> {
    let format = ImageFormat::from_path(path)?;
    save_image_as(img, path, format, None)
}

/// Encode `img` to `path` as `format`. `quality` only affects the lossy
/// encoders, JPEG and WebP.
pub(crate) fn save_image_as(
    img: &DynamicImage,
    path: &Path,
    format: ImageFormat,
    quality: Option<u8>,
) -> Result<(), ToolError> {
    let prepared = prepare_for_format(img, format);
    let mut writer = BufWriter::new(File::create(path)?);

    match format {
        ImageFormat::Jpeg => {
            let quality = quality.unwrap_or(DEFAULT_JPEG_QUALITY);
            prepared.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))?;
        }
        ImageFormat::WebP => {
            let quality = quality.unwrap_or(DEFAULT_WEBP_QUALITY);
            writer.write_all(&encode_webp(&prepared, quality)?)?;
        }
        _ => prepared.write_to(&mut writer, format)?,
    }

    writer.flush()?;
    Ok(())
}

/// Lossy WebP via libwebp. The `image` crate only writes lossless WebP.
fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ToolError> {
    let (width, height) = img.dimensions();
    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(false, quality as f32)
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, quality as f32)
    };
    encoded
        .map(|memory| memory.to_vec())
        .map_err(|e| ToolError::Encode(format!("WebP encoder error: {:?}", e)))
}

/// Convert the colour model to one the target encoder supports.
fn prepare_for_format(img: &DynamicImage, format: ImageFormat) -> DynamicImage {
    let color = img.color();
    match format {
        ImageFormat::Jpeg => match color {
            ColorType::L8 | ColorType::Rgb8 => img.clone(),
            c if c.has_alpha() => DynamicImage::ImageRgb8(flatten_on_white(img)),
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        },
        ImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8()),
        ImageFormat::Png | ImageFormat::Tiff => match color {
            ColorType::Rgb32F => DynamicImage::ImageRgb16(img.to_rgb16()),
            ColorType::Rgba32F => DynamicImage::ImageRgba16(img.to_rgba16()),
            ColorType::La8 if format == ImageFormat::Tiff => {
                DynamicImage::ImageRgba8(img.to_rgba8())
            }
            ColorType::La16 if format == ImageFormat::Tiff => {
                DynamicImage::ImageRgba16(img.to_rgba16())
            }
            _ => img.clone(),
        },
        // Remaining encoders only take 8-bit samples
        _ => match color {
            ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => img.clone(),
            c if c.has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        },
    }
}

/// Composite an image onto an opaque white background using its alpha
/// channel as the blend mask.
pub(crate) fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Return an image converted back to the colour type it was decoded with.
pub(crate) fn restore_color(img: DynamicImage, color: ColorType) -> DynamicImage {
    match color {
        ColorType::L8 => DynamicImage::ImageLuma8(img.to_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(img.to_rgb8()),
        ColorType::Rgba8 => DynamicImage::ImageRgba8(img.to_rgba8()),
        ColorType::L16 => DynamicImage::ImageLuma16(img.to_luma16()),
        ColorType::La16 => DynamicImage::ImageLumaA16(img.to_luma_alpha16()),
        ColorType::Rgb16 => DynamicImage::ImageRgb16(img.to_rgb16()),
        ColorType::Rgba16 => DynamicImage::ImageRgba16(img.to_rgba16()),
        ColorType::Rgb32F => DynamicImage::ImageRgb32F(img.to_rgb32f()),
        ColorType::Rgba32F => DynamicImage::ImageRgba32F(img.to_rgba32f()),
        _ => img,
    }
}

pub(crate) fn size_json(img: &DynamicImage) -> Value {
    let (w, h) = img.dimensions();
    json!([w, h])
}
