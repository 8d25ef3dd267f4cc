use image::{DynamicImage, GenericImageView, ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use tracing::debug;

use super::{open_image, save_image, size_json};
use crate::error::ToolError;
use crate::result::ProcessingResult;
use crate::tool::{Tool, ToolInput};

#[derive(Debug, Clone, PartialEq)]
pub struct RotateParams {
    /// Degrees, positive is clockwise
    pub angle: f64,
    /// Grow the canvas so no corner is clipped
    pub expand: bool,
}

impl RotateParams {
    pub fn new(angle: f64) -> Self {
        Self {
            angle,
            expand: true,
        }
    }
}

pub struct ImageRotator {
    input: ToolInput,
}

impl ImageRotator {
    pub fn new(input: ToolInput) -> Self {
        Self { input }
    }
}

impl Tool for ImageRotator {
    type Params = RotateParams;
    const ACTION: &'static str = "rotate image";

    fn run(&self, params: &RotateParams) -> Result<ProcessingResult, ToolError> {
        if !params.angle.is_finite() {
            return Err(ToolError::InvalidParameter(
                "Angle must be a finite number".into(),
            ));
        }

        let img = open_image(self.input.input_path())?;
        let rotated = rotate_counter_clockwise(&img, -params.angle, params.expand);

        let Some(output) = self.input.output_path() else {
            return Ok(ProcessingResult::success("Image rotated in memory")
                .with_meta("rotation_angle", params.angle)
                .with_meta("new_size", size_json(&rotated)));
        };

        save_image(&rotated, output)?;

        Ok(
            ProcessingResult::success(format!("Image rotated by {} degrees", params.angle))
                .with_output(output, self.input.locator())
                .with_meta("rotation_angle", params.angle)
                .with_meta("expanded", params.expand)
                .with_meta("original_size", size_json(&img))
                .with_meta("new_size", size_json(&rotated)),
        )
    }
}

/// Rotate `img` counter-clockwise by `degrees` about its centre.
///
/// Uncovered pixels are filled with opaque white. Quarter turns that keep
/// the whole image in frame are exact; everything else uses
/// nearest-neighbour sampling.
pub fn rotate_counter_clockwise(img: &DynamicImage, degrees: f64, expand: bool) -> DynamicImage {
    let normalized = degrees.rem_euclid(360.0);
    let (w, h) = img.dimensions();

    let quarter = (normalized / 90.0).round();
    if (normalized - quarter * 90.0).abs() < 1e-9 {
        let turns = quarter as u32 % 4;
        if expand || turns % 2 == 0 || w == h {
            debug!("Rotating by {} quarter turns", turns);
            return match turns {
                0 => img.clone(),
                1 => img.rotate270(),
                2 => img.rotate180(),
                _ => img.rotate90(),
            };
        }
    }

    match img {
        DynamicImage::ImageLuma8(buf) => {
            DynamicImage::ImageLuma8(rotate_buffer(buf, normalized, expand, Luma([u8::MAX])))
        }
        DynamicImage::ImageLumaA8(buf) => DynamicImage::ImageLumaA8(rotate_buffer(
            buf,
            normalized,
            expand,
            LumaA([u8::MAX; 2]),
        )),
        DynamicImage::ImageRgb8(buf) => {
            DynamicImage::ImageRgb8(rotate_buffer(buf, normalized, expand, Rgb([u8::MAX; 3])))
        }
        DynamicImage::ImageLuma16(buf) => {
            DynamicImage::ImageLuma16(rotate_buffer(buf, normalized, expand, Luma([u16::MAX])))
        }
        DynamicImage::ImageLumaA16(buf) => DynamicImage::ImageLumaA16(rotate_buffer(
            buf,
            normalized,
            expand,
            LumaA([u16::MAX; 2]),
        )),
        DynamicImage::ImageRgb16(buf) => {
            DynamicImage::ImageRgb16(rotate_buffer(buf, normalized, expand, Rgb([u16::MAX; 3])))
        }
        DynamicImage::ImageRgba16(buf) => DynamicImage::ImageRgba16(rotate_buffer(
            buf,
            normalized,
            expand,
            Rgba([u16::MAX; 4]),
        )),
        DynamicImage::ImageRgb32F(buf) => {
            DynamicImage::ImageRgb32F(rotate_buffer(buf, normalized, expand, Rgb([1.0; 3])))
        }
        DynamicImage::ImageRgba32F(buf) => {
            DynamicImage::ImageRgba32F(rotate_buffer(buf, normalized, expand, Rgba([1.0; 4])))
        }
        other => DynamicImage::ImageRgba8(rotate_buffer(
            &other.to_rgba8(),
            normalized,
            expand,
            Rgba([u8::MAX; 4]),
        )),
    }
}

fn rotate_buffer<P: Pixel>(
    src: &ImageBuffer<P, Vec<P::Subpixel>>,
    degrees_ccw: f64,
    expand: bool,
    fill: P,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let (w, h) = src.dimensions();
    let theta = degrees_ccw.to_radians();
    let (sin, cos) = theta.sin_cos();

    let (out_w, out_h) = if expand {
        let bw = w as f64 * cos.abs() + h as f64 * sin.abs();
        let bh = w as f64 * sin.abs() + h as f64 * cos.abs();
        (
            ((bw - 1e-6).ceil() as u32).max(1),
            ((bh - 1e-6).ceil() as u32).max(1),
        )
    } else {
        (w, h)
    };

    let (src_cx, src_cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let (dst_cx, dst_cy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    // Inverse mapping from each destination pixel centre back into the source
    ImageBuffer::from_fn(out_w, out_h, |x, y| {
        let dx = x as f64 + 0.5 - dst_cx;
        let dy = y as f64 + 0.5 - dst_cy;
        let sx = (dx * cos - dy * sin + src_cx).floor();
        let sy = (dx * sin + dy * cos + src_cy).floor();

        if sx >= 0.0 && sy >= 0.0 && sx < w as f64 && sy < h as f64 {
            *src.get_pixel(sx as u32, sy as u32)
        } else {
            fill
        }
    })
}
