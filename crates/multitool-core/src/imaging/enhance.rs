use std::ops::RangeInclusive;

use image::{DynamicImage, Rgba, RgbaImage};
use serde_json::json;
use tracing::debug;

use super::{open_image, restore_color, save_image};
use crate::error::ToolError;
use crate::result::ProcessingResult;
use crate::tool::{Tool, ToolInput};

/// Accepted range for every enhancement factor
pub const ENHANCE_RANGE: RangeInclusive<f64> = 0.1..=3.0;

/// Enhancement factors; `1.0` leaves the property unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhanceParams {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub sharpness: f64,
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            sharpness: 1.0,
        }
    }
}

impl EnhanceParams {
    /// Check every factor lies in [`ENHANCE_RANGE`].
    pub fn validate(&self) -> Result<(), ToolError> {
        for (name, value) in self.named() {
            if !ENHANCE_RANGE.contains(&value) {
                return Err(ToolError::InvalidParameter(format!(
                    "{} must be between 0.1 and 3.0",
                    name
                )));
            }
        }
        Ok(())
    }

    fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("Brightness", self.brightness),
            ("Contrast", self.contrast),
            ("Saturation", self.saturation),
            ("Sharpness", self.sharpness),
        ]
    }

    fn is_identity(&self) -> bool {
        self.named().iter().all(|(_, v)| *v == 1.0)
    }
}

pub struct ImageEnhancer {
    input: ToolInput,
}

impl ImageEnhancer {
    pub fn new(input: ToolInput) -> Self {
        Self { input }
    }
}

impl Tool for ImageEnhancer {
    type Params = EnhanceParams;
    const ACTION: &'static str = "enhance image";

    fn run(&self, params: &EnhanceParams) -> Result<ProcessingResult, ToolError> {
        params.validate()?;

        let img = open_image(self.input.input_path())?;
        let enhanced = enhance(&img, params);

        let adjustments = json!({
            "brightness": params.brightness,
            "contrast": params.contrast,
            "saturation": params.saturation,
            "sharpness": params.sharpness,
        });

        let Some(output) = self.input.output_path() else {
            return Ok(ProcessingResult::success("Image enhanced in memory")
                .with_meta("adjustments", adjustments));
        };

        save_image(&enhanced, output)?;

        Ok(ProcessingResult::success("Image enhanced successfully")
            .with_output(output, self.input.locator())
            .with_meta("adjustments", adjustments))
    }
}

/// Apply brightness, contrast, saturation and sharpness in that order.
fn enhance(img: &DynamicImage, params: &EnhanceParams) -> DynamicImage {
    if params.is_identity() {
        return img.clone();
    }

    let color = img.color();
    let mut rgba = img.to_rgba8();

    if params.brightness != 1.0 {
        debug!("brightness x{}", params.brightness);
        blend_towards(&mut rgba, params.brightness, |_, _, _| [0.0; 3]);
    }

    if params.contrast != 1.0 {
        debug!("contrast x{}", params.contrast);
        let mean = mean_luminance(&rgba);
        blend_towards(&mut rgba, params.contrast, |_, _, _| [mean; 3]);
    }

    if params.saturation != 1.0 {
        debug!("saturation x{}", params.saturation);
        blend_towards(&mut rgba, params.saturation, |src, x, y| {
            [luminance(src.get_pixel(x, y)).round(); 3]
        });
    }

    if params.sharpness != 1.0 {
        debug!("sharpness x{}", params.sharpness);
        blend_towards(&mut rgba, params.sharpness, smoothed);
    }

    restore_color(DynamicImage::ImageRgba8(rgba), color)
}

/// `out = degenerate + factor * (img - degenerate)` on the colour channels.
fn blend_towards<F>(img: &mut RgbaImage, factor: f64, degenerate: F)
where
    F: Fn(&RgbaImage, u32, u32) -> [f64; 3],
{
    let snapshot = img.clone();
    for (x, y, px) in img.enumerate_pixels_mut() {
        let d = degenerate(&snapshot, x, y);
        for c in 0..3 {
            let v = d[c] + factor * (px[c] as f64 - d[c]);
            px[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn luminance(p: &Rgba<u8>) -> f64 {
    0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64
}

fn mean_luminance(img: &RgbaImage) -> f64 {
    let count = img.width() as f64 * img.height() as f64;
    if count == 0.0 {
        return 0.0;
    }
    let total: f64 = img.pixels().map(|p| luminance(p).round()).sum();
    (total / count + 0.5).floor()
}

/// 3x3 smoothing with weights `[1 1 1; 1 5 1; 1 1 1] / 13`; the outermost
/// ring keeps its original values.
fn smoothed(src: &RgbaImage, x: u32, y: u32) -> [f64; 3] {
    let px = src.get_pixel(x, y);
    if x == 0 || y == 0 || x + 1 >= src.width() || y + 1 >= src.height() {
        return [px[0] as f64, px[1] as f64, px[2] as f64];
    }

    let mut acc = [0.0f64; 3];
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            let weight = if nx == x && ny == y { 5.0 } else { 1.0 };
            let n = src.get_pixel(nx, ny);
            for c in 0..3 {
                acc[c] += weight * n[c] as f64;
            }
        }
    }
    acc.map(|v| (v / 13.0).round())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{open_image, testutil};
    use image::{ColorType, GenericImageView, Rgb, RgbImage};
    use pretty_assertions::assert_eq;

    fn rgb(pixels: &[[u8; 3]]) -> DynamicImage {
        let img = RgbImage::from_fn(pixels.len() as u32, 1, |x, _| Rgb(pixels[x as usize]));
        DynamicImage::ImageRgb8(img)
    }

    fn params() -> EnhanceParams {
        EnhanceParams::default()
    }

    #[test]
    fn test_brightness_scales_channels() {
        let out = enhance(
            &rgb(&[[100, 50, 200]]),
            &EnhanceParams {
                brightness: 2.0,
                ..params()
            },
        );
        assert_eq!(out.to_rgb8().get_pixel(0, 0).0, [200, 100, 255]);
    }

    #[test]
    fn test_contrast_pulls_towards_mean_grey() {
        let out = enhance(
            &rgb(&[[0, 0, 0], [200, 200, 200]]),
            &EnhanceParams {
                contrast: 0.5,
                ..params()
            },
        );
        let out = out.to_rgb8();
        assert_eq!(out.get_pixel(0, 0).0, [50, 50, 50]);
        assert_eq!(out.get_pixel(1, 0).0, [150, 150, 150]);
    }

    #[test]
    fn test_low_saturation_approaches_grey() {
        let out = enhance(
            &rgb(&[[255, 0, 0]]),
            &EnhanceParams {
                saturation: 0.1,
                ..params()
            },
        );
        assert_eq!(out.to_rgb8().get_pixel(0, 0).0, [94, 68, 68]);
    }

    #[test]
    fn test_sharpness_leaves_flat_image_alone() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 5, Rgb([90, 120, 30])));
        let out = enhance(
            &flat,
            &EnhanceParams {
                sharpness: 3.0,
                ..params()
            },
        );
        assert_eq!(out, flat);
    }

    #[test]
    fn test_sharpness_amplifies_edges() {
        let mut img = RgbImage::from_pixel(3, 3, Rgb([100, 100, 100]));
        img.put_pixel(1, 1, Rgb([200, 200, 200]));
        let out = enhance(
            &DynamicImage::ImageRgb8(img),
            &EnhanceParams {
                sharpness: 2.0,
                ..params()
            },
        )
        .to_rgb8();

        // Smoothed centre is (8*100 + 5*200) / 13 = 138.46 -> 138
        assert_eq!(out.get_pixel(1, 1).0, [255, 255, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [100, 100, 100]);
    }

    #[test]
    fn test_alpha_and_color_type_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let input = testutil::write_half_transparent(dir.path(), "in.png", 4, 2);
        let output = dir.path().join("out.png");

        let tool = ImageEnhancer::new(ToolInput::new(input, Some(output.clone())).unwrap());
        let result = tool.process(&EnhanceParams {
            brightness: 0.5,
            ..params()
        });
        assert!(result.success, "{}", result.message);
        assert_eq!(
            result.meta("adjustments"),
            Some(&json!({"brightness": 0.5, "contrast": 1.0, "saturation": 1.0, "sharpness": 1.0}))
        );

        let out = open_image(&output).unwrap();
        assert_eq!(out.color(), ColorType::Rgba8);
        assert_eq!(out.dimensions(), (4, 2));
        let out = out.to_rgba8();
        assert_eq!(out.get_pixel(0, 0).0, [128, 0, 0, 255]);
        assert_eq!(out.get_pixel(3, 0)[3], 0);
    }

    #[test]
    fn test_identity_factors_keep_pixels() {
        let img = rgb(&[[1, 2, 3], [4, 5, 6]]);
        assert_eq!(enhance(&img, &params()), img);
    }

    #[test]
    fn test_out_of_range_factor_fails() {
        let err = EnhanceParams {
            contrast: 3.5,
            ..params()
        }
        .validate()
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid parameter: Contrast must be between 0.1 and 3.0"
        );

        let nan = EnhanceParams {
            sharpness: f64::NAN,
            ..params()
        };
        assert!(nan.validate().is_err());
        assert!(EnhanceParams {
            brightness: 0.1,
            saturation: 3.0,
            ..params()
        }
        .validate()
        .is_ok());
    }
}
