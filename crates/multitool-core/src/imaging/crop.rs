use image::GenericImageView;
use serde_json::json;

use super::{open_image, save_image, size_json};
use crate::error::ToolError;
use crate::result::ProcessingResult;
use crate::tool::{Tool, ToolInput};

#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub struct ImageCropper {
    input: ToolInput,
}

impl ImageCropper {
    pub fn new(input: ToolInput) -> Self {
        Self { input }
    }
}

impl Tool for ImageCropper {
    type Params = CropParams;
    const ACTION: &'static str = "crop image";

    fn run(&self, params: &CropParams) -> Result<ProcessingResult, ToolError> {
        let CropParams {
            x,
            y,
            width,
            height,
        } = *params;

        if width == 0 || height == 0 {
            return Err(ToolError::InvalidParameter(
                "Crop width and height must be positive".into(),
            ));
        }

        let img = open_image(self.input.input_path())?;
        let (img_w, img_h) = img.dimensions();

        // No clamping: the rectangle must lie inside the image
        if x as u64 + width as u64 > img_w as u64 || y as u64 + height as u64 > img_h as u64 {
            return Err(ToolError::OutOfBounds(format!(
                "Crop coordinates exceed image boundaries ({}x{} at {},{} on {}x{})",
                width, height, x, y, img_w, img_h
            )));
        }

        let cropped = img.crop_imm(x, y, width, height);
        let crop_area = json!({ "x": x, "y": y, "width": width, "height": height });

        let Some(output) = self.input.output_path() else {
            return Ok(ProcessingResult::success("Image cropped in memory")
                .with_meta("crop_area", crop_area));
        };

        save_image(&cropped, output)?;

        Ok(
            ProcessingResult::success(format!("Image cropped to {}x{}", width, height))
                .with_output(output, self.input.locator())
                .with_meta("crop_area", crop_area)
                .with_meta("original_size", size_json(&img)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{open_image, testutil};
    use pretty_assertions::assert_eq;

    fn cropper(dir: &std::path::Path) -> ImageCropper {
        let input = testutil::write_rgb(dir, "in.png", 20, 10);
        ImageCropper::new(ToolInput::new(input, Some(dir.join("crop.png"))).unwrap())
    }

    #[test]
    fn test_crop_extracts_rectangle() {
        let dir = tempfile::tempdir().unwrap();
        let params = CropParams {
            x: 5,
            y: 2,
            width: 10,
            height: 8,
        };
        let result = cropper(dir.path()).process(&params);

        assert!(result.success, "{}", result.message);
        assert_eq!(
            result.meta("crop_area"),
            Some(&json!({"x": 5, "y": 2, "width": 10, "height": 8}))
        );
        assert_eq!(result.meta("original_size"), Some(&json!([20, 10])));

        let out = open_image(&dir.path().join("crop.png")).unwrap();
        assert_eq!(out.dimensions(), (10, 8));
        let source = testutil::gradient_rgb(20, 10);
        assert_eq!(out.to_rgb8().get_pixel(0, 0), source.get_pixel(5, 2));
    }

    #[test]
    fn test_crop_whole_image_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let params = CropParams {
            x: 0,
            y: 0,
            width: 20,
            height: 10,
        };
        assert!(cropper(dir.path()).process(&params).success);
    }

    #[test]
    fn test_crop_one_pixel_too_wide_is_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let params = CropParams {
            x: 0,
            y: 0,
            width: 21,
            height: 10,
        };
        let tool = cropper(dir.path());

        let err = tool.run(&params).unwrap_err();
        assert!(matches!(err, ToolError::OutOfBounds(_)));

        let result = tool.process(&params);
        assert!(!result.success);
        assert!(result.message.contains("exceed image boundaries"));
        assert!(!dir.path().join("crop.png").exists());
    }

    #[test]
    fn test_crop_offset_overflow_is_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let params = CropParams {
            x: u32::MAX,
            y: 0,
            width: 2,
            height: 1,
        };
        assert!(matches!(
            cropper(dir.path()).run(&params),
            Err(ToolError::OutOfBounds(_))
        ));
    }
}
