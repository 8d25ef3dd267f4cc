use std::fmt;
use std::str::FromStr;

use image::{ImageFormat, ImageReader};
use serde_json::Value;

use super::{open_image, save_image_as};
use crate::error::ToolError;
use crate::result::ProcessingResult;
use crate::tool::{Tool, ToolInput};

/// Quality used when the caller does not supply one
pub const DEFAULT_CONVERT_QUALITY: u8 = 95;

/// Formats an image can be converted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    Jpeg,
    Png,
    Webp,
    Bmp,
    Tiff,
}

impl ImageTarget {
    pub const ALL: [ImageTarget; 5] = [
        ImageTarget::Jpeg,
        ImageTarget::Png,
        ImageTarget::Webp,
        ImageTarget::Bmp,
        ImageTarget::Tiff,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ImageTarget::Jpeg => "JPEG",
            ImageTarget::Png => "PNG",
            ImageTarget::Webp => "WEBP",
            ImageTarget::Bmp => "BMP",
            ImageTarget::Tiff => "TIFF",
        }
    }

    /// File extension including the dot
    pub fn extension(self) -> &'static str {
        match self {
            ImageTarget::Jpeg => ".jpg",
            ImageTarget::Png => ".png",
            ImageTarget::Webp => ".webp",
            ImageTarget::Bmp => ".bmp",
            ImageTarget::Tiff => ".tiff",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            ImageTarget::Jpeg => ImageFormat::Jpeg,
            ImageTarget::Png => ImageFormat::Png,
            ImageTarget::Webp => ImageFormat::WebP,
            ImageTarget::Bmp => ImageFormat::Bmp,
            ImageTarget::Tiff => ImageFormat::Tiff,
        }
    }

    /// Whether a quality setting is meaningful for this target
    pub fn is_lossy(self) -> bool {
        matches!(self, ImageTarget::Jpeg | ImageTarget::Webp)
    }
}

impl fmt::Display for ImageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageTarget {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JPEG" | "JPG" => Ok(ImageTarget::Jpeg),
            "PNG" => Ok(ImageTarget::Png),
            "WEBP" => Ok(ImageTarget::Webp),
            "BMP" => Ok(ImageTarget::Bmp),
            "TIFF" | "TIF" => Ok(ImageTarget::Tiff),
            other => Err(ToolError::UnsupportedFormat(format!(
                "Unsupported target format: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertParams {
    pub target: ImageTarget,
    /// 1-100, honoured by the lossy encoders
    pub quality: u8,
}

impl ConvertParams {
    pub fn new(target: ImageTarget) -> Self {
        Self {
            target,
            quality: DEFAULT_CONVERT_QUALITY,
        }
    }
}

pub struct FormatConverter {
    input: ToolInput,
}

impl FormatConverter {
    pub fn new(input: ToolInput) -> Self {
        Self { input }
    }

    /// Upper-case name of the format detected from the input's content
    fn source_format(&self) -> Result<String, ToolError> {
        let format = ImageReader::open(self.input.input_path())?
            .with_guessed_format()?
            .format();
        Ok(match format {
            Some(f) => format!("{:?}", f).to_uppercase(),
            None => self.input.input_extension().to_uppercase(),
        })
    }
}

impl Tool for FormatConverter {
    type Params = ConvertParams;
    const ACTION: &'static str = "convert image format";

    fn run(&self, params: &ConvertParams) -> Result<ProcessingResult, ToolError> {
        if !(1..=100).contains(&params.quality) {
            return Err(ToolError::InvalidParameter(
                "Quality must be between 1 and 100".into(),
            ));
        }

        let original_format = self.source_format()?;
        let img = open_image(self.input.input_path())?;
        let target = params.target;
        let quality = if target.is_lossy() {
            Value::from(params.quality)
        } else {
            Value::Null
        };

        let Some(output) = self.input.output_path() else {
            return Ok(ProcessingResult::success("Image converted in memory")
                .with_meta("original_format", original_format)
                .with_meta("target_format", target.name()));
        };

        save_image_as(&img, output, target.image_format(), Some(params.quality))?;

        Ok(ProcessingResult::success(format!("Image converted to {}", target))
            .with_output(output, self.input.locator())
            .with_meta("original_format", original_format)
            .with_meta("target_format", target.name())
            .with_meta("quality", quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{open_image, testutil};
    use image::{ColorType, GenericImageView};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_target_parsing_is_case_insensitive() {
        assert_eq!("jpeg".parse::<ImageTarget>().unwrap(), ImageTarget::Jpeg);
        assert_eq!("JPG".parse::<ImageTarget>().unwrap(), ImageTarget::Jpeg);
        assert_eq!(" WebP ".parse::<ImageTarget>().unwrap(), ImageTarget::Webp);
        assert!(matches!(
            "gif".parse::<ImageTarget>(),
            Err(ToolError::UnsupportedFormat(_))
        ));
        assert_eq!(ImageTarget::Tiff.extension(), ".tiff");
    }

    #[test]
    fn test_transparent_png_to_jpeg_lands_on_white() {
        let dir = tempfile::tempdir().unwrap();
        let input = testutil::write_half_transparent(dir.path(), "in.png", 16, 8);
        let output = dir.path().join("out.jpg");

        let tool = FormatConverter::new(ToolInput::new(input, Some(output.clone())).unwrap());
        let result = tool.process(&ConvertParams::new(ImageTarget::Jpeg));

        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, "Image converted to JPEG");
        assert_eq!(result.meta("original_format"), Some(&json!("PNG")));
        assert_eq!(result.meta("target_format"), Some(&json!("JPEG")));
        assert_eq!(result.meta("quality"), Some(&json!(95)));

        let out = open_image(&output).unwrap();
        assert_eq!(out.color(), ColorType::Rgb8);
        assert_eq!(out.dimensions(), (16, 8));
        let [r, g, b] = out.to_rgb8().get_pixel(14, 4).0;
        assert!(r > 240 && g > 240 && b > 240, "expected white, got {:?}", (r, g, b));
    }

    #[test]
    fn test_lossless_target_records_null_quality() {
        let dir = tempfile::tempdir().unwrap();
        let input = testutil::write_rgb(dir.path(), "in.png", 5, 5);
        let output = dir.path().join("out.bmp");

        let tool = FormatConverter::new(ToolInput::new(input, Some(output.clone())).unwrap());
        let result = tool.process(&ConvertParams::new(ImageTarget::Bmp));

        assert!(result.success, "{}", result.message);
        assert_eq!(result.meta("quality"), Some(&Value::Null));
        assert_eq!(
            open_image(&output).unwrap().to_rgb8(),
            testutil::gradient_rgb(5, 5)
        );
    }

    #[test]
    fn test_webp_keeps_quality_in_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let input = testutil::write_rgb(dir.path(), "in.png", 6, 6);
        let output = dir.path().join("out.webp");

        let tool = FormatConverter::new(ToolInput::new(input, Some(output.clone())).unwrap());
        let params = ConvertParams {
            target: ImageTarget::Webp,
            quality: 40,
        };
        let result = tool.process(&params);

        assert!(result.success, "{}", result.message);
        assert_eq!(result.meta("quality"), Some(&json!(40)));
        assert_eq!(open_image(&output).unwrap().dimensions(), (6, 6));
    }

    #[test]
    fn test_webp_quality_changes_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let input = testutil::write_rgb(dir.path(), "in.png", 64, 64);

        let encode_at = |quality: u8| {
            let output = dir.path().join(format!("q{}.webp", quality));
            let tool =
                FormatConverter::new(ToolInput::new(&input, Some(output.clone())).unwrap());
            let result = tool.process(&ConvertParams {
                target: ImageTarget::Webp,
                quality,
            });
            assert!(result.success, "{}", result.message);
            std::fs::read(output).unwrap()
        };

        let low = encode_at(5);
        let high = encode_at(100);
        assert_ne!(low, high);
        assert!(low.len() < high.len(), "q5={} q100={}", low.len(), high.len());
    }

    #[test]
    fn test_zero_quality_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = testutil::write_rgb(dir.path(), "in.png", 2, 2);
        let tool = FormatConverter::new(ToolInput::new(input, None).unwrap());

        let result = tool.process(&ConvertParams {
            target: ImageTarget::Jpeg,
            quality: 0,
        });
        assert!(!result.success);
        assert!(result.message.contains("Quality must be between 1 and 100"));
    }
}
