//! Coarse image checks run before preprocessing

use image::{ImageFormat, ImageReader};
use serde::Serialize;
use std::io::Cursor;

/// Largest accepted upload (50 MiB)
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Smallest accepted width and height in pixels
pub const MIN_IMAGE_DIMENSION: u32 = 50;

/// Result of inspecting an uploaded image
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageInfo {
    pub valid: bool,
    pub format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub file_size: usize,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl ImageInfo {
    fn invalid(file_size: usize, error: String) -> Self {
        Self {
            valid: false,
            file_size,
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Checks size, dimensions and container format from the image header
/// without decoding pixel data.
pub struct ImageValidator {
    supported_formats: Vec<String>,
}

impl ImageValidator {
    /// Validator accepting the given format names (case-insensitive)
    pub fn new(supported_formats: &[String]) -> Self {
        Self {
            supported_formats: supported_formats
                .iter()
                .map(|f| f.to_ascii_uppercase())
                .collect(),
        }
    }

    pub fn supported_formats(&self) -> &[String] {
        &self.supported_formats
    }

    /// Inspect image bytes
    pub fn validate(&self, image_data: &[u8]) -> ImageInfo {
        if image_data.is_empty() {
            return ImageInfo::invalid(0, "No image data provided".to_string());
        }

        let file_size = image_data.len();
        if file_size > MAX_IMAGE_BYTES {
            return ImageInfo::invalid(file_size, "Image too large (>50MB)".to_string());
        }

        let reader = match ImageReader::new(Cursor::new(image_data)).with_guessed_format() {
            Ok(reader) => reader,
            Err(e) => return ImageInfo::invalid(file_size, format!("Invalid image data: {}", e)),
        };

        let Some(format) = reader.format() else {
            return ImageInfo::invalid(file_size, "Unrecognized image format".to_string());
        };
        let format_name = format_name(format);

        let (width, height) = match reader.into_dimensions() {
            Ok(dims) => dims,
            Err(e) => return ImageInfo::invalid(file_size, format!("Invalid image data: {}", e)),
        };

        let mut info = ImageInfo {
            valid: true,
            format: Some(format_name.to_string()),
            width,
            height,
            file_size,
            error: None,
            warning: None,
        };

        if width < MIN_IMAGE_DIMENSION || height < MIN_IMAGE_DIMENSION {
            info.valid = false;
            info.error = Some(format!(
                "Image too small ({}x{}, minimum {}x{} pixels)",
                width, height, MIN_IMAGE_DIMENSION, MIN_IMAGE_DIMENSION
            ));
        } else if !self.is_supported(format_name) {
            info.valid = false;
            info.error = Some(format!("Unsupported image format: {}", format_name));
        } else if width > 8 * 1024 || height > 8 * 1024 {
            info.warning = Some(format!("Very large image ({}x{})", width, height));
        }

        info
    }

    fn is_supported(&self, format_name: &str) -> bool {
        self.supported_formats.iter().any(|f| {
            f == format_name || (format_name == "JPEG" && f == "JPG")
        })
    }
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::Gif => "GIF",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Ico => "ICO",
        _ => format.extensions_str().first().copied().unwrap_or("UNKNOWN"),
    }
}
