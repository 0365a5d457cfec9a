//! Image preprocessing for classifier inference.
//!
//! Turns uploaded image bytes into the `(1, 224, 224, 3)` float batch the
//! model was trained on: RGB, Lanczos3-resized, scaled to [0, 1].

use anyhow::{bail, Context, Result};
use image::imageops::{self, FilterType};
use ndarray::{Array3, Array4, Axis};
use tracing::{debug, error, warn};

/// Model input resolution (width, height)
pub const TARGET_SIZE: (u32, u32) = (224, 224);

/// Inputs shorter than this cannot be a real image
pub const MIN_IMAGE_BYTES: usize = 100;

/// Mean pixel values outside this range suggest a blank frame
const MEAN_PIXEL_RANGE: (f32, f32) = (5.0, 250.0);

/// Resampling filter used for every resize
const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Image preprocessor producing model-ready tensors.
pub struct Preprocessor {
    width: u32,
    height: u32,
}

impl Preprocessor {
    /// Preprocessor for the default 224x224 model input
    pub fn new() -> Self {
        Self::with_target_size(TARGET_SIZE.0, TARGET_SIZE.1)
    }

    pub fn with_target_size(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Preprocess image bytes into a single-image batch.
    ///
    /// Returns `None` when the bytes cannot be turned into a valid tensor;
    /// the cause is logged.
    pub fn preprocess(&self, image_data: &[u8]) -> Option<Array4<f32>> {
        match self.try_preprocess(image_data) {
            Ok(tensor) => Some(tensor),
            Err(e) => {
                error!(error = %e, bytes = image_data.len(), "Error preprocessing image");
                None
            }
        }
    }

    fn try_preprocess(&self, image_data: &[u8]) -> Result<Array4<f32>> {
        if image_data.len() < MIN_IMAGE_BYTES {
            bail!("Image data too small: {} bytes", image_data.len());
        }

        let image = image::load_from_memory(image_data).context("Failed to decode image")?;
        debug!(
            color = ?image.color(),
            width = image.width(),
            height = image.height(),
            "Processing image"
        );

        let rgb = image.to_rgb8();
        let resized = imageops::resize(&rgb, self.width, self.height, RESAMPLE_FILTER);
        let (width, height) = resized.dimensions();

        let pixels: Vec<f32> = resized.into_raw().into_iter().map(f32::from).collect();
        let array = Array3::from_shape_vec((height as usize, width as usize, 3), pixels)
            .context("Pixel buffer does not match image dimensions")?;

        let expected = [self.height as usize, self.width as usize, 3];
        if array.shape() != &expected[..] {
            bail!("Unexpected image shape: {:?}", array.shape());
        }

        let mean = array.mean().unwrap_or(0.0);
        if mean < MEAN_PIXEL_RANGE.0 || mean > MEAN_PIXEL_RANGE.1 {
            warn!(mean_pixel_value = mean, "Image seems unusual (nearly uniform black or white)");
        }

        let batch = (array / 255.0).insert_axis(Axis(0));
        debug!(shape = ?batch.shape(), "Preprocessed image");
        Ok(batch)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_jpeg_produces_batch_tensor() {
        let bytes = encode(gradient(300, 300), ImageFormat::Jpeg);
        let tensor = Preprocessor::new().preprocess(&bytes).unwrap();

        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_non_rgb_modes_normalize_to_three_channels() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(120, 80, image::Luma([128])));
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            64,
            200,
            image::Rgba([10, 200, 30, 128]),
        ));

        let preprocessor = Preprocessor::new();
        for bytes in [encode(gray, ImageFormat::Png), encode(rgba, ImageFormat::Png)] {
            let tensor = preprocessor.preprocess(&bytes).unwrap();
            assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        }
    }

    #[test]
    fn test_pixel_scaling() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([255, 255, 255])));
        let tensor = Preprocessor::new()
            .preprocess(&encode(white, ImageFormat::Png))
            .unwrap();
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_degenerate_image_is_not_rejected() {
        let black = DynamicImage::ImageRgb8(RgbImage::new(256, 256));
        let tensor = Preprocessor::new().preprocess(&encode(black, ImageFormat::Png));
        assert!(tensor.is_some());
    }

    #[test]
    fn test_rejects_tiny_and_corrupt_input() {
        let preprocessor = Preprocessor::new();
        assert!(preprocessor.preprocess(&[]).is_none());
        assert!(preprocessor.preprocess(&[0xFF; 50]).is_none());
        assert!(preprocessor.preprocess(&[0x42; 4096]).is_none());

        let mut truncated = encode(gradient(300, 300), ImageFormat::Png);
        truncated.truncate(truncated.len() / 3);
        assert!(preprocessor.preprocess(&truncated).is_none());
    }

    #[test]
    fn test_custom_target_size() {
        let preprocessor = Preprocessor::with_target_size(128, 96);
        let tensor = preprocessor
            .preprocess(&encode(gradient(300, 200), ImageFormat::Bmp))
            .unwrap();
        assert_eq!(tensor.shape(), &[1, 96, 128, 3]);
    }
}
