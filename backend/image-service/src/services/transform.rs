//! Image transform - fixed-size thumbnail generation
//!
//! Decodes the staged bytes, resizes to fill the configured box (cropping the
//! overflow) and encodes the result as JPEG.
//!
//! Uses `spawn_blocking` for CPU-intensive operations to avoid blocking the async runtime.

use crate::error::{AppError, Result};
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Configuration for the transform
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            quality: 85,
        }
    }
}

/// Result of a transform
#[derive(Debug)]
pub struct TransformedImage {
    /// JPEG-encoded output
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

pub struct ImageTransformer {
    config: TransformConfig,
}

impl ImageTransformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(TransformConfig::default())
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Transform the given image bytes (blocking version)
    ///
    /// **Note:** This method performs CPU-intensive operations and should not be called
    /// directly from async code. Use `transform_async` instead.
    pub fn transform(&self, original: &[u8]) -> Result<TransformedImage> {
        let img = image::load_from_memory(original)
            .map_err(|e| AppError::Transform(format!("Failed to decode image: {e}")))?;

        let (orig_w, orig_h) = img.dimensions();
        debug!(
            original_width = orig_w,
            original_height = orig_h,
            "Transforming image"
        );

        let resized = img.resize_to_fill(self.config.width, self.config.height, FilterType::Triangle);
        let data = self.encode_jpeg(&resized)?;

        debug!(
            width = self.config.width,
            height = self.config.height,
            size = data.len(),
            "Image transformed"
        );

        Ok(TransformedImage {
            data,
            width: self.config.width,
            height: self.config.height,
        })
    }

    /// Transform on the blocking thread pool
    pub async fn transform_async(self: Arc<Self>, original: Bytes) -> Result<TransformedImage> {
        tokio::task::spawn_blocking(move || self.transform(&original))
            .await
            .map_err(|e| AppError::Internal(format!("Transform task panicked: {e}")))?
    }

    fn encode_jpeg(&self, img: &DynamicImage) -> Result<Bytes> {
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);

        // JPEG has no alpha channel
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut cursor, ImageOutputFormat::Jpeg(self.config.quality))
            .map_err(|e| AppError::Transform(format!("Failed to encode JPEG: {e}")))?;

        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 128]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_output_has_fixed_size() {
        let transformer = ImageTransformer::with_defaults();
        for (w, h) in [(10, 10), (640, 480), (30, 900)] {
            let result = transformer.transform(&png(w, h)).unwrap();
            assert!(!result.data.is_empty());

            let decoded = image::load_from_memory_with_format(&result.data, ImageFormat::Jpeg).unwrap();
            assert_eq!(decoded.dimensions(), (100, 100));
        }
    }

    #[test]
    fn test_transform_is_deterministic() {
        let transformer = ImageTransformer::with_defaults();
        let input = png(64, 48);
        let a = transformer.transform(&input).unwrap();
        let b = transformer.transform(&input).unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn test_corrupt_input_is_transform_error() {
        let transformer = ImageTransformer::with_defaults();
        let err = transformer.transform(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AppError::Transform(_)));
    }

    #[tokio::test]
    async fn test_transform_async_custom_size() {
        let transformer = Arc::new(ImageTransformer::new(TransformConfig {
            width: 32,
            height: 16,
            quality: 70,
        }));
        let result = transformer
            .transform_async(Bytes::from(png(300, 300)))
            .await
            .unwrap();
        assert_eq!((result.width, result.height), (32, 16));
    }
}
