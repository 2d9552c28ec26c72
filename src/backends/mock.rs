//! Mock backend implementation for testing and examples

use crate::backends::BackgroundRemovalBackend;
use crate::services::ProgressReporter;
use async_trait::async_trait;
use image::DynamicImage;
use std::io::Cursor;

/// Mock backend that clears bright pixels instead of running a model.
///
/// Pixels whose luma meets the threshold are made fully transparent, which
/// approximates matting a subject photographed on a light background. Useful
/// for exercising the pipeline without an actual inference capability.
#[derive(Debug, Clone)]
pub struct MockBackend {
    threshold: u8,
}

impl MockBackend {
    /// Create a mock backend with the default luma threshold
    #[must_use]
    pub fn new() -> Self {
        Self { threshold: 240 }
    }

    /// Create a mock backend with a custom luma threshold
    #[must_use]
    pub fn with_threshold(threshold: u8) -> Self {
        Self { threshold }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundRemovalBackend for MockBackend {
    async fn remove_background(
        &self,
        image_png: &[u8],
        progress: &dyn ProgressReporter,
    ) -> anyhow::Result<Vec<u8>> {
        progress.report(0.1);

        let decoded = image::load_from_memory(image_png)?;
        let mut rgba = decoded.to_rgba8();
        let height = rgba.height().max(1);
        progress.report(0.25);

        for (y, row) in rgba.rows_mut().enumerate() {
            for pixel in row {
                // Integer Rec. 601 luma approximation
                let luma = (u32::from(pixel[0]) * 299
                    + u32::from(pixel[1]) * 587
                    + u32::from(pixel[2]) * 114)
                    / 1000;
                if luma >= u32::from(self.threshold) {
                    pixel[3] = 0;
                }
            }
            if y as u32 == height / 2 {
                progress.report(0.6);
            }
        }
        progress.report(0.9);

        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(rgba).write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::FnProgressReporter;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    fn half_white_png() -> Vec<u8> {
        // Left half white (background), right half dark (subject)
        let img = RgbaImage::from_fn(8, 8, |x, _y| {
            if x < 4 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([20, 20, 20, 255])
            }
        });
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[tokio::test]
    async fn test_bright_pixels_become_transparent() {
        let backend = MockBackend::new();
        let output = backend
            .remove_background(&half_white_png(), &crate::services::NoOpProgressReporter)
            .await
            .unwrap();

        let result = image::load_from_memory(&output).unwrap().to_rgba8();
        assert_eq!(result.get_pixel(0, 0)[3], 0);
        assert_eq!(result.get_pixel(7, 7)[3], 255);
    }

    #[tokio::test]
    async fn test_reports_increasing_progress() {
        let seen = Mutex::new(Vec::new());
        let reporter = FnProgressReporter::new(|fraction| seen.lock().unwrap().push(fraction));

        let backend = MockBackend::new();
        backend
            .remove_background(&half_white_png(), &reporter)
            .await
            .unwrap();

        let values = seen.lock().unwrap().clone();
        assert!(!values.is_empty());
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[tokio::test]
    async fn test_invalid_input_fails() {
        let backend = MockBackend::new();
        let result = backend
            .remove_background(b"not a png", &crate::services::NoOpProgressReporter)
            .await;
        assert!(result.is_err());
    }
}
