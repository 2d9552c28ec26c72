//! Image normalization ahead of inference
//!
//! Bounds an uploaded image to the configured longest side and byte target
//! and re-encodes it as PNG. The byte target is best-effort: the normalizer
//! downscales in bounded steps and stops at a dimension floor rather than
//! degrade the input indefinitely.

use crate::error::{CutoutError, Result};
use crate::types::{ImageAsset, NormalizedImageAsset};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use log::debug;
use serde::{Deserialize, Serialize};

/// Default bound for the longest image side
pub const DEFAULT_MAX_DIMENSION: u32 = 1920;

/// Default byte target for the normalized encoding (1 MiB)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Downscale steps attempted while chasing the byte target
const MAX_DOWNSCALE_ATTEMPTS: u32 = 4;

/// Dimension floor below which the byte target is abandoned
const MIN_DIMENSION: u32 = 256;

/// Normalization bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Longest side of the normalized image
    pub max_dimension: u32,
    /// Byte target for the normalized encoding (best-effort)
    pub max_payload_bytes: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl NormalizerConfig {
    /// Create a new normalizer configuration builder
    #[must_use]
    pub fn builder() -> NormalizerConfigBuilder {
        NormalizerConfigBuilder::new()
    }
}

/// Builder for [`NormalizerConfig`]
pub struct NormalizerConfigBuilder {
    config: NormalizerConfig,
}

impl NormalizerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: NormalizerConfig::default(),
        }
    }

    #[must_use]
    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.max_dimension = max_dimension;
        self
    }

    #[must_use]
    pub fn max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.config.max_payload_bytes = max_payload_bytes;
        self
    }

    /// Build the normalizer configuration
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::InvalidConfig` for zero bounds
    pub fn build(self) -> Result<NormalizerConfig> {
        if self.config.max_dimension == 0 {
            return Err(CutoutError::invalid_config("max_dimension must be non-zero"));
        }
        if self.config.max_payload_bytes == 0 {
            return Err(CutoutError::invalid_config(
                "max_payload_bytes must be non-zero",
            ));
        }
        Ok(self.config)
    }
}

impl Default for NormalizerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Produces size/dimension-bounded PNG versions of uploaded images
#[derive(Debug, Clone, Default)]
pub struct ImageNormalizer {
    config: NormalizerConfig,
}

impl ImageNormalizer {
    /// Create a normalizer with the given bounds
    #[must_use]
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Bounds used by this normalizer
    #[must_use]
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize an uploaded asset for inference.
    ///
    /// The decode and re-encode run on the blocking pool; the caller's task
    /// suspends until they finish. The input asset is not mutated.
    ///
    /// # Errors
    /// - `CutoutError::Decode` when the input cannot be decoded as an image
    /// - `CutoutError::Processing` when re-encoding fails
    pub async fn normalize(&self, asset: &ImageAsset) -> Result<NormalizedImageAsset> {
        let config = self.config.clone();
        let data = asset.data().to_vec();
        let declared = asset.media_type().to_string();
        tokio::task::spawn_blocking(move || normalize_blocking(&data, &declared, &config))
            .await
            .map_err(|e| CutoutError::processing(format!("normalization task failed: {}", e)))?
    }
}

fn normalize_blocking(
    data: &[u8],
    declared_media_type: &str,
    config: &NormalizerConfig,
) -> Result<NormalizedImageAsset> {
    let decoded = image::load_from_memory(data).map_err(|e| {
        CutoutError::decode(format!(
            "failed to decode image (declared {}): {}",
            declared_media_type, e
        ))
    })?;
    let (orig_width, orig_height) = decoded.dimensions();

    let mut current = if decoded.width().max(decoded.height()) > config.max_dimension {
        // resize() preserves aspect ratio within the bounding box
        decoded.resize(config.max_dimension, config.max_dimension, FilterType::Triangle)
    } else {
        decoded
    };
    let mut encoded = encode_png(&current)?;

    // Best-effort byte target: shrink towards the target in bounded steps
    let mut attempts = 0;
    while encoded.len() > config.max_payload_bytes
        && attempts < MAX_DOWNSCALE_ATTEMPTS
        && current.width().max(current.height()) > MIN_DIMENSION
    {
        let ratio = config.max_payload_bytes as f64 / encoded.len() as f64;
        let scale = ratio.sqrt().clamp(0.5, 0.95);
        let new_width = ((f64::from(current.width()) * scale) as u32).max(1);
        let new_height = ((f64::from(current.height()) * scale) as u32).max(1);
        current = current.resize_exact(new_width, new_height, FilterType::Triangle);
        encoded = encode_png(&current)?;
        attempts += 1;
    }

    debug!(
        "normalized {}x{} -> {}x{} ({} -> {} bytes, {} downscale steps)",
        orig_width,
        orig_height,
        current.width(),
        current.height(),
        data.len(),
        encoded.len(),
        attempts
    );

    Ok(NormalizedImageAsset::new(
        encoded,
        current.width(),
        current.height(),
    ))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|e| CutoutError::processing(format!("failed to encode PNG: {}", e)))?;
    Ok(buffer)
}
