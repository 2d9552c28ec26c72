//! Core types for the upload-to-download image flow

use crate::registry::ResourceHandle;
use serde::Serialize;

/// Media type of the fixed output encoding
pub const OUTPUT_MEDIA_TYPE: &str = "image/png";

/// Filename offered by the download surface for a processed result
pub const DEFAULT_OUTPUT_FILENAME: &str = "processed-image.png";

/// Raw uploaded image: bytes plus the media type declared by the picker.
///
/// Immutable once created; normalization derives a new asset and leaves the
/// original untouched.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    data: Vec<u8>,
    media_type: String,
}

impl ImageAsset {
    /// Create an asset from raw bytes and a declared media type
    #[must_use]
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
        }
    }

    /// Raw payload bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Media type declared at intake (not validated until normalization)
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Payload size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Image bounded to the normalizer's dimension and size targets, re-encoded
/// as PNG and ready for inference.
#[derive(Debug, Clone)]
pub struct NormalizedImageAsset {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl NormalizedImageAsset {
    pub(crate) fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Encoded PNG bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Dimensions after normalization (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Longest side after normalization
    #[must_use]
    pub fn longest_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Media type of the normalized encoding, always PNG
    #[must_use]
    pub fn media_type(&self) -> &'static str {
        OUTPUT_MEDIA_TYPE
    }

    /// Encoded size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the encoded payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Stage timings for one pipeline run (milliseconds)
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingTimings {
    /// Time spent in normalization (decode, resize, re-encode)
    pub normalize_ms: u64,
    /// Time spent in the inference capability
    pub inference_ms: u64,
    /// End-to-end run time including result packaging
    pub total_ms: u64,
}

/// Foreground-only image produced by a successful pipeline run.
///
/// Carries the payload bytes together with the registry handle bound to
/// them. Exactly one `ProcessedResult` is live per session at a time; the
/// session releases the previous result's handle before installing a new one.
#[derive(Debug, Clone)]
pub struct ProcessedResult {
    handle: ResourceHandle,
    payload: Vec<u8>,
    timings: ProcessingTimings,
}

impl ProcessedResult {
    pub(crate) fn new(handle: ResourceHandle, payload: Vec<u8>, timings: ProcessingTimings) -> Self {
        Self {
            handle,
            payload,
            timings,
        }
    }

    /// Registry handle usable by display/download surfaces
    #[must_use]
    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// Encoded result bytes
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Media type of the result encoding, always PNG
    #[must_use]
    pub fn media_type(&self) -> &'static str {
        OUTPUT_MEDIA_TYPE
    }

    /// Stage timings for the run that produced this result
    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.timings
    }

    /// Encoded size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the result payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_asset_accessors() {
        let asset = ImageAsset::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg");
        assert_eq!(asset.data(), &[0xFF, 0xD8, 0xFF]);
        assert_eq!(asset.media_type(), "image/jpeg");
        assert_eq!(asset.len(), 3);
        assert!(!asset.is_empty());
    }

    #[test]
    fn test_normalized_asset_dimensions() {
        let asset = NormalizedImageAsset::new(vec![0; 8], 1920, 1440);
        assert_eq!(asset.dimensions(), (1920, 1440));
        assert_eq!(asset.longest_dimension(), 1920);
        assert_eq!(asset.media_type(), "image/png");
    }

    #[test]
    fn test_timings_serialize() {
        let timings = ProcessingTimings {
            normalize_ms: 12,
            inference_ms: 340,
            total_ms: 360,
        };
        let json = serde_json::to_string(&timings).unwrap();
        assert!(json.contains("\"inference_ms\":340"));
    }
}
