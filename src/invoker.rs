//! Invocation wrapper around the inference capability
//!
//! Translates the backend's progress signal into the caller-supplied
//! reporter (through the monotonic clamp) and normalizes every backend
//! failure into `CutoutError::Processing`.

use crate::backends::BackgroundRemovalBackend;
use crate::error::{CutoutError, Result};
use crate::services::{MonotonicProgress, ProgressReporter};
use crate::types::NormalizedImageAsset;
use log::debug;

/// Wraps the external inference capability behind a typed contract
pub struct BackgroundRemovalInvoker {
    backend: Box<dyn BackgroundRemovalBackend>,
}

impl BackgroundRemovalInvoker {
    /// Create an invoker around a backend implementation
    #[must_use]
    pub fn new(backend: Box<dyn BackgroundRemovalBackend>) -> Self {
        Self { backend }
    }

    /// Run background removal on a normalized image.
    ///
    /// Progress delivered to `progress` is clamped to `[0, 1]` and
    /// non-decreasing regardless of backend behavior. Zero progress calls
    /// followed by success is valid; callers must not wait for a terminal
    /// progress value.
    ///
    /// # Errors
    /// - `CutoutError::Processing` for any backend failure
    pub async fn remove_background(
        &self,
        asset: &NormalizedImageAsset,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<u8>> {
        let monotonic = MonotonicProgress::new(progress);
        debug!(
            "invoking background removal on {} bytes ({}x{})",
            asset.len(),
            asset.dimensions().0,
            asset.dimensions().1
        );
        self.backend
            .remove_background(asset.data(), &monotonic)
            .await
            .map_err(|e| CutoutError::processing(format!("background removal failed: {}", e)))
    }
}
