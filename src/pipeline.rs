//! Processing pipeline composing normalization, inference and packaging
//!
//! One `run` is the unit of work behind a single "process" action:
//! normalize the upload, invoke background removal with progress forwarding,
//! wrap the returned bytes as a PNG payload and bind a registry handle to
//! them. There is no implicit retry and no cancellation of a run in flight;
//! the session's Processing guard keeps runs mutually exclusive.

use crate::error::Result;
use crate::invoker::BackgroundRemovalInvoker;
use crate::normalizer::ImageNormalizer;
use crate::registry::ResourceHandleRegistry;
use crate::services::ProgressReporter;
use crate::types::{ImageAsset, ProcessedResult, ProcessingTimings, OUTPUT_MEDIA_TYPE};
use instant::Instant;
use log::info;
use std::sync::Arc;
use tracing::instrument;

/// Composes normalizer, invoker and registry into one per-image unit of work
pub struct ProcessingPipeline {
    normalizer: ImageNormalizer,
    invoker: BackgroundRemovalInvoker,
    registry: Arc<ResourceHandleRegistry>,
}

impl ProcessingPipeline {
    /// Create a pipeline from its parts
    #[must_use]
    pub fn new(
        normalizer: ImageNormalizer,
        invoker: BackgroundRemovalInvoker,
        registry: Arc<ResourceHandleRegistry>,
    ) -> Self {
        Self {
            normalizer,
            invoker,
            registry,
        }
    }

    /// Create a pipeline with default normalization bounds
    #[must_use]
    pub fn with_backend(
        backend: Box<dyn crate::backends::BackgroundRemovalBackend>,
        registry: Arc<ResourceHandleRegistry>,
    ) -> Self {
        Self::new(
            ImageNormalizer::default(),
            BackgroundRemovalInvoker::new(backend),
            registry,
        )
    }

    /// Registry this pipeline acquires result handles from
    #[must_use]
    pub fn registry(&self) -> &Arc<ResourceHandleRegistry> {
        &self.registry
    }

    /// Process one uploaded image end to end.
    ///
    /// Normalization failure short-circuits: the removal step is never
    /// attempted. The result handle is acquired last, so a failed run leaves
    /// nothing behind in the registry.
    ///
    /// # Errors
    /// - `CutoutError::Decode` when the upload cannot be decoded
    /// - `CutoutError::Processing` when the inference capability fails
    /// - `CutoutError::Io` when the registry cannot store the result
    #[instrument(skip_all, fields(input_bytes = asset.len()))]
    pub async fn run(
        &self,
        asset: &ImageAsset,
        progress: &dyn ProgressReporter,
    ) -> Result<ProcessedResult> {
        let run_start = Instant::now();

        let normalized = self.normalizer.normalize(asset).await?;
        let normalize_ms = run_start.elapsed().as_millis() as u64;

        let inference_start = Instant::now();
        let output = self.invoker.remove_background(&normalized, progress).await?;
        let inference_ms = inference_start.elapsed().as_millis() as u64;

        let handle = self.registry.acquire(output.clone(), OUTPUT_MEDIA_TYPE)?;
        let timings = ProcessingTimings {
            normalize_ms,
            inference_ms,
            total_ms: run_start.elapsed().as_millis() as u64,
        };
        info!(
            "background removal completed in {}ms (normalize {}ms, inference {}ms)",
            timings.total_ms, timings.normalize_ms, timings.inference_ms
        );

        Ok(ProcessedResult::new(handle, output, timings))
    }
}
