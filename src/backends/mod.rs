//! Inference capability abstraction
//!
//! The background removal algorithm itself is an external collaborator: a
//! black box that takes image bytes and returns foreground-only image bytes,
//! optionally reporting fractional progress along the way. Frontends inject
//! an implementation of [`BackgroundRemovalBackend`]; the crate ships
//! [`MockBackend`] as a deterministic stand-in for tests and examples.

pub mod mock;

pub use mock::MockBackend;

use crate::services::ProgressReporter;
use async_trait::async_trait;

/// External background removal capability.
///
/// Implementations receive normalized PNG bytes and return foreground-only
/// PNG bytes. Progress may be reported zero or more times; no call count or
/// terminal value is guaranteed. Errors are opaque to the caller — the
/// invoker collapses them into a single processing error kind without
/// inspecting their substructure.
#[async_trait]
pub trait BackgroundRemovalBackend: Send + Sync {
    /// Remove the background from an encoded image
    ///
    /// # Errors
    /// Any backend failure; the concrete error type is not part of the
    /// contract.
    async fn remove_background(
        &self,
        image_png: &[u8],
        progress: &dyn ProgressReporter,
    ) -> anyhow::Result<Vec<u8>>;
}
