#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Cutout
//!
//! Background removal orchestration for upload-style frontends: file intake,
//! compression/normalization, inference invocation with progress reporting,
//! result materialization as a downloadable blob, and explicit lifecycle
//! management for the transient blob references a frontend displays.
//!
//! The inference algorithm itself is an external collaborator behind the
//! [`BackgroundRemovalBackend`] trait; this crate provides everything around
//! it:
//!
//! - **[`ResourceHandleRegistry`]**: explicit acquire/release table for
//!   transient blobs, the equivalent of the browser's object-URL memory.
//! - **[`ImageNormalizer`]**: bounds uploads to 1920px / ~1MB, re-encoded as
//!   PNG, before inference.
//! - **[`BackgroundRemovalInvoker`]**: progress forwarding with a monotonic
//!   clamp and uniform error normalization over the backend.
//! - **[`ProcessingPipeline`]**: normalize → remove background → package the
//!   result behind a fresh registry handle.
//! - **[`UploadSession`]** and [`spawn_session`]: the
//!   Idle/Uploaded/Processing/Succeeded/Failed state machine, driven by a
//!   single-writer message inbox so progress callbacks never mutate state
//!   from arbitrary contexts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cutout::{
//!     spawn_session, ImageAsset, MockBackend, ProcessingPipeline,
//!     ResourceHandleRegistry, SessionStatus,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
//! let registry = Arc::new(ResourceHandleRegistry::new());
//! let pipeline = Arc::new(ProcessingPipeline::with_backend(
//!     Box::new(MockBackend::new()), // swap in a real inference capability
//!     registry.clone(),
//! ));
//!
//! let session = spawn_session(pipeline);
//! session.upload(ImageAsset::new(upload_bytes, "image/jpeg"));
//! session.process();
//!
//! let mut updates = session.watch();
//! while updates.changed().await.is_ok() {
//!     let snapshot = updates.borrow().clone();
//!     match snapshot.status {
//!         SessionStatus::Processing => println!("{:.0}%", snapshot.progress * 100.0),
//!         SessionStatus::Succeeded => {
//!             let handle = snapshot.processed.expect("result installed");
//!             let blob = registry.payload(&handle).expect("handle is live");
//!             std::fs::write(cutout::DEFAULT_OUTPUT_FILENAME, blob.data())?;
//!             break;
//!         }
//!         SessionStatus::Failed => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! For one-shot use without a session, run the pipeline directly or use
//! [`remove_background_from_bytes`].

pub mod backends;
pub mod error;
pub mod invoker;
pub mod normalizer;
pub mod pipeline;
pub mod registry;
pub mod services;
pub mod session;
pub mod types;

// Public API exports
pub use backends::{BackgroundRemovalBackend, MockBackend};
pub use error::{CutoutError, Result};
pub use invoker::BackgroundRemovalInvoker;
pub use normalizer::{ImageNormalizer, NormalizerConfig, NormalizerConfigBuilder};
pub use pipeline::ProcessingPipeline;
pub use registry::{Blob, RegistryStats, ResourceHandle, ResourceHandleRegistry};
pub use services::{FnProgressReporter, MonotonicProgress, NoOpProgressReporter, ProgressReporter};
pub use session::{spawn_session, SessionHandle, SessionSnapshot, SessionStatus, UploadSession};
pub use types::{
    ImageAsset, NormalizedImageAsset, ProcessedResult, ProcessingTimings,
    DEFAULT_OUTPUT_FILENAME, OUTPUT_MEDIA_TYPE,
};

/// Remove the background from an image provided as bytes.
///
/// One-shot convenience over [`ProcessingPipeline::run`] for callers that
/// don't need a session or progress reporting.
///
/// # Errors
/// - `CutoutError::Decode` when the bytes cannot be decoded as an image
/// - `CutoutError::Processing` when the inference capability fails
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    media_type: &str,
    pipeline: &ProcessingPipeline,
) -> Result<ProcessedResult> {
    let asset = ImageAsset::new(image_bytes.to_vec(), media_type);
    pipeline.run(&asset, &NoOpProgressReporter).await
}
