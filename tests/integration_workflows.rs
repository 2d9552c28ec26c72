//! End-to-end session workflows
//!
//! Drives the message-passing session runtime against real and misbehaving
//! backends, covering the upload → process → download lifecycle, handle
//! accounting, failure recovery, and the mutual-exclusion guard.

use async_trait::async_trait;
use cutout::{
    spawn_session, BackgroundRemovalBackend, ImageAsset, MockBackend, ProcessingPipeline,
    ProgressReporter, ResourceHandleRegistry, SessionSnapshot, SessionStatus,
};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn jpeg_asset(width: u32, height: u32) -> ImageAsset {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 7 + y * 13) % 256) as u8,
            ((x * 3 + y * 5) % 256) as u8,
            ((x + y * 11) % 256) as u8,
        ])
    });
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Jpeg)
        .unwrap();
    ImageAsset::new(buffer, "image/jpeg")
}

fn small_png_asset() -> ImageAsset {
    let img = RgbImage::from_pixel(32, 32, Rgb([40, 40, 40]));
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    ImageAsset::new(buffer, "image/png")
}

async fn wait_for(
    updates: &mut watch::Receiver<SessionSnapshot>,
    what: &str,
    predicate: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    loop {
        {
            let snapshot = updates.borrow_and_update().clone();
            if predicate(&snapshot) {
                return snapshot;
            }
        }
        tokio::time::timeout(Duration::from_secs(30), updates.changed())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
            .expect("session driver went away");
    }
}

/// Backend that fails every invocation
struct FailingBackend;

#[async_trait]
impl BackgroundRemovalBackend for FailingBackend {
    async fn remove_background(
        &self,
        _image_png: &[u8],
        progress: &dyn ProgressReporter,
    ) -> anyhow::Result<Vec<u8>> {
        progress.report(0.3);
        Err(anyhow::anyhow!("segmentation model unavailable"))
    }
}

/// Backend that blocks until released, counting invocations
struct GatedBackend {
    invocations: Arc<AtomicUsize>,
    gate: Arc<Notify>,
}

#[async_trait]
impl BackgroundRemovalBackend for GatedBackend {
    async fn remove_background(
        &self,
        image_png: &[u8],
        _progress: &dyn ProgressReporter,
    ) -> anyhow::Result<Vec<u8>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(image_png.to_vec())
    }
}

#[tokio::test]
async fn test_upload_process_download_happy_path() {
    // A large photo is uploaded, processed, and the result is downloadable
    // while the original preview stays valid.
    init_test_logging();
    let registry = Arc::new(ResourceHandleRegistry::new());
    let pipeline = Arc::new(ProcessingPipeline::with_backend(
        Box::new(MockBackend::new()),
        registry.clone(),
    ));
    let session = spawn_session(pipeline);
    let mut updates = session.watch();

    session.upload(jpeg_asset(3000, 4000));
    let uploaded = wait_for(&mut updates, "Uploaded", |s| {
        s.status == SessionStatus::Uploaded
    })
    .await;
    let preview = uploaded.preview.clone().expect("preview handle acquired");
    assert!(registry.payload(&preview).is_some());
    assert_eq!(registry.live_count(), 1);

    session.process();
    let succeeded = wait_for(&mut updates, "Succeeded", |s| {
        s.status == SessionStatus::Succeeded
    })
    .await;

    assert_eq!(succeeded.progress, 0.0);
    let processed = succeeded.processed.expect("result handle installed");
    assert_ne!(processed, preview);

    // Both blobs are live and separately dereferenceable
    assert_eq!(registry.live_count(), 2);
    let result_blob = registry.payload(&processed).expect("result is live");
    assert_eq!(result_blob.media_type(), "image/png");
    let normalized = image::load_from_memory(result_blob.data()).unwrap();
    assert!(normalized.width().max(normalized.height()) <= 1920);
    assert!(registry.payload(&preview).is_some());
}

#[tokio::test]
async fn test_failed_inference_recovers_to_failed_state() {
    // Inference raises mid-call; the session lands in Failed with no
    // result handle and an intact preview.
    init_test_logging();
    let registry = Arc::new(ResourceHandleRegistry::new());
    let pipeline = Arc::new(ProcessingPipeline::with_backend(
        Box::new(FailingBackend),
        registry.clone(),
    ));
    let session = spawn_session(pipeline);
    let mut updates = session.watch();

    session.upload(small_png_asset());
    let uploaded = wait_for(&mut updates, "Uploaded", |s| {
        s.status == SessionStatus::Uploaded
    })
    .await;
    let preview = uploaded.preview.clone().unwrap();

    session.process();
    let failed = wait_for(&mut updates, "Failed", |s| s.status == SessionStatus::Failed).await;

    assert_eq!(failed.progress, 0.0);
    assert!(failed.processed.is_none());
    assert_eq!(
        failed.error_message.as_deref(),
        Some("Please try again with a different image")
    );
    assert_eq!(registry.live_count(), 1);
    assert!(registry.payload(&preview).is_some());

    // The session stays interactive: a fresh upload works
    session.upload(small_png_asset());
    wait_for(&mut updates, "Uploaded again", |s| {
        s.status == SessionStatus::Uploaded && s.error_message.is_none()
    })
    .await;
    assert_eq!(registry.live_count(), 1);
}

#[tokio::test]
async fn test_second_process_request_is_ignored_while_in_flight() {
    // process() during Processing is a no-op; exactly one pipeline run
    // starts.
    let registry = Arc::new(ResourceHandleRegistry::new());
    let invocations = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let pipeline = Arc::new(ProcessingPipeline::with_backend(
        Box::new(GatedBackend {
            invocations: invocations.clone(),
            gate: gate.clone(),
        }),
        registry,
    ));
    let session = spawn_session(pipeline);
    let mut updates = session.watch();

    session.upload(small_png_asset());
    wait_for(&mut updates, "Uploaded", |s| {
        s.status == SessionStatus::Uploaded
    })
    .await;

    session.process();
    wait_for(&mut updates, "Processing", |s| {
        s.status == SessionStatus::Processing
    })
    .await;
    session.process();
    session.process();

    gate.notify_one();
    wait_for(&mut updates, "Succeeded", |s| {
        s.status == SessionStatus::Succeeded
    })
    .await;
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_new_upload_supersedes_previous_result() {
    // No window exists where handles of the old image remain owned once
    // the new upload's preview is acquired.
    let registry = Arc::new(ResourceHandleRegistry::new());
    let pipeline = Arc::new(ProcessingPipeline::with_backend(
        Box::new(MockBackend::new()),
        registry.clone(),
    ));
    let session = spawn_session(pipeline);
    let mut updates = session.watch();

    session.upload(small_png_asset());
    session.process();
    let succeeded = wait_for(&mut updates, "Succeeded", |s| {
        s.status == SessionStatus::Succeeded
    })
    .await;
    let old_preview = succeeded.preview.clone().unwrap();
    let old_result = succeeded.processed.clone().unwrap();
    assert_eq!(registry.live_count(), 2);

    session.upload(small_png_asset());
    let uploaded = wait_for(&mut updates, "Uploaded", |s| {
        s.status == SessionStatus::Uploaded && s.preview.as_ref() != Some(&old_preview)
    })
    .await;

    assert!(uploaded.processed.is_none());
    assert!(registry.payload(&old_preview).is_none());
    assert!(registry.payload(&old_result).is_none());
    assert_eq!(registry.live_count(), 1);
}

#[tokio::test]
async fn test_upload_during_processing_discards_stale_result() {
    // A run finishing after its image was superseded must not install a
    // result or leak the handle the pipeline acquired for it.
    let registry = Arc::new(ResourceHandleRegistry::new());
    let invocations = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let pipeline = Arc::new(ProcessingPipeline::with_backend(
        Box::new(GatedBackend {
            invocations: invocations.clone(),
            gate: gate.clone(),
        }),
        registry.clone(),
    ));
    let session = spawn_session(pipeline);
    let mut updates = session.watch();

    session.upload(small_png_asset());
    session.process();
    wait_for(&mut updates, "Processing", |s| {
        s.status == SessionStatus::Processing
    })
    .await;

    session.upload(small_png_asset());
    wait_for(&mut updates, "Uploaded", |s| {
        s.status == SessionStatus::Uploaded
    })
    .await;

    // Let the stale run finish; its result must be dropped and released
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Uploaded);
    assert!(snapshot.processed.is_none());
    assert_eq!(registry.live_count(), 1);

    // The guard has cleared: processing the new upload works
    session.process();
    wait_for(&mut updates, "Processing again", |s| {
        s.status == SessionStatus::Processing
    })
    .await;
    gate.notify_one();
    wait_for(&mut updates, "Succeeded", |s| {
        s.status == SessionStatus::Succeeded
    })
    .await;
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    assert_eq!(registry.live_count(), 2);
}

#[tokio::test]
async fn test_progress_is_observed_before_terminal_state() {
    // Progress messages for a run are delivered in order, within [0, 1],
    // and strictly before the run's terminal transition.
    struct StagedBackend;

    #[async_trait]
    impl BackgroundRemovalBackend for StagedBackend {
        async fn remove_background(
            &self,
            image_png: &[u8],
            progress: &dyn ProgressReporter,
        ) -> anyhow::Result<Vec<u8>> {
            for fraction in [0.2, 0.5, 0.8] {
                progress.report(fraction);
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            Ok(image_png.to_vec())
        }
    }

    let registry = Arc::new(ResourceHandleRegistry::new());
    let pipeline = Arc::new(ProcessingPipeline::with_backend(
        Box::new(StagedBackend),
        registry,
    ));
    let session = spawn_session(pipeline);
    let mut updates = session.watch();

    session.upload(small_png_asset());
    session.process();

    let mut observed = Vec::new();
    let mut saw_terminal_early = false;
    loop {
        let snapshot = wait_for(&mut updates, "next update", |_| true).await;
        match snapshot.status {
            SessionStatus::Processing => {
                if snapshot.progress > 0.0 {
                    observed.push(snapshot.progress);
                }
            }
            SessionStatus::Succeeded => break,
            SessionStatus::Failed => {
                saw_terminal_early = true;
                break;
            }
            _ => {}
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(!saw_terminal_early);
    assert!(!observed.is_empty(), "no progress observed before success");
    assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(observed.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[tokio::test]
async fn test_teardown_releases_all_handles() {
    let registry = Arc::new(ResourceHandleRegistry::new());
    let pipeline = Arc::new(ProcessingPipeline::with_backend(
        Box::new(MockBackend::new()),
        registry.clone(),
    ));
    let session = spawn_session(pipeline);
    let mut updates = session.watch();

    session.upload(small_png_asset());
    session.process();
    wait_for(&mut updates, "Succeeded", |s| {
        s.status == SessionStatus::Succeeded
    })
    .await;
    assert_eq!(registry.live_count(), 2);

    drop(session);
    for _ in 0..100 {
        if registry.live_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(registry.live_count(), 0);
}

#[tokio::test]
async fn test_process_without_upload_is_ignored() {
    let registry = Arc::new(ResourceHandleRegistry::new());
    let pipeline = Arc::new(ProcessingPipeline::with_backend(
        Box::new(MockBackend::new()),
        registry.clone(),
    ));
    let session = spawn_session(pipeline);

    session.process();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.snapshot().status, SessionStatus::Idle);
    assert_eq!(registry.live_count(), 0);
}
