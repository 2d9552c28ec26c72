//! Upload session state machine and its message-driven runtime
//!
//! [`UploadSession`] is a pure state machine: every transition runs on a
//! single logical writer and releases superseded registry handles before
//! installing replacements. [`spawn_session`] wraps it in a driver task with
//! an mpsc inbox, so UI commands and pipeline callbacks (progress, terminal
//! result) are applied strictly in arrival order rather than mutating state
//! from arbitrary concurrent contexts.

use crate::error::{CutoutError, Result};
use crate::pipeline::ProcessingPipeline;
use crate::registry::{ResourceHandle, ResourceHandleRegistry};
use crate::services::ProgressReporter;
use crate::types::{ImageAsset, ProcessedResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Lifecycle status of the current upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No image uploaded
    Idle,
    /// An image is uploaded and ready to process
    Uploaded,
    /// A pipeline run is in flight
    Processing,
    /// The last run produced a result
    Succeeded,
    /// The last run failed
    Failed,
}

/// Immutable view of session state for frontends to render
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Fractional progress of the in-flight run, 0 outside `Processing`
    pub progress: f32,
    /// Handle of the original upload's preview blob, if any
    pub preview: Option<ResourceHandle>,
    /// Handle of the current processed result, if any
    pub processed: Option<ResourceHandle>,
    /// User-facing message for the last failure, if any
    pub error_message: Option<String>,
}

/// Owns the current image's lifecycle and coordinates handle disposal
/// across transitions.
///
/// At most two registry handles are live for one session at any instant:
/// the original preview and the current processed result. Every transition
/// that replaces one of them releases the previous occupant first.
pub struct UploadSession {
    registry: Arc<ResourceHandleRegistry>,
    asset: Option<ImageAsset>,
    preview: Option<ResourceHandle>,
    processed: Option<ProcessedResult>,
    status: SessionStatus,
    progress: f32,
    error_message: Option<String>,
}

impl UploadSession {
    /// Create an idle session backed by the given registry
    #[must_use]
    pub fn new(registry: Arc<ResourceHandleRegistry>) -> Self {
        Self {
            registry,
            asset: None,
            preview: None,
            processed: None,
            status: SessionStatus::Idle,
            progress: 0.0,
            error_message: None,
        }
    }

    /// Current lifecycle status
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Fractional progress of the in-flight run
    #[must_use]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Currently uploaded asset, if any
    #[must_use]
    pub fn asset(&self) -> Option<&ImageAsset> {
        self.asset.as_ref()
    }

    /// Handle of the original upload's preview blob
    #[must_use]
    pub fn preview_handle(&self) -> Option<&ResourceHandle> {
        self.preview.as_ref()
    }

    /// Current processed result, if any
    #[must_use]
    pub fn processed_result(&self) -> Option<&ProcessedResult> {
        self.processed.as_ref()
    }

    /// Immutable view of the session for frontends
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            progress: self.progress,
            preview: self.preview.clone(),
            processed: self.processed.as_ref().map(|r| r.handle().clone()),
            error_message: self.error_message.clone(),
        }
    }

    /// Install a new upload, superseding whatever came before.
    ///
    /// Releases the previous preview handle and any processed result's
    /// handle before acquiring the new preview handle, then moves to
    /// `Uploaded`. Permitted from any state.
    ///
    /// # Errors
    /// - `CutoutError::Io` when the registry cannot store the preview blob
    pub fn upload(&mut self, asset: ImageAsset) -> Result<()> {
        self.release_preview();
        self.release_processed();
        let handle = self
            .registry
            .acquire(asset.data().to_vec(), asset.media_type())?;
        debug!(
            "uploaded {} bytes ({}) as preview {}",
            asset.len(),
            asset.media_type(),
            handle
        );
        self.preview = Some(handle);
        self.asset = Some(asset);
        self.status = SessionStatus::Uploaded;
        self.progress = 0.0;
        self.error_message = None;
        Ok(())
    }

    /// Move to `Processing` and hand back the asset to run.
    ///
    /// The guard makes runs mutually exclusive: a second call while
    /// `Processing` is rejected, which is the state-machine form of the
    /// "disable the button while processing" affordance.
    ///
    /// # Errors
    /// - `CutoutError::ProcessInFlight` when a run is already in flight
    /// - `CutoutError::NoUpload` when no image has been uploaded
    pub fn begin_processing(&mut self) -> Result<ImageAsset> {
        if self.status == SessionStatus::Processing {
            return Err(CutoutError::ProcessInFlight);
        }
        let asset = self.asset.clone().ok_or(CutoutError::NoUpload)?;
        self.status = SessionStatus::Processing;
        self.progress = 0.0;
        self.error_message = None;
        Ok(asset)
    }

    /// Record progress of the in-flight run; ignored outside `Processing`
    pub fn apply_progress(&mut self, fraction: f32) {
        if self.status != SessionStatus::Processing {
            return;
        }
        if fraction.is_finite() {
            self.progress = fraction.clamp(0.0, 1.0);
        }
    }

    /// Install a successful result, releasing the prior one's handle first.
    ///
    /// If the session has left `Processing` (a newer upload superseded the
    /// run), the stale result's handle is released instead of installed.
    pub fn complete(&mut self, result: ProcessedResult) {
        if self.status != SessionStatus::Processing {
            debug!("dropping stale processing result {}", result.handle());
            self.registry.release(result.handle());
            return;
        }
        self.release_processed();
        self.processed = Some(result);
        self.status = SessionStatus::Succeeded;
        self.progress = 0.0;
        self.error_message = None;
    }

    /// Record a failed run; ignored unless a run is in flight.
    ///
    /// No partial result is retained and the preview handle stays valid, so
    /// the user can re-process or upload a different image.
    pub fn fail(&mut self, error: &CutoutError) {
        if self.status != SessionStatus::Processing {
            return;
        }
        warn!("processing failed: {}", error);
        self.status = SessionStatus::Failed;
        self.progress = 0.0;
        self.error_message = Some(error.user_message().to_string());
    }

    /// Release every live handle and return to `Idle`.
    ///
    /// Called on teardown from any state; also runs on drop.
    pub fn dispose(&mut self) {
        self.release_preview();
        self.release_processed();
        self.asset = None;
        self.status = SessionStatus::Idle;
        self.progress = 0.0;
        self.error_message = None;
    }

    fn release_preview(&mut self) {
        if let Some(handle) = self.preview.take() {
            self.registry.release(&handle);
        }
    }

    fn release_processed(&mut self) {
        if let Some(result) = self.processed.take() {
            self.registry.release(result.handle());
        }
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Messages applied to the session in arrival order
#[derive(Debug)]
enum SessionMessage {
    Upload(ImageAsset),
    Process,
    Progress { run: u64, fraction: f32 },
    Finished { run: u64, outcome: Result<ProcessedResult> },
    Dispose,
}

/// Sends pipeline progress into the session inbox, tagged with its run
struct InboxProgress {
    run: u64,
    inbox: mpsc::UnboundedSender<SessionMessage>,
}

impl ProgressReporter for InboxProgress {
    fn report(&self, fraction: f32) {
        let _ = self.inbox.send(SessionMessage::Progress {
            run: self.run,
            fraction,
        });
    }
}

/// Frontend-facing handle for a driven session.
///
/// Commands are fire-and-forget messages into the driver's inbox; state is
/// observed through snapshots. Dropping the handle tears the session down,
/// releasing every handle it still holds.
pub struct SessionHandle {
    inbox: mpsc::UnboundedSender<SessionMessage>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Submit a new upload
    pub fn upload(&self, asset: ImageAsset) {
        let _ = self.inbox.send(SessionMessage::Upload(asset));
    }

    /// Request processing of the current upload.
    ///
    /// Ignored while a run is already in flight or nothing is uploaded.
    pub fn process(&self) {
        let _ = self.inbox.send(SessionMessage::Process);
    }

    /// Tear the session down, releasing all live handles
    pub fn dispose(&self) {
        let _ = self.inbox.send(SessionMessage::Dispose);
    }

    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Subscribe to snapshot updates
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.inbox.send(SessionMessage::Dispose);
    }
}

/// Spawn a driver task owning one session over the given pipeline.
///
/// The driver is the session's single writer: it applies commands, progress
/// messages and terminal results sequentially, so progress for a run is
/// always observed before that run's success or failure, and publishes a
/// snapshot after every message.
#[must_use]
pub fn spawn_session(pipeline: Arc<ProcessingPipeline>) -> SessionHandle {
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let session = UploadSession::new(pipeline.registry().clone());
    let (watch_tx, watch_rx) = watch::channel(session.snapshot());

    tokio::spawn(drive_session(
        session,
        pipeline,
        inbox_tx.clone(),
        inbox_rx,
        watch_tx,
    ));

    SessionHandle {
        inbox: inbox_tx,
        snapshots: watch_rx,
    }
}

async fn drive_session(
    mut session: UploadSession,
    pipeline: Arc<ProcessingPipeline>,
    inbox_tx: mpsc::UnboundedSender<SessionMessage>,
    mut inbox_rx: mpsc::UnboundedReceiver<SessionMessage>,
    watch_tx: watch::Sender<SessionSnapshot>,
) {
    let mut run_counter: u64 = 0;
    let mut in_flight: Option<u64> = None;

    while let Some(message) = inbox_rx.recv().await {
        match message {
            SessionMessage::Upload(asset) => {
                if let Err(e) = session.upload(asset) {
                    warn!("upload rejected: {}", e);
                }
            }
            SessionMessage::Process => {
                if in_flight.is_some() {
                    debug!("ignoring process request: run already in flight");
                } else {
                    match session.begin_processing() {
                        Ok(asset) => {
                            run_counter += 1;
                            let run = run_counter;
                            in_flight = Some(run);
                            let pipeline = pipeline.clone();
                            let inbox = inbox_tx.clone();
                            tokio::spawn(async move {
                                let reporter = InboxProgress {
                                    run,
                                    inbox: inbox.clone(),
                                };
                                let outcome = pipeline.run(&asset, &reporter).await;
                                let _ = inbox.send(SessionMessage::Finished { run, outcome });
                            });
                        }
                        Err(e) => debug!("process request rejected: {}", e),
                    }
                }
            }
            SessionMessage::Progress { run, fraction } => {
                if in_flight == Some(run) {
                    session.apply_progress(fraction);
                }
            }
            SessionMessage::Finished { run, outcome } => {
                if in_flight == Some(run) {
                    in_flight = None;
                    match outcome {
                        Ok(result) => session.complete(result),
                        Err(e) => session.fail(&e),
                    }
                } else {
                    // A newer upload superseded this run; release its handle
                    if let Ok(result) = outcome {
                        pipeline.registry().release(result.handle());
                    }
                }
            }
            SessionMessage::Dispose => {
                session.dispose();
                if let Some(pending) = in_flight {
                    // Wait out the in-flight run so its handle is released
                    while let Some(message) = inbox_rx.recv().await {
                        if let SessionMessage::Finished { run, outcome } = message {
                            if run == pending {
                                if let Ok(result) = outcome {
                                    pipeline.registry().release(result.handle());
                                }
                                break;
                            }
                        }
                    }
                }
                let _ = watch_tx.send(session.snapshot());
                return;
            }
        }
        let _ = watch_tx.send(session.snapshot());
    }
}
