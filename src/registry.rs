//! In-memory registry of revocable blob references
//!
//! Stands in for the browser's object-URL table: every payload handed to a
//! display or download surface lives here until its handle is explicitly
//! revoked. Handles are single-owner; releases are driven by sequential
//! session state transitions, never by concurrent owners.

use crate::error::Result;
use log::{debug, trace};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Opaque, revocable reference to a blob held by the registry.
///
/// Each handle is revoked at most once; revoking an already-released or
/// unknown handle is a silent no-op. A handle must never be dereferenced
/// after revocation (`payload` returns `None` once released).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Token form of the handle, usable as a display/download key
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Binary payload plus its declared media type, as stored by the registry
#[derive(Debug)]
pub struct Blob {
    data: Vec<u8>,
    media_type: String,
}

impl Blob {
    /// Raw payload bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Declared media type of the payload
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

/// Registry counters for diagnostics and tests
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    /// Handles acquired over the registry's lifetime
    pub total_acquired: u64,
    /// Releases that actually freed a live blob
    pub total_released: u64,
    /// Currently live blobs
    pub live: usize,
}

#[derive(Debug, Default)]
struct RegistryInner {
    blobs: HashMap<ResourceHandle, Arc<Blob>>,
    total_acquired: u64,
    total_released: u64,
}

/// Tracks transient, revocable references to binary blobs.
///
/// Interior mutability lets the registry be shared (`Arc`) between the
/// pipeline that acquires result handles and the session that releases them.
#[derive(Debug, Default)]
pub struct ResourceHandleRegistry {
    inner: Mutex<RegistryInner>,
}

impl ResourceHandleRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a payload and return a fresh handle bound to it.
    ///
    /// Acquisition does not fail for valid payloads; the `Result` is reserved
    /// for propagating platform allocation failures.
    ///
    /// # Errors
    /// - Underlying platform allocation failure
    pub fn acquire(&self, payload: Vec<u8>, media_type: &str) -> Result<ResourceHandle> {
        let handle = ResourceHandle::generate();
        let blob = Arc::new(Blob {
            data: payload,
            media_type: media_type.to_string(),
        });
        let mut inner = self.lock();
        trace!("acquired handle {} ({} bytes, {})", handle, blob.len(), media_type);
        inner.blobs.insert(handle.clone(), blob);
        inner.total_acquired += 1;
        Ok(handle)
    }

    /// Release the blob behind a handle.
    ///
    /// Idempotent: releasing an already-released or unknown handle is a
    /// silent no-op, never an error.
    pub fn release(&self, handle: &ResourceHandle) {
        let mut inner = self.lock();
        if inner.blobs.remove(handle).is_some() {
            inner.total_released += 1;
            trace!("released handle {}", handle);
        } else {
            debug!("ignoring release of unknown handle {}", handle);
        }
    }

    /// Dereference a live handle for display or download.
    ///
    /// Returns `None` once the handle has been released.
    #[must_use]
    pub fn payload(&self, handle: &ResourceHandle) -> Option<Arc<Blob>> {
        self.lock().blobs.get(handle).cloned()
    }

    /// Number of currently live blobs
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.lock().blobs.len()
    }

    /// Snapshot of the registry counters
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let inner = self.lock();
        RegistryStats {
            total_acquired: inner.total_acquired,
            total_released: inner.total_released,
            live: inner.blobs.len(),
        }
    }
}
