//! Error types for background removal orchestration

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Error types surfaced by the processing pipeline and session
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Input bytes could not be interpreted as an image
    #[error("Decode error: {0}")]
    Decode(String),

    /// The inference capability failed for any reason
    #[error("Processing error: {0}")]
    Processing(String),

    /// Registry allocation or other platform failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A processing run is already in flight for this session
    #[error("A processing run is already in flight")]
    ProcessInFlight,

    /// Processing was requested before any image was uploaded
    #[error("No image uploaded")]
    NoUpload,
}

impl CutoutError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Generic user-facing message for any failure surfaced to a session.
    ///
    /// Frontends display this instead of the technical error text, which is
    /// only logged.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        "Please try again with a different image"
    }
}
