//! Central error types for webcam-studio.
//!
//! Every fallible operation in the crate returns `StudioResult`. Errors
//! serialize as their display message so they can be surfaced verbatim in
//! user notices and persisted logs.

use serde::Serialize;
use thiserror::Error;

/// Main error type for webcam-studio operations.
#[derive(Error, Debug)]
pub enum StudioError {
    /// Camera device could not be opened.
    #[error("Camera not found: {0}")]
    DeviceUnavailable(String),

    /// Frame capture failed after the device was opened
    #[error("Capture failed: {0}")]
    CaptureError(String),

    /// Face detection model could not be loaded
    #[error("Failed to load detection model '{path}': {reason}")]
    ModelLoad { path: String, reason: String },

    /// Video encoder could not be opened or rejected a frame
    #[error("Encoder error: {0}")]
    EncoderError(String),

    /// Frame written to a sink that is not open
    #[error("Recording is not active")]
    RecordingNotActive,

    /// A second recording was requested while one is open
    #[error("A recording is already in progress")]
    AlreadyRecording,

    /// FFmpeg binary not found
    #[error("FFmpeg not found. Please ensure FFmpeg is installed or on PATH.")]
    FfmpegNotFound,

    /// File expected on disk is missing
    #[error("File not found: {0}")]
    MissingFile(String),

    /// Frame buffer does not match its declared geometry
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Storage operation failed
    #[error("Storage error: {0}")]
    StorageError(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Image encoding/decoding failed
    #[error("Image error: {0}")]
    ImageError(String),

    /// The capture worker is gone (stopped or panicked)
    #[error("Capture worker unavailable: {0}")]
    ChannelClosed(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Serialize for StudioError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<image::ImageError> for StudioError {
    fn from(err: image::ImageError) -> Self {
        StudioError::ImageError(err.to_string())
    }
}

impl From<String> for StudioError {
    fn from(msg: String) -> Self {
        StudioError::Other(msg)
    }
}

impl From<&str> for StudioError {
    fn from(msg: &str) -> Self {
        StudioError::Other(msg.to_string())
    }
}

/// Extension trait for adding context to Results.
///
/// # Example
/// ```ignore
/// use crate::error::{ResultExt, StudioResult};
///
/// fn load_model(path: &Path) -> StudioResult<String> {
///     std::fs::read_to_string(path).context("failed to read model")
/// }
/// ```
pub trait ResultExt<T> {
    /// Add context to an error, converting it to StudioError::Other.
    fn context(self, msg: &str) -> StudioResult<T>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F: FnOnce() -> String>(self, f: F) -> StudioResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context(self, msg: &str) -> StudioResult<T> {
        self.map_err(|e| StudioError::Other(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> StudioResult<T> {
        self.map_err(|e| StudioError::Other(format!("{}: {}", f(), e)))
    }
}

/// Extension trait for adding context to Option types.
pub trait OptionExt<T> {
    /// Convert None to StudioError::Other with the given message.
    fn context(self, msg: &str) -> StudioResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context(self, msg: &str) -> StudioResult<T> {
        self.ok_or_else(|| StudioError::Other(msg.to_string()))
    }
}

/// Type alias for Results using StudioError.
pub type StudioResult<T> = Result<T, StudioError>;
