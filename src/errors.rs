// SPDX-License-Identifier: MPL-2.0

//! Error types for the photo booth
//!
//! Session-scoped failures ([`CaptureError`], [`ProcessError`], [`ComposeError`],
//! [`PrintError`]) drive the session to its error state and are reported to the
//! controller as a single `ERROR` line. [`TransportError::LinkUnavailable`] is the
//! only error that stops the booth instance.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using BoothError
pub type BoothResult<T> = Result<T, BoothError>;

/// Umbrella error for the booth
#[derive(Debug, Error)]
pub enum BoothError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("processing error: {0}")]
    Process(#[from] ProcessError),
    #[error("compose error: {0}")]
    Compose(#[from] ComposeError),
    #[error("print error: {0}")]
    Print(#[from] PrintError),
    /// Unexpected or out-of-state message. Logged and ignored, never fatal.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl BoothError {
    /// Short category name used in dashboard error reports
    pub fn kind(&self) -> &'static str {
        match self {
            BoothError::Transport(_) => "communication",
            BoothError::Capture(_) => "camera",
            BoothError::Process(_) => "processing",
            BoothError::Compose(_) => "compose",
            BoothError::Print(_) => "printer",
            BoothError::ProtocolViolation(_) => "protocol",
            BoothError::Config(_) => "config",
            BoothError::Storage(_) => "storage",
        }
    }
}

/// Serial link errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The link could not be opened. Fatal to the booth instance.
    #[error("link unavailable at {path}: {source}")]
    LinkUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write failed: {0}")]
    WriteError(#[source] std::io::Error),
    #[error("link is disconnected")]
    Disconnected,
}

/// Camera capture errors
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("camera command could not be started: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("camera command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("camera returned no image data")]
    EmptyImage,
    #[error("device error: {0}")]
    Device(String),
    #[error("failed to store capture at {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tone processing errors
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode processed image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("photo {0} failed processing: {1}")]
    Photo(u32, Box<ProcessError>),
}

/// Strip composition errors
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("expected photos {{1..{expected}}}, got {got:?}")]
    IncompleteSet { expected: u32, got: Vec<u32> },
    #[error("failed to open photo {sequence} at {path}: {source}")]
    Open {
        sequence: u32,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("photo {sequence} ({width}x{height}) does not fit its {box_width}x{box_height} frame")]
    Oversized {
        sequence: u32,
        width: u32,
        height: u32,
        box_width: u32,
        box_height: u32,
    },
    #[error("{count} frames need a strip height of {needed}, canvas is {height}")]
    CanvasOverflow { count: u32, needed: u32, height: u32 },
    #[error("failed to save strip to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Error from a single printer submission mechanism
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The mechanism itself is missing (binary not installed, no queues).
    /// Triggers the fallback path.
    #[error("{backend} unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },
    /// The mechanism exists but rejected the job
    #[error("{backend} rejected job: {reason}")]
    Failed {
        backend: &'static str,
        reason: String,
    },
}

impl SubmitError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SubmitError::Unavailable { .. })
    }
}

/// Printing failed after the primary and (if applicable) fallback attempts
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("primary submission failed: {0}")]
    Primary(#[source] SubmitError),
    #[error("fallback submission failed after primary was unavailable ({primary}): {fallback}")]
    Fallback {
        primary: SubmitError,
        #[source]
        fallback: SubmitError,
    },
    #[error("strip file {0} does not exist")]
    MissingFile(PathBuf),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Validation(String),
}
