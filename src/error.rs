//! Error types for the dehazing service.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ffa-serve.
#[derive(Error, Debug)]
pub enum Error {
    /// Checkpoint could not be read or does not fit the network.
    #[error("failed to load checkpoint {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: candle_core::Error,
    },

    #[error("unsupported checkpoint format for {0}: expected .pk, .pth, .pt or .safetensors")]
    CheckpointFormat(PathBuf),

    /// Compute device could not be opened.
    #[error("failed to open device {name}: {source}")]
    Device {
        name: String,
        #[source]
        source: candle_core::Error,
    },

    /// Invalid configuration value.
    #[error("invalid configuration {name}: {reason}")]
    Config { name: String, reason: String },

    /// The upload is not a readable video.
    #[error("unable to decode video: {0}")]
    Decode(String),

    /// Forward pass or tensor conversion failed.
    #[error("inference failed: {0}")]
    Inference(#[from] candle_core::Error),

    /// Inference worker panicked or was cancelled.
    #[error("inference worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("unable to encode video: {0}")]
    Encode(String),

    /// An external tool could not be started.
    #[error("failed to run {tool}: {source}")]
    Tool {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

impl Error {
    /// Whether the error is the caller's fault (bad input) rather than ours.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Result type alias for ffa-serve operations.
pub type Result<T> = std::result::Result<T, Error>;
