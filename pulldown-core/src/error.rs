//! Error types shared by frame sequences and transforms.

use thiserror::Error;

/// Main error type for frame sequence operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A frame was requested past the end of a sequence.
    #[error("Frame {index} out of range for sequence of length {length}")]
    FrameOutOfRange { index: usize, length: usize },

    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Sequences cannot be joined because their formats differ.
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// Unsupported feature or operation.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A transform provider failed to build or produce frames.
    #[error("Transform '{name}' failed: {message}")]
    Transform { name: String, message: String },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Create a format mismatch error.
    pub fn format_mismatch(msg: impl Into<String>) -> Self {
        Error::FormatMismatch(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create a transform failure error.
    pub fn transform(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transform {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Check if the failing request can simply be retried at another index.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::FrameOutOfRange { .. })
    }
}
