//! Error types for cadence analysis and conversion.

use pulldown_core::Rational;
use thiserror::Error;

/// Pulldown processing error types.
#[derive(Error, Debug)]
pub enum PulldownError {
    /// Index metadata is absent or malformed.
    #[error("Invalid index data: {0}")]
    Format(String),

    /// Cycle-boundary intervals are not uniform where a linear cadence is required.
    #[error("Unable to determine pulldown cycle as it is non linear: {intervals:?}")]
    Cadence {
        /// Interval between each marker pair, in coded frames.
        intervals: Vec<usize>,
    },

    /// Invalid cycle or offsets combination.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The deinterlacer produced a rate that is neither single- nor double-rate.
    #[error("Unsupported deinterlacer output rate: {factor}x the input rate")]
    UnsupportedRate {
        /// Output rate divided by input rate.
        factor: Rational,
    },

    /// Frames and flags drifted apart.
    #[error("Frame/flag length mismatch: {frames} frames, {flags} flags")]
    LengthMismatch {
        /// Frame count.
        frames: usize,
        /// Flag record count.
        flags: usize,
    },

    /// Core library error.
    #[error("Core error: {0}")]
    Core(#[from] pulldown_core::Error),

    /// JSON index could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pulldown operations.
pub type Result<T> = std::result::Result<T, PulldownError>;

impl PulldownError {
    /// Create an index format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if processing can continue with different parameters.
    ///
    /// A non-linear cadence can still be decimated with an explicit cycle;
    /// everything else needs new input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cadence { .. } | Self::Config(_))
    }
}
