//! Error types for AdReel.

use thiserror::Error;

/// Main error type for AdReel operations.
///
/// The first group of variants are caller-input errors and carry the
/// violated constraint verbatim so the request layer can show it to the
/// user. `CancelledByUser` is deliberately not a failure: check
/// [`AdReelError::is_cancelled`] before reporting.
#[derive(Error, Debug)]
pub enum AdReelError {
    #[error("Invalid trim points: {0}")]
    InvalidTrimPoints(String),

    #[error("Invalid split point: {0}")]
    InvalidSplitPoint(String),

    #[error("Invalid merge request: {0}")]
    InvalidMergeRequest(String),

    #[error("Invalid editing state: {0}")]
    InvalidEditingState(String),

    #[error("Corrupt clip '{clip}': {reason}")]
    CorruptClip { clip: String, reason: String },

    #[error("Stale write: expected version {expected}, found {actual}")]
    StaleWriteConflict { expected: u64, actual: u64 },

    #[error("Cancelled by user")]
    CancelledByUser,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Effect error: {0}")]
    Effect(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdReelError {
    /// True for the cooperative-cancellation condition.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::CancelledByUser)
    }

    /// True for errors caused by caller input rather than the system.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidTrimPoints(_)
                | Self::InvalidSplitPoint(_)
                | Self::InvalidMergeRequest(_)
                | Self::InvalidEditingState(_)
        )
    }

    /// Shorthand for a corrupt-source error.
    pub fn corrupt(clip: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptClip {
            clip: clip.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for AdReel operations.
pub type Result<T> = std::result::Result<T, AdReelError>;
