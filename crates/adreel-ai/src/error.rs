//! Error types for scoring and regeneration.

use adreel_core::AdReelError;
use thiserror::Error;

/// Errors that can occur while scoring or regenerating clips.
#[derive(Debug, Error)]
pub enum AiError {
    /// The external generation call failed or timed out.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A clip could not be scored.
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// Reading or writing a quality metric failed.
    #[error("Metric store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cancellation was requested.
    #[error("Cancelled by user")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(AdReelError),
}

impl AiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<AdReelError> for AiError {
    fn from(err: AdReelError) -> Self {
        match err {
            AdReelError::CancelledByUser => Self::Cancelled,
            other => Self::Core(other),
        }
    }
}

impl From<AiError> for AdReelError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Cancelled => AdReelError::CancelledByUser,
            AiError::Core(inner) => inner,
            AiError::Io(e) => AdReelError::Io(e),
            AiError::Serialization(msg) => AdReelError::Serialization(msg),
            other => AdReelError::Internal(other.to_string()),
        }
    }
}

/// Result type alias for AI operations.
pub type AiResult<T> = std::result::Result<T, AiError>;
