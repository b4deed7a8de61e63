//! Cooperative cancellation.
//!
//! Long steps (frame loads, generation attempts, compositing, the final
//! encode) call [`CancelToken::check`] first and bail out with
//! [`AdReelError::CancelledByUser`].

use crate::error::{AdReelError, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// External cancellation signal, polled by job id.
pub trait CancellationSource: Send + Sync {
    /// Whether the user asked to cancel `job_id`.
    fn cancellation_requested(&self, job_id: &str) -> bool;
}

/// Handle for cancelling an in-progress job.
///
/// Cloning shares the flag. A token may additionally poll an external
/// [`CancellationSource`] for its job id.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    source: Option<(String, Arc<dyn CancellationSource>)>,
}

impl CancelToken {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            source: None,
        }
    }

    /// Token that also polls `source` for `job_id`.
    pub fn with_source(job_id: impl Into<String>, source: Arc<dyn CancellationSource>) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            source: Some((job_id.into(), source)),
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Check if cancelled, latching an external request into the local flag.
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        if let Some((job_id, source)) = &self.source {
            if source.cancellation_requested(job_id) {
                self.flag.store(true, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    /// `Err(CancelledByUser)` once cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AdReelError::CancelledByUser)
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.flag.load(Ordering::Relaxed))
            .field("job_id", &self.source.as_ref().map(|(id, _)| id.as_str()))
            .finish()
    }
}
