//! Cooperative cancellation for retrieval requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::NormativaError;

/// Shared cancellation flag, cheap to clone.
///
/// The retriever checks it between stages; a cancelled request fails with
/// [`NormativaError::Cancelled`] and returns no partial results.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled { stage }` if cancellation was requested.
    pub fn check(&self, stage: &str) -> Result<(), NormativaError> {
        if self.is_cancelled() {
            Err(NormativaError::Cancelled {
                stage: stage.to_string(),
            })
        } else {
            Ok(())
        }
    }
}
