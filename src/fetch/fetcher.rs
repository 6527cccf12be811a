//! Page fetch seam: one request per page, cancellable.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use super::PageRequest;
use crate::item::Item;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Superseded by a newer request or a reset. Never shown to the user.
    #[error("request cancelled")]
    Cancelled,

    /// Transport failure, non-2xx status, or unparsable body.
    #[error("page fetch failed: {0}")]
    Failed(String),
}

impl FetchError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Shared cancellation flag handed to a single page request.
///
/// Cancelling is idempotent and harmless after the request has finished.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancelled; for early exits inside a fetch.
    pub fn check(&self) -> Result<(), FetchError> {
        if self.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Fetches one page of items.
///
/// Implementations run on a worker thread and may block. They must return
/// `FetchError::Cancelled` rather than data once `token` is cancelled, and
/// must not retry on their own.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, request: &PageRequest, token: &CancelToken) -> Result<Vec<Item>, FetchError>;
}
