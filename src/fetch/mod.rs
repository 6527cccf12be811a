//! Incremental paginated fetch controller.
//!
//! ```text
//!   QueryContext ──set_context──▶ FetchSequencer ──issue──▶ worker thread
//!                                   ▲      │                 PageFetcher::fetch
//!   ViewportTrigger ─request_more──┘      │◀──── mpsc ─────── (id, result)
//!                                          ▼
//!                                   accumulator::merge → items()
//! ```
//!
//! The sequencer is the only owner of offset, loading flag and the active
//! cancel token. Completions are applied on the caller's thread inside
//! `poll`/`wait`, and only when their request id is still the active one.

pub mod accumulator;
mod context;
mod fetcher;
mod sequencer;
mod trigger;

pub use context::QueryContext;
pub use fetcher::{CancelToken, FetchError, PageFetcher};
pub use sequencer::{Completed, FetchPhase, FetchSequencer, FetchState};
pub use trigger::{Boundary, ViewportTrigger};

/// Items added per page. Fixed by the backend protocol.
pub const PAGE_SIZE: usize = 20;

/// One page request under the cumulative offset protocol: `limit` always
/// grows from 0 (`offset + PAGE_SIZE`) instead of describing a slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
    pub folder_id: Option<String>,
}

impl PageRequest {
    pub fn new(offset: usize, folder_id: Option<String>) -> Self {
        Self {
            offset,
            limit: offset + PAGE_SIZE,
            folder_id,
        }
    }

    /// Query parameters in wire order. `folderId` is omitted when unfiltered.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if let Some(id) = &self.folder_id {
            pairs.push(("folderId", id.clone()));
        }
        pairs
    }
}
