//! Fetch sequencer: the state machine that owns pagination.
//!
//! ```text
//!            start / set_context / recover (always reset to page 0)
//!   ┌──────────────────────────────────────────────────────────┐
//!   ▼                                                          │
//! Loading ──non-empty page──▶ Idle ──request_more──▶ Loading   │
//!   │ ──empty page──────────▶ Exhausted ───────────────────────┤
//!   └ ──failure─────────────▶ Error ───────────────────────────┘
//! ```
//!
//! Single-flight: `issue` cancels the previous token before storing the new
//! one, and `apply` drops any completion whose id is not the active id. The
//! cumulative protocol makes this mandatory: a slow early page landing after
//! a later one would otherwise replace newer data.

use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::accumulator;
use super::{CancelToken, FetchError, PAGE_SIZE, PageFetcher, PageRequest, QueryContext};
use crate::item::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Loading,
    Exhausted,
    Error,
}

impl FetchPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Exhausted => "end",
            Self::Error => "error",
        }
    }
}

#[derive(Debug)]
struct ActiveRequest {
    id: u64,
    token: CancelToken,
}

/// Mutable pagination bookkeeping. Only `FetchSequencer` writes to it.
#[derive(Debug)]
pub struct FetchState {
    offset: usize,
    has_more: bool,
    is_loading: bool,
    active: Option<ActiveRequest>,
}

impl FetchState {
    fn new() -> Self {
        Self {
            offset: 0,
            has_more: true,
            is_loading: false,
            active: None,
        }
    }

    /// Offset the next page will be requested at.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn active_request(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.id)
    }
}

/// What applying one completion did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completed {
    Merged {
        offset: usize,
        received: usize,
        total: usize,
    },
    Exhausted {
        offset: usize,
    },
    Failed(String),
    /// The active request reported cancellation; state is idle again.
    Cancelled,
    /// Completion of a superseded request; nothing changed.
    Stale {
        request_id: u64,
    },
}

/// A finished page request as sent back by its worker thread.
struct Completion {
    request_id: u64,
    offset: usize,
    result: Result<Vec<Item>, FetchError>,
}

pub struct FetchSequencer<F: PageFetcher + ?Sized + 'static> {
    fetcher: Arc<F>,
    context: QueryContext,
    items: Vec<Item>,
    state: FetchState,
    phase: FetchPhase,
    last_error: Option<String>,
    next_request_id: u64,
    requests_issued: u64,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
}

impl<F: PageFetcher + ?Sized + 'static> FetchSequencer<F> {
    /// Create an idle sequencer. No request is issued until `start`.
    pub fn new(fetcher: Arc<F>, context: QueryContext) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            fetcher,
            context,
            items: Vec::new(),
            state: FetchState::new(),
            phase: FetchPhase::Idle,
            last_error: None,
            next_request_id: 0,
            requests_issued: 0,
            tx,
            rx,
        }
    }

    /// Initial load: reset and request page 0 for the current context.
    pub fn start(&mut self) {
        info!("sequencer: start ({})", self.context);
        self.reset();
        self.issue(0);
    }

    /// Switch to a new query context. Equal contexts are ignored.
    ///
    /// Returns `true` if the context changed (and page 0 was requested).
    pub fn set_context(&mut self, context: QueryContext) -> bool {
        if context == self.context {
            debug!("sequencer: context unchanged ({context})");
            return false;
        }
        info!("sequencer: context {} -> {}", self.context, context);
        self.reset();
        self.context = context;
        self.issue(0);
        true
    }

    /// Request the next page. Refused unless idle with more data available.
    pub fn request_more(&mut self) -> bool {
        if self.phase != FetchPhase::Idle || !self.state.has_more {
            debug!(
                "sequencer: request_more refused (phase={:?}, has_more={})",
                self.phase, self.state.has_more
            );
            return false;
        }
        let offset = self.state.offset;
        self.issue(offset);
        true
    }

    /// Manual recovery: unconditionally drop in-flight work, clear the result
    /// set and error, and start over from page 0.
    pub fn recover(&mut self) {
        info!(
            "sequencer: manual recovery (phase={:?}, active={:?}, items={})",
            self.phase,
            self.state.active_request(),
            self.items.len()
        );
        self.reset();
        self.issue(0);
    }

    /// Apply every completion that has already arrived. Non-blocking.
    ///
    /// Returns `true` if any of them changed observable state.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(completion) = self.rx.try_recv() {
            if !matches!(self.apply(completion), Completed::Stale { .. }) {
                changed = true;
            }
        }
        changed
    }

    /// Block up to `timeout` for the next completion and apply it.
    pub fn wait(&mut self, timeout: Duration) -> Option<Completed> {
        let completion = self.rx.recv_timeout(timeout).ok()?;
        Some(self.apply(completion))
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn phase(&self) -> FetchPhase {
        self.phase
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn offset(&self) -> usize {
        self.state.offset
    }

    pub fn has_more(&self) -> bool {
        self.state.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Total page requests issued over the sequencer's lifetime.
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    fn cancel_active(&mut self) {
        if let Some(active) = self.state.active.take() {
            debug!("sequencer: cancel request #{}", active.id);
            active.token.cancel();
        }
    }

    fn reset(&mut self) {
        self.cancel_active();
        self.items.clear();
        self.state.offset = 0;
        self.state.has_more = true;
        self.state.is_loading = false;
        self.last_error = None;
        self.phase = FetchPhase::Idle;
    }

    fn issue(&mut self, offset: usize) {
        self.cancel_active();

        self.next_request_id += 1;
        let id = self.next_request_id;
        let token = CancelToken::new();
        let request = PageRequest::new(offset, self.context.folder_id.clone());
        debug!(
            "sequencer: issue #{id} offset={} limit={} folder={:?}",
            request.offset, request.limit, request.folder_id
        );

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        let worker_token = token.clone();
        let spawned = thread::Builder::new()
            .name(format!("page-fetch-{id}"))
            .spawn(move || {
                let result = worker_token
                    .check()
                    .and_then(|()| fetcher.fetch(&request, &worker_token));
                // A response that raced a cancel is detached, not delivered.
                let result = match result {
                    Ok(_) if worker_token.is_cancelled() => Err(FetchError::Cancelled),
                    other => other,
                };
                let _ = tx.send(Completion {
                    request_id: id,
                    offset: request.offset,
                    result,
                });
            });

        match spawned {
            Ok(_) => {
                self.state.active = Some(ActiveRequest { id, token });
                self.state.is_loading = true;
                self.requests_issued += 1;
                self.phase = FetchPhase::Loading;
            }
            Err(e) => {
                error!("sequencer: failed to spawn fetch worker: {e}");
                self.state.is_loading = false;
                self.last_error = Some(format!("failed to spawn fetch worker: {e}"));
                self.phase = FetchPhase::Error;
            }
        }
    }

    fn apply(&mut self, completion: Completion) -> Completed {
        let Completion {
            request_id,
            offset,
            result,
        } = completion;

        if self.state.active_request() != Some(request_id) {
            debug!("sequencer: drop stale completion #{request_id}");
            return Completed::Stale { request_id };
        }
        self.state.active = None;
        self.state.is_loading = false;

        match result {
            Err(FetchError::Cancelled) => {
                debug!("sequencer: #{request_id} cancelled");
                self.phase = FetchPhase::Idle;
                Completed::Cancelled
            }
            Err(FetchError::Failed(msg)) => {
                warn!("sequencer: #{request_id} offset={offset} failed: {msg}");
                self.last_error = Some(msg.clone());
                self.phase = FetchPhase::Error;
                Completed::Failed(msg)
            }
            Ok(page) if accumulator::is_exhausted(&page) => {
                info!("sequencer: #{request_id} offset={offset} empty, exhausted");
                self.state.has_more = false;
                self.phase = FetchPhase::Exhausted;
                Completed::Exhausted { offset }
            }
            Ok(page) => {
                self.items = accumulator::merge(&self.items, &page);
                self.state.offset = offset + PAGE_SIZE;
                self.state.has_more = true;
                self.phase = FetchPhase::Idle;
                debug!(
                    "sequencer: #{request_id} offset={offset} merged {} -> {} items, next {}",
                    page.len(),
                    self.items.len(),
                    self.state.offset
                );
                Completed::Merged {
                    offset,
                    received: page.len(),
                    total: self.items.len(),
                }
            }
        }
    }
}

impl<F: PageFetcher + ?Sized + 'static> Drop for FetchSequencer<F> {
    fn drop(&mut self) {
        self.cancel_active();
    }
}
