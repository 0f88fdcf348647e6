//! Incremental page loading for the active signature.
//!
//! The pager only fetches when asked: once for the first page and then on
//! every "end reached" signal from the list. A request for a signature that is
//! no longer active still completes inside the cache but is not reported back.

use std::sync::{Arc, Mutex};

use shared::domain::ResultItem;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{error::FetchError, lock, query_cache::QueryCache, types::QuerySignature};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStatus {
    /// Nothing requested yet for this signature (or the cache was flushed).
    Idle,
    Loading,
    Ready,
    Empty,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ResultView {
    pub signature: QuerySignature,
    pub items: Vec<ResultItem>,
    pub total_count: usize,
    pub has_more: bool,
    pub status: ViewStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { offset: usize, items: usize },
    AlreadyLoaded,
    InFlight,
    Exhausted,
    Superseded,
    /// The cache was flushed while the page was in flight; nothing was stored.
    Flushed,
    Failed(FetchError),
}

struct PagerState {
    signature: QuerySignature,
    generation: u64,
    error: Option<FetchError>,
}

pub struct Pager {
    cache: Arc<QueryCache>,
    state: Mutex<PagerState>,
}

impl Pager {
    pub fn new(cache: Arc<QueryCache>, signature: QuerySignature) -> Self {
        Self {
            cache,
            state: Mutex::new(PagerState {
                signature,
                generation: 0,
                error: None,
            }),
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn signature(&self) -> QuerySignature {
        lock(&self.state).signature.clone()
    }

    /// Points the pager at a new signature. Returns `false` when unchanged.
    pub fn set_signature(&self, signature: QuerySignature) -> bool {
        let mut state = lock(&self.state);
        if state.signature == signature {
            return false;
        }
        debug!(query = signature.text(), "pager retargeted");
        state.signature = signature;
        state.generation += 1;
        state.error = None;
        true
    }

    /// A fetch for the next page of the active signature is running. Read from
    /// the cache, so a caller that dropped its load future does not count.
    pub fn is_loading(&self) -> bool {
        let signature = self.signature();
        self.loading_at(&signature)
    }

    fn loading_at(&self, signature: &QuerySignature) -> bool {
        let offset = self
            .cache
            .entry(signature)
            .map_or(0, |entry| entry.next_offset());
        self.cache.is_in_flight(signature, offset)
    }

    /// Items currently visible for the active signature.
    pub fn visible_len(&self) -> usize {
        let signature = self.signature();
        self.cache
            .entry(&signature)
            .map(|entry| entry.next_offset())
            .unwrap_or(0)
    }

    pub fn item(&self, index: usize) -> Option<ResultItem> {
        let signature = self.signature();
        self.cache
            .entry(&signature)
            .and_then(|entry| entry.items().nth(index).cloned())
    }

    pub fn has_more(&self) -> bool {
        let signature = self.signature();
        self.cache
            .entry(&signature)
            .map_or(true, |entry| !entry.is_exhausted())
    }

    /// Fetches offset 0 unless something is already loaded.
    pub async fn load_first(&self) -> LoadOutcome {
        self.fetch_next(true).await
    }

    /// Fetches the page after the last loaded one. Does nothing while a fetch
    /// is running or once the entry is exhausted.
    pub async fn load_more(&self) -> LoadOutcome {
        self.fetch_next(false).await
    }

    /// The list reports that its tail became visible.
    pub async fn on_end_reached(&self) -> LoadOutcome {
        self.load_more().await
    }

    pub fn view(&self) -> ResultView {
        let state = lock(&self.state);
        let entry = self.cache.entry(&state.signature);
        let (items, total_count, has_more, loaded) = match &entry {
            Some(entry) => (
                entry.items().cloned().collect::<Vec<_>>(),
                entry.total_count(),
                !entry.is_exhausted(),
                !entry.pages().is_empty(),
            ),
            None => (Vec::new(), 0, true, false),
        };
        let loading = self.loading_at(&state.signature);
        let status = match &state.error {
            Some(err) => ViewStatus::Error(err.to_string()),
            None if !loaded && loading => ViewStatus::Loading,
            None if !loaded => ViewStatus::Idle,
            None if items.is_empty() => ViewStatus::Empty,
            None => ViewStatus::Ready,
        };
        ResultView {
            signature: state.signature.clone(),
            items,
            total_count,
            has_more,
            status,
        }
    }

    async fn fetch_next(&self, first: bool) -> LoadOutcome {
        let (signature, generation, offset) = {
            let mut state = lock(&self.state);
            let entry = self.cache.entry(&state.signature);
            if let Some(entry) = &entry {
                if first && !entry.pages().is_empty() {
                    return LoadOutcome::AlreadyLoaded;
                }
                if entry.is_exhausted() {
                    return LoadOutcome::Exhausted;
                }
            }
            let offset = entry.map(|entry| entry.next_offset()).unwrap_or(0);
            if self.cache.is_in_flight(&state.signature, offset) {
                return LoadOutcome::InFlight;
            }
            state.error = None;
            (state.signature.clone(), state.generation, offset)
        };

        debug!(offset, query = signature.text(), "loading page");
        let result = self.cache.get_or_fetch(&signature, offset).await;

        let mut state = lock(&self.state);
        if state.generation != generation {
            debug!(offset, "discarding page for superseded signature");
            return LoadOutcome::Superseded;
        }
        match result {
            Ok(page) => {
                let stored = self
                    .cache
                    .entry(&signature)
                    .is_some_and(|entry| entry.page_at(offset).is_some());
                if !stored {
                    debug!(offset, "page arrived after a cache flush");
                    return LoadOutcome::Flushed;
                }
                LoadOutcome::Loaded {
                    offset,
                    items: page.items.len(),
                }
            }
            Err(err) => {
                warn!(offset, error = %err, "page fetch failed");
                state.error = Some(err.clone());
                LoadOutcome::Failed(err)
            }
        }
    }

    /// Re-requests the first page of the active signature after every cache
    /// flush, until the returned task is aborted.
    pub fn spawn_reload_on_flush(self: &Arc<Self>) -> JoinHandle<()> {
        let pager = Arc::clone(self);
        let mut flushes = self.cache.subscribe_flushes();
        tokio::spawn(async move {
            while flushes.changed().await.is_ok() {
                let epoch = *flushes.borrow_and_update();
                let outcome = pager.load_first().await;
                debug!(epoch, ?outcome, "reloaded after cache flush");
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
