//! Paginated result cache keyed by [`QuerySignature`].
//!
//! Entries are immutable values behind `Arc`; every change builds a new entry
//! and swaps it in, so a reader holding an entry never sees it change. Backend
//! calls run on spawned tasks and are shared between concurrent callers, so a
//! `(signature, offset)` pair has at most one request in flight.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use shared::domain::ResultItem;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    error::FetchError,
    facade::CommandFacade,
    lock,
    types::{QuerySignature, ResultPage, SharedPage},
};

pub const DEFAULT_PAGE_SIZE: usize = 10;

type FetchResult = Result<SharedPage, FetchError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// All pages fetched so far for one signature.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    signature: QuerySignature,
    page_size: usize,
    // Contiguous from offset 0.
    pages: Vec<SharedPage>,
    // Pages that completed ahead of a lower offset.
    pending: BTreeMap<usize, SharedPage>,
    total_count: usize,
    exhausted: bool,
}

impl CacheEntry {
    fn new(signature: QuerySignature, page_size: usize) -> Self {
        Self {
            signature,
            page_size,
            pages: Vec::new(),
            pending: BTreeMap::new(),
            total_count: 0,
            exhausted: false,
        }
    }

    pub fn signature(&self) -> &QuerySignature {
        &self.signature
    }

    pub fn pages(&self) -> &[SharedPage] {
        &self.pages
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Offset of the first item not yet loaded.
    pub fn next_offset(&self) -> usize {
        self.pages.last().map(|page| page.end()).unwrap_or(0)
    }

    pub fn items(&self) -> impl Iterator<Item = &ResultItem> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    pub fn page_at(&self, offset: usize) -> Option<SharedPage> {
        self.pages
            .iter()
            .find(|page| page.offset == offset)
            .or_else(|| self.pending.get(&offset))
            .cloned()
    }

    fn with_page(&self, page: SharedPage) -> Self {
        let mut next = self.clone();
        next.total_count = page.total_count;
        if page.offset >= next.next_offset() {
            next.pending.entry(page.offset).or_insert(page);
        }
        while let Some(page) = next.pending.remove(&next.next_offset()) {
            next.pages.push(page);
        }
        if let Some(last) = next.pages.last() {
            next.exhausted =
                next.next_offset() >= next.total_count || last.items.len() < next.page_size;
        }
        next
    }
}

struct InFlight {
    ticket: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    epoch: u64,
    next_ticket: u64,
    entries: HashMap<QuerySignature, Arc<CacheEntry>>,
    in_flight: HashMap<(QuerySignature, usize), InFlight>,
}

impl CacheState {
    fn complete(
        &mut self,
        signature: &QuerySignature,
        offset: usize,
        epoch: u64,
        ticket: u64,
        result: &FetchResult,
        page_size: usize,
    ) {
        let key = (signature.clone(), offset);
        if self
            .in_flight
            .get(&key)
            .is_some_and(|in_flight| in_flight.ticket == ticket)
        {
            self.in_flight.remove(&key);
        }
        if epoch != self.epoch {
            debug!(offset, "dropping page fetched before cache flush");
            return;
        }
        let Ok(page) = result else {
            return;
        };
        let next = match self.entries.get(signature) {
            Some(entry) => entry.with_page(Arc::clone(page)),
            None => CacheEntry::new(signature.clone(), page_size).with_page(Arc::clone(page)),
        };
        self.entries.insert(signature.clone(), Arc::new(next));
    }
}

pub struct QueryCache {
    facade: Arc<dyn CommandFacade>,
    page_size: usize,
    state: Arc<Mutex<CacheState>>,
    flushes: watch::Sender<u64>,
}

impl QueryCache {
    pub fn new(facade: Arc<dyn CommandFacade>) -> Arc<Self> {
        Self::with_page_size(facade, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(facade: Arc<dyn CommandFacade>, page_size: usize) -> Arc<Self> {
        let (flushes, _) = watch::channel(0);
        Arc::new(Self {
            facade,
            page_size: page_size.max(1),
            state: Arc::new(Mutex::new(CacheState::default())),
            flushes,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn entry(&self, signature: &QuerySignature) -> Option<Arc<CacheEntry>> {
        lock(&self.state).entries.get(signature).cloned()
    }

    pub fn is_in_flight(&self, signature: &QuerySignature, offset: usize) -> bool {
        lock(&self.state)
            .in_flight
            .contains_key(&(signature.clone(), offset))
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached page at `offset` or fetches it, joining any request
    /// already in flight for the same pair.
    pub async fn get_or_fetch(
        &self,
        signature: &QuerySignature,
        offset: usize,
    ) -> Result<SharedPage, FetchError> {
        let fetch = {
            let mut state = lock(&self.state);
            if let Some(page) = state
                .entries
                .get(signature)
                .and_then(|entry| entry.page_at(offset))
            {
                debug!(offset, "query cache hit");
                return Ok(page);
            }
            let key = (signature.clone(), offset);
            match state.in_flight.get(&key) {
                Some(in_flight) => {
                    debug!(offset, "joining in-flight page fetch");
                    in_flight.fetch.clone()
                }
                None => {
                    let ticket = state.next_ticket;
                    state.next_ticket += 1;
                    let fetch = self.spawn_fetch(signature.clone(), offset, state.epoch, ticket);
                    state.in_flight.insert(
                        key,
                        InFlight {
                            ticket,
                            fetch: fetch.clone(),
                        },
                    );
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Drops every entry. The backend only says that documents changed, not
    /// which ones, so nothing survives.
    pub fn invalidate_all(&self) {
        let epoch = {
            let mut state = lock(&self.state);
            state.epoch += 1;
            state.entries.clear();
            state.in_flight.clear();
            state.epoch
        };
        info!(epoch, "documents changed; query cache flushed");
        self.flushes.send_replace(epoch);
    }

    /// Yields the flush counter each time [`QueryCache::invalidate_all`] runs.
    pub fn subscribe_flushes(&self) -> watch::Receiver<u64> {
        self.flushes.subscribe()
    }

    fn spawn_fetch(
        &self,
        signature: QuerySignature,
        offset: usize,
        epoch: u64,
        ticket: u64,
    ) -> SharedFetch {
        let facade = Arc::clone(&self.facade);
        let state = Arc::clone(&self.state);
        let page_size = self.page_size;
        let cleanup_state = Arc::clone(&self.state);
        let cleanup_signature = signature.clone();

        let task = tokio::spawn(async move {
            let result = fetch_page(facade.as_ref(), &signature, offset, page_size)
                .await
                .map(Arc::new);
            lock(&state).complete(&signature, offset, epoch, ticket, &result, page_size);
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(err) => {
                    let mut state = lock(&cleanup_state);
                    let key = (cleanup_signature, offset);
                    if state
                        .in_flight
                        .get(&key)
                        .is_some_and(|in_flight| in_flight.ticket == ticket)
                    {
                        state.in_flight.remove(&key);
                    }
                    Err(FetchError::Aborted(err.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }
}

async fn fetch_page(
    facade: &dyn CommandFacade,
    signature: &QuerySignature,
    offset: usize,
    limit: usize,
) -> Result<ResultPage, FetchError> {
    let results = if signature.is_unfiltered() {
        debug!(offset, limit, "fetching unfiltered listing page");
        facade.list_all(offset, limit).await?
    } else {
        debug!(offset, limit, query = signature.text(), "fetching search page");
        let tags: Vec<String> = signature.tags().map(str::to_owned).collect();
        facade
            .search(signature.text(), &tags, signature.sort(), offset, limit)
            .await?
    };
    Ok(ResultPage {
        offset,
        items: results.documents,
        total_count: results.count,
    })
}

#[cfg(test)]
#[path = "tests/query_cache_tests.rs"]
mod tests;
