use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

pub mod config;
pub mod error;
pub mod facade;
pub mod keys;
pub mod notification;
pub mod pagination;
pub mod panel;
pub mod query_cache;
pub mod selection;
pub mod transport;
pub mod types;
pub mod watch_actions;
pub mod watch_sync;

pub use config::{load_settings, ClientSettings};
pub use error::{ClientError, FetchError};
pub use facade::{CommandFacade, PushChannel};
pub use keys::{DispatchOutcome, KeyCode, KeyDispatcher, KeyEvent, KeyTarget, Modifiers};
pub use pagination::{LoadOutcome, Pager, ResultView, ViewStatus};
pub use panel::{PanelStats, SearchPanel};
pub use query_cache::QueryCache;
pub use selection::Selection;
pub use transport::HttpBackend;
pub use types::{QuerySignature, ViewCommand};
pub use watch_actions::WatchActions;
pub use watch_sync::{WatchSync, WatchSyncOptions};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

/// Short critical sections only; a panicked holder leaves data that is still
/// replaced wholesale, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wires the cache, watch synchronizer and watch actions to one backend.
/// Must be created inside a tokio runtime.
pub struct SearchClient {
    cache: Arc<QueryCache>,
    watch_sync: WatchSync,
    actions: WatchActions,
}

impl SearchClient {
    pub fn new(
        facade: Arc<dyn CommandFacade>,
        push: Arc<dyn PushChannel>,
        settings: &ClientSettings,
    ) -> Self {
        let cache = QueryCache::with_page_size(Arc::clone(&facade), settings.page_size);
        let watch_sync = WatchSync::start(
            Arc::clone(&facade),
            push,
            Arc::clone(&cache),
            settings.watch_sync_options(),
        );
        let actions = WatchActions::with_notification_ttl(facade, settings.notification_ttl);
        Self {
            cache,
            watch_sync,
            actions,
        }
    }

    /// Talks HTTP and WebSocket to `settings.backend_url`.
    pub fn connect(settings: &ClientSettings) -> Result<Self, ClientError> {
        let backend = Arc::new(HttpBackend::new(&settings.backend_url)?);
        info!(backend_url = backend.base_url(), "search client configured");
        Ok(Self::new(backend.clone(), backend, settings))
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn watches(&self) -> &WatchSync {
        &self.watch_sync
    }

    pub fn actions(&self) -> &WatchActions {
        &self.actions
    }

    /// A fresh panel showing the unfiltered listing.
    pub fn search_panel(&self) -> SearchPanel {
        let pager = Pager::new(Arc::clone(&self.cache), QuerySignature::default());
        SearchPanel::new(Arc::new(pager))
    }

    pub fn shutdown(&self) {
        self.watch_sync.shutdown();
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
