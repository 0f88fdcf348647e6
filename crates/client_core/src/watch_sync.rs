//! Keeps one coherent `WatchState` from a startup snapshot plus the push channel.
//!
//! The published value is an `Arc<WatchState>` swapped as a whole, so a reader
//! always sees watches and job reports from the same update.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::StreamExt;
use shared::domain::WatchState;
use tokio::{sync::watch, task::JoinHandle};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::{
    facade::{CommandFacade, PushChannel},
    lock,
    query_cache::QueryCache,
};

pub const DEFAULT_PUSH_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSyncOptions {
    /// Delay before re-attaching after the push channel failed or closed.
    pub push_retry_delay: Duration,
    /// Also flush the query cache when a pushed report newly reaches `finished`.
    pub invalidate_on_pushed_finish: bool,
}

impl Default for WatchSyncOptions {
    fn default() -> Self {
        Self {
            push_retry_delay: DEFAULT_PUSH_RETRY_DELAY,
            invalidate_on_pushed_finish: false,
        }
    }
}

pub struct WatchSync {
    state: watch::Sender<Arc<WatchState>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WatchSync {
    /// Starts the snapshot fetch and the push attachment concurrently.
    pub fn start(
        facade: Arc<dyn CommandFacade>,
        push: Arc<dyn PushChannel>,
        cache: Arc<QueryCache>,
        options: WatchSyncOptions,
    ) -> Self {
        let (state, _) = watch::channel(Arc::new(WatchState::default()));
        // Set once a push update is published; a slower snapshot must not overwrite it.
        let pushed = Arc::new(AtomicBool::new(false));

        let snapshot_task = tokio::spawn(apply_snapshot(
            facade,
            Arc::clone(&cache),
            state.clone(),
            Arc::clone(&pushed),
        ));
        let push_task = tokio::spawn(follow_push_channel(
            push,
            cache,
            state.clone(),
            pushed,
            options,
        ));

        Self {
            state,
            tasks: Mutex::new(vec![snapshot_task, push_task]),
        }
    }

    pub fn current(&self) -> Arc<WatchState> {
        Arc::clone(&self.state.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<WatchState>> {
        self.state.subscribe()
    }

    /// Stream of published states, starting with the current one.
    pub fn updates(&self) -> WatchStream<Arc<WatchState>> {
        WatchStream::new(self.state.subscribe())
    }

    /// Stops both tasks and detaches from the push channel. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let tasks: Vec<_> = lock(&self.tasks).drain(..).collect();
        if !tasks.is_empty() {
            debug!("stopping watch synchronizer");
        }
        for task in tasks {
            task.abort();
        }
    }
}

impl Drop for WatchSync {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn apply_snapshot(
    facade: Arc<dyn CommandFacade>,
    cache: Arc<QueryCache>,
    state: watch::Sender<Arc<WatchState>>,
    pushed: Arc<AtomicBool>,
) {
    let snapshot = match facade.get_watch_state().await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(error = %err, "watch state snapshot failed; keeping previous state");
            return;
        }
    };
    if snapshot.has_finished_job() {
        cache.invalidate_all();
    }
    let snapshot = Arc::new(snapshot);
    let published = state.send_if_modified(|current| {
        if pushed.load(Ordering::SeqCst) {
            return false;
        }
        *current = Arc::clone(&snapshot);
        true
    });
    info!(
        watches = snapshot.watches.len(),
        job_reports = snapshot.job_reports.len(),
        published,
        "watch state snapshot applied"
    );
}

async fn follow_push_channel(
    push: Arc<dyn PushChannel>,
    cache: Arc<QueryCache>,
    state: watch::Sender<Arc<WatchState>>,
    pushed: Arc<AtomicBool>,
    options: WatchSyncOptions,
) {
    loop {
        match push.subscribe().await {
            Ok(mut updates) => {
                info!("attached to watch push channel");
                while let Some(update) = updates.next().await {
                    let update = Arc::new(update);
                    if options.invalidate_on_pushed_finish
                        && newly_finished(&state.borrow(), &update)
                    {
                        cache.invalidate_all();
                    }
                    state.send_modify(|current| {
                        pushed.store(true, Ordering::SeqCst);
                        *current = update;
                    });
                }
                warn!("watch push channel closed; re-attaching");
            }
            Err(err) => {
                warn!(error = %err, "failed to attach to watch push channel");
            }
        }
        tokio::time::sleep(options.push_retry_delay).await;
    }
}

fn newly_finished(previous: &WatchState, next: &WatchState) -> bool {
    next.job_reports
        .iter()
        .filter(|report| report.is_finished())
        .any(|report| {
            !previous.job_reports.iter().any(|old| {
                old.is_finished()
                    && old.watch_id() == report.watch_id()
                    && old.job_type == report.job_type
            })
        })
}

#[cfg(test)]
#[path = "tests/watch_sync_tests.rs"]
mod tests;
