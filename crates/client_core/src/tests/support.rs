//! In-memory backend used by the engine tests.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::{stream::BoxStream, StreamExt};
use shared::{
    domain::{
        JobProgress, JobReport, JobStatus, JobType, PathRecommendation, RecommendationKind,
        ResultItem, SortMode, Watch, WatchId, WatchState, WatchStatus,
    },
    error::AddWatchError,
    protocol::SearchResults,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    error::ClientError,
    facade::{CommandFacade, PushChannel},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListAll {
        offset: usize,
        limit: usize,
    },
    Search {
        text: String,
        tags: Vec<String>,
        sort: SortMode,
        offset: usize,
        limit: usize,
    },
}

pub fn item(path: &str, highlight: Option<&str>) -> ResultItem {
    ResultItem {
        path: PathBuf::from(path),
        title: None,
        tags: Vec::new(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        modified_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        highlight: highlight.map(str::to_owned),
    }
}

pub fn corpus(count: usize) -> Vec<ResultItem> {
    (0..count)
        .map(|i| item(&format!("/docs/note-{i:03}.md"), None))
        .collect()
}

pub fn watch(id: i64, path: &str, status: WatchStatus) -> Watch {
    Watch {
        id: WatchId(id),
        path: PathBuf::from(path),
        status,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        document_count: 0,
    }
}

pub fn report(watch: &Watch, status: JobStatus) -> JobReport {
    JobReport {
        watch: watch.clone(),
        progress: JobProgress { done: 1, total: 2 },
        job_type: JobType::Scan,
        status,
    }
}

fn paginate(items: &[ResultItem], offset: usize, limit: usize) -> SearchResults {
    SearchResults {
        count: items.len(),
        documents: items.iter().skip(offset).take(limit).cloned().collect(),
    }
}

pub struct FakeBackend {
    pub listing: Vec<ResultItem>,
    pub hits: Vec<ResultItem>,
    pub delay: Duration,
    pub fail_fetches: Mutex<Option<String>>,
    pub calls: Mutex<Vec<Call>>,
    pub watch_state: Mutex<Result<WatchState, String>>,
    pub snapshot_calls: Mutex<u32>,
    pub watches: Mutex<Vec<Watch>>,
    pub deleted: Mutex<Vec<PathBuf>>,
    pub recommendations: Vec<PathRecommendation>,
}

impl FakeBackend {
    pub fn new(listing: Vec<ResultItem>, hits: Vec<ResultItem>) -> Self {
        Self {
            listing,
            hits,
            delay: Duration::from_millis(20),
            fail_fetches: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            watch_state: Mutex::new(Ok(WatchState::default())),
            snapshot_calls: Mutex::new(0),
            watches: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            recommendations: vec![PathRecommendation {
                path: PathBuf::from("/home/user/Documents"),
                kind: RecommendationKind::Documents,
            }],
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn fail_fetches_with(&self, message: Option<&str>) {
        *self.fail_fetches.lock().unwrap() = message.map(str::to_owned);
    }

    pub fn set_watch_state(&self, state: Result<WatchState, String>) {
        *self.watch_state.lock().unwrap() = state;
    }

    fn fetch_failure(&self) -> Option<ClientError> {
        self.fail_fetches
            .lock()
            .unwrap()
            .clone()
            .map(ClientError::Rejected)
    }
}

#[async_trait]
impl CommandFacade for FakeBackend {
    async fn list_all(&self, offset: usize, limit: usize) -> Result<SearchResults, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::ListAll { offset, limit });
        tokio::time::sleep(self.delay).await;
        if let Some(err) = self.fetch_failure() {
            return Err(err);
        }
        Ok(paginate(&self.listing, offset, limit))
    }

    async fn search(
        &self,
        text: &str,
        tags: &[String],
        sort: SortMode,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResults, ClientError> {
        self.calls.lock().unwrap().push(Call::Search {
            text: text.to_string(),
            tags: tags.to_vec(),
            sort,
            offset,
            limit,
        });
        tokio::time::sleep(self.delay).await;
        if let Some(err) = self.fetch_failure() {
            return Err(err);
        }
        Ok(paginate(&self.hits, offset, limit))
    }

    async fn list_watches(&self) -> Result<Vec<Watch>, ClientError> {
        Ok(self.watches.lock().unwrap().clone())
    }

    async fn get_watch_state(&self) -> Result<WatchState, ClientError> {
        *self.snapshot_calls.lock().unwrap() += 1;
        tokio::time::sleep(self.delay).await;
        self.watch_state
            .lock()
            .unwrap()
            .clone()
            .map_err(ClientError::Rejected)
    }

    async fn add_watch(&self, path: &Path) -> Result<Watch, ClientError> {
        let mut watches = self.watches.lock().unwrap();
        if watches.iter().any(|w| w.path == path) {
            return Err(AddWatchError::WatchAlreadyExists.into());
        }
        if watches.iter().any(|w| w.overlaps(path)) {
            return Err(AddWatchError::ParentChildRelationship.into());
        }
        if path.as_os_str().is_empty() {
            return Err(ClientError::Rejected("empty path".into()));
        }
        let added = Watch {
            path: path.to_path_buf(),
            ..watch(watches.len() as i64 + 1, "", WatchStatus::Adding)
        };
        watches.push(added.clone());
        Ok(added)
    }

    async fn delete_watch(&self, path: &Path) -> Result<(), ClientError> {
        let mut watches = self.watches.lock().unwrap();
        let before = watches.len();
        watches.retain(|w| w.path != path);
        if before == watches.len() {
            return Err(ClientError::Rejected(format!(
                "no watch for {}",
                path.display()
            )));
        }
        self.deleted.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn get_containing_folder(&self, path: &Path) -> Result<PathBuf, ClientError> {
        path.parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ClientError::Rejected("failed to get parent".into()))
    }

    async fn get_path_recommendations(&self) -> Result<Vec<PathRecommendation>, ClientError> {
        Ok(self.recommendations.clone())
    }
}

/// Push channel fed by the test through [`FakePush::sender`].
pub struct FakePush {
    receivers: Mutex<Vec<mpsc::UnboundedReceiver<WatchState>>>,
    pub attach_failures: Mutex<u32>,
    pub attach_attempts: Mutex<u32>,
}

impl FakePush {
    /// Returns the channel plus one sender per successful attachment, in order.
    pub fn new(attachments: usize) -> (Arc<Self>, Vec<mpsc::UnboundedSender<WatchState>>) {
        let mut senders = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..attachments {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            receivers.push(rx);
        }
        receivers.reverse();
        let push = Arc::new(Self {
            receivers: Mutex::new(receivers),
            attach_failures: Mutex::new(0),
            attach_attempts: Mutex::new(0),
        });
        (push, senders)
    }

    pub fn fail_next_attaches(&self, count: u32) {
        *self.attach_failures.lock().unwrap() = count;
    }

    pub fn attempts(&self) -> u32 {
        *self.attach_attempts.lock().unwrap()
    }
}

#[async_trait]
impl PushChannel for FakePush {
    async fn subscribe(&self) -> Result<BoxStream<'static, WatchState>, ClientError> {
        *self.attach_attempts.lock().unwrap() += 1;
        {
            let mut failures = self.attach_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ClientError::Push("channel unavailable".into()));
            }
        }
        match self.receivers.lock().unwrap().pop() {
            Some(rx) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            None => Err(ClientError::Push("no more attachments".into())),
        }
    }
}
