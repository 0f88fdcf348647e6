use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::{
    domain::{PathRecommendation, SortMode, Watch, WatchState},
    protocol::SearchResults,
};

use crate::error::ClientError;

/// Request/response operations offered by the backend process.
#[async_trait]
pub trait CommandFacade: Send + Sync {
    async fn list_all(&self, offset: usize, limit: usize) -> Result<SearchResults, ClientError>;
    async fn search(
        &self,
        text: &str,
        tags: &[String],
        sort: SortMode,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResults, ClientError>;
    async fn list_watches(&self) -> Result<Vec<Watch>, ClientError>;
    async fn get_watch_state(&self) -> Result<WatchState, ClientError>;
    /// Fails with [`ClientError::AddWatch`] when the backend refuses the path.
    async fn add_watch(&self, path: &Path) -> Result<Watch, ClientError>;
    async fn delete_watch(&self, path: &Path) -> Result<(), ClientError>;
    async fn get_containing_folder(&self, path: &Path) -> Result<PathBuf, ClientError>;
    async fn get_path_recommendations(&self) -> Result<Vec<PathRecommendation>, ClientError>;
}

/// Named push subscription delivering whole `WatchState` payloads.
/// Dropping the returned stream detaches from the channel.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(&self) -> Result<BoxStream<'static, WatchState>, ClientError>;
}
