use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ResultItem, SortMode, WatchState},
    error::ApiError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAllRequest {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub tags: Vec<String>,
    pub sort: SortMode,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRequest {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResponse {
    pub path: PathBuf,
}

/// One page of documents as the backend returns it; `count` is the total match count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub count: usize,
    pub documents: Vec<ResultItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    Watches(WatchState),
    Error(ApiError),
}
