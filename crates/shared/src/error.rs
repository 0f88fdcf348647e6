use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the backend refused to register a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AddWatchError {
    #[serde(rename = "parent-child-relationship")]
    #[error("the path overlaps an existing watch")]
    ParentChildRelationship,
    #[serde(rename = "watch-already-exists")]
    #[error("the path is already watched")]
    WatchAlreadyExists,
    #[serde(rename = "other")]
    #[error("the watch could not be added")]
    Other,
}

impl AddWatchError {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddWatchError::ParentChildRelationship => "parent-child-relationship",
            AddWatchError::WatchAlreadyExists => "watch-already-exists",
            AddWatchError::Other => "other",
        }
    }

    /// Validation failures are rejected requests; everything else collapses to `Other`.
    pub fn is_validation(&self) -> bool {
        !matches!(self, AddWatchError::Other)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}
