use shared::error::AddWatchError;
use thiserror::Error;

/// Failure of a single page fetch. Cloneable so every caller sharing an
/// in-flight request observes the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("backend request failed: {0}")]
    Backend(String),
    #[error("page fetch task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid backend url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("push channel failure: {0}")]
    Push(String),
    #[error("backend rejected request: {0}")]
    Rejected(String),
    #[error("add watch failed: {0}")]
    AddWatch(#[from] AddWatchError),
}

impl ClientError {
    /// Collapses any failure to the user-facing add-watch classification.
    pub fn add_watch_classification(&self) -> AddWatchError {
        match self {
            ClientError::AddWatch(err) => *err,
            _ => AddWatchError::Other,
        }
    }
}

impl From<ClientError> for FetchError {
    fn from(value: ClientError) -> Self {
        FetchError::Backend(value.to_string())
    }
}
