//! HTTP command facade and WebSocket push channel for a search backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::{future, stream::BoxStream, StreamExt};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{PathRecommendation, SortMode, Watch, WatchState},
    error::AddWatchError,
    protocol::{ListAllRequest, PathRequest, PathResponse, SearchRequest, SearchResults, ServerEvent},
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::ClientError,
    facade::{CommandFacade, PushChannel},
};

#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|err| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: "backend url must start with http:// or https://".into(),
            });
        }
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket endpoint carrying server events.
    pub fn events_url(&self) -> String {
        let ws_base = if self.base_url.starts_with("https://") {
            self.base_url.replacen("https://", "wss://", 1)
        } else {
            self.base_url.replacen("http://", "ws://", 1)
        };
        format!("{ws_base}/events")
    }

    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(format!("{}{route}", self.base_url))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn post_json<B, T>(&self, route: &str, body: &B) -> Result<T, ClientError>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{route}", self.base_url))
            .json(body)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

/// A 4xx carries the backend's reason in the body; other failures stay
/// transport errors.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_client_error() {
        let reason = response.text().await?;
        warn!(%status, reason = %reason, "backend rejected request");
        return Err(ClientError::Rejected(format!("{status}: {reason}")));
    }
    Ok(response.error_for_status()?)
}

#[async_trait]
impl CommandFacade for HttpBackend {
    async fn list_all(&self, offset: usize, limit: usize) -> Result<SearchResults, ClientError> {
        self.post_json("/documents/all", &ListAllRequest { offset, limit })
            .await
    }

    async fn search(
        &self,
        text: &str,
        tags: &[String],
        sort: SortMode,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResults, ClientError> {
        let request = SearchRequest {
            query: text.to_string(),
            tags: tags.to_vec(),
            sort,
            offset,
            limit,
        };
        self.post_json("/documents/search", &request).await
    }

    async fn list_watches(&self) -> Result<Vec<Watch>, ClientError> {
        self.get_json("/watches").await
    }

    async fn get_watch_state(&self) -> Result<WatchState, ClientError> {
        self.get_json("/watch_state").await
    }

    async fn add_watch(&self, path: &Path) -> Result<Watch, ClientError> {
        let response = self
            .http
            .post(format!("{}/watches/add", self.base_url))
            .json(&PathRequest {
                path: path.to_path_buf(),
            })
            .send()
            .await?;
        if response.status().is_client_error() {
            let status = response.status();
            let body = response.text().await?;
            let err = serde_json::from_str::<AddWatchError>(&body).unwrap_or_else(|parse_err| {
                debug!(%status, error = %parse_err, "unclassified add watch rejection");
                AddWatchError::Other
            });
            return Err(err.into());
        }
        Ok(response.error_for_status()?.json().await?)
    }

    async fn delete_watch(&self, path: &Path) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}/watches/delete", self.base_url))
            .json(&PathRequest {
                path: path.to_path_buf(),
            })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn get_containing_folder(&self, path: &Path) -> Result<PathBuf, ClientError> {
        let response: PathResponse = self
            .post_json(
                "/path/containing_folder",
                &PathRequest {
                    path: path.to_path_buf(),
                },
            )
            .await?;
        Ok(response.path)
    }

    async fn get_path_recommendations(&self) -> Result<Vec<PathRecommendation>, ClientError> {
        self.get_json("/path_recommendations").await
    }
}

#[async_trait]
impl PushChannel for HttpBackend {
    async fn subscribe(&self) -> Result<BoxStream<'static, WatchState>, ClientError> {
        let ws_url = self.events_url();
        let (ws_stream, _) = connect_async(&ws_url)
            .await
            .map_err(|err| ClientError::Push(format!("failed to connect websocket {ws_url}: {err}")))?;
        debug!(%ws_url, "push channel connected");

        let updates = ws_stream
            .take_while(|msg| future::ready(matches!(msg, Ok(message) if !message.is_close())))
            .filter_map(|msg| future::ready(msg.ok().and_then(decode_watch_state)))
            .boxed();
        Ok(updates)
    }
}

fn decode_watch_state(message: Message) -> Option<WatchState> {
    let Message::Text(text) = message else {
        return None;
    };
    match serde_json::from_str::<ServerEvent>(&text) {
        Ok(ServerEvent::Watches(state)) => Some(state),
        Ok(ServerEvent::Error(err)) => {
            warn!(code = ?err.code, message = %err.message, "backend reported an error event");
            None
        }
        Err(err) => {
            warn!(error = %err, "ignoring undecodable push frame");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
