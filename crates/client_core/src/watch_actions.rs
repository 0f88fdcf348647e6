//! Watch mutations and first-run path recommendations.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use futures::future::join_all;
use shared::{
    domain::{PathRecommendation, Watch},
    error::AddWatchError,
};
use tracing::{error, info, warn};

use crate::{
    error::ClientError,
    facade::CommandFacade,
    lock,
    notification::{Notification, NotificationCenter, DEFAULT_NOTIFICATION_TTL},
};

pub struct WatchActions {
    facade: Arc<dyn CommandFacade>,
    notifications: Mutex<NotificationCenter>,
    ttl: Duration,
}

impl WatchActions {
    pub fn new(facade: Arc<dyn CommandFacade>) -> Self {
        Self::with_notification_ttl(facade, DEFAULT_NOTIFICATION_TTL)
    }

    pub fn with_notification_ttl(facade: Arc<dyn CommandFacade>, ttl: Duration) -> Self {
        Self {
            facade,
            notifications: Mutex::new(NotificationCenter::new()),
            ttl,
        }
    }

    /// Registers a watch. Refusals are classified and shown as a notification;
    /// the document cache is never touched here.
    pub async fn add_watch(&self, path: &Path) -> Result<Watch, AddWatchError> {
        match self.facade.add_watch(path).await {
            Ok(watch) => {
                info!(path = %path.display(), watch_id = watch.id.0, "watch added");
                Ok(watch)
            }
            Err(err) => {
                let classification = err.add_watch_classification();
                if classification.is_validation() {
                    warn!(path = %path.display(), error = %err, "watch rejected");
                } else {
                    error!(path = %path.display(), error = %err, "failed to add watch");
                }
                lock(&self.notifications).add_watch_failed(
                    classification,
                    self.ttl,
                    Instant::now(),
                );
                Err(classification)
            }
        }
    }

    /// Issues one request per path concurrently; results keep the input order.
    pub async fn add_watches(&self, paths: &[PathBuf]) -> Vec<Result<Watch, AddWatchError>> {
        join_all(paths.iter().map(|path| self.add_watch(path))).await
    }

    pub async fn delete_watch(&self, path: &Path) -> Result<(), ClientError> {
        match self.facade.delete_watch(path).await {
            Ok(()) => {
                info!(path = %path.display(), "watch deletion requested");
                Ok(())
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to delete watch");
                lock(&self.notifications).add_watch_failed(
                    AddWatchError::Other,
                    self.ttl,
                    Instant::now(),
                );
                Err(err)
            }
        }
    }

    /// Suggested folders, offered only while nothing is watched yet.
    pub async fn load_recommendations(&self) -> Result<Vec<PathRecommendation>, ClientError> {
        let watches = self.facade.list_watches().await?;
        if !watches.is_empty() {
            return Ok(Vec::new());
        }
        self.facade.get_path_recommendations().await
    }

    pub async fn accept_recommendations(
        &self,
        accepted: &[PathRecommendation],
    ) -> Vec<Result<Watch, AddWatchError>> {
        let paths: Vec<PathBuf> = accepted.iter().map(|r| r.path.clone()).collect();
        self.add_watches(&paths).await
    }

    pub async fn containing_folder(&self, path: &Path) -> Result<PathBuf, ClientError> {
        self.facade.get_containing_folder(path).await
    }

    pub fn active_notifications(&self) -> Vec<Notification> {
        lock(&self.notifications).active(Instant::now()).to_vec()
    }

    pub fn dismiss_notification(&self, id: u64) -> bool {
        lock(&self.notifications).dismiss(id)
    }
}

#[cfg(test)]
#[path = "tests/watch_actions_tests.rs"]
mod tests;
