//! Transient user notifications (toasts).

use std::time::{Duration, Instant};

use shared::error::AddWatchError;

/// Display time for watch errors.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    /// Lookup key for the localized text, e.g. `watches.errors.other`.
    pub message_key: String,
    pub message: String,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl Notification {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

#[derive(Debug, Default)]
pub struct NotificationCenter {
    notifications: Vec<Notification>,
    next_id: u64,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        kind: NotificationKind,
        message_key: impl Into<String>,
        message: impl Into<String>,
        ttl: Duration,
        now: Instant,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.notifications.push(Notification {
            id,
            kind,
            message_key: message_key.into(),
            message: message.into(),
            created_at: now,
            ttl,
        });
        id
    }

    pub fn add_watch_failed(&mut self, error: AddWatchError, ttl: Duration, now: Instant) -> u64 {
        self.push(
            NotificationKind::Error,
            format!("watches.errors.{}", error.as_str()),
            error.to_string(),
            ttl,
            now,
        )
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.id != id);
        before != self.notifications.len()
    }

    /// Drops expired notifications. Returns how many were removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired(now));
        before - self.notifications.len()
    }

    pub fn active(&mut self, now: Instant) -> &[Notification] {
        self.prune(now);
        &self.notifications
    }
}
