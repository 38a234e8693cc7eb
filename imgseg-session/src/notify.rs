//! Transient notifications

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub expires_at: Instant,
}

/// Queue of short-lived messages, rendered by whoever owns the display
#[derive(Debug, Default)]
pub struct NotificationQueue {
    items: VecDeque<Notification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>, ttl: Duration, now: Instant) {
        self.items.push_back(Notification {
            message: message.into(),
            expires_at: now + ttl,
        });
    }

    /// Drop everything expired at `now`
    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|n| n.expires_at > now);
    }

    /// Live notifications at `now`, oldest first
    pub fn active(&self, now: Instant) -> Vec<&Notification> {
        self.items.iter().filter(|n| n.expires_at > now).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
