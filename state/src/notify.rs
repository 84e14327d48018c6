//! User-visible notifications.
//!
//! Keeps a fixed-capacity ring of the most recent messages and fans each one
//! out to live listeners.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Thread-safe notification sink shared by the hook stack.
#[derive(Debug, Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

#[derive(Debug)]
struct NotifierInner {
    recent: Mutex<VecDeque<Notification>>,
    capacity: usize,
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(NotifierInner {
                recent: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.tx.subscribe()
    }

    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification {
            level,
            message: message.into(),
        };
        {
            let mut recent = self
                .inner
                .recent
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if recent.len() == self.inner.capacity {
                recent.pop_front();
            }
            recent.push_back(notification.clone());
        }
        // No listeners is fine; the ring still has it.
        let _ = self.inner.tx.send(notification);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "playground error notification");
        self.notify(NotificationLevel::Error, message);
    }

    /// Most recent notifications, oldest first.
    pub fn recent(&self) -> Vec<Notification> {
        self.inner
            .recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::with_capacity(crate::config::NotificationConfig::default().capacity)
    }
}
