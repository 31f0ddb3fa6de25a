//! User-visible notifications.
//!
//! The console never renders anything itself; it queues notifications that the
//! embedding UI drains and shows.

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

/// A message for the user, one line per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub lines: Vec<String>,
}

impl Notification {
    pub fn error(lines: Vec<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            lines,
        }
    }

    pub fn info(lines: Vec<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            lines,
        }
    }
}

/// Queue of pending notifications.
#[derive(Debug, Default)]
pub struct Notifier {
    pending: Mutex<Vec<Notification>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => warn!(lines = ?notification.lines, "User notification"),
            NotificationKind::Info => info!(lines = ?notification.lines, "User notification"),
        }
        self.pending.lock().push(notification);
    }

    /// Takes every pending notification, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
