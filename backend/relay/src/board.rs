//! In-memory notification board.
//!
//! The browser polls `GET /notifications/:id` and renders whatever the board
//! holds; the tracker writes to it through [`NotificationSink`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};
use tx_tracker::{NotificationHandle, NotificationSink, Phase};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub message: String,
    pub phase: Phase,
    pub resolved: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct NotificationBoard {
    next_id: AtomicU64,
    entries: RwLock<HashMap<u64, Notification>>,
}

impl NotificationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u64) -> Option<Notification> {
        self.entries.read().get(&id).cloned()
    }

    /// Drop resolved notifications last touched at or before `cutoff`.
    /// Returns how many were removed.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, n| !(n.resolved && n.updated_at <= cutoff));
        before - entries.len()
    }

    /// Resolve to an error unless the notification already ended.
    /// Returns whether anything changed.
    pub fn fail_open(&self, handle: NotificationHandle, message: &str) -> bool {
        self.set(handle, message, Phase::Error)
    }

    fn set(&self, handle: NotificationHandle, message: &str, phase: Phase) -> bool {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&handle.0) else {
            warn!(id = handle.0, "Update for unknown notification");
            return false;
        };
        if entry.resolved {
            debug!(id = handle.0, "Notification already resolved");
            return false;
        }
        entry.message = message.to_string();
        entry.phase = phase;
        entry.resolved = phase.is_terminal();
        entry.updated_at = Utc::now();
        true
    }
}

impl NotificationSink for NotificationBoard {
    fn create(&self, title: &str, message: &str, phase: Phase) -> NotificationHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.write().insert(
            id,
            Notification {
                id,
                title: title.to_string(),
                message: message.to_string(),
                phase,
                resolved: phase.is_terminal(),
                updated_at: Utc::now(),
            },
        );
        NotificationHandle(id)
    }

    fn update(&self, handle: NotificationHandle, message: &str, phase: Phase) {
        self.set(handle, message, phase);
    }

    fn resolve_success(&self, handle: NotificationHandle, message: &str) {
        self.set(handle, message, Phase::Success);
    }

    fn resolve_error(&self, handle: NotificationHandle, message: &str) {
        self.set(handle, message, Phase::Error);
    }
}
