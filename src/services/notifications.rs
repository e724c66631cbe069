//! Ordered, deduplicated, capped queue of user-facing alerts with
//! one-at-a-time display and auto-expiry.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::events::EventSink;
use super::store::{keys, KvStore};
use super::types::{Notification, NotificationKind};

/// Oldest entries beyond this are silently dropped, not re-delivered.
pub const QUEUE_CAP: usize = 6;

/// A displayed entry that should dismiss itself after `delay`.
#[derive(Debug, Clone)]
pub struct AutoClose {
    pub key: String,
    pub delay: Duration,
}

fn auto_close_delay(kind: NotificationKind) -> Option<Duration> {
    match kind {
        // Awaits an explicit rating submission or skip.
        NotificationKind::DealCompleted => None,
        NotificationKind::DisputeResolved => Some(Duration::from_secs(3)),
        NotificationKind::Info => Some(Duration::from_secs(4)),
    }
}

/// Thumb rating for a completed deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rating {
    Up,
    Down,
}

/// Two-state micro-form carried by a deal-completed notification.
/// Submission is rejected until a thumb is chosen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingForm {
    pub choice: Option<Rating>,
    #[serde(default)]
    pub comment: String,
}

impl RatingForm {
    pub fn ready(&self) -> bool {
        self.choice.is_some()
    }
}

/// Persisted notification backlog. At most one entry is displayed at a
/// time; the backlog does not auto-cycle — after the first proactive
/// surface of a session the rest wait for explicit review.
pub struct NotificationQueue {
    entries: Vec<Notification>,
    active: Option<String>,
    surfaced_this_session: bool,
    store: KvStore,
    sink: Arc<dyn EventSink>,
}

impl NotificationQueue {
    pub fn load(store: KvStore, sink: Arc<dyn EventSink>) -> Self {
        let entries: Vec<Notification> = store.load(keys::NOTIFICATION_QUEUE);
        Self {
            entries,
            active: None,
            surfaced_this_session: false,
            store,
            sink,
        }
    }

    /// Append an entry unless its message is empty or its key is already
    /// queued. Truncates to the newest [`QUEUE_CAP`], persists, and if
    /// nothing is currently displayed, displays the new entry.
    pub fn enqueue(&mut self, mut entry: Notification) -> Option<AutoClose> {
        if entry.message.is_empty() {
            return None;
        }
        if self.entries.iter().any(|e| e.key == entry.key) {
            log::debug!("Notification '{}' already queued, skipping", entry.key);
            return None;
        }
        entry.created_at = Utc::now();
        log::info!("Enqueued notification '{}'", entry.key);
        self.entries.push(entry.clone());
        if self.entries.len() > QUEUE_CAP {
            let overflow = self.entries.len() - QUEUE_CAP;
            self.entries.drain(0..overflow);
        }
        self.store.save(keys::NOTIFICATION_QUEUE, &self.entries);

        if self.active.is_none() {
            return self.show(entry);
        }
        None
    }

    /// Remove an entry by key. If entries remain and none has been
    /// proactively surfaced this session, the next one is shown exactly
    /// once.
    pub fn dismiss(&mut self, key: &str) -> Option<AutoClose> {
        self.entries.retain(|e| e.key != key);
        self.store.save(keys::NOTIFICATION_QUEUE, &self.entries);

        if self.active.as_deref() == Some(key) {
            self.active = None;
            self.sink
                .emit("notification-hide", serde_json::json!({ "key": key }));
        }

        if !self.surfaced_this_session {
            if let Some(next) = self.entries.first().cloned() {
                self.surfaced_this_session = true;
                return self.show(next);
            }
        }
        None
    }

    /// Auto-expiry path: dismiss only if the entry is still the one on
    /// screen. A later display supersedes the pending expiry.
    pub fn dismiss_if_active(&mut self, key: &str) -> Option<AutoClose> {
        if self.active.as_deref() == Some(key) {
            self.dismiss(key)
        } else {
            None
        }
    }

    /// Called once at startup: surface the first pending backlog entry.
    pub fn surface_pending(&mut self) -> Option<AutoClose> {
        if self.surfaced_this_session || self.active.is_some() {
            return None;
        }
        if let Some(first) = self.entries.first().cloned() {
            self.surfaced_this_session = true;
            return self.show(first);
        }
        None
    }

    fn show(&mut self, entry: Notification) -> Option<AutoClose> {
        self.active = Some(entry.key.clone());
        self.sink.emit(
            "notification-show",
            serde_json::to_value(&entry).unwrap_or_default(),
        );
        auto_close_delay(entry.kind).map(|delay| AutoClose {
            key: entry.key,
            delay,
        })
    }

    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }
}
