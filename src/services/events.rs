//! Rendering boundary. The core never touches a view layer directly; it
//! emits named events with JSON payloads and the host renders them.

use std::sync::Mutex;

/// Sink for user-visible signals: `notification-show`, `notification-hide`,
/// `badge-update`, `haptic`, `dispute-changed`, `deal-refreshed`,
/// `balance-update`.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: serde_json::Value);
}

/// Discards everything. Useful for headless operation.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &str, _payload: serde_json::Value) {}
}

/// Records emitted events for inspection; used by tests and diagnostics.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .map(|e| e.iter().filter(|(name, _)| name == event).count())
            .unwrap_or(0)
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        if let Ok(mut events) = self.events.lock() {
            events.push((event.to_string(), payload));
        }
    }
}
