//! The locally owned, persisted reconciliation state: unread markers,
//! status baselines, and idempotency guards. One aggregate, injected into
//! each component, so nothing mutates hidden globals.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use super::events::EventSink;
use super::store::{keys, KvStore};
use super::types::DealStatus;

/// All map/set entries for a deal are pruned once it reaches a terminal
/// status; the idempotency guards and status baseline survive so a
/// terminal event never re-alerts.
pub struct SyncState {
    /// Deal ids with an unacknowledged incoming offer.
    pub unread_deals: HashSet<i64>,
    /// Deal id → newest chat activity timestamp the user has observed.
    pub chat_last_seen_at: HashMap<i64, DateTime<Utc>>,
    /// Deal id → unacknowledged incoming chat events since last seen.
    pub chat_unread_counts: HashMap<i64, u32>,
    /// Deal id → offer visually acknowledged. Distinct from
    /// `unread_deals` so a once-read pending offer never re-alerts.
    pub pending_read: HashMap<i64, bool>,
    /// Deal id → last-known status; the reconciler's transition baseline.
    pub deal_status_map: HashMap<i64, DealStatus>,
    /// `"{id}:completed"` → notified.
    pub completed_notified: HashMap<String, bool>,
    /// `"{id}:dispute_resolved"` → notified.
    pub dispute_resolved_notified: HashMap<String, bool>,
    /// Previous aggregate badge value, session-local.
    last_badge: u32,
}

impl SyncState {
    /// Read every key once at startup. Missing or corrupt blobs load as
    /// empty, never as errors.
    pub fn load(store: &KvStore) -> Self {
        let mut state = Self {
            unread_deals: store.load(keys::UNREAD_DEALS),
            chat_last_seen_at: store.load(keys::CHAT_LAST_SEEN_AT),
            chat_unread_counts: store.load(keys::CHAT_UNREAD_COUNTS),
            pending_read: store.load(keys::PENDING_READ),
            deal_status_map: store.load(keys::DEAL_STATUS_MAP),
            completed_notified: store.load(keys::COMPLETED_NOTIFIED),
            dispute_resolved_notified: store.load(keys::DISPUTE_RESOLVED_NOTIFIED),
            last_badge: 0,
        };
        // Reloaded unread state is not "new": no haptic for it.
        state.last_badge = state.badge();
        log::info!(
            "Loaded sync state: {} unread deals, {} chat counters, {} status baselines",
            state.unread_deals.len(),
            state.chat_unread_counts.len(),
            state.deal_status_map.len()
        );
        state
    }

    /// Aggregate badge: unacknowledged pending offers plus the sum of all
    /// per-deal chat unread counters.
    pub fn badge(&self) -> u32 {
        self.unread_deals.len() as u32 + self.chat_unread_counts.values().sum::<u32>()
    }

    /// Emit `badge-update` when the aggregate changed and `haptic` only
    /// when it increased; plateaus and decreases stay silent.
    pub fn publish_badge(&mut self, sink: &dyn EventSink) {
        let badge = self.badge();
        if badge > self.last_badge {
            sink.emit("haptic", serde_json::json!({ "reason": "badge" }));
        }
        if badge != self.last_badge {
            sink.emit("badge-update", serde_json::json!({ "count": badge }));
            self.last_badge = badge;
        }
    }

    /// Drop every unread/pending/chat marker for a deal. Called when the
    /// deal reaches a terminal status; terminal deals never show a badge.
    pub fn prune_deal(&mut self, deal_id: i64) {
        self.unread_deals.remove(&deal_id);
        self.pending_read.remove(&deal_id);
        self.chat_unread_counts.remove(&deal_id);
        self.chat_last_seen_at.remove(&deal_id);
    }

    /// The user opened the deal: its offer is acknowledged and stays
    /// acknowledged even if polled again before the status changes.
    pub fn acknowledge_offer(&mut self, store: &KvStore, deal_id: i64) {
        self.pending_read.insert(deal_id, true);
        self.unread_deals.remove(&deal_id);
        store.save(keys::PENDING_READ, &self.pending_read);
        store.save(keys::UNREAD_DEALS, &self.unread_deals);
    }

    /// Explicit mark-read: reset the deal's chat counter to zero and
    /// advance the seen timestamp to the newest known value.
    pub fn mark_chat_read(
        &mut self,
        store: &KvStore,
        deal_id: i64,
        latest: Option<DateTime<Utc>>,
    ) {
        self.chat_unread_counts.remove(&deal_id);
        if let Some(ts) = latest {
            let seen = self.chat_last_seen_at.entry(deal_id).or_insert(ts);
            if ts > *seen {
                *seen = ts;
            }
        }
        store.save(keys::CHAT_UNREAD_COUNTS, &self.chat_unread_counts);
        store.save(keys::CHAT_LAST_SEEN_AT, &self.chat_last_seen_at);
    }

    /// Write every key back in full.
    pub fn persist_all(&self, store: &KvStore) {
        store.save(keys::UNREAD_DEALS, &self.unread_deals);
        store.save(keys::CHAT_LAST_SEEN_AT, &self.chat_last_seen_at);
        store.save(keys::CHAT_UNREAD_COUNTS, &self.chat_unread_counts);
        store.save(keys::PENDING_READ, &self.pending_read);
        store.save(keys::DEAL_STATUS_MAP, &self.deal_status_map);
        store.save(keys::COMPLETED_NOTIFIED, &self.completed_notified);
        store.save(keys::DISPUTE_RESOLVED_NOTIFIED, &self.dispute_resolved_notified);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::events::RecordingSink;
    use tempfile::TempDir;

    fn make_store() -> (KvStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = KvStore::new(tmp.path());
        (store, tmp)
    }

    #[test]
    fn test_badge_sums_offers_and_chat() {
        let (store, _tmp) = make_store();
        let mut state = SyncState::load(&store);
        state.unread_deals.insert(1);
        state.unread_deals.insert(2);
        state.chat_unread_counts.insert(3, 4);
        assert_eq!(state.badge(), 6);
    }

    #[test]
    fn test_haptic_only_on_increase() {
        let (store, _tmp) = make_store();
        let mut state = SyncState::load(&store);
        let sink = RecordingSink::new();

        state.unread_deals.insert(1);
        state.publish_badge(&sink);
        assert_eq!(sink.count("haptic"), 1);
        assert_eq!(sink.count("badge-update"), 1);

        // Plateau: silent.
        state.publish_badge(&sink);
        assert_eq!(sink.count("haptic"), 1);
        assert_eq!(sink.count("badge-update"), 1);

        // Decrease: badge updates but no haptic.
        state.unread_deals.remove(&1);
        state.publish_badge(&sink);
        assert_eq!(sink.count("haptic"), 1);
        assert_eq!(sink.count("badge-update"), 2);
    }

    #[test]
    fn test_no_haptic_for_reloaded_state() {
        let (store, _tmp) = make_store();
        {
            let mut state = SyncState::load(&store);
            state.unread_deals.insert(5);
            state.persist_all(&store);
        }
        let mut state = SyncState::load(&store);
        let sink = RecordingSink::new();
        state.publish_badge(&sink);
        assert_eq!(sink.count("haptic"), 0);
    }

    #[test]
    fn test_prune_clears_all_markers() {
        let (store, _tmp) = make_store();
        let mut state = SyncState::load(&store);
        state.unread_deals.insert(9);
        state.pending_read.insert(9, true);
        state.chat_unread_counts.insert(9, 2);
        state.chat_last_seen_at.insert(9, Utc::now());

        state.prune_deal(9);
        assert_eq!(state.badge(), 0);
        assert!(state.pending_read.is_empty());
        assert!(state.chat_last_seen_at.is_empty());
    }

    #[test]
    fn test_acknowledge_offer_persists() {
        let (store, _tmp) = make_store();
        {
            let mut state = SyncState::load(&store);
            state.unread_deals.insert(42);
            state.acknowledge_offer(&store, 42);
        }
        let state = SyncState::load(&store);
        assert!(!state.unread_deals.contains(&42));
        assert_eq!(state.pending_read.get(&42), Some(&true));
    }

    #[test]
    fn test_mark_chat_read_advances_seen() {
        let (store, _tmp) = make_store();
        let mut state = SyncState::load(&store);
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::seconds(30);
        state.chat_last_seen_at.insert(7, earlier);
        state.chat_unread_counts.insert(7, 3);

        state.mark_chat_read(&store, 7, Some(later));
        assert_eq!(state.chat_unread_counts.get(&7), None);
        assert_eq!(state.chat_last_seen_at.get(&7), Some(&later));
    }
}
