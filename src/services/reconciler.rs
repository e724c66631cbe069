//! Deal snapshot reconciler: derives terminal-transition notifications
//! and unread/pending markers from a freshly polled deal list, diffed
//! against the persisted baseline.

use chrono::Utc;
use std::collections::{HashMap, HashSet};

use super::store::KvStore;
use super::sync_state::SyncState;
use super::types::{Deal, DealRole, DealStatus, Notification, NotificationKind};

pub struct DealReconciler {
    user_id: i64,
}

impl DealReconciler {
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }

    /// One full pass over an authoritative deal snapshot. Returns the
    /// notifications derived from it; feeding the same snapshot N times
    /// yields each notification exactly once.
    pub fn reconcile(
        &self,
        state: &mut SyncState,
        store: &KvStore,
        deals: &[Deal],
    ) -> Vec<Notification> {
        let mut next_status: HashMap<i64, DealStatus> = HashMap::new();
        let mut notifications = Vec::new();

        for deal in deals {
            next_status.insert(deal.id, deal.status);

            // Fires on first sight of a completed deal and on a detected
            // transition into it; the guard keeps both paths to one alert
            // so a user who was offline during the transition still hears
            // about it exactly once.
            if deal.status == DealStatus::Completed && !deal.reviewed {
                let key = completed_key(deal.id);
                if !state.completed_notified.get(&key).copied().unwrap_or(false) {
                    state.completed_notified.insert(key.clone(), true);
                    notifications.push(Notification {
                        key,
                        message: format!(
                            "Deal {} is completed. Rate your counterpart.",
                            deal.public_id
                        ),
                        kind: NotificationKind::DealCompleted,
                        deal_id: Some(deal.id),
                        public_id: Some(deal.public_id.clone()),
                        created_at: Utc::now(),
                    });
                }
            }

            if let Some(resolution) = &deal.dispute_resolution {
                let key = dispute_resolved_key(deal.id);
                if !state
                    .dispute_resolved_notified
                    .get(&key)
                    .copied()
                    .unwrap_or(false)
                {
                    state.dispute_resolved_notified.insert(key.clone(), true);
                    let own_amount = match deal.role {
                        DealRole::Seller => resolution.seller_amount,
                        DealRole::Buyer => resolution.buyer_amount,
                    };
                    let message = if own_amount > 0.0 {
                        format!(
                            "Dispute on deal {} was closed in your favor, {} credited.",
                            deal.public_id, own_amount
                        )
                    } else {
                        format!(
                            "Dispute on deal {} was closed in favor of the counterpart.",
                            deal.public_id
                        )
                    };
                    notifications.push(Notification {
                        key,
                        message,
                        kind: NotificationKind::DisputeResolved,
                        deal_id: Some(deal.id),
                        public_id: Some(deal.public_id.clone()),
                        created_at: Utc::now(),
                    });
                }
            }

            if deal.status.is_terminal() {
                state.prune_deal(deal.id);
            }
        }

        state.deal_status_map = next_status;
        self.recompute_unread_offers(state, deals);
        state.persist_all(store);

        if !notifications.is_empty() {
            log::info!("Reconcile pass produced {} notification(s)", notifications.len());
        }
        notifications
    }

    /// Re-derive the unacknowledged-offer set from the snapshot: offers
    /// still pending and previously flagged stay flagged, newly seen
    /// incoming offers join unless already marked read. Deals absent from
    /// the snapshot drop out and self-heal on the next full poll.
    fn recompute_unread_offers(&self, state: &mut SyncState, deals: &[Deal]) {
        let incoming: HashSet<i64> = deals
            .iter()
            .filter(|d| {
                d.status == DealStatus::Pending
                    && d.offer_initiator_id.is_some_and(|i| i != self.user_id)
            })
            .map(|d| d.id)
            .collect();

        let mut next: HashSet<i64> = state
            .unread_deals
            .intersection(&incoming)
            .copied()
            .collect();
        for id in &incoming {
            if !state.pending_read.get(id).copied().unwrap_or(false) {
                next.insert(*id);
            }
        }
        state.unread_deals = next;
    }
}

pub fn completed_key(deal_id: i64) -> String {
    format!("{}:completed", deal_id)
}

pub fn dispute_resolved_key(deal_id: i64) -> String {
    format!("{}:dispute_resolved", deal_id)
}
