//! Per-deal chat unread tracking, driven purely by the last-activity
//! timestamp the server reports per deal. Message content is never
//! replayed; each observed timestamp change counts as one unseen event.

use super::store::{keys, KvStore};
use super::sync_state::SyncState;
use super::types::Deal;

pub struct ChatUnreadTracker {
    user_id: i64,
}

impl ChatUnreadTracker {
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }

    /// Fold one deal snapshot into the unread counters. Counters only
    /// move up here; the sole way down is an explicit mark-read.
    pub fn observe(&self, state: &mut SyncState, store: &KvStore, deals: &[Deal]) {
        let mut dirty = false;

        for deal in deals {
            if deal.status.is_terminal() {
                continue;
            }
            let Some(last_at) = deal.chat_last_at else {
                continue;
            };
            // Activity from the local user is not unread.
            if deal.chat_last_sender_id.map_or(true, |s| s == self.user_id) {
                continue;
            }

            let seen = state.chat_last_seen_at.get(&deal.id).copied();
            match seen {
                // First observation: exactly one unseen event, since
                // history is not replayed.
                None => {
                    state.chat_last_seen_at.insert(deal.id, last_at);
                    *state.chat_unread_counts.entry(deal.id).or_insert(0) += 1;
                    dirty = true;
                }
                Some(prev) if prev != last_at => {
                    state.chat_last_seen_at.insert(deal.id, last_at);
                    *state.chat_unread_counts.entry(deal.id).or_insert(0) += 1;
                    dirty = true;
                }
                Some(_) => {}
            }
        }

        if dirty {
            store.save(keys::CHAT_UNREAD_COUNTS, &state.chat_unread_counts);
            store.save(keys::CHAT_LAST_SEEN_AT, &state.chat_last_seen_at);
        }
    }

    /// A deal is chat-unread iff its last sender is not the local user
    /// and its counter is above zero.
    pub fn is_chat_unread(&self, state: &SyncState, deal: &Deal) -> bool {
        deal.chat_last_sender_id.is_some_and(|s| s != self.user_id)
            && state.chat_unread_counts.get(&deal.id).copied().unwrap_or(0) > 0
    }
}
