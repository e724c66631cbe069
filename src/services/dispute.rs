//! Dispute snapshot differ. A lightweight fingerprint of the mutable
//! fields decides whether the open detail view needs a full re-render;
//! identical fingerprints mean the network round-trip cost nothing.

use super::types::Dispute;

/// Derived summary of a dispute's mutable fields. Held only while that
/// dispute's detail view is open, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeFingerprint {
    pub evidence_count: usize,
    pub message_count: usize,
    pub assigned_to: Option<i64>,
    pub reason: String,
    pub comment: String,
}

impl DisputeFingerprint {
    pub fn of(dispute: &Dispute) -> Self {
        Self {
            evidence_count: dispute.evidence.len(),
            message_count: dispute.messages.len(),
            assigned_to: dispute.assigned_to,
            reason: dispute.reason.clone(),
            comment: dispute.comment.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeDelta {
    /// Re-fetch and re-render the full detail. Partial application of
    /// evidence/messages is not supported.
    Changed,
    /// No UI update.
    Unchanged,
}

#[derive(Default)]
pub struct DisputeDiffer {
    dispute_id: Option<i64>,
    last: Option<DisputeFingerprint>,
}

impl DisputeDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispute detail view opened; forget any previous fingerprint so
    /// the first observation renders.
    pub fn open(&mut self, dispute_id: i64) {
        self.dispute_id = Some(dispute_id);
        self.last = None;
    }

    /// The view closed; the fingerprint's lifetime ends with it.
    pub fn reset(&mut self) {
        self.dispute_id = None;
        self.last = None;
    }

    pub fn dispute_id(&self) -> Option<i64> {
        self.dispute_id
    }

    /// Compare a fresh snapshot against the fingerprint captured at last
    /// render. A snapshot for a dispute other than the open one is stale
    /// and reports `Unchanged` without touching state.
    pub fn observe(&mut self, dispute: &Dispute) -> DisputeDelta {
        if self.dispute_id != Some(dispute.id) {
            log::debug!(
                "Discarding dispute {} snapshot; open dispute is {:?}",
                dispute.id,
                self.dispute_id
            );
            return DisputeDelta::Unchanged;
        }
        let fingerprint = DisputeFingerprint::of(dispute);
        if self.last.as_ref() == Some(&fingerprint) {
            return DisputeDelta::Unchanged;
        }
        self.last = Some(fingerprint);
        DisputeDelta::Changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::types::{DisputeMessage, Evidence};

    fn dispute(id: i64) -> Dispute {
        Dispute {
            id,
            deal_id: 10,
            reason: "payment not received".to_string(),
            comment: String::new(),
            assigned_to: None,
            evidence: Vec::new(),
            messages: Vec::new(),
        }
    }

    #[test]
    fn test_first_observation_renders() {
        let mut differ = DisputeDiffer::new();
        differ.open(1);
        assert_eq!(differ.observe(&dispute(1)), DisputeDelta::Changed);
    }

    #[test]
    fn test_identical_snapshots_do_not_rerender() {
        let mut differ = DisputeDiffer::new();
        differ.open(1);
        differ.observe(&dispute(1));
        assert_eq!(differ.observe(&dispute(1)), DisputeDelta::Unchanged);
        assert_eq!(differ.observe(&dispute(1)), DisputeDelta::Unchanged);
    }

    #[test]
    fn test_each_mutable_field_triggers_change() {
        let mut differ = DisputeDiffer::new();
        differ.open(1);
        differ.observe(&dispute(1));

        let mut with_evidence = dispute(1);
        with_evidence.evidence.push(Evidence {
            id: 1,
            file_url: "f".to_string(),
        });
        assert_eq!(differ.observe(&with_evidence), DisputeDelta::Changed);

        let mut with_message = with_evidence.clone();
        with_message.messages.push(DisputeMessage {
            sender_id: 2,
            text: "hi".to_string(),
            created_at: None,
        });
        assert_eq!(differ.observe(&with_message), DisputeDelta::Changed);

        let mut assigned = with_message.clone();
        assigned.assigned_to = Some(77);
        assert_eq!(differ.observe(&assigned), DisputeDelta::Changed);

        let mut reworded = assigned.clone();
        reworded.comment = "updated".to_string();
        assert_eq!(differ.observe(&reworded), DisputeDelta::Changed);

        // Unchanged again after settling.
        assert_eq!(differ.observe(&reworded), DisputeDelta::Unchanged);
    }

    #[test]
    fn test_stale_dispute_is_discarded() {
        let mut differ = DisputeDiffer::new();
        differ.open(1);
        assert_eq!(differ.observe(&dispute(2)), DisputeDelta::Unchanged);
    }

    #[test]
    fn test_reopen_forgets_fingerprint() {
        let mut differ = DisputeDiffer::new();
        differ.open(1);
        differ.observe(&dispute(1));
        differ.reset();
        differ.open(1);
        assert_eq!(differ.observe(&dispute(1)), DisputeDelta::Changed);
    }
}
