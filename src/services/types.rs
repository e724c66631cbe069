use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Server-owned snapshot types ────────────────────────────────

/// Deal status lifecycle. `Completed`, `Canceled` and `Expired` are
/// terminal: no further transition is expected once a deal reaches them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    #[default]
    Open,
    Pending,
    Reserved,
    Paid,
    Dispute,
    Completed,
    Canceled,
    Expired,
}

impl DealStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DealStatus::Completed | DealStatus::Canceled | DealStatus::Expired
        )
    }
}

/// The local user's side of a deal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealRole {
    #[default]
    Buyer,
    Seller,
}

/// Outcome of a concluded dispute, attached to the deal once a moderator
/// has split the funds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeResolution {
    #[serde(default)]
    pub seller_amount: f64,
    #[serde(default)]
    pub buyer_amount: f64,
}

/// One cash-for-crypto exchange transaction, as returned by a poll.
/// Everything except `id` tolerates absence; a partial snapshot must not
/// abort reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: i64,
    #[serde(default)]
    pub public_id: String,
    #[serde(default)]
    pub status: DealStatus,
    /// Sub-state of `paid` (QR handover progress).
    #[serde(default)]
    pub qr_stage: Option<String>,
    #[serde(default)]
    pub offer_initiator_id: Option<i64>,
    /// Timestamp of the newest chat activity on this deal.
    #[serde(default)]
    pub chat_last_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub chat_last_sender_id: Option<i64>,
    #[serde(default)]
    pub dispute_resolution: Option<DisputeResolution>,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default)]
    pub role: DealRole,
}

/// A piece of uploaded dispute evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub file_url: String,
}

/// A message in a dispute thread (between parties and the moderator).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeMessage {
    #[serde(default)]
    pub sender_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// An escalation on a deal, mediated by a moderator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispute {
    pub id: i64,
    #[serde(default)]
    pub deal_id: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub assigned_to: Option<i64>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub messages: Vec<DisputeMessage>,
}

/// The user's account balance, fetched in every live-sync cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    #[serde(default)]
    pub available: f64,
    #[serde(default)]
    pub frozen: f64,
}

/// A single chat message on a deal thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub sender_id: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ── Locally owned notification types ───────────────────────────

/// Kind of a user-facing alert; drives the display auto-close policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    /// Deal reached `completed`; carries the rating micro-form.
    DealCompleted,
    /// A dispute on one of the user's deals concluded.
    DisputeResolved,
    /// Generic one-shot notice.
    Info,
}

/// One entry in the notification queue. `key` is stable across polls of
/// the same underlying event so repeated snapshots dedupe to one alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub key: String,
    pub message: String,
    pub kind: NotificationKind,
    #[serde(default)]
    pub deal_id: Option<i64>,
    #[serde(default)]
    pub public_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// A generic notice with a generated key (never dedupes against
    /// event-derived entries).
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            message: message.into(),
            kind: NotificationKind::Info,
            deal_id: None,
            public_id: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DealStatus::Completed, true)]
    #[case(DealStatus::Canceled, true)]
    #[case(DealStatus::Expired, true)]
    #[case(DealStatus::Open, false)]
    #[case(DealStatus::Pending, false)]
    #[case(DealStatus::Reserved, false)]
    #[case(DealStatus::Paid, false)]
    #[case(DealStatus::Dispute, false)]
    fn test_terminal_statuses(#[case] status: DealStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn test_deal_tolerates_missing_fields() {
        let deal: Deal = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(deal.id, 7);
        assert_eq!(deal.status, DealStatus::Open);
        assert!(deal.chat_last_at.is_none());
        assert!(!deal.reviewed);
        assert_eq!(deal.role, DealRole::Buyer);
    }

    #[test]
    fn test_status_wire_format() {
        let deal: Deal = serde_json::from_str(r#"{"id": 1, "status": "dispute"}"#).unwrap();
        assert_eq!(deal.status, DealStatus::Dispute);
        let json = serde_json::to_string(&deal).unwrap();
        assert!(json.contains(r#""status":"dispute""#));
    }

    #[test]
    fn test_dispute_tolerates_missing_collections() {
        let dispute: Dispute = serde_json::from_str(r#"{"id": 3, "dealId": 9}"#).unwrap();
        assert!(dispute.evidence.is_empty());
        assert!(dispute.messages.is_empty());
        assert!(dispute.assigned_to.is_none());
    }
}
