// Service layer for the reconciliation core.

pub mod chat_unread;
pub mod config;
pub mod dispute;
pub mod events;
pub mod notifications;
pub mod reconciler;
pub mod scheduler;
pub mod store;
pub mod sync_state;
pub mod types;

pub use chat_unread::ChatUnreadTracker;
pub use config::DealwatchConfig;
pub use dispute::{DisputeDelta, DisputeDiffer, DisputeFingerprint};
pub use events::{EventSink, NullSink, RecordingSink};
pub use notifications::{NotificationQueue, Rating, RatingForm, QUEUE_CAP};
pub use reconciler::DealReconciler;
pub use scheduler::{ActiveViews, PollScheduler, SyncContext};
pub use store::KvStore;
pub use sync_state::SyncState;
pub use types::{
    Balance, ChatMessage, Deal, DealRole, DealStatus, Dispute, DisputeMessage, DisputeResolution,
    Evidence, Notification, NotificationKind,
};
