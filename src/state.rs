use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::api::{DealAction, ExchangeApi};
use crate::error::{DealwatchError, Result};
use crate::services::chat_unread::ChatUnreadTracker;
use crate::services::config::DealwatchConfig;
use crate::services::dispute::DisputeDiffer;
use crate::services::events::EventSink;
use crate::services::notifications::{NotificationQueue, RatingForm};
use crate::services::reconciler::{completed_key, DealReconciler};
use crate::services::scheduler::{self, ActiveViews, PollScheduler, SyncContext};
use crate::services::store::KvStore;
use crate::services::sync_state::SyncState;
use crate::services::types::{Balance, ChatMessage, Notification};

/// Top-level aggregate wiring the store, sync state, notification queue
/// and polling scheduler together. The host calls the view-lifecycle
/// operations; everything else runs on timers.
pub struct AppState {
    ctx: SyncContext,
    scheduler: Mutex<PollScheduler>,
}

impl AppState {
    pub fn new(
        config: DealwatchConfig,
        user_id: i64,
        data_dir: &Path,
        api: Arc<dyn ExchangeApi>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let store = KvStore::new(data_dir);
        let sync = SyncState::load(&store);
        let queue = NotificationQueue::load(store.clone(), sink.clone());

        let ctx = SyncContext {
            api,
            store,
            sync: Arc::new(RwLock::new(sync)),
            queue: Arc::new(RwLock::new(queue)),
            differ: Arc::new(RwLock::new(DisputeDiffer::new())),
            views: Arc::new(RwLock::new(ActiveViews::default())),
            balance: Arc::new(RwLock::new(None)),
            sink,
            reconciler: Arc::new(DealReconciler::new(user_id)),
            tracker: Arc::new(ChatUnreadTracker::new(user_id)),
            config,
            live_in_flight: Arc::new(AtomicBool::new(false)),
        };

        Self {
            scheduler: Mutex::new(PollScheduler::new(ctx.clone())),
            ctx,
        }
    }

    /// Bring the session up: surface the first pending backlog entry,
    /// publish the persisted badge, and start the live sync timer.
    pub async fn bootstrap(&self) {
        let auto = self.ctx.queue.write().await.surface_pending();
        if let Some(auto) = auto {
            scheduler::spawn_auto_close(self.ctx.queue.clone(), auto);
        }

        let badge = self.ctx.sync.read().await.badge();
        self.ctx
            .sink
            .emit("badge-update", serde_json::json!({ "count": badge }));

        self.scheduler.lock().await.start_live();
        log::info!("Bootstrap complete, live sync running");
    }

    /// Run one live-sync cycle outside the timer (initial load, pull to
    /// refresh, post-action re-poll).
    pub async fn poll_now(&self) {
        scheduler::live_sync_cycle(&self.ctx).await;
    }

    // ── View lifecycle ────────────────────────────────────────

    /// The deal detail view opened: acknowledge its offer and start the
    /// active-deal refresh timer.
    pub async fn open_deal(&self, deal_id: i64) {
        self.ctx.views.write().await.deal = Some(deal_id);
        {
            let mut sync = self.ctx.sync.write().await;
            sync.acknowledge_offer(&self.ctx.store, deal_id);
            sync.publish_badge(self.ctx.sink.as_ref());
        }
        self.scheduler.lock().await.start_deal_refresh();
    }

    pub async fn close_deal_view(&self) {
        self.ctx.views.write().await.deal = None;
        self.scheduler.lock().await.stop_deal_refresh();
    }

    /// The chat thread for a deal opened (or was explicitly marked read):
    /// reset its counter and advance the seen timestamp.
    pub async fn mark_chat_read(
        &self,
        deal_id: i64,
        latest: Option<chrono::DateTime<chrono::Utc>>,
    ) {
        let mut sync = self.ctx.sync.write().await;
        sync.mark_chat_read(&self.ctx.store, deal_id, latest);
        sync.publish_badge(self.ctx.sink.as_ref());
    }

    pub async fn open_dispute(&self, dispute_id: i64) {
        self.ctx.views.write().await.dispute = Some(dispute_id);
        self.ctx.differ.write().await.open(dispute_id);
        self.scheduler.lock().await.start_dispute_refresh();
    }

    pub async fn close_dispute_view(&self) {
        self.ctx.views.write().await.dispute = None;
        self.ctx.differ.write().await.reset();
        self.scheduler.lock().await.stop_dispute_refresh();
    }

    // ── Notifications ─────────────────────────────────────────

    pub async fn notifications(&self) -> Vec<Notification> {
        self.ctx.queue.read().await.entries().to_vec()
    }

    pub async fn dismiss_notification(&self, key: &str) {
        let auto = self.ctx.queue.write().await.dismiss(key);
        if let Some(auto) = auto {
            scheduler::spawn_auto_close(self.ctx.queue.clone(), auto);
        }
    }

    /// Submit the rating attached to a deal-completed notification. The
    /// submit is rejected until a thumb is chosen; on success the entry
    /// is dismissed and the deal list is re-polled immediately so the
    /// `reviewed` flag clears the completed badge.
    pub async fn submit_rating(&self, deal_id: i64, form: &RatingForm) -> Result<()> {
        let Some(choice) = form.choice else {
            return Err(DealwatchError::InvalidInput(
                "a rating must be chosen before submitting".to_string(),
            ));
        };
        let comment = (!form.comment.is_empty()).then_some(form.comment.as_str());
        self.ctx.api.submit_review(deal_id, choice, comment).await?;

        self.dismiss_notification(&completed_key(deal_id)).await;
        self.poll_now().await;
        Ok(())
    }

    // ── Fire-and-poll write actions ───────────────────────────

    pub async fn deal_action(&self, deal_id: i64, action: DealAction) -> Result<()> {
        self.ctx.api.deal_action(deal_id, action).await?;
        self.poll_now().await;
        Ok(())
    }

    pub async fn send_chat_message(&self, deal_id: i64, text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(DealwatchError::InvalidInput(
                "chat message must not be empty".to_string(),
            ));
        }
        self.ctx.api.send_chat_message(deal_id, text).await
    }

    pub async fn resolve_dispute(
        &self,
        dispute_id: i64,
        seller_amount: f64,
        buyer_amount: f64,
    ) -> Result<()> {
        self.ctx
            .api
            .resolve_dispute(dispute_id, seller_amount, buyer_amount)
            .await?;
        self.poll_now().await;
        Ok(())
    }

    pub async fn chat_messages(&self, deal_id: i64) -> Result<Vec<ChatMessage>> {
        self.ctx.api.get_chat_messages(deal_id).await
    }

    // ── Read accessors ────────────────────────────────────────

    pub async fn badge(&self) -> u32 {
        self.ctx.sync.read().await.badge()
    }

    pub async fn unread_deal_ids(&self) -> Vec<i64> {
        let sync = self.ctx.sync.read().await;
        let mut ids: Vec<i64> = sync.unread_deals.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn balance(&self) -> Option<Balance> {
        self.ctx.balance.read().await.clone()
    }

    /// Stop every timer. In-flight requests are not awaited; their
    /// results would be discarded by the stale-target checks anyway.
    pub async fn shutdown(&self) {
        self.scheduler.lock().await.shutdown();
    }
}
