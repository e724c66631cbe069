//! Polling scheduler: three independent, cancellable timers with
//! single-flight execution. Timer callbacks never pile up requests, and
//! a response that arrives for a no-longer-active target is discarded
//! after re-validating the active id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::ExchangeApi;

use super::chat_unread::ChatUnreadTracker;
use super::config::DealwatchConfig;
use super::dispute::{DisputeDelta, DisputeDiffer};
use super::events::EventSink;
use super::notifications::{AutoClose, NotificationQueue};
use super::reconciler::DealReconciler;
use super::store::KvStore;
use super::sync_state::SyncState;
use super::types::{Balance, Deal, Notification};

/// Which detail views are open. At most one deal and one dispute view
/// can be open at a time; in-flight responses are checked against these
/// before being applied.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActiveViews {
    pub deal: Option<i64>,
    pub dispute: Option<i64>,
}

/// Shared handles for everything a poll cycle touches. Cloning is cheap;
/// all mutation happens behind the locks.
#[derive(Clone)]
pub struct SyncContext {
    pub api: Arc<dyn ExchangeApi>,
    pub store: KvStore,
    pub sync: Arc<RwLock<SyncState>>,
    pub queue: Arc<RwLock<NotificationQueue>>,
    pub differ: Arc<RwLock<DisputeDiffer>>,
    pub views: Arc<RwLock<ActiveViews>>,
    pub balance: Arc<RwLock<Option<Balance>>>,
    pub sink: Arc<dyn EventSink>,
    pub reconciler: Arc<DealReconciler>,
    pub tracker: Arc<ChatUnreadTracker>,
    pub config: DealwatchConfig,
    pub live_in_flight: Arc<AtomicBool>,
}

/// One live-sync firing. If the previous cycle is still pending this is
/// a silent no-op, bounding outstanding live-sync requests to one.
pub async fn live_sync_cycle(ctx: &SyncContext) {
    if ctx
        .live_in_flight
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        log::debug!("Live sync still in flight, skipping tick");
        return;
    }
    run_live_sync(ctx).await;
    ctx.live_in_flight.store(false, Ordering::SeqCst);
}

async fn run_live_sync(ctx: &SyncContext) {
    match ctx.api.get_deals().await {
        Ok(deals) => apply_deal_snapshot(ctx, &deals).await,
        Err(e) => log::warn!("Deal list poll failed: {}", e),
    }

    match ctx.api.get_balance().await {
        Ok(balance) => {
            ctx.sink.emit(
                "balance-update",
                serde_json::to_value(&balance).unwrap_or_default(),
            );
            *ctx.balance.write().await = Some(balance);
        }
        Err(e) => log::warn!("Balance poll failed: {}", e),
    }

    let active_deal = ctx.views.read().await.deal;
    if let Some(id) = active_deal {
        refresh_active_deal(ctx, id).await;
    }
}

/// Run the reconciler and chat tracker over one snapshot, then publish
/// badge changes and deliver any derived notifications.
pub async fn apply_deal_snapshot(ctx: &SyncContext, deals: &[Deal]) {
    let notifications = {
        let mut sync = ctx.sync.write().await;
        let notes = ctx.reconciler.reconcile(&mut sync, &ctx.store, deals);
        ctx.tracker.observe(&mut sync, &ctx.store, deals);
        sync.publish_badge(ctx.sink.as_ref());
        notes
    };
    for notification in notifications {
        deliver(ctx, notification).await;
    }
}

/// Enqueue a notification and arm its auto-expiry if it got displayed.
pub async fn deliver(ctx: &SyncContext, notification: Notification) {
    let auto = ctx.queue.write().await.enqueue(notification);
    if let Some(auto) = auto {
        spawn_auto_close(ctx.queue.clone(), auto);
    }
}

/// Expire a displayed entry after its delay. Dismissal may surface the
/// next backlog entry, which arms its own expiry in turn.
pub fn spawn_auto_close(queue: Arc<RwLock<NotificationQueue>>, auto: AutoClose) {
    tokio::spawn(async move {
        let mut auto = auto;
        loop {
            tokio::time::sleep(auto.delay).await;
            let next = queue.write().await.dismiss_if_active(&auto.key);
            match next {
                Some(n) => auto = n,
                None => break,
            }
        }
    });
}

/// Refetch the open deal. Returns true when the deal has reached a
/// terminal status (the per-deal timer stops on that).
async fn refresh_active_deal(ctx: &SyncContext, id: i64) -> bool {
    match ctx.api.get_deal(id).await {
        Ok(Some(deal)) => {
            // The view may have changed while the fetch was in flight.
            if ctx.views.read().await.deal != Some(id) {
                log::debug!("Discarding stale refresh for deal {}", id);
                return false;
            }
            let terminal = deal.status.is_terminal();
            ctx.sink
                .emit("deal-refreshed", serde_json::to_value(&deal).unwrap_or_default());
            terminal
        }
        Ok(None) => false,
        Err(e) => {
            log::warn!("Active deal {} refresh failed: {}", id, e);
            false
        }
    }
}

/// One active-deal timer firing. Returns false when the timer should
/// stop: view closed or deal terminal.
pub async fn deal_refresh_cycle(ctx: &SyncContext) -> bool {
    let Some(id) = ctx.views.read().await.deal else {
        return false;
    };
    let terminal = refresh_active_deal(ctx, id).await;
    if terminal {
        log::info!("Deal {} reached a terminal status, stopping refresh", id);
    }
    !terminal
}

/// One active-dispute timer firing: fetch, fingerprint, and re-render
/// only on change. Returns false when the view has closed.
pub async fn dispute_refresh_cycle(ctx: &SyncContext) -> bool {
    let Some(id) = ctx.views.read().await.dispute else {
        return false;
    };
    match ctx.api.get_dispute(id).await {
        Ok(Some(dispute)) => {
            // Re-validate: the view may have moved on mid-fetch.
            if ctx.views.read().await.dispute != Some(id) {
                log::debug!("Discarding stale snapshot for dispute {}", id);
                return false;
            }
            let delta = ctx.differ.write().await.observe(&dispute);
            if delta == DisputeDelta::Changed {
                ctx.sink.emit(
                    "dispute-changed",
                    serde_json::to_value(&dispute).unwrap_or_default(),
                );
            }
            true
        }
        Ok(None) => true,
        Err(e) => {
            log::warn!("Dispute {} refresh failed: {}", id, e);
            true
        }
    }
}

/// Owns the three timer tasks. Stopping a timer aborts its task
/// deterministically; it never fires again after the corresponding view
/// closes.
pub struct PollScheduler {
    ctx: SyncContext,
    live: Option<JoinHandle<()>>,
    deal: Option<JoinHandle<()>>,
    dispute: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            live: None,
            deal: None,
            dispute: None,
        }
    }

    /// Continuous deal-list/balance sync. Runs until shutdown.
    pub fn start_live(&mut self) {
        if self.live.is_some() {
            return;
        }
        let ctx = self.ctx.clone();
        self.live = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(ctx.config.live_sync_period());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                live_sync_cycle(&ctx).await;
            }
        }));
        log::info!("Live sync started ({}s period)", self.ctx.config.live_sync_secs);
    }

    /// Refresh the open deal until its view closes or it goes terminal.
    pub fn start_deal_refresh(&mut self) {
        self.stop_deal_refresh();
        let ctx = self.ctx.clone();
        self.deal = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(ctx.config.deal_refresh_period());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !deal_refresh_cycle(&ctx).await {
                    break;
                }
            }
        }));
    }

    pub fn stop_deal_refresh(&mut self) {
        if let Some(handle) = self.deal.take() {
            handle.abort();
        }
    }

    /// Refresh the open dispute through the differ until its view closes.
    pub fn start_dispute_refresh(&mut self) {
        self.stop_dispute_refresh();
        let ctx = self.ctx.clone();
        self.dispute = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(ctx.config.dispute_refresh_period());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !dispute_refresh_cycle(&ctx).await {
                    break;
                }
            }
        }));
    }

    pub fn stop_dispute_refresh(&mut self) {
        if let Some(handle) = self.dispute.take() {
            handle.abort();
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(handle) = self.live.take() {
            handle.abort();
        }
        self.stop_deal_refresh();
        self.stop_dispute_refresh();
        log::info!("Polling stopped");
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
