//! Bot lifecycle scheduler
//!
//! Sweeps every bot on a fixed interval (plus once at startup when enabled)
//! and applies the payment predicates:
//! - running bots with a failed payment are paused and stamped inactive
//! - non-included bots inactive for 30 days or more are deleted
//!
//! Each sweep works on the snapshot read at its start. A bot paused in a sweep
//! is never deleted by that same sweep. A failure on one bot is logged and the
//! sweep moves on. Sweeps never overlap: a tick or manual trigger arriving
//! while one is in progress is skipped.

use crate::clock::Clock;
use crate::components::event_bus::{BotChange, EventBus, ShieldEvent};
use crate::errors::Result;
use crate::metrics::{metrics, Timer};
use crate::payment::{should_auto_pause, should_delete};
use crate::storage::Repository;
use crate::structured_logging::OperationContext;
use crate::types::{ArbitrageBot, BotPatch};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Outcome of one completed sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub paused: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// What a sweep did to a single bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BotAction {
    Untouched,
    Paused,
    Deleted,
}

pub struct BotLifecycleManager {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    run_on_start: bool,
    events: Option<EventBus>,
    /// Set while a sweep is in progress
    sweeping: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BotLifecycleManager {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            repo,
            clock,
            interval,
            run_on_start: true,
            events: None,
            sweeping: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    /// Broadcast `bot_update` events for paused and deleted bots
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the periodic sweep task; a second call while running is a no-op
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("Bot lifecycle scheduler already running");
            return;
        }

        let manager = Arc::clone(self);
        *task = Some(tokio::spawn(async move { manager.run_loop().await }));
        info!(
            interval_secs = self.interval.as_secs(),
            run_on_start = self.run_on_start,
            "⏱️ Bot lifecycle scheduler started"
        );
    }

    /// Abort the periodic task. A sweep cut off mid-way leaves already
    /// applied changes in place.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("Bot lifecycle scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(Ordering::Acquire)
    }

    async fn run_loop(self: Arc<Self>) {
        let period = self.interval.max(Duration::from_millis(1));
        let first = if self.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = tokio::time::interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_now().await {
                error!(error = %e, "Bot lifecycle sweep failed");
            }
        }
    }

    /// Run a sweep immediately
    ///
    /// `Ok(None)` when another sweep is already in progress.
    pub async fn run_now(&self) -> Result<Option<SweepReport>> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            metrics().lifecycle_sweeps_skipped.inc();
            debug!("Bot lifecycle sweep already in progress, skipping");
            return Ok(None);
        }
        let _reset = scopeguard::guard((), |_| self.sweeping.store(false, Ordering::Release));

        self.sweep().await.map(Some)
    }

    async fn sweep(&self) -> Result<SweepReport> {
        let timer = Timer::new();
        let ctx = OperationContext::new("lifecycle_sweep");
        let now = self.clock.now();

        let bots = self.repo.all_bots().await?;
        metrics().bots_seen_last_sweep.set(bots.len() as i64);

        let mut report = SweepReport {
            scanned: bots.len(),
            ..Default::default()
        };

        for bot in &bots {
            match self.process_bot(bot, now, &ctx).await {
                Ok(BotAction::Paused) => report.paused += 1,
                Ok(BotAction::Deleted) => report.deleted += 1,
                Ok(BotAction::Untouched) => {}
                Err(e) => {
                    report.failed += 1;
                    metrics().sweep_item_failures.inc();
                    ctx.logger.log_sweep_item_failure(&bot.id, &e.to_string());
                }
            }
        }

        metrics().lifecycle_sweeps.inc();
        timer.observe_duration(&metrics().sweep_duration);
        ctx.logger
            .log_sweep_complete(report.scanned, report.paused, report.deleted, report.failed);

        Ok(report)
    }

    async fn process_bot(
        &self,
        bot: &ArbitrageBot,
        now: DateTime<Utc>,
        ctx: &OperationContext,
    ) -> Result<BotAction> {
        if should_auto_pause(bot) {
            let patch = BotPatch {
                active: Some(false),
                inactive_since: Some(Some(now)),
                ..Default::default()
            };
            // Removed since the snapshot
            let Some(paused) = self.repo.update_bot(&bot.id, &patch).await? else {
                return Ok(BotAction::Untouched);
            };
            metrics().bots_paused.inc();
            ctx.logger.log_bot_paused(&paused.id, &paused.wallet_id);
            self.publish(BotChange::Paused, paused);
            return Ok(BotAction::Paused);
        }

        if should_delete(bot, now) {
            if !self.repo.delete_bot(&bot.id).await? {
                return Ok(BotAction::Untouched);
            }
            metrics().bots_deleted.inc();
            ctx.logger.log_bot_deleted(&bot.id, bot.inactive_since);
            self.publish(BotChange::Deleted, bot.clone());
            return Ok(BotAction::Deleted);
        }

        Ok(BotAction::Untouched)
    }

    fn publish(&self, change: BotChange, bot: ArbitrageBot) {
        if let Some(events) = &self.events {
            events.publish(ShieldEvent::BotUpdate { change, bot });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::errors::{StorageError, StorageResult};
    use crate::storage::MemStorage;
    use crate::types::{
        BotStrategy, NewBot, NftPass, NftPassPatch, PaymentStatus, Transaction, Wallet,
        WalletPatch,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;

    /// Repository that stalls listings or fails updates for one bot
    struct FlakyRepo {
        inner: MemStorage,
        poisoned_bot: Option<String>,
        stall: Option<Duration>,
    }

    impl FlakyRepo {
        fn new() -> Self {
            Self {
                inner: MemStorage::new(),
                poisoned_bot: None,
                stall: None,
            }
        }

        fn poisoned(&self, id: &str) -> StorageResult<()> {
            if self.poisoned_bot.as_deref() == Some(id) {
                return Err(StorageError::Backend("disk on fire".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Repository for FlakyRepo {
        async fn get_wallet(&self, id: &str) -> StorageResult<Option<Wallet>> {
            self.inner.get_wallet(id).await
        }
        async fn get_wallet_by_address(&self, address: &str) -> StorageResult<Option<Wallet>> {
            self.inner.get_wallet_by_address(address).await
        }
        async fn insert_wallet(&self, wallet: Wallet) -> StorageResult<Wallet> {
            self.inner.insert_wallet(wallet).await
        }
        async fn update_wallet(
            &self,
            id: &str,
            patch: &WalletPatch,
        ) -> StorageResult<Option<Wallet>> {
            self.inner.update_wallet(id, patch).await
        }
        async fn delete_wallet(&self, id: &str) -> StorageResult<bool> {
            self.inner.delete_wallet(id).await
        }
        async fn get_transaction(&self, id: &str) -> StorageResult<Option<Transaction>> {
            self.inner.get_transaction(id).await
        }
        async fn transactions_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<Transaction>> {
            self.inner.transactions_by_wallet(wallet_id).await
        }
        async fn insert_transaction(&self, tx: Transaction) -> StorageResult<Transaction> {
            self.inner.insert_transaction(tx).await
        }
        async fn get_bot(&self, id: &str) -> StorageResult<Option<ArbitrageBot>> {
            self.inner.get_bot(id).await
        }
        async fn bots_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<ArbitrageBot>> {
            self.inner.bots_by_wallet(wallet_id).await
        }
        async fn all_bots(&self) -> StorageResult<Vec<ArbitrageBot>> {
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            self.inner.all_bots().await
        }
        async fn insert_bot(&self, bot: ArbitrageBot) -> StorageResult<ArbitrageBot> {
            self.inner.insert_bot(bot).await
        }
        async fn update_bot(
            &self,
            id: &str,
            patch: &BotPatch,
        ) -> StorageResult<Option<ArbitrageBot>> {
            self.poisoned(id)?;
            self.inner.update_bot(id, patch).await
        }
        async fn delete_bot(&self, id: &str) -> StorageResult<bool> {
            self.poisoned(id)?;
            self.inner.delete_bot(id).await
        }
        async fn get_pass(&self, id: &str) -> StorageResult<Option<NftPass>> {
            self.inner.get_pass(id).await
        }
        async fn passes_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<NftPass>> {
            self.inner.passes_by_wallet(wallet_id).await
        }
        async fn insert_pass(&self, pass: NftPass) -> StorageResult<NftPass> {
            self.inner.insert_pass(pass).await
        }
        async fn update_pass(
            &self,
            id: &str,
            patch: &NftPassPatch,
        ) -> StorageResult<Option<NftPass>> {
            self.inner.update_pass(id, patch).await
        }
    }

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
    }

    fn bot(id: &str, active: bool, included: bool) -> ArbitrageBot {
        let new = NewBot::new("w1", format!("Bot {}", id), "Addr", BotStrategy::DexArbitrage);
        ArbitrageBot {
            id: id.to_string(),
            wallet_id: new.wallet_id,
            bot_name: new.bot_name,
            active,
            wallet_address: new.wallet_address,
            strategy: new.strategy,
            min_profit_threshold: new.min_profit_threshold,
            max_risk_score: new.max_risk_score,
            max_trade_size: new.max_trade_size,
            slippage_tolerance: new.slippage_tolerance,
            target_pairs: new.target_pairs,
            dex_allowlist: new.dex_allowlist,
            auto_pause_config: None,
            payment_status: PaymentStatus::Current,
            is_included_bot: included,
            inactive_since: if active { None } else { Some(start_time()) },
            next_payment_due: start_time(),
            created_at: start_time(),
        }
    }

    fn failed(mut bot: ArbitrageBot) -> ArbitrageBot {
        bot.payment_status = PaymentStatus::Failed;
        bot
    }

    fn manager(repo: Arc<dyn Repository>, clock: Arc<ManualClock>) -> BotLifecycleManager {
        BotLifecycleManager::new(repo, clock, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_sweep_pauses_failed_and_deletes_stale() {
        let repo = Arc::new(MemStorage::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        repo.insert_bot(failed(bot("running-failed", true, false))).await.unwrap();
        repo.insert_bot(bot("stale", false, false)).await.unwrap();
        repo.insert_bot(bot("stale-included", false, true)).await.unwrap();
        repo.insert_bot(bot("healthy", true, false)).await.unwrap();

        clock.advance(chrono::Duration::days(30));
        let mgr = manager(repo.clone(), clock.clone());
        let report = mgr.run_now().await.unwrap().unwrap();

        assert_eq!(
            report,
            SweepReport {
                scanned: 4,
                paused: 1,
                deleted: 1,
                failed: 0
            }
        );
        let paused = repo.get_bot("running-failed").await.unwrap().unwrap();
        assert!(!paused.active);
        assert_eq!(paused.inactive_since, Some(clock.now()));
        assert!(repo.get_bot("stale").await.unwrap().is_none());
        assert!(repo.get_bot("stale-included").await.unwrap().is_some());
        assert!(repo.get_bot("healthy").await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_paused_bot_survives_until_aged() {
        let repo = Arc::new(MemStorage::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        repo.insert_bot(failed(bot("b1", true, false))).await.unwrap();
        let mgr = manager(repo.clone(), clock.clone());

        assert_eq!(mgr.run_now().await.unwrap().unwrap().paused, 1);

        clock.advance(chrono::Duration::days(29));
        let report = mgr.run_now().await.unwrap().unwrap();
        assert_eq!((report.paused, report.deleted), (0, 0));

        clock.advance(chrono::Duration::days(1));
        assert_eq!(mgr.run_now().await.unwrap().unwrap().deleted, 1);
        assert!(repo.get_bot("b1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_item_failure_does_not_abort_sweep() {
        let mut flaky = FlakyRepo::new();
        flaky.poisoned_bot = Some("b1".to_string());
        let repo = Arc::new(flaky);
        repo.insert_bot(failed(bot("b1", true, false))).await.unwrap();
        repo.insert_bot(failed(bot("b2", true, false))).await.unwrap();

        let clock = Arc::new(ManualClock::new(start_time()));
        let mgr = manager(repo.clone(), clock);
        let report = mgr.run_now().await.unwrap().unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.paused, 1);
        assert!(!repo.get_bot("b2").await.unwrap().unwrap().active);
        assert!(repo.get_bot("b1").await.unwrap().unwrap().active);
        assert!(!mgr.is_sweeping());
    }

    #[tokio::test]
    async fn test_events_for_paused_and_deleted() {
        let repo = Arc::new(MemStorage::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        repo.insert_bot(failed(bot("b1", true, false))).await.unwrap();
        let events = EventBus::new(8);
        let mut rx = events.subscribe();
        let mgr = manager(repo.clone(), clock.clone()).with_events(events);

        mgr.run_now().await.unwrap();
        match rx.recv().await.unwrap() {
            ShieldEvent::BotUpdate { change, bot } => {
                assert_eq!(change, BotChange::Paused);
                assert!(!bot.active);
            }
            other => panic!("unexpected event {:?}", other),
        }

        clock.advance(chrono::Duration::days(31));
        mgr.run_now().await.unwrap();
        match rx.recv().await.unwrap() {
            ShieldEvent::BotUpdate { change, bot } => {
                assert_eq!(change, BotChange::Deleted);
                assert_eq!(bot.id, "b1");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_sweep_is_skipped() {
        let mut flaky = FlakyRepo::new();
        flaky.stall = Some(Duration::from_secs(10));
        let repo = Arc::new(flaky);
        let clock = Arc::new(ManualClock::new(start_time()));
        let mgr = Arc::new(manager(repo, clock));

        let first = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move { mgr.run_now().await })
        };
        tokio::task::yield_now().await;
        assert!(mgr.is_sweeping());
        assert!(mgr.run_now().await.unwrap().is_none());

        assert!(first.await.unwrap().unwrap().is_some());
        assert!(!mgr.is_sweeping());
        assert!(mgr.run_now().await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_on_start_and_on_interval() {
        let repo = Arc::new(MemStorage::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        repo.insert_bot(failed(bot("b1", true, false))).await.unwrap();

        let mgr = Arc::new(manager(repo.clone(), clock.clone()));
        mgr.start();
        assert!(mgr.is_running());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!repo.get_bot("b1").await.unwrap().unwrap().active);

        clock.advance(chrono::Duration::days(31));
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(repo.get_bot("b1").await.unwrap().is_none());

        mgr.stop();
        tokio::task::yield_now().await;
        assert!(!mgr.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sweep_on_start_when_disabled() {
        let repo = Arc::new(MemStorage::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        repo.insert_bot(failed(bot("b1", true, false))).await.unwrap();

        let mgr = Arc::new(manager(repo.clone(), clock).with_run_on_start(false));
        mgr.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(repo.get_bot("b1").await.unwrap().unwrap().active);
        mgr.stop();
    }
}
