//! Arbitrage bot management for Pro+ wallets

use crate::bot_templates::{validate_bot, validate_new_bot};
use crate::clock::Clock;
use crate::components::event_bus::{BotChange, EventBus, ShieldEvent};
use crate::errors::{Result, ShieldError};
use crate::metrics::metrics;
use crate::payment::{free_bot_slots, is_pass_valid, next_payment_due, FeeSchedule, PaymentSummary};
use crate::services::tiers::TierService;
use crate::storage::Repository;
use crate::types::{ArbitrageBot, BotPatch, NewBot, NftPass, PaymentStatus, Tier};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct BotService {
    repo: Arc<dyn Repository>,
    tiers: Arc<TierService>,
    clock: Arc<dyn Clock>,
    fees: FeeSchedule,
    max_bots_per_wallet: usize,
    events: EventBus,
}

impl BotService {
    pub fn new(
        repo: Arc<dyn Repository>,
        tiers: Arc<TierService>,
        clock: Arc<dyn Clock>,
        fees: FeeSchedule,
        max_bots_per_wallet: usize,
        events: EventBus,
    ) -> Self {
        Self {
            repo,
            tiers,
            clock,
            fees,
            max_bots_per_wallet,
            events,
        }
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Create a bot for a Pro+ wallet
    ///
    /// The first `included_bots` bots of a wallet, plus one per free slot from
    /// valid passes held at creation, are marked included. New bots
    /// always start paused with payment current and due on the first of next
    /// month.
    pub async fn create_bot(&self, new: NewBot) -> Result<ArbitrageBot> {
        validate_new_bot(&new)?;

        let wallet = self
            .repo
            .get_wallet(&new.wallet_id)
            .await?
            .ok_or_else(|| ShieldError::not_found("wallet", new.wallet_id.clone()))?;

        let resolution = self.tiers.resolve_wallet(&wallet).await?;
        if !self.tiers.features(&resolution).arbitrage_bots {
            return Err(ShieldError::TierRequired {
                required: Tier::ProPlus,
                actual: resolution.tier,
            });
        }

        let existing = self.repo.bots_by_wallet(&wallet.id).await?;
        if existing.len() >= self.max_bots_per_wallet {
            return Err(ShieldError::BotLimitReached {
                limit: self.max_bots_per_wallet,
            });
        }

        let now = self.clock.now();
        let free_slots = free_bot_slots(&self.repo.active_passes(&wallet.id).await?, now);
        let bot = ArbitrageBot {
            id: Uuid::new_v4().to_string(),
            wallet_id: wallet.id.clone(),
            bot_name: new.bot_name,
            active: false,
            wallet_address: new.wallet_address,
            strategy: new.strategy,
            min_profit_threshold: new.min_profit_threshold,
            max_risk_score: new.max_risk_score,
            max_trade_size: new.max_trade_size,
            slippage_tolerance: new.slippage_tolerance,
            target_pairs: new.target_pairs,
            dex_allowlist: new.dex_allowlist,
            auto_pause_config: new.auto_pause_config,
            payment_status: PaymentStatus::Current,
            is_included_bot: self.fees.is_included_slot(existing.len(), free_slots),
            inactive_since: Some(now),
            next_payment_due: next_payment_due(now),
            created_at: now,
        };

        let bot = self.repo.insert_bot(bot).await?;
        metrics().bots_created.inc();
        info!(
            bot_id = %bot.id,
            wallet = %wallet.address,
            included = bot.is_included_bot,
            "🤖 Arbitrage bot created"
        );
        self.events.publish(ShieldEvent::BotUpdate {
            change: BotChange::Created,
            bot: bot.clone(),
        });
        Ok(bot)
    }

    /// Apply a typed patch; `None` for an unknown bot
    ///
    /// Toggling `active` stamps or clears `inactive_since` unless the patch
    /// sets it explicitly.
    pub async fn update_bot(&self, id: &str, patch: BotPatch) -> Result<Option<ArbitrageBot>> {
        let Some(current) = self.repo.get_bot(id).await? else {
            return Ok(None);
        };

        let mut patch = patch;
        if patch.inactive_since.is_none() {
            match patch.active {
                Some(true) if !current.active => patch.inactive_since = Some(None),
                Some(false) if current.active => {
                    patch.inactive_since = Some(Some(self.clock.now()))
                }
                _ => {}
            }
        }

        let mut candidate = current.clone();
        candidate.apply(&patch);
        validate_bot(&candidate)?;

        let Some(updated) = self.repo.update_bot(id, &patch).await? else {
            return Ok(None);
        };
        self.events.publish(ShieldEvent::BotUpdate {
            change: BotChange::Updated,
            bot: updated.clone(),
        });
        Ok(Some(updated))
    }

    pub async fn set_active(&self, id: &str, active: bool) -> Result<Option<ArbitrageBot>> {
        self.update_bot(id, BotPatch::activate(active)).await
    }

    pub async fn delete_bot(&self, id: &str) -> Result<bool> {
        let Some(bot) = self.repo.get_bot(id).await? else {
            return Ok(false);
        };
        let deleted = self.repo.delete_bot(id).await?;
        if deleted {
            info!(bot_id = %id, "Arbitrage bot deleted");
            self.events.publish(ShieldEvent::BotUpdate {
                change: BotChange::Deleted,
                bot,
            });
        }
        Ok(deleted)
    }

    /// Bots visible to a wallet: `None` if unknown, empty unless Pro+
    pub async fn bots_for_wallet(&self, wallet_id: &str) -> Result<Option<Vec<ArbitrageBot>>> {
        let Some(wallet) = self.repo.get_wallet(wallet_id).await? else {
            return Ok(None);
        };
        let resolution = self.tiers.resolve_wallet(&wallet).await?;
        if !self.tiers.features(&resolution).arbitrage_bots {
            return Ok(Some(Vec::new()));
        }
        Ok(Some(self.repo.bots_by_wallet(&wallet.id).await?))
    }

    /// Mark the monthly payment as failed; the next sweep pauses the bot
    pub async fn record_payment_failure(&self, id: &str) -> Result<Option<ArbitrageBot>> {
        let patch = BotPatch {
            payment_status: Some(PaymentStatus::Failed),
            ..Default::default()
        };
        Ok(self.repo.update_bot(id, &patch).await?)
    }

    /// Mark the monthly payment as settled and roll the due date forward
    pub async fn record_payment(&self, id: &str) -> Result<Option<ArbitrageBot>> {
        let patch = BotPatch {
            payment_status: Some(PaymentStatus::Current),
            next_payment_due: Some(next_payment_due(self.clock.now())),
            ..Default::default()
        };
        Ok(self.repo.update_bot(id, &patch).await?)
    }

    async fn valid_passes(&self, wallet_id: &str) -> Result<Vec<NftPass>> {
        let now = self.clock.now();
        Ok(self
            .repo
            .active_passes(wallet_id)
            .await?
            .into_iter()
            .filter(|p| is_pass_valid(p, now))
            .collect())
    }

    pub async fn payment_summary(&self, wallet_id: &str) -> Result<Option<PaymentSummary>> {
        if self.repo.get_wallet(wallet_id).await?.is_none() {
            return Ok(None);
        }
        let bots = self.repo.bots_by_wallet(wallet_id).await?;
        let passes = self.valid_passes(wallet_id).await?;
        Ok(Some(self.fees.payment_summary(&bots, &passes, self.clock.now())))
    }

    /// Taker fee a wallet pays on a trade of `amount` SOL
    pub async fn transaction_fee(&self, wallet_id: &str, amount: f64) -> Result<Option<f64>> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ShieldError::validation("trade amount must be a non-negative number"));
        }
        if self.repo.get_wallet(wallet_id).await?.is_none() {
            return Ok(None);
        }
        let passes = self.valid_passes(wallet_id).await?;
        Ok(Some(self.fees.transaction_fee(amount, &passes, self.clock.now())))
    }
}
