//! Tier service: feeds the resolver with fresh state and refreshes the
//! wallet's cached projection.

use crate::clock::Clock;
use crate::components::event_bus::{EventBus, ShieldEvent, TierChange};
use crate::components::price_feed::PriceFeed;
use crate::errors::Result;
use crate::metrics::metrics;
use crate::storage::Repository;
use crate::structured_logging::OperationContext;
use crate::tier::{TierFeatures, TierResolution, TierResolver};
use crate::types::{BaseFeeStatus, Wallet, WalletPatch};
use std::sync::Arc;

const BASE_FEE_WAIVED_REASON: &str = "CATH holdings cover the base fee";

pub struct TierService {
    repo: Arc<dyn Repository>,
    prices: Arc<PriceFeed>,
    clock: Arc<dyn Clock>,
    resolver: TierResolver,
    events: EventBus,
    bot_limit: usize,
}

/// Resolution plus the CATH price it used, `None` when the feed failed
struct Resolved {
    resolution: TierResolution,
    cath_price: Option<f64>,
}

impl TierService {
    pub fn new(
        repo: Arc<dyn Repository>,
        prices: Arc<PriceFeed>,
        clock: Arc<dyn Clock>,
        resolver: TierResolver,
        events: EventBus,
        bot_limit: usize,
    ) -> Self {
        Self {
            repo,
            prices,
            clock,
            resolver,
            events,
            bot_limit,
        }
    }

    pub fn resolver(&self) -> &TierResolver {
        &self.resolver
    }

    pub fn features(&self, resolution: &TierResolution) -> TierFeatures {
        TierFeatures::for_tier(resolution.tier, self.bot_limit)
    }

    async fn resolve_inner(&self, wallet: &Wallet, ctx: &OperationContext) -> Result<Resolved> {
        let passes = self.repo.active_passes(&wallet.id).await?;

        // Thresholds are token counts, so a missing price only zeroes the
        // holdings value.
        let cath_price = match self.prices.cath_price_in_sol().await {
            Ok(price) => Some(price),
            Err(e) => {
                metrics().supplier_failures.inc();
                ctx.logger
                    .log_supplier_fallback("price_feed", &wallet.address, &e.to_string());
                None
            }
        };

        let resolution = self.resolver.resolve(
            wallet,
            wallet.cath_balance,
            cath_price.unwrap_or(0.0),
            &passes,
            self.clock.now(),
        )?;
        metrics().tier_resolutions.inc();

        Ok(Resolved {
            resolution,
            cath_price,
        })
    }

    /// Authoritative tier for an already loaded wallet; read-only
    pub async fn resolve_wallet(&self, wallet: &Wallet) -> Result<TierResolution> {
        let ctx = OperationContext::new("resolve_tier");
        Ok(self.resolve_inner(wallet, &ctx).await?.resolution)
    }

    /// Authoritative tier by wallet id; `None` for an unknown wallet
    pub async fn resolve(&self, wallet_id: &str) -> Result<Option<TierResolution>> {
        let Some(wallet) = self.repo.get_wallet(wallet_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.resolve_wallet(&wallet).await?))
    }

    /// Resolve and write the cached tier, holdings value and base-fee state back
    ///
    /// Emits `tier_update` when the cached tier changes. Base-fee state is left
    /// alone when no price was available.
    pub async fn refresh_tier(&self, wallet_id: &str) -> Result<Option<TierResolution>> {
        let Some(wallet) = self.repo.get_wallet(wallet_id).await? else {
            return Ok(None);
        };
        let ctx = OperationContext::new("refresh_tier");
        let Resolved {
            resolution,
            cath_price,
        } = self.resolve_inner(&wallet, &ctx).await?;

        let mut patch = WalletPatch {
            tier: Some(resolution.tier),
            cath_balance: Some(resolution.cath_balance),
            cath_value_in_sol: Some(resolution.cath_value_in_sol),
            ..Default::default()
        };

        if let Some(price) = cath_price {
            if self.resolver.is_base_fee_waived(resolution.cath_balance, price) {
                patch.base_fee_status = Some(BaseFeeStatus::Waived);
                patch.base_fee_waived_reason = Some(Some(BASE_FEE_WAIVED_REASON.to_string()));
                patch.base_fee_next_due = Some(None);
            } else if wallet.base_fee_status == BaseFeeStatus::Waived {
                patch.base_fee_status = Some(BaseFeeStatus::None);
                patch.base_fee_waived_reason = Some(None);
            }
        }

        let Some(updated) = self.repo.update_wallet(&wallet.id, &patch).await? else {
            // Deleted between read and write
            return Ok(None);
        };

        ctx.logger
            .log_tier_resolved(&updated.address, wallet.tier, &resolution);

        if wallet.tier != resolution.tier {
            metrics().tier_changes.inc();
            self.events.publish(ShieldEvent::TierUpdate(TierChange {
                wallet_id: updated.id.clone(),
                address: updated.address.clone(),
                previous: wallet.tier,
                resolution: resolution.clone(),
            }));
        }

        Ok(Some(resolution))
    }
}
