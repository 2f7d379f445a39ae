//! Services that drive the core: they load state from the repository, call
//! the pure classifier/tier/payment functions and persist the outcome.

pub mod bots;
pub mod tiers;
pub mod transactions;
pub mod wallets;

pub use bots::BotService;
pub use tiers::TierService;
pub use transactions::{IncomingTransaction, TransactionPipeline};
pub use wallets::WalletService;

use crate::classifier::TokenClassifier;
use crate::clock::Clock;
use crate::components::deep3::RiskAnalyzer;
use crate::components::event_bus::EventBus;
use crate::components::price_feed::{PriceFeed, PriceQuote, PriceSource};
use crate::config::Config;
use crate::errors::Result;
use crate::lifecycle::BotLifecycleManager;
use crate::payment::FeeSchedule;
use crate::storage::Repository;
use crate::tier::{TierResolver, TierThresholds};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// USD list prices quoted in SOL and CATH
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceList {
    pub app_purchase: PriceQuote,
    pub base_fee: PriceQuote,
    pub pro_tier: PriceQuote,
    pub pro_plus_tier: PriceQuote,
}

/// Fully wired engine
///
/// Every service shares the same repository, clock and event bus.
#[derive(Clone)]
pub struct ShieldEngine {
    pub wallets: Arc<WalletService>,
    pub tiers: Arc<TierService>,
    pub bots: Arc<BotService>,
    pub transactions: Arc<TransactionPipeline>,
    pub prices: Arc<PriceFeed>,
    pub events: EventBus,
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl ShieldEngine {
    pub fn new(
        config: Config,
        repo: Arc<dyn Repository>,
        analyzer: Arc<dyn RiskAnalyzer>,
        price_source: Arc<dyn PriceSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = EventBus::new(config.monitoring.event_capacity);
        let prices = Arc::new(PriceFeed::new(
            price_source,
            clock.clone(),
            chrono::Duration::seconds(config.suppliers.price_cache_ttl_secs as i64),
        ));

        let tiers = Arc::new(TierService::new(
            repo.clone(),
            prices.clone(),
            clock.clone(),
            TierResolver::new(TierThresholds::from(&config.tiers)),
            events.clone(),
            config.fees.max_bots_per_wallet,
        ));

        let wallets = Arc::new(WalletService::new(repo.clone(), clock.clone()));

        let bots = Arc::new(BotService::new(
            repo.clone(),
            tiers.clone(),
            clock.clone(),
            FeeSchedule::from(&config.fees),
            config.fees.max_bots_per_wallet,
            events.clone(),
        ));

        let analysis_timeout = match config.suppliers.analysis_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        let transactions = Arc::new(TransactionPipeline::new(
            repo.clone(),
            TokenClassifier::new(),
            analyzer,
            tiers.clone(),
            clock.clone(),
            events.clone(),
            analysis_timeout,
        ));

        Self {
            wallets,
            tiers,
            bots,
            transactions,
            prices,
            events,
            repo,
            clock,
            config,
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current list prices at the cached exchange rates
    pub async fn price_list(&self) -> Result<PriceList> {
        let prices = &self.config.prices;
        Ok(PriceList {
            app_purchase: self.prices.quote_usd(prices.app_purchase_usd).await?,
            base_fee: self.prices.quote_usd(prices.base_fee_usd).await?,
            pro_tier: self.prices.quote_usd(prices.pro_tier_usd).await?,
            pro_plus_tier: self.prices.quote_usd(prices.pro_plus_tier_usd).await?,
        })
    }

    /// Scheduler sweeping this engine's bots
    pub fn lifecycle_manager(&self) -> Arc<BotLifecycleManager> {
        Arc::new(
            BotLifecycleManager::new(
                self.repo.clone(),
                self.clock.clone(),
                Duration::from_secs(self.config.lifecycle.interval_secs),
            )
            .with_run_on_start(self.config.lifecycle.run_on_start)
            .with_events(self.events.clone()),
        )
    }
}
