//! Tier resolution
//!
//! Four signal sources are checked in strict priority order, first satisfied
//! wins: CATH holdings, NFT tier-upgrade passes, paid subscription, default.
//! The result is authoritative; the wallet's cached `tier` is refreshed from
//! it and never read back as an input.

use crate::config::TierConfig;
use crate::errors::{Result, ShieldError};
use crate::payment::is_pass_valid;
use crate::types::{BenefitType, NftPass, SubscriptionStatus, Tier, Wallet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which signal decided the tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierSource {
    CathHoldings,
    NftPass,
    Subscription,
    Default,
}

/// Resolved tier plus diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierResolution {
    pub tier: Tier,
    pub source: TierSource,
    pub cath_balance: f64,
    pub cath_value_in_sol: f64,
    pub meets_pro_threshold: bool,
    pub meets_pro_plus_threshold: bool,
    /// Informational, independent of which branch won
    pub has_paid_subscription: bool,
}

/// Holding thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    /// CATH tokens required for Pro
    pub pro_tokens: f64,
    /// CATH tokens required for Pro+
    pub pro_plus_tokens: f64,
    /// Holdings value in SOL that waives the base fee
    pub base_fee_waiver_sol: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            pro_tokens: 50.0,
            pro_plus_tokens: 100.0,
            base_fee_waiver_sol: 0.1,
        }
    }
}

impl From<&TierConfig> for TierThresholds {
    fn from(cfg: &TierConfig) -> Self {
        Self {
            pro_tokens: cfg.pro_threshold_tokens,
            pro_plus_tokens: cfg.pro_plus_threshold_tokens,
            base_fee_waiver_sol: cfg.base_fee_waiver_sol,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TierResolver {
    thresholds: TierThresholds,
}

impl TierResolver {
    pub fn new(thresholds: TierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }

    /// Resolve the effective tier for `wallet`
    ///
    /// `passes` may contain inactive or expired passes; only valid
    /// tier-upgrade passes count. Fails on negative or non-finite numbers.
    pub fn resolve(
        &self,
        wallet: &Wallet,
        cath_balance: f64,
        cath_price_in_sol: f64,
        passes: &[NftPass],
        now: DateTime<Utc>,
    ) -> Result<TierResolution> {
        validate_amount("CATH balance", cath_balance)?;
        validate_amount("CATH price", cath_price_in_sol)?;

        let cath_value_in_sol = cath_balance * cath_price_in_sol;
        let meets_pro_plus_threshold = cath_balance >= self.thresholds.pro_plus_tokens;
        let meets_pro_threshold = cath_balance >= self.thresholds.pro_tokens;
        let paid_tier = match wallet.paid_tier_status {
            SubscriptionStatus::Current => wallet.paid_tier.as_tier(),
            _ => None,
        };
        let has_paid_subscription = paid_tier.is_some();

        let resolved = |tier, source| TierResolution {
            tier,
            source,
            cath_balance,
            cath_value_in_sol,
            meets_pro_threshold,
            meets_pro_plus_threshold,
            has_paid_subscription,
        };

        if meets_pro_plus_threshold {
            return Ok(resolved(Tier::ProPlus, TierSource::CathHoldings));
        }
        if meets_pro_threshold {
            return Ok(resolved(Tier::Pro, TierSource::CathHoldings));
        }

        if let Some(tier) = best_pass_upgrade(passes, now) {
            return Ok(resolved(tier, TierSource::NftPass));
        }

        if let Some(tier) = paid_tier {
            return Ok(resolved(tier, TierSource::Subscription));
        }

        Ok(resolved(Tier::Basic, TierSource::Default))
    }

    /// Holdings worth at least the waiver threshold waive the base fee
    ///
    /// Independent of the tier priority chain.
    pub fn is_base_fee_waived(&self, cath_balance: f64, cath_price_in_sol: f64) -> bool {
        cath_balance * cath_price_in_sol >= self.thresholds.base_fee_waiver_sol
    }
}

/// Highest Pro/Pro+ target among valid tier-upgrade passes
fn best_pass_upgrade(passes: &[NftPass], now: DateTime<Utc>) -> Option<Tier> {
    passes
        .iter()
        .filter(|p| p.benefit_type == BenefitType::TierUpgrade && is_pass_valid(p, now))
        .filter_map(|p| p.tier_upgrade)
        .filter(|t| matches!(t, Tier::Pro | Tier::ProPlus))
        .max()
}

fn validate_amount(what: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ShieldError::validation(format!(
            "{} must be a non-negative number, got {}",
            what, value
        )));
    }
    Ok(())
}

/// Feature flags unlocked by a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierFeatures {
    pub local_classifier: bool,
    pub deep3_integration: bool,
    pub arbitrage_bots: bool,
    pub max_bots_allowed: usize,
    pub realtime_monitoring: bool,
    pub historical_data: bool,
    pub custom_rules: bool,
}

impl TierFeatures {
    /// Feature table for `tier`; `bot_limit` is the configured per-wallet cap
    pub fn for_tier(tier: Tier, bot_limit: usize) -> Self {
        match tier {
            Tier::Basic => Self {
                local_classifier: true,
                deep3_integration: false,
                arbitrage_bots: false,
                max_bots_allowed: 0,
                realtime_monitoring: true,
                historical_data: false,
                custom_rules: false,
            },
            Tier::Pro => Self {
                local_classifier: true,
                deep3_integration: true,
                arbitrage_bots: false,
                max_bots_allowed: 0,
                realtime_monitoring: true,
                historical_data: true,
                custom_rules: true,
            },
            Tier::ProPlus => Self {
                local_classifier: true,
                deep3_integration: true,
                arbitrage_bots: true,
                max_bots_allowed: bot_limit,
                realtime_monitoring: true,
                historical_data: true,
                custom_rules: true,
            },
        }
    }
}
