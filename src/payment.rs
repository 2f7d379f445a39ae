//! Payment and fee utilities for arbitrage bots and NFT passes
//!
//! Everything here is pure apart from the `now` argument. Amounts are in SOL.

use crate::config::FeeConfig;
use crate::types::{ArbitrageBot, BenefitType, NftPass, PaymentStatus};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// SOL per additional active bot per month
pub const MONTHLY_FEE_SOL: f64 = 0.0009;
/// Taker fee applied to bot trades (0.5%)
pub const TRANSACTION_FEE_PERCENT: f64 = 0.005;
/// Bots per wallet exempt from the monthly fee
pub const INCLUDED_BOTS: usize = 2;
/// Non-included bots inactive this long are removed
pub const INACTIVE_DELETION_DAYS: i64 = 30;

/// A pass counts only while active and unexpired; `expires_at == None` is permanent
pub fn is_pass_valid(pass: &NftPass, now: DateTime<Utc>) -> bool {
    if !pass.is_active {
        return false;
    }
    match pass.expires_at {
        None => true,
        Some(expires_at) => expires_at > now,
    }
}

/// Whether any valid pass waives fees
pub fn has_fee_waiver(passes: &[NftPass], now: DateTime<Utc>) -> bool {
    passes
        .iter()
        .any(|p| p.benefit_type == BenefitType::FeeWaiver && is_pass_valid(p, now))
}

/// Extra fee-exempt bot slots granted by valid passes
pub fn free_bot_slots(passes: &[NftPass], now: DateTime<Utc>) -> u32 {
    passes
        .iter()
        .filter(|p| p.benefit_type == BenefitType::FreeBotSlot && is_pass_valid(p, now))
        .map(|p| p.free_bot_slots.unwrap_or(0))
        .sum()
}

/// First day of the month after `from`, at midnight UTC
pub fn next_payment_due(from: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if from.month() == 12 {
        (from.year() + 1, 1)
    } else {
        (from.year(), from.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        // None only past chrono's maximum year
        .unwrap_or(from)
}

/// A bot with a failed payment that is still running must be paused
pub fn should_auto_pause(bot: &ArbitrageBot) -> bool {
    bot.payment_status == PaymentStatus::Failed && bot.active
}

/// A non-included bot inactive for 30 days or more may be deleted
pub fn should_delete(bot: &ArbitrageBot, now: DateTime<Utc>) -> bool {
    if bot.is_included_bot {
        return false;
    }
    match bot.inactive_since {
        None => false,
        Some(since) => now - since >= Duration::days(INACTIVE_DELETION_DAYS),
    }
}

/// Fee parameters, normally taken from configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub monthly_fee_sol: f64,
    pub transaction_fee_percent: f64,
    pub included_bots: usize,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            monthly_fee_sol: MONTHLY_FEE_SOL,
            transaction_fee_percent: TRANSACTION_FEE_PERCENT,
            included_bots: INCLUDED_BOTS,
        }
    }
}

impl From<&FeeConfig> for FeeSchedule {
    fn from(cfg: &FeeConfig) -> Self {
        Self {
            monthly_fee_sol: cfg.monthly_bot_fee_sol,
            transaction_fee_percent: cfg.transaction_fee_percent,
            included_bots: cfg.included_bots,
        }
    }
}

impl FeeSchedule {
    /// Whether the bot created at zero-based `index` is an included bot
    ///
    /// Free-bot-slot passes valid at creation time widen the included range.
    pub fn is_included_slot(&self, index: usize, free_slots: u32) -> bool {
        index < self.included_bots + free_slots as usize
    }

    /// Monthly fee for one bot
    ///
    /// Zero for included bots or when a valid fee-waiver pass exists,
    /// otherwise the flat rate while the bot is active.
    pub fn monthly_fee(&self, bot: &ArbitrageBot, passes: &[NftPass], now: DateTime<Utc>) -> f64 {
        if bot.is_included_bot {
            return 0.0;
        }
        if has_fee_waiver(passes, now) {
            return 0.0;
        }
        if bot.active {
            self.monthly_fee_sol
        } else {
            0.0
        }
    }

    /// Taker fee on a trade of `amount` SOL
    pub fn transaction_fee(&self, amount: f64, passes: &[NftPass], now: DateTime<Utc>) -> f64 {
        if has_fee_waiver(passes, now) {
            return 0.0;
        }
        amount * self.transaction_fee_percent
    }

    pub fn total_monthly_cost(
        &self,
        bots: &[ArbitrageBot],
        passes: &[NftPass],
        now: DateTime<Utc>,
    ) -> f64 {
        bots.iter().map(|bot| self.monthly_fee(bot, passes, now)).sum()
    }

    pub fn payment_summary(
        &self,
        bots: &[ArbitrageBot],
        passes: &[NftPass],
        now: DateTime<Utc>,
    ) -> PaymentSummary {
        let (included, additional): (Vec<&ArbitrageBot>, Vec<&ArbitrageBot>) = bots
            .iter()
            .filter(|b| b.active)
            .partition(|b| b.is_included_bot);

        PaymentSummary {
            total_bots: bots.len(),
            active_bots: included.len() + additional.len(),
            included_bots: included.len(),
            additional_bots: additional.len(),
            monthly_cost_sol: self.total_monthly_cost(bots, passes, now),
            has_fee_waiver: has_fee_waiver(passes, now),
            next_payment_due: next_payment_due(now),
        }
    }
}

/// Payment overview for one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub total_bots: usize,
    pub active_bots: usize,
    pub included_bots: usize,
    pub additional_bots: usize,
    #[serde(rename = "monthlyCostSOL")]
    pub monthly_cost_sol: f64,
    pub has_fee_waiver: bool,
    pub next_payment_due: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BotStrategy, Tier};
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 15, 30, 0).unwrap()
    }

    fn bot(active: bool, included: bool) -> ArbitrageBot {
        let now = at(2024, 3, 1);
        ArbitrageBot {
            id: "bot".to_string(),
            wallet_id: "wallet".to_string(),
            bot_name: "bot".to_string(),
            active,
            wallet_address: "addr".to_string(),
            strategy: BotStrategy::DexArbitrage,
            min_profit_threshold: 0.01,
            max_risk_score: 50,
            max_trade_size: 10.0,
            slippage_tolerance: 0.5,
            target_pairs: vec!["SOL/USDC".to_string()],
            dex_allowlist: vec!["orca".to_string()],
            auto_pause_config: None,
            payment_status: PaymentStatus::Current,
            is_included_bot: included,
            inactive_since: None,
            next_payment_due: next_payment_due(now),
            created_at: now,
        }
    }

    fn pass(benefit: BenefitType, active: bool, expires_at: Option<DateTime<Utc>>) -> NftPass {
        NftPass {
            id: "pass".to_string(),
            wallet_id: "wallet".to_string(),
            mint_address: "mint".to_string(),
            pass_name: "Genesis".to_string(),
            benefit_type: benefit,
            is_active: active,
            expires_at,
            tier_upgrade: Some(Tier::Pro),
            free_bot_slots: Some(1),
            acquired_at: at(2024, 1, 1),
        }
    }

    #[test]
    fn test_pass_validity() {
        let now = at(2024, 6, 1);
        assert!(is_pass_valid(&pass(BenefitType::FeeWaiver, true, None), now));
        assert!(!is_pass_valid(&pass(BenefitType::FeeWaiver, false, None), now));
        assert!(is_pass_valid(&pass(BenefitType::FeeWaiver, true, Some(at(2024, 7, 1))), now));
        assert!(!is_pass_valid(&pass(BenefitType::FeeWaiver, true, Some(now)), now));
    }

    #[test]
    fn test_monthly_fee_included_bot_is_free() {
        let schedule = FeeSchedule::default();
        let now = at(2024, 6, 1);
        assert_eq!(schedule.monthly_fee(&bot(true, true), &[], now), 0.0);
        assert_eq!(schedule.monthly_fee(&bot(false, true), &[], now), 0.0);
    }

    #[test]
    fn test_monthly_fee_active_additional_bot() {
        let schedule = FeeSchedule::default();
        let now = at(2024, 6, 1);
        assert_eq!(schedule.monthly_fee(&bot(true, false), &[], now), MONTHLY_FEE_SOL);
        assert_eq!(schedule.monthly_fee(&bot(false, false), &[], now), 0.0);
    }

    #[test]
    fn test_monthly_fee_waiver_requires_valid_pass() {
        let schedule = FeeSchedule::default();
        let now = at(2024, 6, 1);
        let expired = [pass(BenefitType::FeeWaiver, true, Some(at(2024, 5, 1)))];
        assert_eq!(schedule.monthly_fee(&bot(true, false), &expired, now), MONTHLY_FEE_SOL);

        let valid = [pass(BenefitType::FeeWaiver, true, None)];
        assert_eq!(schedule.monthly_fee(&bot(true, false), &valid, now), 0.0);
    }

    #[test]
    fn test_free_bot_slots_only_widen_included_range() {
        let schedule = FeeSchedule::default();
        let now = at(2024, 6, 1);
        let slots = [pass(BenefitType::FreeBotSlot, true, None)];
        assert_eq!(free_bot_slots(&slots, now), 1);
        let expired = [pass(BenefitType::FreeBotSlot, true, Some(at(2024, 5, 1)))];
        assert_eq!(free_bot_slots(&expired, now), 0);

        assert!(schedule.is_included_slot(1, 0));
        assert!(!schedule.is_included_slot(2, 0));
        assert!(schedule.is_included_slot(2, 1));
        assert!(!schedule.is_included_slot(3, 1));

        // The fee never looks at slot passes, only at the stored flag
        assert_eq!(schedule.monthly_fee(&bot(true, false), &slots, now), MONTHLY_FEE_SOL);
    }

    #[test]
    fn test_transaction_fee() {
        let schedule = FeeSchedule::default();
        let now = at(2024, 6, 1);
        assert!((schedule.transaction_fee(10.0, &[], now) - 0.05).abs() < 1e-12);
        let waiver = [pass(BenefitType::FeeWaiver, true, None)];
        assert_eq!(schedule.transaction_fee(10.0, &waiver, now), 0.0);
        let upgrade_only = [pass(BenefitType::TierUpgrade, true, None)];
        assert!(schedule.transaction_fee(10.0, &upgrade_only, now) > 0.0);
    }

    #[test]
    fn test_next_payment_due() {
        assert_eq!(next_payment_due(at(2024, 3, 15)), Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
        assert_eq!(next_payment_due(at(2024, 12, 31)), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(next_payment_due(at(2024, 1, 31)), Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_should_auto_pause() {
        let mut b = bot(true, false);
        assert!(!should_auto_pause(&b));
        b.payment_status = PaymentStatus::Failed;
        assert!(should_auto_pause(&b));
        b.active = false;
        assert!(!should_auto_pause(&b));
    }

    #[test]
    fn test_should_delete_boundary() {
        let now = at(2024, 6, 30);
        let mut b = bot(false, false);
        assert!(!should_delete(&b, now));

        b.inactive_since = Some(now - Duration::days(30) + Duration::seconds(1));
        assert!(!should_delete(&b, now));

        b.inactive_since = Some(now - Duration::days(30));
        assert!(should_delete(&b, now));

        b.is_included_bot = true;
        assert!(!should_delete(&b, now));
    }

    #[test]
    fn test_payment_summary() {
        let schedule = FeeSchedule::default();
        let now = at(2024, 6, 10);
        let bots = vec![bot(true, true), bot(false, true), bot(true, false), bot(true, false)];
        let summary = schedule.payment_summary(&bots, &[], now);

        assert_eq!(summary.total_bots, 4);
        assert_eq!(summary.active_bots, 3);
        assert_eq!(summary.included_bots, 1);
        assert_eq!(summary.additional_bots, 2);
        assert!((summary.monthly_cost_sol - 2.0 * MONTHLY_FEE_SOL).abs() < 1e-12);
        assert!(!summary.has_fee_waiver);
        assert_eq!(summary.next_payment_due, Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap());
    }
}
