//! Common types used throughout the application
//!
//! Entities follow a root-aggregate layout: a [`Wallet`] owns its
//! [`Transaction`]s, [`ArbitrageBot`]s and [`NftPass`]es, which point back at it
//! by id only. Mutations go through the typed `*Patch` structs: unset fields
//! are left alone, set fields overwrite, nothing is deep-merged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Subscription level gating feature access
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Basic,
    Pro,
    ProPlus,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::ProPlus => "pro_plus",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Tier::Basic),
            "pro" => Ok(Tier::Pro),
            "pro_plus" => Ok(Tier::ProPlus),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

/// Tier purchased through a paid subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaidTier {
    None,
    Pro,
    ProPlus,
}

impl PaidTier {
    /// The tier this subscription grants, if any
    pub fn as_tier(&self) -> Option<Tier> {
        match self {
            PaidTier::None => None,
            PaidTier::Pro => Some(Tier::Pro),
            PaidTier::ProPlus => Some(Tier::ProPlus),
        }
    }
}

/// Status of the paid subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    None,
    Current,
    Failed,
    Canceled,
}

/// Status of the monthly base fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseFeeStatus {
    None,
    Current,
    Failed,
    Waived,
}

/// Currency the wallet prefers to settle fees in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentCurrency {
    Sol,
    Cath,
}

/// Local/final classification verdict, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClassification {
    Allow,
    Warn,
    Block,
}

impl fmt::Display for TokenClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenClassification::Allow => "allow",
            TokenClassification::Warn => "warn",
            TokenClassification::Block => "block",
        };
        f.write_str(s)
    }
}

/// Threat severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Safe,
    Suspicious,
    Danger,
    Blocked,
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThreatLevel::Safe => "safe",
            ThreatLevel::Suspicious => "suspicious",
            ThreatLevel::Danger => "danger",
            ThreatLevel::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// Verdict reported by the external risk analysis supplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deep3Verdict {
    Safe,
    Suspicious,
    Malicious,
}

/// Monthly payment state of an arbitrage bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Current,
    Failed,
    Waived,
}

/// What an NFT pass grants while valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenefitType {
    FeeWaiver,
    TierUpgrade,
    FreeBotSlot,
}

/// Arbitrage bot strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStrategy {
    DexArbitrage,
    LiquidityProvision,
    MarketMaking,
}

/// Token metadata as seen on an incoming transfer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

impl TokenInfo {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }
}

// ============================================================================
// Wallet
// ============================================================================

/// Wallet record, the root aggregate
///
/// `tier` is a cached projection of the last tier resolution. It is never an
/// input to resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub address: String,
    pub tier: Tier,
    pub nickname: Option<String>,
    pub solana_name: Option<String>,
    pub connected_at: DateTime<Utc>,

    /// Cached CATH token balance
    pub cath_balance: f64,
    /// Cached CATH holdings value in SOL
    pub cath_value_in_sol: f64,

    pub paid_tier: PaidTier,
    pub paid_tier_status: SubscriptionStatus,
    pub paid_tier_next_due: Option<DateTime<Utc>>,

    pub base_fee_status: BaseFeeStatus,
    pub base_fee_waived_reason: Option<String>,
    pub base_fee_next_due: Option<DateTime<Utc>>,

    pub app_purchased: bool,
    pub payment_currency: PaymentCurrency,
}

impl Wallet {
    /// Apply a partial update in place
    pub fn apply(&mut self, patch: &WalletPatch) {
        if let Some(tier) = patch.tier {
            self.tier = tier;
        }
        if let Some(nickname) = &patch.nickname {
            self.nickname = nickname.clone();
        }
        if let Some(balance) = patch.cath_balance {
            self.cath_balance = balance;
        }
        if let Some(value) = patch.cath_value_in_sol {
            self.cath_value_in_sol = value;
        }
        if let Some(paid_tier) = patch.paid_tier {
            self.paid_tier = paid_tier;
        }
        if let Some(status) = patch.paid_tier_status {
            self.paid_tier_status = status;
        }
        if let Some(due) = patch.paid_tier_next_due {
            self.paid_tier_next_due = due;
        }
        if let Some(status) = patch.base_fee_status {
            self.base_fee_status = status;
        }
        if let Some(reason) = &patch.base_fee_waived_reason {
            self.base_fee_waived_reason = reason.clone();
        }
        if let Some(due) = patch.base_fee_next_due {
            self.base_fee_next_due = due;
        }
        if let Some(purchased) = patch.app_purchased {
            self.app_purchased = purchased;
        }
        if let Some(currency) = patch.payment_currency {
            self.payment_currency = currency;
        }
    }
}

/// Insert payload for a wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWallet {
    pub address: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub solana_name: Option<String>,
    #[serde(default)]
    pub cath_balance: f64,
    #[serde(default = "default_payment_currency")]
    pub payment_currency: PaymentCurrency,
}

fn default_payment_currency() -> PaymentCurrency {
    PaymentCurrency::Sol
}

impl NewWallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            nickname: None,
            solana_name: None,
            cath_balance: 0.0,
            payment_currency: default_payment_currency(),
        }
    }

    pub fn with_cath_balance(mut self, balance: f64) -> Self {
        self.cath_balance = balance;
        self
    }

    /// Materialise the record with a fresh id
    pub fn into_wallet(self, now: DateTime<Utc>) -> Wallet {
        Wallet {
            id: Uuid::new_v4().to_string(),
            address: self.address,
            tier: Tier::Basic,
            nickname: self.nickname,
            solana_name: self.solana_name,
            connected_at: now,
            cath_balance: self.cath_balance,
            cath_value_in_sol: 0.0,
            paid_tier: PaidTier::None,
            paid_tier_status: SubscriptionStatus::None,
            paid_tier_next_due: None,
            base_fee_status: BaseFeeStatus::None,
            base_fee_waived_reason: None,
            base_fee_next_due: None,
            app_purchased: false,
            payment_currency: self.payment_currency,
        }
    }
}

/// Partial wallet update; `Some(None)` clears a nullable field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletPatch {
    pub tier: Option<Tier>,
    pub nickname: Option<Option<String>>,
    pub cath_balance: Option<f64>,
    pub cath_value_in_sol: Option<f64>,
    pub paid_tier: Option<PaidTier>,
    pub paid_tier_status: Option<SubscriptionStatus>,
    pub paid_tier_next_due: Option<Option<DateTime<Utc>>>,
    pub base_fee_status: Option<BaseFeeStatus>,
    pub base_fee_waived_reason: Option<Option<String>>,
    pub base_fee_next_due: Option<Option<DateTime<Utc>>>,
    pub app_purchased: Option<bool>,
    pub payment_currency: Option<PaymentCurrency>,
}

impl WalletPatch {
    pub fn is_empty(&self) -> bool {
        *self == WalletPatch::default()
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// Classified incoming token transfer; immutable once stored
///
/// `blocked` always equals `final_classification == Block`, and the final
/// verdict is never less severe than the local one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub wallet_id: String,
    pub signature: String,
    pub token_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub amount: String,
    pub timestamp: DateTime<Utc>,

    pub local_classification: TokenClassification,
    pub local_threat_level: ThreatLevel,
    pub local_reason: String,

    pub deep3_classification: Option<Deep3Verdict>,
    pub deep3_threat_score: Option<u8>,
    pub deep3_reason: Option<String>,
    /// JSON-encoded supplier metadata
    pub deep3_metadata: Option<String>,

    pub final_classification: TokenClassification,
    pub final_threat_level: ThreatLevel,
    pub blocked: bool,
}

// ============================================================================
// Arbitrage bots
// ============================================================================

/// Auto-pause guard rails attached to a bot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoPauseConfig {
    pub enabled: bool,
    pub volatility_threshold: f64,
    pub max_daily_loss: f64,
    pub max_consecutive_losses: u32,
}

impl Default for AutoPauseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volatility_threshold: 20.0,
            max_daily_loss: 5.0,
            max_consecutive_losses: 5,
        }
    }
}

/// Arbitrage bot owned by exactly one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageBot {
    pub id: String,
    pub wallet_id: String,
    pub bot_name: String,
    pub active: bool,
    pub wallet_address: String,
    pub strategy: BotStrategy,
    pub min_profit_threshold: f64,
    pub max_risk_score: u8,
    pub max_trade_size: f64,
    pub slippage_tolerance: f64,
    pub target_pairs: Vec<String>,
    pub dex_allowlist: Vec<String>,
    pub auto_pause_config: Option<AutoPauseConfig>,

    pub payment_status: PaymentStatus,
    /// One of the first N bots of the wallet, exempt from monthly fees
    pub is_included_bot: bool,
    /// Set while inactive, cleared on activation
    pub inactive_since: Option<DateTime<Utc>>,
    pub next_payment_due: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ArbitrageBot {
    /// Apply a partial update in place
    pub fn apply(&mut self, patch: &BotPatch) {
        if let Some(name) = &patch.bot_name {
            self.bot_name = name.clone();
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(v) = patch.min_profit_threshold {
            self.min_profit_threshold = v;
        }
        if let Some(v) = patch.max_risk_score {
            self.max_risk_score = v;
        }
        if let Some(v) = patch.max_trade_size {
            self.max_trade_size = v;
        }
        if let Some(v) = patch.slippage_tolerance {
            self.slippage_tolerance = v;
        }
        if let Some(pairs) = &patch.target_pairs {
            self.target_pairs = pairs.clone();
        }
        if let Some(dexes) = &patch.dex_allowlist {
            self.dex_allowlist = dexes.clone();
        }
        if let Some(cfg) = &patch.auto_pause_config {
            self.auto_pause_config = cfg.clone();
        }
        if let Some(status) = patch.payment_status {
            self.payment_status = status;
        }
        if let Some(included) = patch.is_included_bot {
            self.is_included_bot = included;
        }
        if let Some(since) = patch.inactive_since {
            self.inactive_since = since;
        }
        if let Some(due) = patch.next_payment_due {
            self.next_payment_due = due;
        }
    }
}

/// Insert payload for a bot; lifecycle fields are decided by the bot service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBot {
    pub wallet_id: String,
    pub bot_name: String,
    pub wallet_address: String,
    pub strategy: BotStrategy,
    pub min_profit_threshold: f64,
    pub max_risk_score: u8,
    pub max_trade_size: f64,
    pub slippage_tolerance: f64,
    pub target_pairs: Vec<String>,
    pub dex_allowlist: Vec<String>,
    pub auto_pause_config: Option<AutoPauseConfig>,
}

impl NewBot {
    pub fn new(
        wallet_id: impl Into<String>,
        bot_name: impl Into<String>,
        wallet_address: impl Into<String>,
        strategy: BotStrategy,
    ) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            bot_name: bot_name.into(),
            wallet_address: wallet_address.into(),
            strategy,
            min_profit_threshold: 0.01,
            max_risk_score: 50,
            max_trade_size: 10.0,
            slippage_tolerance: 0.5,
            target_pairs: vec!["SOL/USDC".to_string(), "SOL/USDT".to_string()],
            dex_allowlist: vec![
                "raydium".to_string(),
                "orca".to_string(),
                "jupiter".to_string(),
            ],
            auto_pause_config: None,
        }
    }
}

/// Partial bot update; `Some(None)` clears a nullable field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotPatch {
    pub bot_name: Option<String>,
    pub active: Option<bool>,
    pub min_profit_threshold: Option<f64>,
    pub max_risk_score: Option<u8>,
    pub max_trade_size: Option<f64>,
    pub slippage_tolerance: Option<f64>,
    pub target_pairs: Option<Vec<String>>,
    pub dex_allowlist: Option<Vec<String>>,
    pub auto_pause_config: Option<Option<AutoPauseConfig>>,
    pub payment_status: Option<PaymentStatus>,
    pub is_included_bot: Option<bool>,
    pub inactive_since: Option<Option<DateTime<Utc>>>,
    pub next_payment_due: Option<DateTime<Utc>>,
}

impl BotPatch {
    pub fn activate(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Default::default()
        }
    }
}

// ============================================================================
// NFT passes
// ============================================================================

/// Entitlement token held by a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftPass {
    pub id: String,
    pub wallet_id: String,
    pub mint_address: String,
    pub pass_name: String,
    pub benefit_type: BenefitType,
    pub is_active: bool,
    /// `None` means permanent
    pub expires_at: Option<DateTime<Utc>>,
    pub tier_upgrade: Option<Tier>,
    pub free_bot_slots: Option<u32>,
    pub acquired_at: DateTime<Utc>,
}

impl NftPass {
    pub fn apply(&mut self, patch: &NftPassPatch) {
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        if let Some(expires) = patch.expires_at {
            self.expires_at = expires;
        }
    }
}

/// Insert payload for an NFT pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNftPass {
    pub wallet_id: String,
    pub mint_address: String,
    pub pass_name: String,
    pub benefit_type: BenefitType,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tier_upgrade: Option<Tier>,
    #[serde(default)]
    pub free_bot_slots: Option<u32>,
}

impl NewNftPass {
    pub fn new(
        wallet_id: impl Into<String>,
        mint_address: impl Into<String>,
        pass_name: impl Into<String>,
        benefit_type: BenefitType,
    ) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            mint_address: mint_address.into(),
            pass_name: pass_name.into(),
            benefit_type,
            expires_at: None,
            tier_upgrade: None,
            free_bot_slots: None,
        }
    }

    pub fn tier_upgrade(mut self, tier: Tier) -> Self {
        self.tier_upgrade = Some(tier);
        self
    }

    pub fn free_slots(mut self, slots: u32) -> Self {
        self.free_bot_slots = Some(slots);
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn into_pass(self, now: DateTime<Utc>) -> NftPass {
        NftPass {
            id: Uuid::new_v4().to_string(),
            wallet_id: self.wallet_id,
            mint_address: self.mint_address,
            pass_name: self.pass_name,
            benefit_type: self.benefit_type,
            is_active: true,
            expires_at: self.expires_at,
            tier_upgrade: self.tier_upgrade,
            free_bot_slots: self.free_bot_slots,
            acquired_at: now,
        }
    }
}

/// Partial pass update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NftPassPatch {
    pub is_active: Option<bool>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}
