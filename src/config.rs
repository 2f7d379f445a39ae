//! Configuration module for the shield engine
//!
//! Loaded from a TOML file, with `.env` and `CATH_SHIELD_*` environment
//! variable overrides applied on top. Every section has working defaults.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Tier thresholds
    #[serde(default)]
    pub tiers: TierConfig,

    /// Bot and trade fees
    #[serde(default)]
    pub fees: FeeConfig,

    /// USD list prices
    #[serde(default)]
    pub prices: PricingConfig,

    /// External suppliers (risk analysis, prices)
    #[serde(default)]
    pub suppliers: SupplierConfig,

    /// Bot lifecycle sweep
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Repository backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// CATH tokens needed for Pro
    #[serde(default = "default_pro_threshold")]
    pub pro_threshold_tokens: f64,

    /// CATH tokens needed for Pro+
    #[serde(default = "default_pro_plus_threshold")]
    pub pro_plus_threshold_tokens: f64,

    /// CATH holdings value (SOL) that waives the base fee
    #[serde(default = "default_base_fee_waiver")]
    pub base_fee_waiver_sol: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// SOL per additional active bot per month
    #[serde(default = "default_monthly_bot_fee")]
    pub monthly_bot_fee_sol: f64,

    /// Taker fee fraction
    #[serde(default = "default_transaction_fee")]
    pub transaction_fee_percent: f64,

    /// Bots per wallet exempt from the monthly fee
    #[serde(default = "default_included_bots")]
    pub included_bots: usize,

    /// Hard cap on bots per wallet
    #[serde(default = "default_max_bots")]
    pub max_bots_per_wallet: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_base_price_usd")]
    pub app_purchase_usd: f64,
    #[serde(default = "default_base_price_usd")]
    pub base_fee_usd: f64,
    #[serde(default = "default_pro_price_usd")]
    pub pro_tier_usd: f64,
    #[serde(default = "default_pro_plus_price_usd")]
    pub pro_plus_tier_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierConfig {
    /// Simulated analysis latency lower bound
    #[serde(default = "default_latency_min")]
    pub analysis_latency_min_ms: u64,

    /// Simulated analysis latency upper bound
    #[serde(default = "default_latency_max")]
    pub analysis_latency_max_ms: u64,

    /// Give up on the risk supplier after this long (0 = wait forever)
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_ms: u64,

    /// How long a fetched price stays fresh
    #[serde(default = "default_price_ttl")]
    pub price_cache_ttl_secs: u64,

    /// Mock CATH price in SOL
    #[serde(default = "default_cath_price")]
    pub cath_price_in_sol: f64,

    /// Mock SOL price in USD
    #[serde(default = "default_sol_price")]
    pub sol_price_in_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// Run a sweep immediately on start
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Sled database directory
    #[serde(default = "default_sled_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics endpoint
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Event bus capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

// Default value functions
fn default_pro_threshold() -> f64 { 50.0 }
fn default_pro_plus_threshold() -> f64 { 100.0 }
fn default_base_fee_waiver() -> f64 { 0.1 }
fn default_monthly_bot_fee() -> f64 { 0.0009 }
fn default_transaction_fee() -> f64 { 0.005 }
fn default_included_bots() -> usize { 2 }
fn default_max_bots() -> usize { 5 }
fn default_base_price_usd() -> f64 { 0.99 }
fn default_pro_price_usd() -> f64 { 9.99 }
fn default_pro_plus_price_usd() -> f64 { 29.99 }
fn default_latency_min() -> u64 { 800 }
fn default_latency_max() -> u64 { 1200 }
fn default_analysis_timeout() -> u64 { 5_000 }
fn default_price_ttl() -> u64 { 60 }
fn default_cath_price() -> f64 { 0.005 }
fn default_sol_price() -> f64 { 100.0 }
fn default_sweep_interval() -> u64 { 3600 }
fn default_backend() -> StorageBackend { StorageBackend::Memory }
fn default_sled_path() -> String { "data/cath-shield.sled".to_string() }
fn default_metrics_port() -> u16 { 9090 }
fn default_event_capacity() -> usize { 1024 }
fn default_true() -> bool { true }

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            pro_threshold_tokens: default_pro_threshold(),
            pro_plus_threshold_tokens: default_pro_plus_threshold(),
            base_fee_waiver_sol: default_base_fee_waiver(),
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            monthly_bot_fee_sol: default_monthly_bot_fee(),
            transaction_fee_percent: default_transaction_fee(),
            included_bots: default_included_bots(),
            max_bots_per_wallet: default_max_bots(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            app_purchase_usd: default_base_price_usd(),
            base_fee_usd: default_base_price_usd(),
            pro_tier_usd: default_pro_price_usd(),
            pro_plus_tier_usd: default_pro_plus_price_usd(),
        }
    }
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            analysis_latency_min_ms: default_latency_min(),
            analysis_latency_max_ms: default_latency_max(),
            analysis_timeout_ms: default_analysis_timeout(),
            price_cache_ttl_secs: default_price_ttl(),
            cath_price_in_sol: default_cath_price(),
            sol_price_in_usd: default_sol_price(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            run_on_start: default_true(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_sled_path(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            metrics_port: default_metrics_port(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CATH_SHIELD_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CATH_SHIELD_MAX_BOTS") {
            self.fees.max_bots_per_wallet = v.parse().context("CATH_SHIELD_MAX_BOTS")?;
        }
        if let Some(v) = lookup("CATH_SHIELD_INCLUDED_BOTS") {
            self.fees.included_bots = v.parse().context("CATH_SHIELD_INCLUDED_BOTS")?;
        }
        if let Some(v) = lookup("CATH_SHIELD_SWEEP_INTERVAL_SECS") {
            self.lifecycle.interval_secs = v.parse().context("CATH_SHIELD_SWEEP_INTERVAL_SECS")?;
        }
        if let Some(v) = lookup("CATH_SHIELD_ANALYSIS_TIMEOUT_MS") {
            self.suppliers.analysis_timeout_ms =
                v.parse().context("CATH_SHIELD_ANALYSIS_TIMEOUT_MS")?;
        }
        if let Some(v) = lookup("CATH_SHIELD_STORAGE_PATH") {
            self.storage.path = v;
        }
        if let Some(v) = lookup("CATH_SHIELD_METRICS_PORT") {
            self.monitoring.metrics_port = v.parse().context("CATH_SHIELD_METRICS_PORT")?;
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tiers.pro_threshold_tokens > self.tiers.pro_plus_threshold_tokens {
            bail!(
                "pro threshold ({}) must not exceed pro_plus threshold ({})",
                self.tiers.pro_threshold_tokens,
                self.tiers.pro_plus_threshold_tokens
            );
        }
        if self.fees.included_bots > self.fees.max_bots_per_wallet {
            bail!(
                "included_bots ({}) must not exceed max_bots_per_wallet ({})",
                self.fees.included_bots,
                self.fees.max_bots_per_wallet
            );
        }
        if !(0.0..1.0).contains(&self.fees.transaction_fee_percent) {
            bail!("transaction_fee_percent must be in [0, 1)");
        }
        if self.suppliers.analysis_latency_min_ms > self.suppliers.analysis_latency_max_ms {
            bail!("analysis latency min must not exceed max");
        }
        if self.suppliers.cath_price_in_sol <= 0.0 || self.suppliers.sol_price_in_usd <= 0.0 {
            bail!("mock prices must be positive");
        }
        if self.lifecycle.interval_secs == 0 {
            bail!("lifecycle interval must be at least one second");
        }
        Ok(())
    }
}
