//! Bot configuration templates and settings validation

use crate::errors::{Result, ShieldError};
use crate::types::{ArbitrageBot, AutoPauseConfig, BotStrategy, NewBot};
use serde::{Deserialize, Serialize};

/// DEXes a bot may route through
pub const SUPPORTED_DEXES: [&str; 4] = ["raydium", "orca", "jupiter", "phoenix"];

/// Importable bot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotTemplate {
    pub name: String,
    pub strategy: BotStrategy,
    #[serde(default = "default_min_profit")]
    pub min_profit_threshold: f64,
    #[serde(default = "default_max_risk")]
    pub max_risk_score: u8,
    #[serde(default = "default_max_trade_size")]
    pub max_trade_size: f64,
    #[serde(default = "default_slippage")]
    pub slippage_tolerance: f64,
    #[serde(default = "default_pairs")]
    pub target_pairs: Vec<String>,
    #[serde(default = "default_dexes")]
    pub dex_allowlist: Vec<String>,
    #[serde(default)]
    pub auto_pause: Option<AutoPauseConfig>,
}

fn default_min_profit() -> f64 {
    0.01
}

fn default_max_risk() -> u8 {
    50
}

fn default_max_trade_size() -> f64 {
    10.0
}

fn default_slippage() -> f64 {
    0.5
}

fn default_pairs() -> Vec<String> {
    strings(&["SOL/USDC", "SOL/USDT"])
}

fn default_dexes() -> Vec<String> {
    strings(&["raydium", "orca"])
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Borrowed view over the tunable settings of a bot
struct Settings<'a> {
    name: &'a str,
    min_profit_threshold: f64,
    max_risk_score: u8,
    max_trade_size: f64,
    slippage_tolerance: f64,
    target_pairs: &'a [String],
    dex_allowlist: &'a [String],
    auto_pause: Option<&'a AutoPauseConfig>,
}

impl Settings<'_> {
    fn check(&self) -> Result<()> {
        let mut problems = Vec::new();

        let name_len = self.name.trim().chars().count();
        if !(1..=100).contains(&name_len) {
            problems.push("name must be 1-100 characters".to_string());
        }
        if !(0.001..=1.0).contains(&self.min_profit_threshold) {
            problems.push("minProfitThreshold must be within 0.001-1".to_string());
        }
        if self.max_risk_score > 100 {
            problems.push("maxRiskScore must be within 0-100".to_string());
        }
        if !(self.max_trade_size > 0.0 && self.max_trade_size <= 1000.0) {
            problems.push("maxTradeSize must be positive and at most 1000".to_string());
        }
        if !(0.0..=10.0).contains(&self.slippage_tolerance) {
            problems.push("slippageTolerance must be within 0-10".to_string());
        }
        if self.target_pairs.is_empty() {
            problems.push("at least one target pair is required".to_string());
        }
        if self.dex_allowlist.is_empty() {
            problems.push("at least one DEX is required".to_string());
        }
        for dex in self.dex_allowlist {
            if !SUPPORTED_DEXES.contains(&dex.as_str()) {
                problems.push(format!("unsupported DEX '{}'", dex));
            }
        }
        if let Some(auto_pause) = self.auto_pause {
            if !(0.0..=100.0).contains(&auto_pause.volatility_threshold) {
                problems.push("autoPause.volatilityThreshold must be within 0-100".to_string());
            }
            if !(0.0..=100.0).contains(&auto_pause.max_daily_loss) {
                problems.push("autoPause.maxDailyLoss must be within 0-100".to_string());
            }
            if !(1..=20).contains(&auto_pause.max_consecutive_losses) {
                problems.push("autoPause.maxConsecutiveLosses must be within 1-20".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ShieldError::validation(problems.join("; ")))
        }
    }
}

pub fn validate_new_bot(bot: &NewBot) -> Result<()> {
    Settings {
        name: &bot.bot_name,
        min_profit_threshold: bot.min_profit_threshold,
        max_risk_score: bot.max_risk_score,
        max_trade_size: bot.max_trade_size,
        slippage_tolerance: bot.slippage_tolerance,
        target_pairs: &bot.target_pairs,
        dex_allowlist: &bot.dex_allowlist,
        auto_pause: bot.auto_pause_config.as_ref(),
    }
    .check()
}

pub fn validate_bot(bot: &ArbitrageBot) -> Result<()> {
    Settings {
        name: &bot.bot_name,
        min_profit_threshold: bot.min_profit_threshold,
        max_risk_score: bot.max_risk_score,
        max_trade_size: bot.max_trade_size,
        slippage_tolerance: bot.slippage_tolerance,
        target_pairs: &bot.target_pairs,
        dex_allowlist: &bot.dex_allowlist,
        auto_pause: bot.auto_pause_config.as_ref(),
    }
    .check()
}

impl BotTemplate {
    /// Parse and validate a JSON template
    pub fn from_json(json: &str) -> Result<Self> {
        let template: BotTemplate = serde_json::from_str(json)
            .map_err(|e| ShieldError::validation(format!("invalid bot template: {}", e)))?;
        template.validate()?;
        Ok(template)
    }

    pub fn validate(&self) -> Result<()> {
        Settings {
            name: &self.name,
            min_profit_threshold: self.min_profit_threshold,
            max_risk_score: self.max_risk_score,
            max_trade_size: self.max_trade_size,
            slippage_tolerance: self.slippage_tolerance,
            target_pairs: &self.target_pairs,
            dex_allowlist: &self.dex_allowlist,
            auto_pause: self.auto_pause.as_ref(),
        }
        .check()
    }

    /// Bot insert payload for `wallet_id` built from this template
    pub fn into_new_bot(
        self,
        wallet_id: impl Into<String>,
        wallet_address: impl Into<String>,
    ) -> Result<NewBot> {
        self.validate()?;
        Ok(NewBot {
            wallet_id: wallet_id.into(),
            bot_name: self.name,
            wallet_address: wallet_address.into(),
            strategy: self.strategy,
            min_profit_threshold: self.min_profit_threshold,
            max_risk_score: self.max_risk_score,
            max_trade_size: self.max_trade_size,
            slippage_tolerance: self.slippage_tolerance,
            target_pairs: self.target_pairs,
            dex_allowlist: self.dex_allowlist,
            auto_pause_config: self.auto_pause,
        })
    }
}

/// Shipped template with its lookup key and blurb
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinTemplate {
    pub key: &'static str,
    pub description: &'static str,
    pub template: BotTemplate,
}

pub fn builtin_templates() -> Vec<BuiltinTemplate> {
    vec![
        BuiltinTemplate {
            key: "conservativeArbitrage",
            description: "Low-risk strategy focusing on safe arbitrage opportunities between major DEXes. 2% minimum profit with strict risk controls.",
            template: BotTemplate {
                name: "Conservative DEX Arbitrage".to_string(),
                strategy: BotStrategy::DexArbitrage,
                min_profit_threshold: 0.02,
                max_risk_score: 40,
                max_trade_size: 5.0,
                slippage_tolerance: 0.5,
                target_pairs: strings(&["SOL/USDC", "SOL/USDT"]),
                dex_allowlist: strings(&["raydium", "orca"]),
                auto_pause: Some(AutoPauseConfig {
                    enabled: true,
                    volatility_threshold: 15.0,
                    max_daily_loss: 3.0,
                    max_consecutive_losses: 3,
                }),
            },
        },
        BuiltinTemplate {
            key: "liquidityProvider",
            description: "Provide liquidity to stable pairs with minimal impermanent loss. Lower profit requirements but higher volume.",
            template: BotTemplate {
                name: "Stable Liquidity Provider".to_string(),
                strategy: BotStrategy::LiquidityProvision,
                min_profit_threshold: 0.005,
                max_risk_score: 30,
                max_trade_size: 20.0,
                slippage_tolerance: 1.0,
                target_pairs: strings(&["SOL/USDC", "SOL/USDT", "USDC/USDT"]),
                dex_allowlist: strings(&["raydium", "orca", "phoenix"]),
                auto_pause: Some(AutoPauseConfig {
                    enabled: true,
                    volatility_threshold: 25.0,
                    max_daily_loss: 10.0,
                    max_consecutive_losses: 5,
                }),
            },
        },
        BuiltinTemplate {
            key: "aggressiveMarketMaker",
            description: "Active market making across multiple pairs. Higher risk tolerance for greater profit potential.",
            template: BotTemplate {
                name: "Aggressive Market Maker".to_string(),
                strategy: BotStrategy::MarketMaking,
                min_profit_threshold: 0.01,
                max_risk_score: 60,
                max_trade_size: 15.0,
                slippage_tolerance: 2.0,
                target_pairs: strings(&["SOL/USDC", "SOL/USDT", "SOL/RAY", "SOL/BONK"]),
                dex_allowlist: strings(&["raydium", "orca", "jupiter"]),
                auto_pause: Some(AutoPauseConfig {
                    enabled: true,
                    volatility_threshold: 30.0,
                    max_daily_loss: 8.0,
                    max_consecutive_losses: 4,
                }),
            },
        },
    ]
}

pub fn builtin_template(key: &str) -> Option<BuiltinTemplate> {
    builtin_templates().into_iter().find(|t| t.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_valid() {
        let templates = builtin_templates();
        assert_eq!(templates.len(), 3);
        for t in &templates {
            assert!(t.template.validate().is_ok(), "{} invalid", t.key);
        }
        assert!(builtin_template("liquidityProvider").is_some());
        assert!(builtin_template("yolo").is_none());
    }

    #[test]
    fn test_json_defaults() {
        let t = BotTemplate::from_json(r#"{"name":"Mine","strategy":"market_making"}"#).unwrap();
        assert_eq!(t.max_risk_score, 50);
        assert_eq!(t.dex_allowlist, vec!["raydium", "orca"]);
        assert!(t.auto_pause.is_none());

        let t = BotTemplate::from_json(
            r#"{"name":"Mine","strategy":"dex_arbitrage","autoPause":{"maxDailyLoss":2}}"#,
        )
        .unwrap();
        let auto_pause = t.auto_pause.unwrap();
        assert_eq!(auto_pause.max_daily_loss, 2.0);
        assert_eq!(auto_pause.max_consecutive_losses, 5);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let err = BotTemplate::from_json(
            r#"{"name":"X","strategy":"dex_arbitrage","maxTradeSize":0,"dexAllowlist":["serum"]}"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("maxTradeSize"));
        assert!(msg.contains("unsupported DEX 'serum'"));

        assert!(BotTemplate::from_json(r#"{"name":"X","strategy":"hodl"}"#).is_err());
        assert!(BotTemplate::from_json(r#"{"name":"","strategy":"dex_arbitrage"}"#).is_err());
        assert!(BotTemplate::from_json(
            r#"{"name":"X","strategy":"dex_arbitrage","autoPause":{"maxConsecutiveLosses":0}}"#
        )
        .is_err());
    }

    #[test]
    fn test_into_new_bot() {
        let t = builtin_template("conservativeArbitrage").unwrap().template;
        let bot = t.into_new_bot("w1", "Addr").unwrap();
        assert_eq!(bot.bot_name, "Conservative DEX Arbitrage");
        assert_eq!(bot.wallet_id, "w1");
        assert!(validate_new_bot(&bot).is_ok());
    }
}
