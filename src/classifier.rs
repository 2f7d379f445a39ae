//! CA-first (contract analysis) token classifier
//!
//! Local rules run first and in a fixed order; the first matching rule
//! decides. A second opinion from the external risk supplier can only be
//! merged on top of the local verdict and can only raise severity. A local
//! BLOCK is final.

use crate::errors::{Result, ShieldError};
use crate::types::{ThreatLevel, TokenClassification, TokenInfo};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static SUSPICIOUS_NAMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)free|airdrop|claim|bonus|reward|giveaway|double|mystery")
        .expect("static name pattern compiles")
});

static SUSPICIOUS_SYMBOLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)xxx|scam|rug|fake").expect("static symbol pattern compiles"));

/// Wrapped SOL
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
/// USDC
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

const KNOWN_SCAM_PREFIXES: [&str; 3] = ["1111", "dead", "beef"];

/// Risk score at or above which the external signal escalates to DANGER
pub const DANGER_RISK_SCORE: u8 = 70;
/// Risk score at or above which a SAFE verdict escalates to SUSPICIOUS
pub const SUSPICIOUS_RISK_SCORE: u8 = 40;

/// Outcome of the local rule chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub classification: TokenClassification,
    pub threat_level: ThreatLevel,
    pub reason: String,
    /// Carried for API compatibility; nothing downstream depends on it
    pub confidence: u8,
}

/// Outcome of merging the local verdict with an external risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedClassification {
    pub classification: TokenClassification,
    pub threat_level: ThreatLevel,
}

impl From<&ClassificationResult> for MergedClassification {
    fn from(local: &ClassificationResult) -> Self {
        Self {
            classification: local.classification,
            threat_level: local.threat_level,
        }
    }
}

/// Rule-based token classifier
#[derive(Debug, Clone)]
pub struct TokenClassifier {
    allowlist: HashSet<String>,
    scam_prefixes: Vec<String>,
}

impl Default for TokenClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenClassifier {
    pub fn new() -> Self {
        Self {
            allowlist: [WSOL_MINT, USDC_MINT].iter().map(|s| s.to_string()).collect(),
            scam_prefixes: KNOWN_SCAM_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add extra verified mints to the allow-set
    pub fn with_allowlist<I, S>(mut self, mints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowlist.extend(mints.into_iter().map(Into::into));
        self
    }

    pub fn is_allowlisted(&self, address: &str) -> bool {
        self.allowlist.contains(address)
    }

    /// Classify a token with the ordered local rule chain
    ///
    /// Fails only when the token address is missing.
    pub fn classify(&self, token: &TokenInfo) -> Result<ClassificationResult> {
        if token.address.trim().is_empty() {
            return Err(ShieldError::validation("token address is required"));
        }

        if self.allowlist.contains(&token.address) {
            return Ok(ClassificationResult {
                classification: TokenClassification::Allow,
                threat_level: ThreatLevel::Safe,
                reason: "Whitelisted token - verified legitimate".to_string(),
                confidence: 100,
            });
        }

        if let Some(name) = token.name.as_deref() {
            if SUSPICIOUS_NAMES.is_match(name) {
                return Ok(ClassificationResult {
                    classification: TokenClassification::Block,
                    threat_level: ThreatLevel::Blocked,
                    reason: format!(
                        "Spam detected: Token name \"{}\" matches known scam patterns",
                        name
                    ),
                    confidence: 90,
                });
            }
        }

        if let Some(symbol) = token.symbol.as_deref() {
            if SUSPICIOUS_SYMBOLS.is_match(symbol) {
                return Ok(ClassificationResult {
                    classification: TokenClassification::Block,
                    threat_level: ThreatLevel::Blocked,
                    reason: format!(
                        "Spam detected: Token symbol \"{}\" matches known scam patterns",
                        symbol
                    ),
                    confidence: 95,
                });
            }
        }

        let prefix: String = token.address.chars().take(4).collect::<String>().to_lowercase();
        if self.scam_prefixes.iter().any(|p| prefix.contains(p.as_str())) {
            return Ok(ClassificationResult {
                classification: TokenClassification::Warn,
                threat_level: ThreatLevel::Suspicious,
                reason: "Address matches known scam pattern prefix".to_string(),
                confidence: 70,
            });
        }

        let missing = |field: &Option<String>| field.as_deref().map_or(true, str::is_empty);
        if missing(&token.name) || missing(&token.symbol) {
            return Ok(ClassificationResult {
                classification: TokenClassification::Warn,
                threat_level: ThreatLevel::Suspicious,
                reason: "Incomplete token metadata - exercise caution".to_string(),
                confidence: 60,
            });
        }

        Ok(ClassificationResult {
            classification: TokenClassification::Allow,
            threat_level: ThreatLevel::Safe,
            reason: "No suspicious patterns detected".to_string(),
            confidence: 75,
        })
    }

    /// Merge the local verdict with an external risk score (0-100)
    pub fn merge_with_deep3(
        &self,
        local: &ClassificationResult,
        risk_score: u8,
    ) -> MergedClassification {
        merge_with_risk_score(local, risk_score)
    }
}

/// CA-first merge policy
///
/// A local BLOCK is returned untouched without looking at the score. Otherwise
/// a score of 70+ escalates to WARN/DANGER, and 40+ escalates a SAFE verdict to
/// WARN/SUSPICIOUS. Anything else keeps the local verdict.
pub fn merge_with_risk_score(local: &ClassificationResult, risk_score: u8) -> MergedClassification {
    if local.classification == TokenClassification::Block {
        return MergedClassification {
            classification: TokenClassification::Block,
            threat_level: ThreatLevel::Blocked,
        };
    }

    if risk_score >= DANGER_RISK_SCORE {
        MergedClassification {
            classification: TokenClassification::Warn,
            threat_level: ThreatLevel::Danger,
        }
    } else if risk_score >= SUSPICIOUS_RISK_SCORE && local.threat_level == ThreatLevel::Safe {
        MergedClassification {
            classification: TokenClassification::Warn,
            threat_level: ThreatLevel::Suspicious,
        }
    } else {
        MergedClassification::from(local)
    }
}

/// Final guard applied after any merge: a local BLOCK always wins
pub fn enforce_local_block(
    local: &ClassificationResult,
    merged: MergedClassification,
) -> MergedClassification {
    if local.classification == TokenClassification::Block {
        MergedClassification {
            classification: TokenClassification::Block,
            threat_level: ThreatLevel::Blocked,
        }
    } else {
        merged
    }
}
