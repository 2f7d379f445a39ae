//! Deep3 risk analysis supplier
//!
//! The engine treats the supplier as untrusted and slow. Only the risk score
//! feeds the merge policy; everything else is stored as opaque metadata.

use crate::errors::SupplierError;
use crate::types::Deep3Verdict;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const SUPPLIER_NAME: &str = "deep3";

/// Analysis returned by the supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deep3Analysis {
    pub token_address: String,
    /// 0-100, higher is riskier
    pub risk_score: u8,
    pub classification: Deep3Verdict,
    pub confidence: u8,
    pub metadata: Deep3Metadata,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deep3Metadata {
    pub contract_age: u32,
    pub holder_count: u32,
    #[serde(rename = "liquidityUSD")]
    pub liquidity_usd: u64,
    pub is_honeypot: bool,
    pub is_mintable: bool,
    pub has_blacklist: bool,
    pub rug_pull_risk: u8,
    pub social_score: i32,
}

/// External risk analysis supplier
#[async_trait]
pub trait RiskAnalyzer: Send + Sync {
    async fn analyze(&self, token_address: &str) -> Result<Deep3Analysis, SupplierError>;
}

/// Verdict band for a risk score
pub fn verdict_for_score(risk_score: u8) -> Deep3Verdict {
    if risk_score >= 70 {
        Deep3Verdict::Malicious
    } else if risk_score >= 40 {
        Deep3Verdict::Suspicious
    } else {
        Deep3Verdict::Safe
    }
}

/// Deterministic score derived from the address
///
/// 31-multiplier rolling hash over UTF-16 code units with 32-bit wraparound,
/// reduced to 0-99. Known high-risk fragments bump the score.
pub fn mock_risk_score(token_address: &str) -> u8 {
    let hash = token_address.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    });
    let base = (hash % 100).unsigned_abs() as u8;

    if token_address.contains("111") || token_address.contains("dead") {
        return (base + 40).min(100);
    }
    if token_address.contains("beef") || token_address.contains("cafe") {
        return (base + 20).min(80);
    }
    base
}

fn recommendations(risk_score: u8, verdict: Deep3Verdict) -> Vec<String> {
    let mut out: Vec<String> = match verdict {
        Deep3Verdict::Malicious => vec![
            "❌ Do not interact with this token - high risk of loss",
            "🚨 Multiple red flags detected including potential honeypot mechanics",
            "📊 Extremely low liquidity and suspicious holder distribution",
        ],
        Deep3Verdict::Suspicious => vec![
            "⚠️ Exercise extreme caution when interacting with this token",
            "🔍 Verify token legitimacy on multiple sources before trading",
            "💰 Consider limiting exposure to small test amounts only",
        ],
        Deep3Verdict::Safe => vec![
            "✅ Token appears legitimate based on current analysis",
            "📈 Monitor liquidity and holder count for changes",
            "🔄 Continue to verify on official sources before large transactions",
        ],
    }
    .into_iter()
    .map(String::from)
    .collect();

    if risk_score < 30 {
        out.push("🌟 Strong community presence and social validation detected".to_string());
    }
    out
}

/// Simulated Deep3 Labs service
///
/// Score and verdict are deterministic per address; confidence, metadata and
/// latency are random.
pub struct MockDeep3Analyzer {
    latency_min: Duration,
    latency_max: Duration,
    rng: Mutex<fastrand::Rng>,
}

impl Default for MockDeep3Analyzer {
    fn default() -> Self {
        Self::new(Duration::from_millis(800), Duration::from_millis(1200))
    }
}

impl MockDeep3Analyzer {
    pub fn new(latency_min: Duration, latency_max: Duration) -> Self {
        Self {
            latency_min,
            latency_max: latency_max.max(latency_min),
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// No simulated latency
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Reproducible random fields
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(fastrand::Rng::with_seed(seed));
        self
    }

    fn sample_latency(&self) -> Duration {
        let min = self.latency_min.as_millis() as u64;
        let max = self.latency_max.as_millis() as u64;
        Duration::from_millis(self.rng.lock().u64(min..=max))
    }

    fn build_analysis(&self, token_address: &str) -> Deep3Analysis {
        let risk_score = mock_risk_score(token_address);
        let classification = verdict_for_score(risk_score);
        let mut rng = self.rng.lock();

        let metadata = Deep3Metadata {
            contract_age: rng.u32(0..365),
            holder_count: rng.u32(0..50_000) + 100,
            liquidity_usd: rng.u64(0..5_000_000) + 10_000,
            is_honeypot: risk_score > 80 && rng.f64() > 0.5,
            is_mintable: rng.f64() > 0.6,
            has_blacklist: rng.f64() > 0.7,
            rug_pull_risk: if risk_score > 60 {
                risk_score - 10
            } else {
                rng.u8(0..40)
            },
            social_score: 100 - i32::from(risk_score) + rng.i32(0..20) - 10,
        };

        Deep3Analysis {
            token_address: token_address.to_string(),
            risk_score,
            classification,
            confidence: 75 + rng.u8(0..20),
            metadata,
            recommendations: recommendations(risk_score, classification),
        }
    }
}

#[async_trait]
impl RiskAnalyzer for MockDeep3Analyzer {
    async fn analyze(&self, token_address: &str) -> Result<Deep3Analysis, SupplierError> {
        if token_address.is_empty() {
            return Err(SupplierError::InvalidResponse {
                supplier: SUPPLIER_NAME,
                reason: "empty token address".to_string(),
            });
        }

        let latency = self.sample_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let analysis = self.build_analysis(token_address);
        debug!(
            token = %token_address,
            risk_score = analysis.risk_score,
            latency_ms = latency.as_millis() as u64,
            "Deep3 analysis complete"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_is_deterministic_and_bounded() {
        let a = mock_risk_score("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");
        let b = mock_risk_score("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");
        assert_eq!(a, b);
        assert!(a <= 100);
    }

    #[test]
    fn test_hash_matches_reference_values() {
        // "a" -> 97; "ab" -> 97*31 + 98 = 3105
        assert_eq!(mock_risk_score("a"), 97);
        assert_eq!(mock_risk_score("ab"), 5);
    }

    #[test]
    fn test_risky_fragments_raise_score() {
        // "dead" hashes to a fixed base; the fragment adds 40 capped at 100
        let score = mock_risk_score("dead");
        assert!(score >= 40);
        assert!(score <= 100);

        let cafe = mock_risk_score("cafe");
        assert!(cafe >= 20);
        assert!(cafe <= 80);
    }

    #[test]
    fn test_verdict_bands() {
        assert_eq!(verdict_for_score(39), Deep3Verdict::Safe);
        assert_eq!(verdict_for_score(40), Deep3Verdict::Suspicious);
        assert_eq!(verdict_for_score(69), Deep3Verdict::Suspicious);
        assert_eq!(verdict_for_score(70), Deep3Verdict::Malicious);
    }

    #[test]
    fn test_recommendations() {
        assert_eq!(recommendations(10, Deep3Verdict::Safe).len(), 4);
        assert_eq!(recommendations(35, Deep3Verdict::Safe).len(), 3);
        assert_eq!(recommendations(90, Deep3Verdict::Malicious).len(), 3);
    }

    #[tokio::test]
    async fn test_mock_analyzer_fields() {
        let analyzer = MockDeep3Analyzer::instant().with_seed(7);
        let analysis = analyzer.analyze("dead1111").await.unwrap();
        assert_eq!(analysis.risk_score, mock_risk_score("dead1111"));
        assert_eq!(analysis.classification, verdict_for_score(analysis.risk_score));
        assert!((75..95).contains(&analysis.confidence));
        assert!(analysis.metadata.holder_count >= 100);
        assert!(analysis.metadata.liquidity_usd >= 10_000);

        assert!(analyzer.analyze("").await.is_err());
    }
}
