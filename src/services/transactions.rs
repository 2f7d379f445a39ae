//! Incoming transaction pipeline
//!
//! Local classification always runs. Deep3 is consulted only when the wallet's
//! resolved tier unlocks it, and only its risk score feeds the merge. A
//! supplier failure or timeout degrades to the local verdict. A local BLOCK is
//! re-asserted after the merge.

use crate::classifier::{enforce_local_block, ClassificationResult, MergedClassification, TokenClassifier};
use crate::clock::Clock;
use crate::components::deep3::{Deep3Analysis, RiskAnalyzer, SUPPLIER_NAME};
use crate::components::event_bus::{EventBus, ShieldEvent};
use crate::errors::{Result, SupplierError};
use crate::metrics::{metrics, Timer};
use crate::services::tiers::TierService;
use crate::storage::Repository;
use crate::structured_logging::OperationContext;
use crate::types::{ThreatLevel, TokenClassification, TokenInfo, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Raw transfer notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingTransaction {
    pub wallet_address: String,
    pub token_address: String,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
}

impl IncomingTransaction {
    pub fn new(wallet_address: impl Into<String>, token_address: impl Into<String>) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            token_address: token_address.into(),
            token_name: None,
            token_symbol: None,
            amount: None,
        }
    }

    pub fn with_token(mut self, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.token_name = Some(name.into());
        self.token_symbol = Some(symbol.into());
        self
    }

    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    fn token_info(&self) -> TokenInfo {
        TokenInfo {
            address: self.token_address.clone(),
            name: self.token_name.clone(),
            symbol: self.token_symbol.clone(),
            decimals: None,
        }
    }
}

/// Outcome of a classification without persistence
#[derive(Debug, Clone, PartialEq)]
pub struct TokenVerdict {
    pub local: ClassificationResult,
    pub deep3: Option<Deep3Analysis>,
    pub merged: MergedClassification,
}

pub struct TransactionPipeline {
    repo: Arc<dyn Repository>,
    classifier: TokenClassifier,
    analyzer: Arc<dyn RiskAnalyzer>,
    tiers: Arc<TierService>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    analysis_timeout: Option<Duration>,
}

impl TransactionPipeline {
    pub fn new(
        repo: Arc<dyn Repository>,
        classifier: TokenClassifier,
        analyzer: Arc<dyn RiskAnalyzer>,
        tiers: Arc<TierService>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        analysis_timeout: Option<Duration>,
    ) -> Self {
        Self {
            repo,
            classifier,
            analyzer,
            tiers,
            clock,
            events,
            analysis_timeout,
        }
    }

    async fn call_analyzer(&self, token_address: &str) -> std::result::Result<Deep3Analysis, SupplierError> {
        let timer = Timer::new();
        let result = match self.analysis_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.analyzer.analyze(token_address)).await {
                Ok(result) => result,
                Err(_) => Err(SupplierError::Timeout {
                    supplier: SUPPLIER_NAME,
                    waited_ms: limit.as_millis() as u64,
                }),
            },
            None => self.analyzer.analyze(token_address).await,
        };
        timer.observe_duration(&metrics().deep3_latency);
        result
    }

    /// Classify a token; Deep3 is consulted only when `use_deep3` is set
    ///
    /// Supplier failures are logged and absorbed.
    pub async fn analyze_token(
        &self,
        token: &TokenInfo,
        use_deep3: bool,
        ctx: &OperationContext,
    ) -> Result<TokenVerdict> {
        let local = self.classifier.classify(token)?;

        if !use_deep3 {
            let merged = MergedClassification::from(&local);
            return Ok(TokenVerdict {
                local,
                deep3: None,
                merged,
            });
        }

        match self.call_analyzer(&token.address).await {
            Ok(analysis) => {
                metrics().deep3_analyses.inc();
                let merged = self.classifier.merge_with_deep3(&local, analysis.risk_score);
                if merged.threat_level > local.threat_level {
                    metrics().deep3_escalations.inc();
                }
                Ok(TokenVerdict {
                    local,
                    deep3: Some(analysis),
                    merged,
                })
            }
            Err(e) => {
                metrics().supplier_failures.inc();
                ctx.logger
                    .log_supplier_fallback(SUPPLIER_NAME, &token.address, &e.to_string());
                let merged = MergedClassification::from(&local);
                Ok(TokenVerdict {
                    local,
                    deep3: None,
                    merged,
                })
            }
        }
    }

    /// Classify, persist and broadcast an incoming transfer
    ///
    /// `Ok(None)` when the receiving wallet is unknown.
    pub async fn process_incoming(&self, incoming: IncomingTransaction) -> Result<Option<Transaction>> {
        let timer = Timer::new();
        let ctx = OperationContext::new("process_incoming");

        let Some(wallet) = self.repo.get_wallet_by_address(&incoming.wallet_address).await? else {
            return Ok(None);
        };

        let resolution = self.tiers.resolve_wallet(&wallet).await?;
        let use_deep3 = self.tiers.features(&resolution).deep3_integration;

        let token = incoming.token_info();
        let verdict = self
            .analyze_token(&token, use_deep3, &ctx.child("analyze_token"))
            .await?;
        let fin = enforce_local_block(&verdict.local, verdict.merged);

        let deep3_metadata = match &verdict.deep3 {
            Some(analysis) => Some(serde_json::to_string(&analysis.metadata).map_err(|e| {
                SupplierError::InvalidResponse {
                    supplier: SUPPLIER_NAME,
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        let tx = Transaction {
            id: Uuid::new_v4().to_string(),
            wallet_id: wallet.id.clone(),
            signature: generate_signature(),
            token_address: incoming.token_address,
            token_name: incoming.token_name.unwrap_or_else(|| "Unknown Token".to_string()),
            token_symbol: incoming.token_symbol.unwrap_or_else(|| "???".to_string()),
            amount: incoming.amount.unwrap_or_else(|| "0".to_string()),
            timestamp: self.clock.now(),
            local_classification: verdict.local.classification,
            local_threat_level: verdict.local.threat_level,
            local_reason: verdict.local.reason.clone(),
            deep3_classification: verdict.deep3.as_ref().map(|a| a.classification),
            deep3_threat_score: verdict.deep3.as_ref().map(|a| a.risk_score),
            deep3_reason: verdict
                .deep3
                .as_ref()
                .and_then(|a| a.recommendations.first().cloned()),
            deep3_metadata,
            final_classification: fin.classification,
            final_threat_level: fin.threat_level,
            blocked: fin.classification == TokenClassification::Block,
        };

        let tx = self.repo.insert_transaction(tx).await?;

        metrics().transactions_classified.inc();
        if tx.blocked {
            metrics().transactions_blocked.inc();
        }
        timer.observe_duration(&metrics().classification_latency);
        ctx.logger.log_classification(
            &wallet.address,
            &tx.token_address,
            tx.final_classification,
            tx.final_threat_level,
            tx.deep3_threat_score,
            (timer.elapsed_secs() * 1000.0) as u64,
        );

        self.events.publish(ShieldEvent::Transaction(tx.clone()));
        if tx.final_threat_level != ThreatLevel::Safe {
            metrics().threats_detected.inc();
            self.events.publish(ShieldEvent::ThreatDetected {
                transaction: tx.clone(),
                threat_level: tx.final_threat_level,
            });
        }

        Ok(Some(tx))
    }
}

/// Random 64-byte base58 signature
fn generate_signature() -> String {
    let mut bytes = [0u8; 64];
    fastrand::fill(&mut bytes);
    bs58::encode(bytes).into_string()
}
