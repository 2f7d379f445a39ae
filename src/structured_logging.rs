//! Structured logging and operation context

use crate::tier::TierResolution;
use crate::types::{ThreatLevel, Tier, TokenClassification};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Structured logger for engine events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_classification(
        &self,
        wallet: &str,
        token: &str,
        classification: TokenClassification,
        threat_level: ThreatLevel,
        deep3_score: Option<u8>,
        latency_ms: u64,
    ) {
        tracing::info!(
            context_id = %self.context_id,
            wallet = %wallet,
            token = %token,
            final_classification = %classification,
            final_threat_level = %threat_level,
            deep3_score = ?deep3_score,
            latency_ms = %latency_ms,
            "Transaction classified"
        );
    }

    pub fn log_supplier_fallback(&self, supplier: &str, token: &str, error: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            supplier = %supplier,
            token = %token,
            error = %error,
            "Supplier unavailable, using local classification only"
        );
    }

    pub fn log_tier_resolved(&self, wallet: &str, previous: Tier, resolution: &TierResolution) {
        tracing::info!(
            context_id = %self.context_id,
            wallet = %wallet,
            previous = %previous,
            tier = %resolution.tier,
            source = ?resolution.source,
            cath_balance = %resolution.cath_balance,
            "Tier resolved"
        );
    }

    pub fn log_bot_paused(&self, bot_id: &str, wallet_id: &str) {
        tracing::info!(
            context_id = %self.context_id,
            bot_id = %bot_id,
            wallet_id = %wallet_id,
            "Auto-paused bot with failed payment"
        );
    }

    pub fn log_bot_deleted(&self, bot_id: &str, inactive_since: Option<DateTime<Utc>>) {
        tracing::info!(
            context_id = %self.context_id,
            bot_id = %bot_id,
            inactive_since = ?inactive_since,
            "Deleted long-inactive bot"
        );
    }

    pub fn log_sweep_item_failure(&self, bot_id: &str, error: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            bot_id = %bot_id,
            error = %error,
            "Bot lifecycle step failed, continuing sweep"
        );
    }

    pub fn log_sweep_complete(&self, scanned: usize, paused: usize, deleted: usize, failed: usize) {
        tracing::info!(
            context_id = %self.context_id,
            scanned = %scanned,
            paused = %paused,
            deleted = %deleted,
            failed = %failed,
            "Bot lifecycle sweep complete"
        );
    }
}

/// Per-operation context carrying correlation ids
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Unique request ID, shared by child contexts
    pub request_id: String,

    pub span_id: String,

    pub parent_span_id: Option<String>,

    /// Operation name
    pub operation: String,

    pub started_at: DateTime<Utc>,

    /// Structured logger instance
    pub logger: StructuredLogger,
}

impl OperationContext {
    pub fn new(operation: &str) -> Self {
        let request_id = Uuid::new_v4().to_string();

        Self {
            logger: StructuredLogger::new(request_id.clone()),
            request_id,
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: None,
            operation: operation.to_string(),
            started_at: Utc::now(),
        }
    }

    /// Create a child context
    pub fn child(&self, operation: &str) -> Self {
        Self {
            request_id: self.request_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: Some(self.span_id.clone()),
            operation: operation.to_string(),
            started_at: Utc::now(),
            logger: self.logger.clone(),
        }
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new("default")
    }
}
