//! Error types for the shield engine
//!
//! Lookups that can miss return `Option` instead of an error so callers can
//! branch without unwinding. Errors here are reserved for bad input, policy
//! refusals, collaborator failures and storage faults. Nothing is retried.

use crate::types::Tier;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShieldError>;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Top-level error surfaced by services
#[derive(Debug, Error)]
pub enum ShieldError {
    /// Malformed input, fails fast
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The resolved tier does not unlock the requested feature
    #[error("{required} tier required, wallet resolves to {actual}")]
    TierRequired { required: Tier, actual: Tier },

    /// Per-wallet bot limit already reached
    #[error("bot limit reached: at most {limit} bots per wallet")]
    BotLimitReached { limit: usize },

    /// External supplier could not answer
    #[error("supplier unavailable: {0}")]
    Supplier(#[from] SupplierError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ShieldError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ShieldError::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ShieldError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Failure of an external supplier (risk analysis, price)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SupplierError {
    #[error("{supplier} unavailable: {reason}")]
    Unavailable {
        supplier: &'static str,
        reason: String,
    },

    #[error("{supplier} timed out after {waited_ms}ms")]
    Timeout {
        supplier: &'static str,
        waited_ms: u64,
    },

    #[error("invalid response from {supplier}: {reason}")]
    InvalidResponse {
        supplier: &'static str,
        reason: String,
    },
}

/// Repository backend failure
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record codec error: {0}")]
    Codec(String),

    /// Unique key already taken (wallet address)
    #[error("conflict: {0}")]
    Conflict(String),
}

#[cfg(feature = "sled-storage")]
impl From<sled::Error> for StorageError {
    fn from(e: sled::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

#[cfg(feature = "sled-storage")]
impl From<bincode::Error> for StorageError {
    fn from(e: bincode::Error) -> Self {
        StorageError::Codec(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShieldError::not_found("wallet", "abc");
        assert_eq!(err.to_string(), "wallet not found: abc");

        let err = ShieldError::TierRequired {
            required: Tier::ProPlus,
            actual: Tier::Pro,
        };
        assert_eq!(err.to_string(), "pro_plus tier required, wallet resolves to pro");
    }

    #[test]
    fn test_supplier_error_converts() {
        let err: ShieldError = SupplierError::Timeout {
            supplier: "deep3",
            waited_ms: 5000,
        }
        .into();
        assert!(matches!(err, ShieldError::Supplier(SupplierError::Timeout { .. })));
        assert!(err.to_string().contains("timed out after 5000ms"));
    }
}
