//! CATH Shield - wallet security engine
//!
//! Classifies incoming token transfers (local rules first, Deep3 risk score
//! as a second opinion), resolves a wallet's effective tier from holdings,
//! NFT passes and subscriptions, and keeps arbitrage bots within their
//! payment rules.

pub mod bot_templates;
pub mod classifier;
pub mod clock;
pub mod components;
pub mod config;
pub mod demo;
pub mod endpoints;
pub mod errors;
pub mod lifecycle;
pub mod metrics;
pub mod payment;
pub mod services;
pub mod storage;
pub mod structured_logging;
pub mod tier;
pub mod types;

// Re-export commonly used types
pub use classifier::{ClassificationResult, MergedClassification, TokenClassifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use errors::{Result, ShieldError, StorageError, SupplierError};
pub use lifecycle::{BotLifecycleManager, SweepReport};
pub use services::ShieldEngine;
pub use storage::{MemStorage, Repository};
pub use tier::{TierFeatures, TierResolution, TierResolver};
