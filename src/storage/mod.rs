//! Repository abstraction over wallets, transactions, bots and NFT passes
//!
//! Services depend only on [`Repository`]. `MemStorage` backs tests and the
//! demo binary, `SledStorage` persists to disk. Updates are typed patches
//! applied with last-writer-wins semantics; no optimistic concurrency.

mod memory;
#[cfg(feature = "sled-storage")]
mod sled_store;

pub use memory::MemStorage;
#[cfg(feature = "sled-storage")]
pub use sled_store::SledStorage;

use crate::errors::StorageResult;
use crate::types::{
    ArbitrageBot, BotPatch, NftPass, NftPassPatch, Transaction, Wallet, WalletPatch,
};
use async_trait::async_trait;

#[async_trait]
pub trait Repository: Send + Sync {
    // Wallets
    async fn get_wallet(&self, id: &str) -> StorageResult<Option<Wallet>>;
    async fn get_wallet_by_address(&self, address: &str) -> StorageResult<Option<Wallet>>;
    async fn insert_wallet(&self, wallet: Wallet) -> StorageResult<Wallet>;
    /// Returns the updated record, `None` when the id is unknown
    async fn update_wallet(&self, id: &str, patch: &WalletPatch)
        -> StorageResult<Option<Wallet>>;
    async fn delete_wallet(&self, id: &str) -> StorageResult<bool>;

    // Transactions
    async fn get_transaction(&self, id: &str) -> StorageResult<Option<Transaction>>;
    /// Newest first
    async fn transactions_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<Transaction>>;
    async fn insert_transaction(&self, tx: Transaction) -> StorageResult<Transaction>;

    // Bots
    async fn get_bot(&self, id: &str) -> StorageResult<Option<ArbitrageBot>>;
    /// Creation order
    async fn bots_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<ArbitrageBot>>;
    async fn all_bots(&self) -> StorageResult<Vec<ArbitrageBot>>;
    async fn insert_bot(&self, bot: ArbitrageBot) -> StorageResult<ArbitrageBot>;
    async fn update_bot(&self, id: &str, patch: &BotPatch) -> StorageResult<Option<ArbitrageBot>>;
    async fn delete_bot(&self, id: &str) -> StorageResult<bool>;

    // NFT passes
    async fn get_pass(&self, id: &str) -> StorageResult<Option<NftPass>>;
    async fn passes_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<NftPass>>;
    /// Passes flagged active; expiry is checked by callers against their clock
    async fn active_passes(&self, wallet_id: &str) -> StorageResult<Vec<NftPass>> {
        Ok(self
            .passes_by_wallet(wallet_id)
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .collect())
    }
    async fn insert_pass(&self, pass: NftPass) -> StorageResult<NftPass>;
    async fn update_pass(&self, id: &str, patch: &NftPassPatch) -> StorageResult<Option<NftPass>>;
}

fn sort_bots(bots: &mut [ArbitrageBot]) {
    bots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

fn sort_newest_first(txs: &mut [Transaction]) {
    txs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
}

fn sort_passes(passes: &mut [NftPass]) {
    passes.sort_by_key(|p| (p.acquired_at, p.id.clone()));
}
