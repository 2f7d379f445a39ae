//! In-memory repository backed by DashMap

use super::{sort_bots, sort_newest_first, sort_passes, Repository};
use crate::errors::{StorageError, StorageResult};
use crate::types::{
    ArbitrageBot, BotPatch, NftPass, NftPassPatch, Transaction, Wallet, WalletPatch,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Map-backed repository
///
/// Per-wallet queries are linear scans; fine for demo-sized data.
#[derive(Debug, Default)]
pub struct MemStorage {
    wallets: DashMap<String, Wallet>,
    /// address -> wallet id
    addresses: DashMap<String, String>,
    transactions: DashMap<String, Transaction>,
    bots: DashMap<String, ArbitrageBot>,
    passes: DashMap<String, NftPass>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }
}

#[async_trait]
impl Repository for MemStorage {
    async fn get_wallet(&self, id: &str) -> StorageResult<Option<Wallet>> {
        Ok(self.wallets.get(id).map(|w| w.clone()))
    }

    async fn get_wallet_by_address(&self, address: &str) -> StorageResult<Option<Wallet>> {
        let Some(id) = self.addresses.get(address).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.wallets.get(&id).map(|w| w.clone()))
    }

    async fn insert_wallet(&self, wallet: Wallet) -> StorageResult<Wallet> {
        match self.addresses.entry(wallet.address.clone()) {
            Entry::Occupied(_) => {
                return Err(StorageError::Conflict(format!(
                    "wallet address {} already registered",
                    wallet.address
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(wallet.id.clone());
            }
        }
        self.wallets.insert(wallet.id.clone(), wallet.clone());
        Ok(wallet)
    }

    async fn update_wallet(
        &self,
        id: &str,
        patch: &WalletPatch,
    ) -> StorageResult<Option<Wallet>> {
        Ok(self.wallets.get_mut(id).map(|mut w| {
            w.apply(patch);
            w.clone()
        }))
    }

    async fn delete_wallet(&self, id: &str) -> StorageResult<bool> {
        match self.wallets.remove(id) {
            Some((_, wallet)) => {
                self.addresses.remove(&wallet.address);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_transaction(&self, id: &str) -> StorageResult<Option<Transaction>> {
        Ok(self.transactions.get(id).map(|t| t.clone()))
    }

    async fn transactions_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<Transaction>> {
        let mut txs: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| t.wallet_id == wallet_id)
            .map(|t| t.clone())
            .collect();
        sort_newest_first(&mut txs);
        Ok(txs)
    }

    async fn insert_transaction(&self, tx: Transaction) -> StorageResult<Transaction> {
        self.transactions.insert(tx.id.clone(), tx.clone());
        Ok(tx)
    }

    async fn get_bot(&self, id: &str) -> StorageResult<Option<ArbitrageBot>> {
        Ok(self.bots.get(id).map(|b| b.clone()))
    }

    async fn bots_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<ArbitrageBot>> {
        let mut bots: Vec<ArbitrageBot> = self
            .bots
            .iter()
            .filter(|b| b.wallet_id == wallet_id)
            .map(|b| b.clone())
            .collect();
        sort_bots(&mut bots);
        Ok(bots)
    }

    async fn all_bots(&self) -> StorageResult<Vec<ArbitrageBot>> {
        let mut bots: Vec<ArbitrageBot> = self.bots.iter().map(|b| b.clone()).collect();
        sort_bots(&mut bots);
        Ok(bots)
    }

    async fn insert_bot(&self, bot: ArbitrageBot) -> StorageResult<ArbitrageBot> {
        self.bots.insert(bot.id.clone(), bot.clone());
        Ok(bot)
    }

    async fn update_bot(&self, id: &str, patch: &BotPatch) -> StorageResult<Option<ArbitrageBot>> {
        Ok(self.bots.get_mut(id).map(|mut b| {
            b.apply(patch);
            b.clone()
        }))
    }

    async fn delete_bot(&self, id: &str) -> StorageResult<bool> {
        Ok(self.bots.remove(id).is_some())
    }

    async fn get_pass(&self, id: &str) -> StorageResult<Option<NftPass>> {
        Ok(self.passes.get(id).map(|p| p.clone()))
    }

    async fn passes_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<NftPass>> {
        let mut passes: Vec<NftPass> = self
            .passes
            .iter()
            .filter(|p| p.wallet_id == wallet_id)
            .map(|p| p.clone())
            .collect();
        sort_passes(&mut passes);
        Ok(passes)
    }

    async fn insert_pass(&self, pass: NftPass) -> StorageResult<NftPass> {
        self.passes.insert(pass.id.clone(), pass.clone());
        Ok(pass)
    }

    async fn update_pass(&self, id: &str, patch: &NftPassPatch) -> StorageResult<Option<NftPass>> {
        Ok(self.passes.get_mut(id).map(|mut p| {
            p.apply(patch);
            p.clone()
        }))
    }
}
