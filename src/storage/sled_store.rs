//! Sled-backed repository
//!
//! One tree per entity, values encoded with bincode. Wallet addresses are
//! indexed in their own tree. Read-modify-write updates are serialised by a
//! single writer lock; readers never take it.

use super::{sort_bots, sort_newest_first, sort_passes, Repository};
use crate::errors::{StorageError, StorageResult};
use crate::types::{
    ArbitrageBot, BotPatch, NftPass, NftPassPatch, Transaction, Wallet, WalletPatch,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

pub struct SledStorage {
    db: sled::Db,
    wallets: sled::Tree,
    addresses: sled::Tree,
    transactions: sled::Tree,
    bots: sled::Tree,
    passes: sled::Tree,
    write_lock: Mutex<()>,
}

impl SledStorage {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = sled::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Opened sled storage");
        Self::from_db(db)
    }

    /// Throwaway database, removed on drop
    pub fn temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> StorageResult<Self> {
        Ok(Self {
            wallets: db.open_tree("wallets")?,
            addresses: db.open_tree("wallet_addresses")?,
            transactions: db.open_tree("transactions")?,
            bots: db.open_tree("bots")?,
            passes: db.open_tree("nft_passes")?,
            write_lock: Mutex::new(()),
            db,
        })
    }

    /// Flush dirty buffers to disk
    pub async fn flush(&self) -> StorageResult<usize> {
        Ok(self.db.flush_async().await?)
    }
}

fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(bincode::deserialize(bytes)?)
}

fn get<T: DeserializeOwned>(tree: &sled::Tree, key: &str) -> StorageResult<Option<T>> {
    tree.get(key.as_bytes())?
        .map(|bytes| decode(&bytes))
        .transpose()
}

fn put<T: Serialize>(tree: &sled::Tree, key: &str, value: &T) -> StorageResult<()> {
    tree.insert(key.as_bytes(), encode(value)?)?;
    Ok(())
}

fn scan<T, F>(tree: &sled::Tree, keep: F) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    F: Fn(&T) -> bool,
{
    let mut out = Vec::new();
    for entry in tree.iter() {
        let (_, bytes) = entry?;
        let value: T = decode(&bytes)?;
        if keep(&value) {
            out.push(value);
        }
    }
    Ok(out)
}

#[async_trait]
impl Repository for SledStorage {
    async fn get_wallet(&self, id: &str) -> StorageResult<Option<Wallet>> {
        get(&self.wallets, id)
    }

    async fn get_wallet_by_address(&self, address: &str) -> StorageResult<Option<Wallet>> {
        let Some(id) = self.addresses.get(address.as_bytes())? else {
            return Ok(None);
        };
        let id = String::from_utf8(id.to_vec())
            .map_err(|e| StorageError::Codec(format!("wallet index: {}", e)))?;
        get(&self.wallets, &id)
    }

    async fn insert_wallet(&self, wallet: Wallet) -> StorageResult<Wallet> {
        let _guard = self.write_lock.lock();
        if self.addresses.contains_key(wallet.address.as_bytes())? {
            return Err(StorageError::Conflict(format!(
                "wallet address {} already registered",
                wallet.address
            )));
        }
        put(&self.wallets, &wallet.id, &wallet)?;
        self.addresses
            .insert(wallet.address.as_bytes(), wallet.id.as_bytes())?;
        Ok(wallet)
    }

    async fn update_wallet(
        &self,
        id: &str,
        patch: &WalletPatch,
    ) -> StorageResult<Option<Wallet>> {
        let _guard = self.write_lock.lock();
        let Some(mut wallet) = get::<Wallet>(&self.wallets, id)? else {
            return Ok(None);
        };
        wallet.apply(patch);
        put(&self.wallets, id, &wallet)?;
        Ok(Some(wallet))
    }

    async fn delete_wallet(&self, id: &str) -> StorageResult<bool> {
        let _guard = self.write_lock.lock();
        let Some(wallet) = get::<Wallet>(&self.wallets, id)? else {
            return Ok(false);
        };
        self.wallets.remove(id.as_bytes())?;
        self.addresses.remove(wallet.address.as_bytes())?;
        Ok(true)
    }

    async fn get_transaction(&self, id: &str) -> StorageResult<Option<Transaction>> {
        get(&self.transactions, id)
    }

    async fn transactions_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<Transaction>> {
        let mut txs = scan(&self.transactions, |t: &Transaction| t.wallet_id == wallet_id)?;
        sort_newest_first(&mut txs);
        Ok(txs)
    }

    async fn insert_transaction(&self, tx: Transaction) -> StorageResult<Transaction> {
        put(&self.transactions, &tx.id, &tx)?;
        Ok(tx)
    }

    async fn get_bot(&self, id: &str) -> StorageResult<Option<ArbitrageBot>> {
        get(&self.bots, id)
    }

    async fn bots_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<ArbitrageBot>> {
        let mut bots = scan(&self.bots, |b: &ArbitrageBot| b.wallet_id == wallet_id)?;
        sort_bots(&mut bots);
        Ok(bots)
    }

    async fn all_bots(&self) -> StorageResult<Vec<ArbitrageBot>> {
        let mut bots = scan(&self.bots, |_: &ArbitrageBot| true)?;
        sort_bots(&mut bots);
        Ok(bots)
    }

    async fn insert_bot(&self, bot: ArbitrageBot) -> StorageResult<ArbitrageBot> {
        put(&self.bots, &bot.id, &bot)?;
        Ok(bot)
    }

    async fn update_bot(&self, id: &str, patch: &BotPatch) -> StorageResult<Option<ArbitrageBot>> {
        let _guard = self.write_lock.lock();
        let Some(mut bot) = get::<ArbitrageBot>(&self.bots, id)? else {
            return Ok(None);
        };
        bot.apply(patch);
        put(&self.bots, id, &bot)?;
        Ok(Some(bot))
    }

    async fn delete_bot(&self, id: &str) -> StorageResult<bool> {
        Ok(self.bots.remove(id.as_bytes())?.is_some())
    }

    async fn get_pass(&self, id: &str) -> StorageResult<Option<NftPass>> {
        get(&self.passes, id)
    }

    async fn passes_by_wallet(&self, wallet_id: &str) -> StorageResult<Vec<NftPass>> {
        let mut passes = scan(&self.passes, |p: &NftPass| p.wallet_id == wallet_id)?;
        sort_passes(&mut passes);
        Ok(passes)
    }

    async fn insert_pass(&self, pass: NftPass) -> StorageResult<NftPass> {
        put(&self.passes, &pass.id, &pass)?;
        Ok(pass)
    }

    async fn update_pass(&self, id: &str, patch: &NftPassPatch) -> StorageResult<Option<NftPass>> {
        let _guard = self.write_lock.lock();
        let Some(mut pass) = get::<NftPass>(&self.passes, id)? else {
            return Ok(None);
        };
        pass.apply(patch);
        put(&self.passes, id, &pass)?;
        Ok(Some(pass))
    }
}
