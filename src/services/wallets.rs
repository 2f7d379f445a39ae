//! Wallet registration, holdings, subscriptions and NFT passes

use crate::clock::Clock;
use crate::errors::{Result, ShieldError};
use crate::payment::next_payment_due;
use crate::storage::Repository;
use crate::types::{
    NewNftPass, NewWallet, NftPass, NftPassPatch, PaidTier, SubscriptionStatus, Transaction,
    Wallet, WalletPatch,
};
use std::sync::Arc;
use tracing::{debug, info};

pub struct WalletService {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl WalletService {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Get-or-create by address
    pub async fn connect(&self, new: NewWallet) -> Result<Wallet> {
        if new.address.trim().is_empty() {
            return Err(ShieldError::validation("wallet address is required"));
        }
        if !new.cath_balance.is_finite() || new.cath_balance < 0.0 {
            return Err(ShieldError::validation("CATH balance must be a non-negative number"));
        }
        if let Some(existing) = self.repo.get_wallet_by_address(&new.address).await? {
            debug!(wallet = %existing.address, "Wallet already registered");
            return Ok(existing);
        }
        let wallet = self.repo.insert_wallet(new.into_wallet(self.clock.now())).await?;
        info!(wallet = %wallet.address, id = %wallet.id, "👛 Wallet connected");
        Ok(wallet)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Wallet>> {
        Ok(self.repo.get_wallet(id).await?)
    }

    pub async fn get_by_address(&self, address: &str) -> Result<Option<Wallet>> {
        Ok(self.repo.get_wallet_by_address(address).await?)
    }

    /// Record a new CATH balance reading
    ///
    /// The cached tier is not touched; call the tier service to refresh it.
    pub async fn update_holdings(&self, wallet_id: &str, cath_balance: f64) -> Result<Option<Wallet>> {
        if !cath_balance.is_finite() || cath_balance < 0.0 {
            return Err(ShieldError::validation("CATH balance must be a non-negative number"));
        }
        let patch = WalletPatch {
            cath_balance: Some(cath_balance),
            ..Default::default()
        };
        Ok(self.repo.update_wallet(wallet_id, &patch).await?)
    }

    /// Start or renew a paid subscription; next due is the first of next month
    pub async fn subscribe(&self, wallet_id: &str, tier: PaidTier) -> Result<Option<Wallet>> {
        if tier == PaidTier::None {
            return Err(ShieldError::validation("subscription tier must be pro or pro_plus"));
        }
        let patch = WalletPatch {
            paid_tier: Some(tier),
            paid_tier_status: Some(SubscriptionStatus::Current),
            paid_tier_next_due: Some(Some(next_payment_due(self.clock.now()))),
            ..Default::default()
        };
        Ok(self.repo.update_wallet(wallet_id, &patch).await?)
    }

    pub async fn set_subscription_status(
        &self,
        wallet_id: &str,
        status: SubscriptionStatus,
    ) -> Result<Option<Wallet>> {
        let mut patch = WalletPatch {
            paid_tier_status: Some(status),
            ..Default::default()
        };
        if status == SubscriptionStatus::Canceled {
            patch.paid_tier_next_due = Some(None);
        }
        Ok(self.repo.update_wallet(wallet_id, &patch).await?)
    }

    pub async fn transactions(&self, wallet_id: &str) -> Result<Vec<Transaction>> {
        Ok(self.repo.transactions_by_wallet(wallet_id).await?)
    }

    /// Attach a pass to an existing wallet
    pub async fn add_pass(&self, pass: NewNftPass) -> Result<NftPass> {
        if self.repo.get_wallet(&pass.wallet_id).await?.is_none() {
            return Err(ShieldError::not_found("wallet", pass.wallet_id));
        }
        if pass.mint_address.trim().is_empty() {
            return Err(ShieldError::validation("pass mint address is required"));
        }
        let pass = self.repo.insert_pass(pass.into_pass(self.clock.now())).await?;
        info!(wallet_id = %pass.wallet_id, pass = %pass.pass_name, benefit = ?pass.benefit_type, "🎟️ NFT pass added");
        Ok(pass)
    }

    pub async fn deactivate_pass(&self, pass_id: &str) -> Result<Option<NftPass>> {
        let patch = NftPassPatch {
            is_active: Some(false),
            ..Default::default()
        };
        Ok(self.repo.update_pass(pass_id, &patch).await?)
    }

    pub async fn passes(&self, wallet_id: &str) -> Result<Vec<NftPass>> {
        Ok(self.repo.passes_by_wallet(wallet_id).await?)
    }
}
