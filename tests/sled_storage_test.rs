//! Integration tests for the sled-backed repository

use cath_shield::errors::StorageError;
use cath_shield::storage::{Repository, SledStorage};
use cath_shield::types::{
    ArbitrageBot, BenefitType, BotPatch, BotStrategy, NewNftPass, NewWallet, NftPassPatch,
    PaymentStatus, ThreatLevel, Tier, TokenClassification, Transaction, WalletPatch,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 0).unwrap()
}

fn transaction(id: &str, wallet_id: &str, at: DateTime<Utc>) -> Transaction {
    Transaction {
        id: id.to_string(),
        wallet_id: wallet_id.to_string(),
        signature: "sig".to_string(),
        token_address: "1111Token".to_string(),
        token_name: "Mystery Box Reward".to_string(),
        token_symbol: "FAKE".to_string(),
        amount: "42.00".to_string(),
        timestamp: at,
        local_classification: TokenClassification::Block,
        local_threat_level: ThreatLevel::Blocked,
        local_reason: "Spam detected".to_string(),
        deep3_classification: None,
        deep3_threat_score: Some(88),
        deep3_reason: None,
        deep3_metadata: Some("{\"contractAge\":3}".to_string()),
        final_classification: TokenClassification::Block,
        final_threat_level: ThreatLevel::Blocked,
        blocked: true,
    }
}

fn bot(id: &str, wallet_id: &str, created_at: DateTime<Utc>) -> ArbitrageBot {
    ArbitrageBot {
        id: id.to_string(),
        wallet_id: wallet_id.to_string(),
        bot_name: format!("Bot {}", id),
        active: false,
        wallet_address: "Addr".to_string(),
        strategy: BotStrategy::LiquidityProvision,
        min_profit_threshold: 0.01,
        max_risk_score: 40,
        max_trade_size: 5.0,
        slippage_tolerance: 0.5,
        target_pairs: vec!["SOL/USDC".to_string()],
        dex_allowlist: vec!["orca".to_string()],
        auto_pause_config: None,
        payment_status: PaymentStatus::Current,
        is_included_bot: true,
        inactive_since: Some(created_at),
        next_payment_due: created_at,
        created_at,
    }
}

#[tokio::test]
async fn test_wallets_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shield.db");

    let wallet_id = {
        let store = SledStorage::open(&path).unwrap();
        let wallet = store
            .insert_wallet(NewWallet::new("Persisted").with_cath_balance(75.0).into_wallet(t0()))
            .await
            .unwrap();
        let patch = WalletPatch {
            tier: Some(Tier::Pro),
            nickname: Some(Some("main".to_string())),
            ..Default::default()
        };
        store.update_wallet(&wallet.id, &patch).await.unwrap().unwrap();
        store.flush().await.unwrap();
        wallet.id
    };

    let store = SledStorage::open(&path).unwrap();
    let wallet = store.get_wallet_by_address("Persisted").await.unwrap().unwrap();
    assert_eq!(wallet.id, wallet_id);
    assert_eq!(wallet.tier, Tier::Pro);
    assert_eq!(wallet.nickname.as_deref(), Some("main"));
    assert_eq!(wallet.cath_balance, 75.0);
    assert_eq!(wallet.connected_at, t0());
}

#[tokio::test]
async fn test_duplicate_address_conflicts() {
    let store = SledStorage::temporary().unwrap();
    store
        .insert_wallet(NewWallet::new("Twin").into_wallet(t0()))
        .await
        .unwrap();
    let err = store
        .insert_wallet(NewWallet::new("Twin").into_wallet(t0()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));

    let wallet = store.get_wallet_by_address("Twin").await.unwrap().unwrap();
    assert!(store.delete_wallet(&wallet.id).await.unwrap());
    assert!(store.get_wallet_by_address("Twin").await.unwrap().is_none());
    assert!(!store.delete_wallet(&wallet.id).await.unwrap());
}

#[tokio::test]
async fn test_transactions_newest_first() {
    let store = SledStorage::temporary().unwrap();
    for (i, minutes) in [5, 1, 9].iter().enumerate() {
        store
            .insert_transaction(transaction(&format!("tx{}", i), "w1", t0() + Duration::minutes(*minutes)))
            .await
            .unwrap();
    }
    store
        .insert_transaction(transaction("other", "w2", t0()))
        .await
        .unwrap();

    let txs = store.transactions_by_wallet("w1").await.unwrap();
    let ids: Vec<&str> = txs.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["tx2", "tx0", "tx1"]);
    assert_eq!(txs[0].deep3_threat_score, Some(88));
    assert!(store.get_transaction("other").await.unwrap().is_some());
}

#[tokio::test]
async fn test_bot_crud_in_creation_order() {
    let store = SledStorage::temporary().unwrap();
    store.insert_bot(bot("late", "w1", t0() + Duration::hours(2))).await.unwrap();
    store.insert_bot(bot("early", "w1", t0())).await.unwrap();
    store.insert_bot(bot("foreign", "w2", t0())).await.unwrap();

    let ids: Vec<String> = store
        .bots_by_wallet("w1")
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(ids, vec!["early", "late"]);
    assert_eq!(store.all_bots().await.unwrap().len(), 3);

    let patch = BotPatch {
        active: Some(true),
        inactive_since: Some(None),
        ..Default::default()
    };
    let updated = store.update_bot("early", &patch).await.unwrap().unwrap();
    assert!(updated.active);
    assert_eq!(updated.inactive_since, None);
    assert!(store.update_bot("ghost", &patch).await.unwrap().is_none());

    assert!(store.delete_bot("late").await.unwrap());
    assert!(!store.delete_bot("late").await.unwrap());
}

#[tokio::test]
async fn test_passes_filter_active() {
    let store = SledStorage::temporary().unwrap();
    let keep = store
        .insert_pass(NewNftPass::new("w1", "MintA", "Keep", BenefitType::FeeWaiver).into_pass(t0()))
        .await
        .unwrap();
    let revoked = store
        .insert_pass(
            NewNftPass::new("w1", "MintB", "Drop", BenefitType::TierUpgrade)
                .tier_upgrade(Tier::ProPlus)
                .into_pass(t0() + Duration::seconds(1)),
        )
        .await
        .unwrap();

    let patch = NftPassPatch {
        is_active: Some(false),
        ..Default::default()
    };
    store.update_pass(&revoked.id, &patch).await.unwrap().unwrap();

    assert_eq!(store.passes_by_wallet("w1").await.unwrap().len(), 2);
    let active = store.active_passes("w1").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, keep.id);
    assert_eq!(store.get_pass(&revoked.id).await.unwrap().unwrap().tier_upgrade, Some(Tier::ProPlus));
}
