mod common;

use common::harness;
use disbursement_signer::application::leasing::ChannelAccountLeaser;
use disbursement_signer::domain::account::{
    AccountType, ChannelAccount, INCREMENT_FOR_MAX_LEDGER_BOUNDS, TransactionAccount,
};
use disbursement_signer::domain::ports::{ChannelAccountStore, ChannelAccountStoreRef};
use disbursement_signer::error::SignerError;
use disbursement_signer::infrastructure::in_memory::{
    InMemoryChannelAccountStore, ManualLedgerNumberTracker,
};
use std::sync::Arc;

#[tokio::test]
async fn test_provisioned_accounts_are_leased_until_bound() {
    let h = harness(5_000, &[AccountType::ChannelAccountStellarDb]);
    let created = h
        .router
        .batch_insert(AccountType::ChannelAccountStellarDb, 3)
        .await
        .unwrap();

    for account in &created {
        let row = h.channel_store.get(&account.address, 0).await.unwrap();
        assert_eq!(row.locked_at_ledger_number, Some(5_000));
        assert_eq!(
            row.locked_until_ledger_number,
            Some(5_000 + INCREMENT_FOR_MAX_LEDGER_BOUNDS)
        );
        // Leased rows are invisible to lease-aware reads.
        assert!(h.channel_store.get(&account.address, 5_000).await.is_err());
    }
}

#[tokio::test]
async fn test_router_delete_fails_once_lease_is_reacquired() {
    let h = harness(5_000, &[AccountType::ChannelAccountStellarDb]);
    let account = h
        .router
        .batch_insert(AccountType::ChannelAccountStellarDb, 1)
        .await
        .unwrap()
        .remove(0);

    // The first lease expires and another worker picks the account up.
    h.tracker.set(5_000 + INCREMENT_FOR_MAX_LEDGER_BOUNDS + 1);
    let leaser = ChannelAccountLeaser::new(h.channel_store.clone(), Arc::new(h.tracker.clone()));
    leaser.lock_one().await.unwrap();
    h.tracker.advance(2);

    let err = h.router.delete(&account).await.unwrap_err();
    assert!(err.is_lease_conflict());
    assert!(h.channel_store.get(&account.address, 0).await.is_ok());
}

#[tokio::test]
async fn test_router_delete_within_lease() {
    let h = harness(5_000, &[AccountType::ChannelAccountStellarDb]);
    let account = h
        .router
        .batch_insert(AccountType::ChannelAccountStellarDb, 1)
        .await
        .unwrap()
        .remove(0);

    h.router.delete(&account).await.unwrap();
    assert!(
        h.router
            .delete(&TransactionAccount::channel(&account.address))
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_two_workers_compete_for_one_account() {
    let store: ChannelAccountStoreRef = Arc::new(InMemoryChannelAccountStore::new());
    store
        .batch_insert_and_lock(vec![ChannelAccount::new("GONLY", "ciphertext")], 1, 1)
        .await
        .unwrap();
    let tracker = Arc::new(ManualLedgerNumberTracker::new(2));

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let leaser = ChannelAccountLeaser::new(store.clone(), tracker.clone());
            tokio::spawn(async move { leaser.lock_one().await })
        })
        .collect();

    let mut leased = 0;
    let mut exhausted = 0;
    for worker in workers {
        match worker.await.unwrap() {
            Ok(account) => {
                assert_eq!(account.public_key, "GONLY");
                leased += 1;
            }
            Err(SignerError::PoolExhausted) => exhausted += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((leased, exhausted), (1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_leases_never_overlap() {
    let store = Arc::new(InMemoryChannelAccountStore::new());
    let accounts = (0..20)
        .map(|i| ChannelAccount::new(format!("G{i:02}"), "ciphertext"))
        .collect();
    store.batch_insert_and_lock(accounts, 1, 1).await.unwrap();
    let tracker = Arc::new(ManualLedgerNumberTracker::new(2));

    let workers: Vec<_> = (0..32)
        .map(|_| {
            let leaser = ChannelAccountLeaser::new(store.clone(), tracker.clone());
            tokio::spawn(async move { leaser.lock_one().await })
        })
        .collect();

    let mut addresses = Vec::new();
    for worker in workers {
        if let Ok(account) = worker.await.unwrap() {
            addresses.push(account.public_key);
        }
    }
    addresses.sort();
    addresses.dedup();
    assert_eq!(addresses.len(), 20);
    assert!(store.get_all(2, 0).await.unwrap().is_empty());
}

#[cfg(feature = "storage-rocksdb")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rocksdb_two_workers_compete_for_one_account() {
    use disbursement_signer::infrastructure::rocksdb::RocksDBStore;

    let dir = tempfile::tempdir().unwrap();
    let store: ChannelAccountStoreRef = Arc::new(RocksDBStore::open(dir.path()).unwrap());
    store
        .batch_insert_and_lock(vec![ChannelAccount::new("GONLY", "ciphertext")], 1, 1)
        .await
        .unwrap();
    let tracker = Arc::new(ManualLedgerNumberTracker::new(2));

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let leaser = ChannelAccountLeaser::new(store.clone(), tracker.clone());
            tokio::spawn(async move { leaser.lock_one().await })
        })
        .collect();

    let mut leased = 0;
    for worker in workers {
        if worker.await.unwrap().is_ok() {
            leased += 1;
        }
    }
    assert_eq!(leased, 1);
}
