use crate::domain::account::{ChannelAccount, DistributionSignatory};
use crate::domain::ports::{
    ChannelAccountStore, DistributionVault, LedgerAccountLookup, LedgerNumberTracker, TenantStore,
};
use crate::domain::tenant::Tenant;
use crate::error::{Result, SignerError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

fn validate_new_channel_account(account: &ChannelAccount) -> Result<()> {
    if account.public_key.is_empty() {
        return Err(SignerError::Validation("public key cannot be empty".into()));
    }
    if account.encrypted_private_key.is_empty() {
        return Err(SignerError::Validation("private key cannot be empty".into()));
    }
    Ok(())
}

/// A thread-safe in-memory pool of channel accounts.
///
/// Every lease mutation runs under one write guard with no await point in between, so a
/// conditional update either fully applies or never happens, even if the caller is cancelled.
#[derive(Default, Clone)]
pub struct InMemoryChannelAccountStore {
    accounts: Arc<RwLock<BTreeMap<String, ChannelAccount>>>,
}

impl InMemoryChannelAccountStore {
    /// Creates a new, empty in-memory channel account store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelAccountStore for InMemoryChannelAccountStore {
    async fn batch_insert_and_lock(
        &self,
        accounts: Vec<ChannelAccount>,
        current_ledger: u32,
        locked_until: u32,
    ) -> Result<()> {
        let mut rows = self.accounts.write().await;
        {
            let mut seen = HashSet::new();
            for account in &accounts {
                validate_new_channel_account(account)?;
                if rows.contains_key(&account.public_key) || !seen.insert(&account.public_key) {
                    return Err(SignerError::Validation(format!(
                        "channel account {:?} already exists",
                        account.public_key
                    )));
                }
            }
        }

        for mut account in accounts {
            account.lock(current_ledger, locked_until);
            rows.insert(account.public_key.clone(), account);
        }
        Ok(())
    }

    async fn get(&self, public_key: &str, current_ledger: u32) -> Result<ChannelAccount> {
        let rows = self.accounts.read().await;
        rows.get(public_key)
            .filter(|account| current_ledger == 0 || account.is_available(current_ledger))
            .cloned()
            .ok_or_else(|| SignerError::not_found("channel account", public_key))
    }

    async fn get_all(&self, current_ledger: u32, limit: usize) -> Result<Vec<ChannelAccount>> {
        let rows = self.accounts.read().await;
        let available = rows
            .values()
            .filter(|account| current_ledger == 0 || account.is_available(current_ledger))
            .cloned();
        Ok(if limit > 0 {
            available.take(limit).collect()
        } else {
            available.collect()
        })
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.accounts.read().await.len())
    }

    async fn lock(
        &self,
        public_key: &str,
        current_ledger: u32,
        locked_until: u32,
    ) -> Result<ChannelAccount> {
        let mut rows = self.accounts.write().await;
        let account = rows
            .get_mut(public_key)
            .ok_or_else(|| SignerError::not_found("channel account", public_key))?;
        if account.is_locked(current_ledger) {
            return Err(SignerError::lease_not_held(
                public_key,
                "already leased by another holder",
            ));
        }
        account.lock(current_ledger, locked_until);
        Ok(account.clone())
    }

    async fn lock_one(&self, current_ledger: u32, locked_until: u32) -> Result<ChannelAccount> {
        let mut rows = self.accounts.write().await;
        let account = rows
            .values_mut()
            .find(|account| account.is_available(current_ledger))
            .ok_or(SignerError::PoolExhausted)?;
        account.lock(current_ledger, locked_until);
        Ok(account.clone())
    }

    async fn lock_all(
        &self,
        current_ledger: u32,
        locked_until: u32,
        limit: usize,
    ) -> Result<Vec<ChannelAccount>> {
        let mut rows = self.accounts.write().await;
        let limit = if limit == 0 { usize::MAX } else { limit };
        let locked: Vec<ChannelAccount> = rows
            .values_mut()
            .filter(|account| account.is_available(current_ledger))
            .take(limit)
            .map(|account| {
                account.lock(current_ledger, locked_until);
                account.clone()
            })
            .collect();

        if locked.is_empty() {
            return Err(SignerError::PoolExhausted);
        }
        Ok(locked)
    }

    async fn unlock(&self, public_key: &str) -> Result<ChannelAccount> {
        let mut rows = self.accounts.write().await;
        let account = rows
            .get_mut(public_key)
            .ok_or_else(|| SignerError::not_found("channel account", public_key))?;
        account.unlock();
        Ok(account.clone())
    }

    async fn delete(&self, public_key: &str) -> Result<()> {
        let mut rows = self.accounts.write().await;
        rows.remove(public_key)
            .map(|_| ())
            .ok_or_else(|| SignerError::not_found("channel account", public_key))
    }

    async fn delete_if_locked_until(&self, public_key: &str, locked_until: u32) -> Result<()> {
        let mut rows = self.accounts.write().await;
        let account = rows
            .get(public_key)
            .ok_or_else(|| SignerError::not_found("channel account", public_key))?;
        if account.locked_until_ledger_number != Some(locked_until) {
            return Err(SignerError::lease_bound_mismatch(public_key, locked_until));
        }
        rows.remove(public_key);
        Ok(())
    }
}

/// A thread-safe in-memory vault of distribution account keys.
#[derive(Default, Clone)]
pub struct InMemoryDistributionVault {
    entries: Arc<RwLock<HashMap<String, DistributionSignatory>>>,
}

impl InMemoryDistributionVault {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributionVault for InMemoryDistributionVault {
    async fn batch_insert(&self, entries: Vec<DistributionSignatory>) -> Result<()> {
        let mut rows = self.entries.write().await;
        for entry in &entries {
            if entry.public_key.is_empty() || entry.encrypted_private_key.is_empty() {
                return Err(SignerError::Validation(
                    "vault entries need a public key and an encrypted private key".into(),
                ));
            }
            if rows.contains_key(&entry.public_key) {
                return Err(SignerError::Validation(format!(
                    "distribution account {:?} already exists",
                    entry.public_key
                )));
            }
        }
        rows.extend(
            entries
                .into_iter()
                .map(|entry| (entry.public_key.clone(), entry)),
        );
        Ok(())
    }

    async fn get(&self, public_key: &str) -> Result<DistributionSignatory> {
        let rows = self.entries.read().await;
        rows.get(public_key)
            .cloned()
            .ok_or_else(|| SignerError::not_found("distribution account", public_key))
    }

    async fn delete(&self, public_key: &str) -> Result<()> {
        let mut rows = self.entries.write().await;
        rows.remove(public_key)
            .map(|_| ())
            .ok_or_else(|| SignerError::not_found("distribution account", public_key))
    }
}

/// Tenant lookup backed by a map, for tests and single-tenant deployments.
#[derive(Default, Clone)]
pub struct InMemoryTenantStore {
    tenants: Arc<RwLock<HashMap<String, Tenant>>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, tenant: Tenant) {
        self.tenants.write().await.insert(tenant.id.clone(), tenant);
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn tenant_by_id(&self, tenant_id: &str) -> Result<Tenant> {
        self.tenants
            .read()
            .await
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| SignerError::not_found("tenant", tenant_id))
    }
}

/// Ledger number source that only moves when told to.
#[derive(Debug, Default, Clone)]
pub struct ManualLedgerNumberTracker {
    ledger: Arc<AtomicU32>,
}

impl ManualLedgerNumberTracker {
    pub fn new(ledger: u32) -> Self {
        Self {
            ledger: Arc::new(AtomicU32::new(ledger)),
        }
    }

    pub fn set(&self, ledger: u32) {
        self.ledger.store(ledger, Ordering::SeqCst);
    }

    pub fn advance(&self, by: u32) -> u32 {
        self.ledger.fetch_add(by, Ordering::SeqCst) + by
    }
}

#[async_trait]
impl LedgerNumberTracker for ManualLedgerNumberTracker {
    async fn ledger_number(&self) -> Result<u32> {
        match self.ledger.load(Ordering::SeqCst) {
            0 => Err(SignerError::Validation(
                "ledger number has not been set".into(),
            )),
            ledger => Ok(ledger),
        }
    }
}

/// Set of addresses that exist on the ledger.
#[derive(Default, Clone)]
pub struct InMemoryLedgerAccounts {
    addresses: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryLedgerAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, address: impl Into<String>) {
        self.addresses.write().await.insert(address.into());
    }
}

#[async_trait]
impl LedgerAccountLookup for InMemoryLedgerAccounts {
    async fn account_exists(&self, address: &str) -> Result<bool> {
        Ok(self.addresses.read().await.contains(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(public_key: &str) -> ChannelAccount {
        ChannelAccount::new(public_key, "ciphertext")
    }

    #[tokio::test]
    async fn test_batch_insert_and_lock() {
        let store = InMemoryChannelAccountStore::new();
        store
            .batch_insert_and_lock(vec![account("GA"), account("GB")], 100, 110)
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let a = store.get("GA", 0).await.unwrap();
        assert_eq!(a.locked_at_ledger_number, Some(100));
        assert_eq!(a.locked_until_ledger_number, Some(110));

        // Leased rows are hidden from lease-aware reads.
        assert!(store.get("GA", 105).await.unwrap_err().is_not_found());
        assert!(store.get("GA", 111).await.is_ok());
    }

    #[tokio::test]
    async fn test_batch_insert_is_all_or_nothing() {
        let store = InMemoryChannelAccountStore::new();
        store
            .batch_insert_and_lock(vec![account("GA")], 100, 110)
            .await
            .unwrap();

        let result = store
            .batch_insert_and_lock(vec![account("GB"), account("GA")], 100, 110)
            .await;
        assert!(matches!(result, Err(SignerError::Validation(_))));
        assert_eq!(store.count().await.unwrap(), 1);

        let result = store
            .batch_insert_and_lock(vec![ChannelAccount::new("GC", "")], 100, 110)
            .await;
        assert!(matches!(result, Err(SignerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_lock_one_and_exhaustion() {
        let store = InMemoryChannelAccountStore::new();
        store
            .batch_insert_and_lock(vec![account("GA")], 100, 110)
            .await
            .unwrap();
        store.unlock("GA").await.unwrap();

        let leased = store.lock_one(100, 110).await.unwrap();
        assert_eq!(leased.public_key, "GA");
        assert!(matches!(
            store.lock_one(100, 110).await,
            Err(SignerError::PoolExhausted)
        ));

        // Expired leases are reacquired lazily.
        let leased = store.lock_one(111, 121).await.unwrap();
        assert_eq!(leased.locked_until_ledger_number, Some(121));
    }

    #[tokio::test]
    async fn test_lock_all_respects_limit() {
        let store = InMemoryChannelAccountStore::new();
        store
            .batch_insert_and_lock(vec![account("GA"), account("GB"), account("GC")], 1, 5)
            .await
            .unwrap();

        let leased = store.lock_all(10, 20, 2).await.unwrap();
        assert_eq!(leased.len(), 2);
        let leased = store.lock_all(10, 20, 0).await.unwrap();
        assert_eq!(leased.len(), 1);
        assert!(matches!(
            store.lock_all(10, 20, 0).await,
            Err(SignerError::PoolExhausted)
        ));
    }

    #[tokio::test]
    async fn test_lock_conflict() {
        let store = InMemoryChannelAccountStore::new();
        store
            .batch_insert_and_lock(vec![account("GA")], 100, 110)
            .await
            .unwrap();

        let err = store.lock("GA", 105, 115).await.unwrap_err();
        assert!(err.is_lease_conflict());
        assert!(store.lock("GZ", 105, 115).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_if_locked_until() {
        let store = InMemoryChannelAccountStore::new();
        store
            .batch_insert_and_lock(vec![account("GA")], 100, 110)
            .await
            .unwrap();

        let err = store.delete_if_locked_until("GA", 111).await.unwrap_err();
        assert!(err.is_lease_conflict());
        assert!(err.is_not_found());
        assert!(matches!(
            err,
            SignerError::LeaseBoundMismatch { locked_until: 111, .. }
        ));
        store.delete_if_locked_until("GA", 110).await.unwrap();
        assert!(store.get("GA", 0).await.unwrap_err().is_not_found());
        assert!(
            store
                .delete_if_locked_until("GA", 110)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_in_memory_distribution_vault() {
        let vault = InMemoryDistributionVault::new();
        let entry = DistributionSignatory {
            public_key: "GA".into(),
            encrypted_private_key: "ciphertext".into(),
        };

        vault.batch_insert(vec![entry.clone()]).await.unwrap();
        assert_eq!(vault.get("GA").await.unwrap(), entry);
        assert!(vault.batch_insert(vec![entry]).await.is_err());

        vault.delete("GA").await.unwrap();
        assert!(vault.get("GA").await.unwrap_err().is_not_found());
        assert!(vault.delete("GA").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_manual_ledger_number_tracker() {
        let tracker = ManualLedgerNumberTracker::default();
        assert!(tracker.ledger_number().await.is_err());

        tracker.set(100);
        assert_eq!(tracker.advance(5), 105);
        assert_eq!(tracker.ledger_number().await.unwrap(), 105);
    }
}
