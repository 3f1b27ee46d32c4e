use super::account::{ChannelAccount, DistributionSignatory};
use super::tenant::Tenant;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Pool of leasable channel accounts.
///
/// Every lease mutation must be a single atomic conditional update: two callers can
/// never both observe success for the same row.
#[async_trait]
pub trait ChannelAccountStore: Send + Sync {
    /// Inserts the accounts already leased until `locked_until`. All rows or none.
    async fn batch_insert_and_lock(
        &self,
        accounts: Vec<ChannelAccount>,
        current_ledger: u32,
        locked_until: u32,
    ) -> Result<()>;
    /// Fetches an account. With `current_ledger == 0` the lease filter is bypassed,
    /// otherwise only an available account is returned.
    async fn get(&self, public_key: &str, current_ledger: u32) -> Result<ChannelAccount>;
    /// Lists accounts (available ones only, unless `current_ledger == 0`). `limit == 0` means all.
    async fn get_all(&self, current_ledger: u32, limit: usize) -> Result<Vec<ChannelAccount>>;
    async fn count(&self) -> Result<usize>;
    async fn lock(
        &self,
        public_key: &str,
        current_ledger: u32,
        locked_until: u32,
    ) -> Result<ChannelAccount>;
    /// Leases one available account, or fails with `PoolExhausted`.
    async fn lock_one(&self, current_ledger: u32, locked_until: u32) -> Result<ChannelAccount>;
    /// Leases up to `limit` available accounts (`0` = all), or fails with `PoolExhausted`.
    async fn lock_all(
        &self,
        current_ledger: u32,
        locked_until: u32,
        limit: usize,
    ) -> Result<Vec<ChannelAccount>>;
    async fn unlock(&self, public_key: &str) -> Result<ChannelAccount>;
    async fn delete(&self, public_key: &str) -> Result<()>;
    /// Deletes the row only while its lease still ends at `locked_until`.
    async fn delete_if_locked_until(&self, public_key: &str, locked_until: u32) -> Result<()>;
}

/// Lease-free storage for distribution account keys.
#[async_trait]
pub trait DistributionVault: Send + Sync {
    async fn batch_insert(&self, entries: Vec<DistributionSignatory>) -> Result<()>;
    async fn get(&self, public_key: &str) -> Result<DistributionSignatory>;
    async fn delete(&self, public_key: &str) -> Result<()>;
}

#[async_trait]
pub trait LedgerNumberTracker: Send + Sync {
    async fn ledger_number(&self) -> Result<u32>;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn tenant_by_id(&self, tenant_id: &str) -> Result<Tenant>;
}

/// Answers whether an account exists on the ledger.
#[async_trait]
pub trait LedgerAccountLookup: Send + Sync {
    async fn account_exists(&self, address: &str) -> Result<bool>;
}

/// Symmetric, authenticated encryption of private keys under a passphrase.
pub trait PrivateKeyEncrypter: Send + Sync {
    fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str, passphrase: &str) -> Result<Zeroizing<String>>;
}

pub type ChannelAccountStoreRef = Arc<dyn ChannelAccountStore>;
pub type DistributionVaultRef = Arc<dyn DistributionVault>;
pub type LedgerNumberTrackerRef = Arc<dyn LedgerNumberTracker>;
pub type TenantStoreRef = Arc<dyn TenantStore>;
pub type PrivateKeyEncrypterRef = Arc<dyn PrivateKeyEncrypter>;
pub type LedgerAccountLookupRef = Arc<dyn LedgerAccountLookup>;
