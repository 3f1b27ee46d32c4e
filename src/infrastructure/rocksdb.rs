use crate::domain::account::{ChannelAccount, DistributionSignatory};
use crate::domain::ports::{ChannelAccountStore, DistributionVault};
use crate::error::{Result, SignerError};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Column Family for the channel account pool.
pub const CF_CHANNEL_ACCOUNTS: &str = "channel_accounts";
/// Column Family for the distribution account vault.
pub const CF_DISTRIBUTION_SIGNATORIES: &str = "distribution_signatories";

/// A persistent store implementation using RocksDB.
///
/// Holds both the channel account pool and the distribution vault in separate Column
/// Families, keyed by public key with JSON values.
///
/// RocksDB allows a single process per database, so lease exclusivity is enforced with a
/// store-wide write mutex: each conditional update reads, checks and commits one
/// `WriteBatch` while holding it.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| SignerError::Storage(format!("Serialization error: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| SignerError::Storage(format!("Deserialization error: {}", e)))
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_channel = ColumnFamilyDescriptor::new(CF_CHANNEL_ACCOUNTS, Options::default());
        let cf_vault = ColumnFamilyDescriptor::new(CF_DISTRIBUTION_SIGNATORIES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_channel, cf_vault])?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| SignerError::Storage(format!("{} column family not found", name)))
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_guard
            .lock()
            .map_err(|_| SignerError::Storage("write guard poisoned".into()))
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_channel_accounts(&self) -> Result<Vec<ChannelAccount>> {
        let cf = self.cf(CF_CHANNEL_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            accounts.push(decode(&value)?);
        }
        Ok(accounts)
    }

    fn write_channel_accounts<'a>(
        &self,
        accounts: impl IntoIterator<Item = &'a ChannelAccount>,
    ) -> Result<()> {
        let cf = self.cf(CF_CHANNEL_ACCOUNTS)?;
        let mut batch = WriteBatch::default();
        for account in accounts {
            batch.put_cf(cf, account.public_key.as_bytes(), encode(account)?);
        }
        self.db.write(batch)?;
        Ok(())
    }

    fn insert_and_lock_sync(
        &self,
        mut accounts: Vec<ChannelAccount>,
        current_ledger: u32,
        locked_until: u32,
    ) -> Result<()> {
        let _guard = self.guard()?;
        {
            let mut seen = HashSet::new();
            for account in &accounts {
                if account.public_key.is_empty() || account.encrypted_private_key.is_empty() {
                    return Err(SignerError::Validation(
                        "public key and private key cannot be empty".into(),
                    ));
                }
                if !seen.insert(account.public_key.as_str())
                    || self
                        .read::<ChannelAccount>(CF_CHANNEL_ACCOUNTS, &account.public_key)?
                        .is_some()
                {
                    return Err(SignerError::Validation(format!(
                        "channel account {:?} already exists",
                        account.public_key
                    )));
                }
            }
        }
        for account in &mut accounts {
            account.lock(current_ledger, locked_until);
        }
        self.write_channel_accounts(&accounts)
    }

    fn lock_sync(
        &self,
        public_key: &str,
        current_ledger: u32,
        locked_until: u32,
    ) -> Result<ChannelAccount> {
        let _guard = self.guard()?;
        let mut account: ChannelAccount = self
            .read(CF_CHANNEL_ACCOUNTS, public_key)?
            .ok_or_else(|| SignerError::not_found("channel account", public_key))?;
        if account.is_locked(current_ledger) {
            return Err(SignerError::lease_not_held(
                public_key,
                "already leased by another holder",
            ));
        }
        account.lock(current_ledger, locked_until);
        self.write_channel_accounts([&account])?;
        Ok(account)
    }

    fn lock_many_sync(
        &self,
        current_ledger: u32,
        locked_until: u32,
        limit: usize,
    ) -> Result<Vec<ChannelAccount>> {
        let _guard = self.guard()?;
        let limit = if limit == 0 { usize::MAX } else { limit };
        let mut locked: Vec<ChannelAccount> = self
            .scan_channel_accounts()?
            .into_iter()
            .filter(|account| account.is_available(current_ledger))
            .take(limit)
            .collect();
        if locked.is_empty() {
            return Err(SignerError::PoolExhausted);
        }
        for account in &mut locked {
            account.lock(current_ledger, locked_until);
        }
        self.write_channel_accounts(&locked)?;
        Ok(locked)
    }

    fn unlock_sync(&self, public_key: &str) -> Result<ChannelAccount> {
        let _guard = self.guard()?;
        let mut account: ChannelAccount = self
            .read(CF_CHANNEL_ACCOUNTS, public_key)?
            .ok_or_else(|| SignerError::not_found("channel account", public_key))?;
        account.unlock();
        self.write_channel_accounts([&account])?;
        Ok(account)
    }

    fn delete_sync(&self, public_key: &str, locked_until: Option<u32>) -> Result<()> {
        let _guard = self.guard()?;
        let account: ChannelAccount = self
            .read(CF_CHANNEL_ACCOUNTS, public_key)?
            .ok_or_else(|| SignerError::not_found("channel account", public_key))?;
        if let Some(expected) = locked_until
            && account.locked_until_ledger_number != Some(expected)
        {
            return Err(SignerError::lease_bound_mismatch(public_key, expected));
        }
        let cf = self.cf(CF_CHANNEL_ACCOUNTS)?;
        self.db.delete_cf(cf, public_key.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl ChannelAccountStore for RocksDBStore {
    async fn batch_insert_and_lock(
        &self,
        accounts: Vec<ChannelAccount>,
        current_ledger: u32,
        locked_until: u32,
    ) -> Result<()> {
        self.insert_and_lock_sync(accounts, current_ledger, locked_until)
    }

    async fn get(&self, public_key: &str, current_ledger: u32) -> Result<ChannelAccount> {
        self.read::<ChannelAccount>(CF_CHANNEL_ACCOUNTS, public_key)?
            .filter(|account| current_ledger == 0 || account.is_available(current_ledger))
            .ok_or_else(|| SignerError::not_found("channel account", public_key))
    }

    async fn get_all(&self, current_ledger: u32, limit: usize) -> Result<Vec<ChannelAccount>> {
        let limit = if limit == 0 { usize::MAX } else { limit };
        Ok(self
            .scan_channel_accounts()?
            .into_iter()
            .filter(|account| current_ledger == 0 || account.is_available(current_ledger))
            .take(limit)
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let cf = self.cf(CF_CHANNEL_ACCOUNTS)?;
        let mut count = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    async fn lock(
        &self,
        public_key: &str,
        current_ledger: u32,
        locked_until: u32,
    ) -> Result<ChannelAccount> {
        self.lock_sync(public_key, current_ledger, locked_until)
    }

    async fn lock_one(&self, current_ledger: u32, locked_until: u32) -> Result<ChannelAccount> {
        let mut locked = self.lock_many_sync(current_ledger, locked_until, 1)?;
        locked.pop().ok_or(SignerError::PoolExhausted)
    }

    async fn lock_all(
        &self,
        current_ledger: u32,
        locked_until: u32,
        limit: usize,
    ) -> Result<Vec<ChannelAccount>> {
        self.lock_many_sync(current_ledger, locked_until, limit)
    }

    async fn unlock(&self, public_key: &str) -> Result<ChannelAccount> {
        self.unlock_sync(public_key)
    }

    async fn delete(&self, public_key: &str) -> Result<()> {
        self.delete_sync(public_key, None)
    }

    async fn delete_if_locked_until(&self, public_key: &str, locked_until: u32) -> Result<()> {
        self.delete_sync(public_key, Some(locked_until))
    }
}

#[async_trait]
impl DistributionVault for RocksDBStore {
    async fn batch_insert(&self, entries: Vec<DistributionSignatory>) -> Result<()> {
        let _guard = self.guard()?;
        let cf = self.cf(CF_DISTRIBUTION_SIGNATORIES)?;
        let mut batch = WriteBatch::default();
        for entry in &entries {
            if entry.public_key.is_empty() || entry.encrypted_private_key.is_empty() {
                return Err(SignerError::Validation(
                    "vault entries need a public key and an encrypted private key".into(),
                ));
            }
            if self.db.get_pinned_cf(cf, entry.public_key.as_bytes())?.is_some() {
                return Err(SignerError::Validation(format!(
                    "distribution account {:?} already exists",
                    entry.public_key
                )));
            }
            batch.put_cf(cf, entry.public_key.as_bytes(), encode(entry)?);
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, public_key: &str) -> Result<DistributionSignatory> {
        self.read(CF_DISTRIBUTION_SIGNATORIES, public_key)?
            .ok_or_else(|| SignerError::not_found("distribution account", public_key))
    }

    async fn delete(&self, public_key: &str) -> Result<()> {
        let _guard = self.guard()?;
        let cf = self.cf(CF_DISTRIBUTION_SIGNATORIES)?;
        if self.db.get_pinned_cf(cf, public_key.as_bytes())?.is_none() {
            return Err(SignerError::not_found("distribution account", public_key));
        }
        self.db.delete_cf(cf, public_key.as_bytes())?;
        Ok(())
    }
}
