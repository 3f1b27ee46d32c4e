use crate::domain::account::{ChannelAccount, INCREMENT_FOR_MAX_LEDGER_BOUNDS};
use crate::domain::ports::{ChannelAccountStoreRef, LedgerNumberTrackerRef};
use crate::error::{Result, ResultExt, SignerError};
use tracing::debug;

/// Ledger-bounded leasing over a channel account pool.
///
/// Every lease ends at `current_ledger + INCREMENT_FOR_MAX_LEDGER_BOUNDS`, the same bound
/// a transaction built from the leased account carries. Expiry is lazy: an expired lease
/// simply makes the row eligible again on the next acquisition.
#[derive(Clone)]
pub struct ChannelAccountLeaser {
    store: ChannelAccountStoreRef,
    tracker: LedgerNumberTrackerRef,
}

impl ChannelAccountLeaser {
    pub fn new(store: ChannelAccountStoreRef, tracker: LedgerNumberTrackerRef) -> Self {
        Self { store, tracker }
    }

    pub fn store(&self) -> &ChannelAccountStoreRef {
        &self.store
    }

    /// The current ledger number and the ledger a lease taken now would end at.
    pub async fn lease_bounds(&self) -> Result<(u32, u32)> {
        let current = self
            .tracker
            .ledger_number()
            .await
            .context(|| "getting current ledger number")?;
        let until = current.checked_add(INCREMENT_FOR_MAX_LEDGER_BOUNDS).ok_or_else(|| {
            SignerError::Validation(format!("ledger number {current} is out of range"))
        })?;
        Ok((current, until))
    }

    /// Inserts fresh accounts already leased to the caller. Returns the lease bound.
    pub async fn provision_and_lock(&self, accounts: Vec<ChannelAccount>) -> Result<u32> {
        let (current, until) = self.lease_bounds().await?;
        let count = accounts.len();
        self.store
            .batch_insert_and_lock(accounts, current, until)
            .await
            .context(|| format!("inserting {count} channel accounts"))?;
        debug!(count, ledger = current, locked_until = until, "provisioned channel accounts");
        Ok(until)
    }

    pub async fn lock_one(&self) -> Result<ChannelAccount> {
        let (current, until) = self.lease_bounds().await?;
        let account = self.store.lock_one(current, until).await?;
        debug!(address = %account.public_key, locked_until = until, "leased channel account");
        Ok(account)
    }

    pub async fn lock_all(&self, limit: usize) -> Result<Vec<ChannelAccount>> {
        let (current, until) = self.lease_bounds().await?;
        let accounts = self.store.lock_all(current, until, limit).await?;
        debug!(count = accounts.len(), locked_until = until, "leased channel accounts");
        Ok(accounts)
    }

    pub async fn lock(&self, public_key: &str) -> Result<ChannelAccount> {
        let (current, until) = self.lease_bounds().await?;
        self.store
            .lock(public_key, current, until)
            .await
            .context(|| format!("locking channel account {public_key}"))
    }

    pub async fn unlock(&self, public_key: &str) -> Result<ChannelAccount> {
        self.store
            .unlock(public_key)
            .await
            .context(|| format!("unlocking channel account {public_key}"))
    }

    /// Deletes the row only while the caller's lease ending at `expected_until` is still
    /// the current one and the network has not moved past it.
    pub async fn delete_if_lease_valid(&self, public_key: &str, expected_until: u32) -> Result<()> {
        let current = self
            .tracker
            .ledger_number()
            .await
            .context(|| "getting current ledger number")?;
        if current > expected_until {
            return Err(SignerError::lease_not_held(public_key, "lease expired"));
        }
        self.store
            .delete_if_locked_until(public_key, expected_until)
            .await
            .context(|| format!("deleting channel account {public_key}"))?;
        debug!(address = public_key, "deleted channel account");
        Ok(())
    }
}
