use crate::application::leasing::ChannelAccountLeaser;
use crate::application::signing::SignerRouter;
use crate::domain::account::{AccountType, ChannelAccount};
use crate::domain::ports::{ChannelAccountStoreRef, LedgerAccountLookupRef, LedgerNumberTrackerRef};
use crate::error::{Result, ResultExt, SignerError};
use std::cmp::Ordering;
use tracing::{info, warn};

/// Upper bound on the size of the channel account pool.
pub const MAX_CHANNEL_ACCOUNTS: usize = 1000;

/// Administration of the channel account pool: growing, shrinking, listing and
/// reconciling it against the ledger.
///
/// Rows are always leased before they are deleted, so an account in use by a
/// submission worker is never removed from under it.
pub struct ChannelAccountsService {
    router: SignerRouter,
    leaser: ChannelAccountLeaser,
    ledger_accounts: Option<LedgerAccountLookupRef>,
}

impl ChannelAccountsService {
    /// `store` and `tracker` must be the ones the router's channel account strategy uses.
    pub fn new(
        router: SignerRouter,
        store: ChannelAccountStoreRef,
        tracker: LedgerNumberTrackerRef,
    ) -> Result<Self> {
        router
            .route_signer(AccountType::ChannelAccountStellarDb)
            .context(|| "channel account administration")?;
        Ok(Self {
            router,
            leaser: ChannelAccountLeaser::new(store, tracker),
            ledger_accounts: None,
        })
    }

    pub fn with_ledger_accounts(mut self, ledger_accounts: LedgerAccountLookupRef) -> Self {
        self.ledger_accounts = Some(ledger_accounts);
        self
    }

    /// Provisions `count` accounts and releases them into the pool.
    pub async fn create_channel_accounts(&self, count: usize) -> Result<Vec<String>> {
        if count > MAX_CHANNEL_ACCOUNTS {
            return Err(SignerError::Validation(format!(
                "cannot create more than {MAX_CHANNEL_ACCOUNTS} channel accounts"
            )));
        }
        let number = i64::try_from(count)
            .map_err(|_| SignerError::Validation(format!("invalid channel account count {count}")))?;

        let accounts = self
            .router
            .batch_insert(AccountType::ChannelAccountStellarDb, number)
            .await?;
        let mut addresses = Vec::with_capacity(accounts.len());
        for account in accounts {
            self.leaser.unlock(&account.address).await?;
            addresses.push(account.address);
        }
        info!(count = addresses.len(), "created channel accounts");
        Ok(addresses)
    }

    /// Grows or shrinks the pool to exactly `count` accounts.
    pub async fn ensure_channel_accounts_count(&self, count: usize) -> Result<usize> {
        if count > MAX_CHANNEL_ACCOUNTS {
            return Err(SignerError::Validation(format!(
                "count {count} exceeds the maximum of {MAX_CHANNEL_ACCOUNTS} channel accounts"
            )));
        }

        let existing = self.leaser.store().count().await?;
        match existing.cmp(&count) {
            Ordering::Less => {
                info!(existing, wanted = count, "growing channel account pool");
                self.create_channel_accounts(count - existing).await?;
            }
            Ordering::Greater => {
                info!(existing, wanted = count, "shrinking channel account pool");
                for _ in count..existing {
                    let account = self.leaser.lock_one().await?;
                    self.delete_leased(&account).await?;
                }
            }
            Ordering::Equal => {
                info!(existing, "channel account pool already has the wanted size");
            }
        }
        self.leaser.store().count().await
    }

    pub async fn delete_channel_account(&self, address: &str) -> Result<()> {
        let leased = self.leaser.lock(address).await?;
        self.delete_leased(&leased).await
    }

    /// Deletes every account that is not leased by someone else. Returns how many were deleted.
    pub async fn delete_all_channel_accounts(&self) -> Result<usize> {
        let mut deleted = 0;
        loop {
            let account = match self.leaser.lock_one().await {
                Ok(account) => account,
                Err(err) if matches!(err.root(), SignerError::PoolExhausted) => break,
                Err(err) => return Err(err),
            };
            self.delete_leased(&account).await?;
            deleted += 1;
        }
        info!(count = deleted, "deleted channel accounts");
        Ok(deleted)
    }

    /// Every row, leased or not.
    pub async fn view_channel_accounts(&self) -> Result<Vec<ChannelAccount>> {
        self.leaser.store().get_all(0, 0).await
    }

    /// Returns the accounts that do not exist on the ledger, deleting their rows when
    /// `delete_invalid` is set.
    pub async fn verify_channel_accounts(&self, delete_invalid: bool) -> Result<Vec<String>> {
        let ledger_accounts = self.ledger_accounts.as_ref().ok_or_else(|| {
            SignerError::Config("verifying channel accounts needs a ledger account lookup".into())
        })?;

        let mut invalid = Vec::new();
        for account in self.leaser.store().get_all(0, 0).await? {
            let exists = ledger_accounts
                .account_exists(&account.public_key)
                .await
                .context(|| format!("looking up channel account {}", account.public_key))?;
            if exists {
                continue;
            }
            warn!(address = %account.public_key, "channel account does not exist on the ledger");
            if delete_invalid {
                self.leaser.store().delete(&account.public_key).await?;
                info!(address = %account.public_key, "deleted invalid channel account");
            }
            invalid.push(account.public_key);
        }
        Ok(invalid)
    }

    /// Deletes a row under the lease bound this service took on it.
    async fn delete_leased(&self, account: &ChannelAccount) -> Result<()> {
        let locked_until = account.locked_until_ledger_number.ok_or_else(|| {
            SignerError::lease_not_held(&account.public_key, "account is not leased")
        })?;
        self.leaser
            .delete_if_lease_valid(&account.public_key, locked_until)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::signing::SignerRouterOptions;
    use crate::domain::keypair::Keypair;
    use crate::domain::ports::LedgerNumberTracker;
    use crate::infrastructure::in_memory::{
        InMemoryChannelAccountStore, InMemoryLedgerAccounts, ManualLedgerNumberTracker,
    };
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    /// Moves one ledger forward on every read, like a live network closing ledgers.
    struct ClosingLedgers(AtomicU32);

    #[async_trait]
    impl LedgerNumberTracker for ClosingLedgers {
        async fn ledger_number(&self) -> Result<u32> {
            Ok(self.0.fetch_add(1, AtomicOrdering::SeqCst))
        }
    }

    fn service_with(tracker: LedgerNumberTrackerRef) -> ChannelAccountsService {
        let store: ChannelAccountStoreRef = Arc::new(InMemoryChannelAccountStore::new());
        let router = SignerRouter::from_options(
            &SignerRouterOptions {
                network_passphrase: "Test SDF Network ; September 2015".into(),
                channel_account_encryption_passphrase: Keypair::random().seed().to_string(),
                channel_account_store: Some(store.clone()),
                ledger_number_tracker: Some(tracker.clone()),
                ..Default::default()
            },
            &[AccountType::ChannelAccountStellarDb],
        )
        .unwrap();
        ChannelAccountsService::new(router, store, tracker).unwrap()
    }

    fn service() -> (ChannelAccountsService, ManualLedgerNumberTracker) {
        let tracker = ManualLedgerNumberTracker::new(100);
        (service_with(Arc::new(tracker.clone())), tracker)
    }

    #[tokio::test]
    async fn test_created_accounts_enter_the_pool_unlocked() {
        let (service, _) = service();
        let created = service.create_channel_accounts(3).await.unwrap();
        assert_eq!(created.len(), 3);

        let rows = service.view_channel_accounts().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.locked_until_ledger_number.is_none()));
        assert!(service.create_channel_accounts(0).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_count_grows_and_shrinks() {
        let (service, _) = service();
        assert_eq!(service.ensure_channel_accounts_count(4).await.unwrap(), 4);
        assert_eq!(service.ensure_channel_accounts_count(4).await.unwrap(), 4);
        assert_eq!(service.ensure_channel_accounts_count(1).await.unwrap(), 1);
        assert_eq!(service.ensure_channel_accounts_count(0).await.unwrap(), 0);
        assert!(matches!(
            service.ensure_channel_accounts_count(MAX_CHANNEL_ACCOUNTS + 1).await,
            Err(SignerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_pool_deletes_survive_ledger_closes() {
        let service = service_with(Arc::new(ClosingLedgers(AtomicU32::new(100))));
        service.create_channel_accounts(3).await.unwrap();

        assert_eq!(service.ensure_channel_accounts_count(1).await.unwrap(), 1);
        let rows = service.view_channel_accounts().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].locked_until_ledger_number.is_none());

        service.create_channel_accounts(2).await.unwrap();
        assert_eq!(service.delete_all_channel_accounts().await.unwrap(), 3);
        assert!(service.view_channel_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_skips_accounts_leased_elsewhere() {
        let (service, tracker) = service();
        let created = service.create_channel_accounts(2).await.unwrap();

        // A submission worker holds one of the accounts.
        let busy = service.leaser.lock(&created[0]).await.unwrap();
        tracker.advance(1);

        assert!(
            service
                .delete_channel_account(&busy.public_key)
                .await
                .unwrap_err()
                .is_lease_conflict()
        );
        assert_eq!(service.delete_all_channel_accounts().await.unwrap(), 1);
        assert_eq!(service.view_channel_accounts().await.unwrap().len(), 1);

        service.leaser.unlock(&busy.public_key).await.unwrap();
        service.delete_channel_account(&busy.public_key).await.unwrap();
        assert_eq!(service.delete_all_channel_accounts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_verify_channel_accounts() {
        let (service, _) = service();
        assert!(matches!(
            service.verify_channel_accounts(false).await,
            Err(SignerError::Config(_))
        ));

        let ledger = InMemoryLedgerAccounts::new();
        let service = service.with_ledger_accounts(Arc::new(ledger.clone()));
        let created = service.create_channel_accounts(2).await.unwrap();
        ledger.insert(&created[0]).await;

        assert_eq!(
            service.verify_channel_accounts(false).await.unwrap(),
            vec![created[1].clone()]
        );
        assert_eq!(service.view_channel_accounts().await.unwrap().len(), 2);

        service.verify_channel_accounts(true).await.unwrap();
        let remaining = service.view_channel_accounts().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].public_key, created[0]);
    }
}
