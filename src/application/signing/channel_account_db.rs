use super::{
    SignatureClient, decrypt_keypair, dedup_addresses, require_envelope, validate_provision_count,
};
use crate::application::leasing::ChannelAccountLeaser;
use crate::domain::account::{AccountType, ChannelAccount};
use crate::domain::envelope::{FeeBumpTransaction, Transaction};
use crate::domain::keypair::{Keypair, is_valid_secret_seed};
use crate::domain::ports::{ChannelAccountStoreRef, LedgerNumberTrackerRef, PrivateKeyEncrypterRef};
use crate::error::{Result, ResultExt, SignerError};
use crate::infrastructure::encrypter::DefaultPrivateKeyEncrypter;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

#[derive(Clone, Default)]
pub struct ChannelAccountDbOptions {
    pub network_passphrase: String,
    pub encryption_passphrase: String,
    pub store: Option<ChannelAccountStoreRef>,
    pub ledger_number_tracker: Option<LedgerNumberTrackerRef>,
    /// Defaults to [`DefaultPrivateKeyEncrypter`].
    pub encrypter: Option<PrivateKeyEncrypterRef>,
}

impl ChannelAccountDbOptions {
    pub fn validate(&self) -> Result<()> {
        if self.network_passphrase.is_empty() {
            return Err(SignerError::Config("network passphrase cannot be empty".into()));
        }
        if !is_valid_secret_seed(&self.encryption_passphrase) {
            return Err(SignerError::Config(
                "encryption passphrase is not a valid Ed25519 secret".into(),
            ));
        }
        if self.store.is_none() {
            return Err(SignerError::Config("channel account store cannot be nil".into()));
        }
        if self.ledger_number_tracker.is_none() {
            return Err(SignerError::Config("ledger number tracker cannot be nil".into()));
        }
        Ok(())
    }
}

/// Signs with pooled channel accounts whose keys are stored encrypted.
///
/// Provisioning inserts the new rows already leased to the caller, and deletion only
/// removes a row whose lease was taken at the current ledger.
pub struct ChannelAccountDbSignatureClient {
    network_passphrase: String,
    encryption_passphrase: Zeroizing<String>,
    leaser: ChannelAccountLeaser,
    encrypter: PrivateKeyEncrypterRef,
}

impl ChannelAccountDbSignatureClient {
    pub fn new(opts: ChannelAccountDbOptions) -> Result<Self> {
        opts.validate()?;
        let ChannelAccountDbOptions {
            network_passphrase,
            encryption_passphrase,
            store,
            ledger_number_tracker,
            encrypter,
        } = opts;
        let (Some(store), Some(tracker)) = (store, ledger_number_tracker) else {
            return Err(SignerError::Config(
                "channel account store and ledger number tracker are required".into(),
            ));
        };
        Ok(Self {
            network_passphrase,
            encryption_passphrase: Zeroizing::new(encryption_passphrase),
            leaser: ChannelAccountLeaser::new(store, tracker),
            encrypter: encrypter.unwrap_or_else(|| Arc::new(DefaultPrivateKeyEncrypter::new())),
        })
    }

    pub fn leaser(&self) -> &ChannelAccountLeaser {
        &self.leaser
    }

    async fn keypair(&self, address: &str) -> Result<Keypair> {
        let account = self
            .leaser
            .store()
            .get(address, 0)
            .await
            .context(|| format!("getting channel account {address}"))?;
        decrypt_keypair(
            self.encrypter.as_ref(),
            &account.encrypted_private_key,
            &self.encryption_passphrase,
            address,
        )
        .context(|| format!("decrypting channel account {address}"))
    }

    async fn keypairs_for(&self, accounts: &[String]) -> Result<Vec<Keypair>> {
        let mut keypairs = Vec::new();
        for address in dedup_addresses(accounts)? {
            keypairs.push(self.keypair(address).await?);
        }
        Ok(keypairs)
    }
}

#[async_trait]
impl SignatureClient for ChannelAccountDbSignatureClient {
    fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    async fn sign_transaction(&self, tx: &Transaction, accounts: &[String]) -> Result<Transaction> {
        require_envelope(&tx.envelope)?;
        let keypairs = self
            .keypairs_for(accounts)
            .await
            .context(|| "getting keypairs for accounts")?;
        debug!(count = keypairs.len(), "signing transaction with channel accounts");
        tx.sign(&self.network_passphrase, &keypairs)
            .context(|| "signing transaction")
    }

    async fn sign_fee_bump_transaction(
        &self,
        tx: &FeeBumpTransaction,
        accounts: &[String],
    ) -> Result<FeeBumpTransaction> {
        require_envelope(&tx.envelope)?;
        let keypairs = self
            .keypairs_for(accounts)
            .await
            .context(|| "getting keypairs for accounts")?;
        debug!(count = keypairs.len(), "signing fee bump transaction with channel accounts");
        tx.sign(&self.network_passphrase, &keypairs)
            .context(|| "signing fee bump transaction")
    }

    async fn batch_provision(&self, number: i64) -> Result<Vec<String>> {
        let number = validate_provision_count(number)?;

        let mut addresses = Vec::with_capacity(number);
        let mut accounts = Vec::with_capacity(number);
        for _ in 0..number {
            let keypair = Keypair::random();
            let encrypted = self
                .encrypter
                .encrypt(&keypair.seed(), &self.encryption_passphrase)
                .context(|| "encrypting channel account private key")?;
            addresses.push(keypair.address().to_string());
            accounts.push(ChannelAccount::new(keypair.address(), encrypted));
        }

        let locked_until = self.leaser.provision_and_lock(accounts).await?;
        info!(count = number, locked_until, "provisioned channel accounts");
        Ok(addresses)
    }

    async fn delete(&self, address: &str) -> Result<()> {
        let (_, locked_until) = self.leaser.lease_bounds().await?;
        self.leaser.delete_if_lease_valid(address, locked_until).await
    }

    fn account_type(&self) -> AccountType {
        AccountType::ChannelAccountStellarDb
    }
}
