use super::{
    SignatureClient, decrypt_keypair, dedup_addresses, require_envelope, validate_provision_count,
};
use crate::domain::account::{AccountType, DistributionSignatory};
use crate::domain::envelope::{FeeBumpTransaction, Transaction};
use crate::domain::keypair::{Keypair, is_valid_secret_seed};
use crate::domain::ports::{DistributionVaultRef, PrivateKeyEncrypterRef};
use crate::error::{Result, ResultExt, SignerError};
use crate::infrastructure::encrypter::DefaultPrivateKeyEncrypter;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

#[derive(Clone, Default)]
pub struct DistributionVaultOptions {
    pub network_passphrase: String,
    pub encryption_passphrase: String,
    pub vault: Option<DistributionVaultRef>,
    pub encrypter: Option<PrivateKeyEncrypterRef>,
}

impl DistributionVaultOptions {
    pub fn validate(&self) -> Result<()> {
        if self.network_passphrase.is_empty() {
            return Err(SignerError::Config("network passphrase cannot be empty".into()));
        }
        if !is_valid_secret_seed(&self.encryption_passphrase) {
            return Err(SignerError::Config(
                "encryption passphrase is not a valid Ed25519 secret".into(),
            ));
        }
        if self.vault.is_none() {
            return Err(SignerError::Config("distribution account vault cannot be nil".into()));
        }
        Ok(())
    }
}

/// Signs with per-tenant distribution accounts kept encrypted in the vault.
pub struct DistributionVaultSignatureClient {
    network_passphrase: String,
    encryption_passphrase: Zeroizing<String>,
    vault: DistributionVaultRef,
    encrypter: PrivateKeyEncrypterRef,
}

impl DistributionVaultSignatureClient {
    pub fn new(opts: DistributionVaultOptions) -> Result<Self> {
        opts.validate()?;
        let DistributionVaultOptions {
            network_passphrase,
            encryption_passphrase,
            vault,
            encrypter,
        } = opts;
        let vault = vault.ok_or_else(|| {
            SignerError::Config("distribution account vault cannot be nil".into())
        })?;
        Ok(Self {
            network_passphrase,
            encryption_passphrase: Zeroizing::new(encryption_passphrase),
            vault,
            encrypter: encrypter.unwrap_or_else(|| Arc::new(DefaultPrivateKeyEncrypter::new())),
        })
    }

    async fn keypairs_for(&self, accounts: &[String]) -> Result<Vec<Keypair>> {
        let mut keypairs = Vec::new();
        for address in dedup_addresses(accounts)? {
            let entry = self
                .vault
                .get(address)
                .await
                .context(|| format!("getting distribution account {address}"))?;
            let keypair = decrypt_keypair(
                self.encrypter.as_ref(),
                &entry.encrypted_private_key,
                &self.encryption_passphrase,
                address,
            )
            .context(|| format!("decrypting distribution account {address}"))?;
            keypairs.push(keypair);
        }
        Ok(keypairs)
    }
}

#[async_trait]
impl SignatureClient for DistributionVaultSignatureClient {
    fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    async fn sign_transaction(&self, tx: &Transaction, accounts: &[String]) -> Result<Transaction> {
        require_envelope(&tx.envelope)?;
        let keypairs = self
            .keypairs_for(accounts)
            .await
            .context(|| "getting keypairs for accounts")?;
        debug!(count = keypairs.len(), "signing transaction with vault accounts");
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
        debug!(count = keypairs.len(), "signing fee bump transaction with vault accounts");
        tx.sign(&self.network_passphrase, &keypairs)
            .context(|| "signing fee bump transaction")
    }

    async fn batch_provision(&self, number: i64) -> Result<Vec<String>> {
        let number = validate_provision_count(number)?;

        let mut addresses = Vec::with_capacity(number);
        let mut entries = Vec::with_capacity(number);
        for _ in 0..number {
            let keypair = Keypair::random();
            let encrypted_private_key = self
                .encrypter
                .encrypt(&keypair.seed(), &self.encryption_passphrase)
                .context(|| "encrypting distribution account private key")?;
            addresses.push(keypair.address().to_string());
            entries.push(DistributionSignatory {
                public_key: keypair.address().to_string(),
                encrypted_private_key,
            });
        }

        self.vault
            .batch_insert(entries)
            .await
            .context(|| format!("inserting {number} distribution accounts"))?;
        info!(count = number, "provisioned distribution accounts");
        Ok(addresses)
    }

    async fn delete(&self, address: &str) -> Result<()> {
        self.vault
            .delete(address)
            .await
            .context(|| format!("deleting distribution account {address}"))
    }

    fn account_type(&self) -> AccountType {
        AccountType::DistributionAccountStellarDbVault
    }
}
