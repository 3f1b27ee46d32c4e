use super::{SignatureClient, dedup_addresses, require_envelope, validate_provision_count};
use crate::domain::account::{AccountType, StorageMethod};
use crate::domain::envelope::{FeeBumpTransaction, Transaction};
use crate::domain::keypair::Keypair;
use crate::error::{Result, ResultExt, SignerError};
use async_trait::async_trait;
use tracing::debug;

#[derive(Clone)]
pub struct AccountEnvOptions {
    pub network_passphrase: String,
    pub account_type: AccountType,
    /// `S...` seed of the single account this client holds.
    pub secret_seed: String,
}

impl AccountEnvOptions {
    pub fn validate(&self) -> Result<()> {
        if self.network_passphrase.is_empty() {
            return Err(SignerError::Config("network passphrase cannot be empty".into()));
        }
        if self.account_type.storage_method() != StorageMethod::Env {
            return Err(SignerError::Config(format!(
                "type {} is not stored in the environment",
                self.account_type
            )));
        }
        if self.secret_seed.is_empty() {
            return Err(SignerError::Config(format!(
                "secret seed for {} cannot be empty",
                self.account_type
            )));
        }
        Ok(())
    }
}

/// Signs with one account whose seed comes from process configuration (host or shared
/// distribution account). It cannot provision or delete accounts.
pub struct AccountEnvSignatureClient {
    network_passphrase: String,
    account_type: AccountType,
    keypair: Keypair,
}

impl AccountEnvSignatureClient {
    pub fn new(opts: AccountEnvOptions) -> Result<Self> {
        opts.validate()?;
        let keypair = Keypair::from_seed(&opts.secret_seed)
            .map_err(|_| {
                SignerError::Config(format!(
                    "secret seed for {} is not a valid Ed25519 secret",
                    opts.account_type
                ))
            })?;
        Ok(Self {
            network_passphrase: opts.network_passphrase,
            account_type: opts.account_type,
            keypair,
        })
    }

    pub fn address(&self) -> &str {
        self.keypair.address()
    }

    fn keypairs_for(&self, accounts: &[String]) -> Result<Vec<Keypair>> {
        for address in dedup_addresses(accounts)? {
            if address != self.keypair.address() {
                return Err(SignerError::Validation(format!(
                    "account {address:?} is not the account held by {}",
                    self.account_type
                )));
            }
        }
        Ok(vec![self.keypair.clone()])
    }

    fn unsupported(&self, operation: &'static str, addresses: Vec<String>) -> SignerError {
        SignerError::UnsupportedCommand {
            operation,
            client: self.account_type.to_string(),
            addresses,
        }
    }
}

#[async_trait]
impl SignatureClient for AccountEnvSignatureClient {
    fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    async fn sign_transaction(&self, tx: &Transaction, accounts: &[String]) -> Result<Transaction> {
        require_envelope(&tx.envelope)?;
        let keypairs = self
            .keypairs_for(accounts)
            .context(|| "getting keypairs for accounts")?;
        debug!(account_type = %self.account_type, "signing transaction");
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
            .context(|| "getting keypairs for accounts")?;
        debug!(account_type = %self.account_type, "signing fee bump transaction");
        tx.sign(&self.network_passphrase, &keypairs)
            .context(|| "signing fee bump transaction")
    }

    /// Reports the configured address once per requested account alongside
    /// `UnsupportedCommand`.
    async fn batch_provision(&self, number: i64) -> Result<Vec<String>> {
        let number = validate_provision_count(number)?;
        Err(self.unsupported(
            "batch_provision",
            vec![self.keypair.address().to_string(); number],
        ))
    }

    async fn delete(&self, address: &str) -> Result<()> {
        self.keypairs_for(&[address.to_string()])
            .context(|| format!("validating account {address}"))?;
        Err(self.unsupported("delete", Vec::new()))
    }

    fn account_type(&self) -> AccountType {
        self.account_type
    }
}
