//! Signature clients: one strategy per custody model, behind [`SignatureClient`].

pub mod account_env;
pub mod channel_account_db;
pub mod distribution_vault;
pub mod router;

use crate::domain::account::AccountType;
use crate::domain::envelope::{FeeBumpTransaction, Transaction};
use crate::domain::keypair::Keypair;
use crate::domain::ports::PrivateKeyEncrypter;
use crate::error::{Result, SignerError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

pub use account_env::{AccountEnvOptions, AccountEnvSignatureClient};
pub use channel_account_db::{ChannelAccountDbOptions, ChannelAccountDbSignatureClient};
pub use distribution_vault::{DistributionVaultOptions, DistributionVaultSignatureClient};
pub use router::{SignerRouter, SignerRouterOptions};

/// Signs transactions for the addresses of one custody strategy.
#[async_trait]
pub trait SignatureClient: Send + Sync {
    /// The network this client signs for.
    fn network_passphrase(&self) -> &str;

    /// Returns a copy of `tx` with one signature per distinct address in `accounts`.
    async fn sign_transaction(&self, tx: &Transaction, accounts: &[String]) -> Result<Transaction>;

    async fn sign_fee_bump_transaction(
        &self,
        tx: &FeeBumpTransaction,
        accounts: &[String],
    ) -> Result<FeeBumpTransaction>;

    /// Creates `number` new accounts in this client's custody and returns their addresses.
    async fn batch_provision(&self, number: i64) -> Result<Vec<String>>;

    async fn delete(&self, address: &str) -> Result<()>;

    fn account_type(&self) -> AccountType;
}

pub type SignatureClientRef = Arc<dyn SignatureClient>;

/// Rejects an absent (empty) envelope before any key is touched.
pub(crate) fn require_envelope(envelope: &[u8]) -> Result<()> {
    if envelope.is_empty() {
        return Err(SignerError::Validation(
            "stellar transaction cannot be empty".into(),
        ));
    }
    Ok(())
}

/// Distinct addresses in first-seen order.
pub(crate) fn dedup_addresses(accounts: &[String]) -> Result<Vec<&str>> {
    if accounts.is_empty() {
        return Err(SignerError::NoAccounts);
    }
    let mut seen = HashSet::new();
    let mut distinct = Vec::with_capacity(accounts.len());
    for address in accounts {
        if address.is_empty() {
            return Err(SignerError::Validation("account address cannot be empty".into()));
        }
        if seen.insert(address.as_str()) {
            distinct.push(address.as_str());
        }
    }
    Ok(distinct)
}

pub(crate) fn validate_provision_count(number: i64) -> Result<usize> {
    if number < 1 {
        return Err(SignerError::Validation(format!(
            "number of accounts to provision must be greater than 0, got {number}"
        )));
    }
    usize::try_from(number)
        .map_err(|_| SignerError::Validation(format!("cannot provision {number} accounts")))
}

/// Decrypts a stored secret seed and checks it belongs to `address`.
pub(crate) fn decrypt_keypair(
    encrypter: &dyn PrivateKeyEncrypter,
    encrypted_private_key: &str,
    passphrase: &str,
    address: &str,
) -> Result<Keypair> {
    let seed = encrypter.decrypt(encrypted_private_key, passphrase)?;
    let keypair = Keypair::from_seed(&seed).map_err(|_| SignerError::Authentication)?;
    if keypair.address() != address {
        return Err(SignerError::Authentication);
    }
    Ok(keypair)
}
