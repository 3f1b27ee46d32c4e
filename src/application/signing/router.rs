use super::{
    AccountEnvOptions, AccountEnvSignatureClient, ChannelAccountDbOptions,
    ChannelAccountDbSignatureClient, DistributionVaultOptions, DistributionVaultSignatureClient,
    SignatureClientRef, require_envelope,
};
use crate::domain::account::{AccountType, TransactionAccount};
use crate::domain::envelope::{FeeBumpTransaction, Transaction};
use crate::domain::ports::{
    ChannelAccountStoreRef, DistributionVaultRef, LedgerNumberTrackerRef, PrivateKeyEncrypterRef,
};
use crate::error::{Result, ResultExt, SignerError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything needed to build the strategies of a [`SignerRouter`].
///
/// Only the fields used by the requested account types have to be set.
#[derive(Clone, Default)]
pub struct SignerRouterOptions {
    pub network_passphrase: String,
    pub host_account_seed: String,
    pub distribution_account_seed: String,
    pub channel_account_encryption_passphrase: String,
    pub distribution_account_encryption_passphrase: String,
    pub channel_account_store: Option<ChannelAccountStoreRef>,
    pub distribution_vault: Option<DistributionVaultRef>,
    pub ledger_number_tracker: Option<LedgerNumberTrackerRef>,
    pub encrypter: Option<PrivateKeyEncrypterRef>,
}

impl SignerRouterOptions {
    fn build_strategy(&self, account_type: AccountType) -> Result<SignatureClientRef> {
        let strategy: SignatureClientRef = match account_type {
            AccountType::HostStellarEnv => {
                Arc::new(AccountEnvSignatureClient::new(AccountEnvOptions {
                    network_passphrase: self.network_passphrase.clone(),
                    account_type,
                    secret_seed: self.host_account_seed.clone(),
                })?)
            }
            AccountType::DistributionAccountStellarEnv => {
                Arc::new(AccountEnvSignatureClient::new(AccountEnvOptions {
                    network_passphrase: self.network_passphrase.clone(),
                    account_type,
                    secret_seed: self.distribution_account_seed.clone(),
                })?)
            }
            AccountType::ChannelAccountStellarDb => {
                Arc::new(ChannelAccountDbSignatureClient::new(ChannelAccountDbOptions {
                    network_passphrase: self.network_passphrase.clone(),
                    encryption_passphrase: self.channel_account_encryption_passphrase.clone(),
                    store: self.channel_account_store.clone(),
                    ledger_number_tracker: self.ledger_number_tracker.clone(),
                    encrypter: self.encrypter.clone(),
                })?)
            }
            AccountType::DistributionAccountStellarDbVault => Arc::new(
                DistributionVaultSignatureClient::new(DistributionVaultOptions {
                    network_passphrase: self.network_passphrase.clone(),
                    encryption_passphrase: self.distribution_account_encryption_passphrase.clone(),
                    vault: self.distribution_vault.clone(),
                    encrypter: self.encrypter.clone(),
                })?,
            ),
        };
        Ok(strategy)
    }
}

/// Routes signing and custody operations to the strategy registered for each
/// [`AccountType`].
///
/// Multi-account transactions are signed one type group at a time, in the lexicographic
/// order of the type names, so the signature sequence is the same for every permutation
/// of the input accounts.
#[derive(Clone)]
pub struct SignerRouter {
    network_passphrase: String,
    strategies: HashMap<AccountType, SignatureClientRef>,
}

impl SignerRouter {
    /// Registers the given strategies. All of them must sign for `network_passphrase`,
    /// and each account type may only be registered once.
    pub fn new(
        network_passphrase: impl Into<String>,
        strategies: impl IntoIterator<Item = SignatureClientRef>,
    ) -> Result<Self> {
        let network_passphrase = network_passphrase.into();
        if network_passphrase.is_empty() {
            return Err(SignerError::Config("network passphrase cannot be empty".into()));
        }

        let mut registered = HashMap::new();
        for strategy in strategies {
            let account_type = strategy.account_type();
            if strategy.network_passphrase() != network_passphrase {
                return Err(SignerError::Config(format!(
                    "strategy {account_type} signs for network {:?}, expected {:?}",
                    strategy.network_passphrase(),
                    network_passphrase
                )));
            }
            if registered.insert(account_type, strategy).is_some() {
                return Err(SignerError::Config(format!(
                    "strategy {account_type} is registered more than once"
                )));
            }
        }
        if registered.is_empty() {
            return Err(SignerError::Config(
                "signer router needs at least one strategy".into(),
            ));
        }

        Ok(Self {
            network_passphrase,
            strategies: registered,
        })
    }

    /// Builds one strategy per requested type. An empty list means every type.
    pub fn from_options(opts: &SignerRouterOptions, account_types: &[AccountType]) -> Result<Self> {
        let account_types = if account_types.is_empty() {
            &AccountType::ALL[..]
        } else {
            account_types
        };

        let mut strategies = Vec::with_capacity(account_types.len());
        for &account_type in account_types {
            let strategy = opts
                .build_strategy(account_type)
                .context(|| format!("creating signature client for {account_type}"))?;
            strategies.push(strategy);
        }

        let router = Self::new(opts.network_passphrase.clone(), strategies)?;
        info!(account_types = ?router.supported_account_types(), "signer router ready");
        Ok(router)
    }

    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    /// Registered account types, sorted.
    pub fn supported_account_types(&self) -> Vec<AccountType> {
        let mut types: Vec<AccountType> = self.strategies.keys().copied().collect();
        types.sort();
        types
    }

    pub fn route_signer(&self, account_type: AccountType) -> Result<&SignatureClientRef> {
        self.strategies
            .get(&account_type)
            .ok_or(SignerError::UnsupportedAccountType(account_type))
    }

    /// Distinct addresses per type, iterated in signing order.
    fn group_accounts(accounts: &[TransactionAccount]) -> Result<BTreeMap<AccountType, Vec<String>>> {
        if accounts.is_empty() {
            return Err(SignerError::NoAccounts);
        }
        let mut groups: BTreeMap<AccountType, Vec<String>> = BTreeMap::new();
        for account in accounts {
            let addresses = groups.entry(account.r#type).or_default();
            if !addresses.contains(&account.address) {
                addresses.push(account.address.clone());
            }
        }
        Ok(groups)
    }

    pub async fn sign_stellar_transaction(
        &self,
        tx: &Transaction,
        accounts: &[TransactionAccount],
    ) -> Result<Transaction> {
        require_envelope(&tx.envelope)?;
        let groups = Self::group_accounts(accounts)?;

        let mut signed = tx.clone();
        for (account_type, addresses) in &groups {
            let strategy = self.route_signer(*account_type)?;
            debug!(%account_type, count = addresses.len(), "signing stellar transaction");
            signed = strategy
                .sign_transaction(&signed, addresses)
                .await
                .context(|| format!("signing stellar transaction for strategy={account_type}"))?;
        }
        Ok(signed)
    }

    pub async fn sign_fee_bump_stellar_transaction(
        &self,
        tx: &FeeBumpTransaction,
        accounts: &[TransactionAccount],
    ) -> Result<FeeBumpTransaction> {
        require_envelope(&tx.envelope)?;
        let groups = Self::group_accounts(accounts)?;

        let mut signed = tx.clone();
        for (account_type, addresses) in &groups {
            let strategy = self.route_signer(*account_type)?;
            debug!(%account_type, count = addresses.len(), "signing fee bump stellar transaction");
            signed = strategy
                .sign_fee_bump_transaction(&signed, addresses)
                .await
                .context(|| {
                    format!("signing fee bump stellar transaction for strategy={account_type}")
                })?;
        }
        Ok(signed)
    }

    /// Provisions `number` accounts of `account_type`.
    ///
    /// A strategy holding a fixed account answers with `UnsupportedCommand` plus the
    /// addresses it already has; those are returned as the result.
    pub async fn batch_insert(
        &self,
        account_type: AccountType,
        number: i64,
    ) -> Result<Vec<TransactionAccount>> {
        let strategy = self.route_signer(account_type)?;
        let addresses = match strategy.batch_provision(number).await {
            Ok(addresses) => addresses,
            Err(SignerError::UnsupportedCommand { addresses, .. }) if !addresses.is_empty() => {
                warn!(
                    %account_type,
                    count = addresses.len(),
                    "strategy cannot provision accounts, returning its existing addresses"
                );
                addresses
            }
            Err(err) => {
                return Err(err.context(format!("batch inserting accounts for strategy={account_type}")));
            }
        };

        Ok(addresses
            .into_iter()
            .map(|address| TransactionAccount::new(account_type, address))
            .collect())
    }

    pub async fn delete(&self, account: &TransactionAccount) -> Result<()> {
        let strategy = self.route_signer(account.r#type)?;
        strategy.delete(&account.address).await.context(|| {
            format!(
                "deleting account {} for strategy={}",
                account.address, account.r#type
            )
        })
    }
}
