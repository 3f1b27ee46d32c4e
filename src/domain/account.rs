use crate::error::SignerError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Number of ledgers a lease (and the transaction it was taken for) stays valid.
pub const INCREMENT_FOR_MAX_LEDGER_BOUNDS: u32 = 10;

/// Identifies the custody strategy that holds the key of an account.
///
/// The string form is `ROLE.PLATFORM.STORAGE`; ordering follows that string so the
/// router's signing order is lexicographic.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AccountType {
    #[serde(rename = "HOST.STELLAR.ENV")]
    HostStellarEnv,
    #[serde(rename = "CHANNEL_ACCOUNT.STELLAR.DB")]
    ChannelAccountStellarDb,
    #[serde(rename = "DISTRIBUTION_ACCOUNT.STELLAR.ENV")]
    DistributionAccountStellarEnv,
    #[serde(rename = "DISTRIBUTION_ACCOUNT.STELLAR.DB_VAULT")]
    DistributionAccountStellarDbVault,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Role {
    Host,
    ChannelAccount,
    DistributionAccount,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StorageMethod {
    Env,
    Db,
    DbVault,
}

impl AccountType {
    pub const ALL: [AccountType; 4] = [
        AccountType::HostStellarEnv,
        AccountType::ChannelAccountStellarDb,
        AccountType::DistributionAccountStellarEnv,
        AccountType::DistributionAccountStellarDbVault,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::HostStellarEnv => "HOST.STELLAR.ENV",
            AccountType::ChannelAccountStellarDb => "CHANNEL_ACCOUNT.STELLAR.DB",
            AccountType::DistributionAccountStellarEnv => "DISTRIBUTION_ACCOUNT.STELLAR.ENV",
            AccountType::DistributionAccountStellarDbVault => {
                "DISTRIBUTION_ACCOUNT.STELLAR.DB_VAULT"
            }
        }
    }

    pub fn role(&self) -> Role {
        match self {
            AccountType::HostStellarEnv => Role::Host,
            AccountType::ChannelAccountStellarDb => Role::ChannelAccount,
            AccountType::DistributionAccountStellarEnv
            | AccountType::DistributionAccountStellarDbVault => Role::DistributionAccount,
        }
    }

    pub fn storage_method(&self) -> StorageMethod {
        match self {
            AccountType::HostStellarEnv | AccountType::DistributionAccountStellarEnv => {
                StorageMethod::Env
            }
            AccountType::ChannelAccountStellarDb => StorageMethod::Db,
            AccountType::DistributionAccountStellarDbVault => StorageMethod::DbVault,
        }
    }

    pub fn is_db_backed(&self) -> bool {
        self.storage_method() != StorageMethod::Env
    }
}

impl Ord for AccountType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for AccountType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        AccountType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| SignerError::Validation(format!("invalid account type {s:?}")))
    }
}

/// Operator-facing selector for how tenants' distribution accounts are custodied.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DistributionSignerType {
    /// One distribution account, shared by every tenant and the host, read from configuration.
    Env,
    /// One distribution account per tenant, stored encrypted in the vault.
    Db,
}

impl DistributionSignerType {
    pub fn account_type(&self) -> AccountType {
        match self {
            DistributionSignerType::Env => AccountType::DistributionAccountStellarEnv,
            DistributionSignerType::Db => AccountType::DistributionAccountStellarDbVault,
        }
    }
}

impl FromStr for DistributionSignerType {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DISTRIBUTION_ACCOUNT_ENV" => Ok(DistributionSignerType::Env),
            "DISTRIBUTION_ACCOUNT_DB" => Ok(DistributionSignerType::Db),
            _ => Err(SignerError::Validation(format!(
                "invalid distribution signer type {s:?}"
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    #[default]
    Active,
    PendingUserActivation,
}

/// An address that must contribute a signature, and the custody strategy holding its key.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct TransactionAccount {
    pub r#type: AccountType,
    pub address: String,
    pub status: AccountStatus,
}

impl TransactionAccount {
    pub fn new(r#type: AccountType, address: impl Into<String>) -> Self {
        Self {
            r#type,
            address: address.into(),
            status: AccountStatus::Active,
        }
    }

    pub fn channel(address: impl Into<String>) -> Self {
        Self::new(AccountType::ChannelAccountStellarDb, address)
    }

    pub fn host(address: impl Into<String>) -> Self {
        Self::new(AccountType::HostStellarEnv, address)
    }
}

/// A pooled signing account and its ledger-bounded lease.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct ChannelAccount {
    pub public_key: String,
    pub encrypted_private_key: String,
    pub locked_at_ledger_number: Option<u32>,
    /// The lease expires once the network moves past this ledger.
    pub locked_until_ledger_number: Option<u32>,
}

impl ChannelAccount {
    pub fn new(public_key: impl Into<String>, encrypted_private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            encrypted_private_key: encrypted_private_key.into(),
            locked_at_ledger_number: None,
            locked_until_ledger_number: None,
        }
    }

    pub fn is_locked(&self, current_ledger_number: u32) -> bool {
        matches!(self.locked_until_ledger_number, Some(until) if current_ledger_number <= until)
    }

    pub fn is_available(&self, current_ledger_number: u32) -> bool {
        !self.is_locked(current_ledger_number)
    }

    pub(crate) fn lock(&mut self, current_ledger_number: u32, locked_until_ledger_number: u32) {
        self.locked_at_ledger_number = Some(current_ledger_number);
        self.locked_until_ledger_number = Some(locked_until_ledger_number);
    }

    pub(crate) fn unlock(&mut self) {
        self.locked_at_ledger_number = None;
        self.locked_until_ledger_number = None;
    }
}

/// Vault entry holding a long-lived distribution account key.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct DistributionSignatory {
    pub public_key: String,
    pub encrypted_private_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_qualifiers() {
        for account_type in AccountType::ALL {
            let qualifiers: Vec<&str> = account_type.as_str().split('.').collect();
            assert_eq!(qualifiers.len(), 3);
            assert_eq!(qualifiers[1], "STELLAR");
        }
        assert_eq!(AccountType::HostStellarEnv.role(), Role::Host);
        assert_eq!(
            AccountType::DistributionAccountStellarDbVault.storage_method(),
            StorageMethod::DbVault
        );
        assert!(AccountType::ChannelAccountStellarDb.is_db_backed());
        assert!(!AccountType::DistributionAccountStellarEnv.is_db_backed());
    }

    #[test]
    fn test_account_type_lexicographic_order() {
        let mut types = AccountType::ALL.to_vec();
        types.sort();
        assert_eq!(
            types,
            vec![
                AccountType::ChannelAccountStellarDb,
                AccountType::DistributionAccountStellarDbVault,
                AccountType::DistributionAccountStellarEnv,
                AccountType::HostStellarEnv,
            ]
        );
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!(
            "channel_account.stellar.db".parse::<AccountType>().unwrap(),
            AccountType::ChannelAccountStellarDb
        );
        assert!(matches!(
            "CIRCLE".parse::<AccountType>(),
            Err(SignerError::Validation(_))
        ));
        assert_eq!(
            serde_json::to_string(&AccountType::DistributionAccountStellarDbVault).unwrap(),
            "\"DISTRIBUTION_ACCOUNT.STELLAR.DB_VAULT\""
        );
    }

    #[test]
    fn test_distribution_signer_type() {
        assert_eq!(
            "distribution_account_db"
                .parse::<DistributionSignerType>()
                .unwrap()
                .account_type(),
            AccountType::DistributionAccountStellarDbVault
        );
        assert!("VAULT".parse::<DistributionSignerType>().is_err());
    }

    #[test]
    fn test_channel_account_lease_window() {
        let mut account = ChannelAccount::new("GABC", "ciphertext");
        assert!(account.is_available(100));

        account.lock(100, 100 + INCREMENT_FOR_MAX_LEDGER_BOUNDS);
        assert!(account.is_locked(100));
        assert!(account.is_locked(110));
        assert!(account.is_available(111));

        account.unlock();
        assert!(account.is_available(100));
        assert_eq!(account.locked_at_ledger_number, None);
    }
}
