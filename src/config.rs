//! Signer configuration.
//!
//! CLI arguments and environment variable handling using clap. Secrets are normally
//! supplied through the environment so they stay out of shell history.

use crate::application::signing::SignerRouterOptions;
use crate::domain::ports::{ChannelAccountStoreRef, DistributionVaultRef, LedgerNumberTrackerRef};
use clap::Args;
use std::fmt;
use std::path::PathBuf;

pub const TESTNET_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";

#[derive(Args, Clone)]
pub struct SignerArgs {
    /// Passphrase of the network transactions are signed for
    #[arg(long, env = "NETWORK_PASSPHRASE", default_value = TESTNET_NETWORK_PASSPHRASE)]
    pub network_passphrase: String,

    /// Secret seed of the host account
    #[arg(long, env = "HOST_SEED", hide_env_values = true)]
    pub host_seed: Option<String>,

    /// Secret seed of the shared distribution account
    #[arg(long, env = "DISTRIBUTION_SEED", hide_env_values = true)]
    pub distribution_seed: Option<String>,

    /// Passphrase encrypting channel account keys (must be a valid secret seed)
    #[arg(long, env = "CHANNEL_ACCOUNT_ENCRYPTION_PASSPHRASE", hide_env_values = true)]
    pub channel_account_encryption_passphrase: Option<String>,

    /// Passphrase encrypting vault distribution account keys (must be a valid secret seed)
    #[arg(long, env = "DISTRIBUTION_ACCOUNT_ENCRYPTION_PASSPHRASE", hide_env_values = true)]
    pub distribution_account_encryption_passphrase: Option<String>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Current ledger number, used to bound channel account leases
    #[arg(long, env = "LEDGER_NUMBER")]
    pub ledger_number: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl SignerArgs {
    /// Router options over the given adapters. Missing secrets stay empty and are
    /// rejected when a strategy that needs them is built.
    pub fn router_options(
        &self,
        channel_account_store: ChannelAccountStoreRef,
        distribution_vault: DistributionVaultRef,
        ledger_number_tracker: LedgerNumberTrackerRef,
    ) -> SignerRouterOptions {
        SignerRouterOptions {
            network_passphrase: self.network_passphrase.clone(),
            host_account_seed: self.host_seed.clone().unwrap_or_default(),
            distribution_account_seed: self.distribution_seed.clone().unwrap_or_default(),
            channel_account_encryption_passphrase: self
                .channel_account_encryption_passphrase
                .clone()
                .unwrap_or_default(),
            distribution_account_encryption_passphrase: self
                .distribution_account_encryption_passphrase
                .clone()
                .unwrap_or_default(),
            channel_account_store: Some(channel_account_store),
            distribution_vault: Some(distribution_vault),
            ledger_number_tracker: Some(ledger_number_tracker),
            encrypter: None,
        }
    }
}

impl fmt::Debug for SignerArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerArgs")
            .field("network_passphrase", &self.network_passphrase)
            .field("db_path", &self.db_path)
            .field("ledger_number", &self.ledger_number)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}
