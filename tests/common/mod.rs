#![allow(dead_code)]

use disbursement_signer::application::signing::{SignerRouter, SignerRouterOptions};
use disbursement_signer::domain::account::AccountType;
use disbursement_signer::domain::keypair::Keypair;
use disbursement_signer::infrastructure::in_memory::{
    InMemoryChannelAccountStore, InMemoryDistributionVault, ManualLedgerNumberTracker,
};
use std::sync::Arc;

pub const TESTNET: &str = "Test SDF Network ; September 2015";

/// A router over in-memory adapters, with handles on everything behind it.
pub struct Harness {
    pub router: SignerRouter,
    pub opts: SignerRouterOptions,
    pub channel_store: Arc<InMemoryChannelAccountStore>,
    pub vault: Arc<InMemoryDistributionVault>,
    pub tracker: ManualLedgerNumberTracker,
    pub host: Keypair,
    pub distribution: Keypair,
}

pub fn harness(ledger: u32, account_types: &[AccountType]) -> Harness {
    let channel_store = Arc::new(InMemoryChannelAccountStore::new());
    let vault = Arc::new(InMemoryDistributionVault::new());
    let tracker = ManualLedgerNumberTracker::new(ledger);
    let host = Keypair::random();
    let distribution = Keypair::random();

    let opts = SignerRouterOptions {
        network_passphrase: TESTNET.into(),
        host_account_seed: host.seed().to_string(),
        distribution_account_seed: distribution.seed().to_string(),
        channel_account_encryption_passphrase: Keypair::random().seed().to_string(),
        distribution_account_encryption_passphrase: Keypair::random().seed().to_string(),
        channel_account_store: Some(channel_store.clone()),
        distribution_vault: Some(vault.clone()),
        ledger_number_tracker: Some(Arc::new(tracker.clone())),
        encrypter: None,
    };
    let router = SignerRouter::from_options(&opts, account_types).unwrap();

    Harness {
        router,
        opts,
        channel_store,
        vault,
        tracker,
        host,
        distribution,
    }
}

/// A fresh secret seed, usable as an encryption passphrase.
pub fn passphrase() -> String {
    Keypair::random().seed().to_string()
}
