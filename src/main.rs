use clap::{Parser, Subcommand};
use disbursement_signer::application::channel_accounts::ChannelAccountsService;
use disbursement_signer::application::signing::SignerRouter;
use disbursement_signer::config::SignerArgs;
use disbursement_signer::domain::account::{AccountType, TransactionAccount};
use disbursement_signer::domain::ports::{
    ChannelAccountStoreRef, DistributionVaultRef, LedgerNumberTrackerRef,
};
use disbursement_signer::infrastructure::in_memory::{
    InMemoryChannelAccountStore, InMemoryDistributionVault, ManualLedgerNumberTracker,
};
use disbursement_signer::interfaces::csv::channel_account_writer::ChannelAccountWriter;
use miette::{IntoDiagnostic, Result};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    signer: SignerArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the channel account pool
    ChannelAccounts {
        #[command(subcommand)]
        action: ChannelAccountsAction,
    },
    /// Manage vault-held distribution accounts
    DistributionAccounts {
        #[command(subcommand)]
        action: DistributionAccountsAction,
    },
}

#[derive(Subcommand)]
enum ChannelAccountsAction {
    /// Provision new channel accounts and release them into the pool
    Create { count: usize },
    /// Grow or shrink the pool to exactly COUNT accounts
    Ensure { count: usize },
    /// Print every channel account and its lease as CSV
    View,
    /// Delete one channel account that is not leased
    Delete { address: String },
    /// Delete every channel account that is not leased
    DeleteAll,
}

#[derive(Subcommand)]
enum DistributionAccountsAction {
    /// Provision new distribution accounts in the vault
    Create { count: usize },
    /// Remove a distribution account from the vault
    Delete { address: String },
}

fn in_memory_stores() -> (ChannelAccountStoreRef, DistributionVaultRef) {
    let channel_store: ChannelAccountStoreRef = Arc::new(InMemoryChannelAccountStore::new());
    let vault: DistributionVaultRef = Arc::new(InMemoryDistributionVault::new());
    (channel_store, vault)
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&Path>) -> Result<(ChannelAccountStoreRef, DistributionVaultRef)> {
    use disbursement_signer::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(db_path) => {
            // Use persistent storage (RocksDB)
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            tracing::info!(path = %db_path.display(), "using RocksDB storage");
            let channel_store: ChannelAccountStoreRef = Arc::new(store.clone());
            let vault: DistributionVaultRef = Arc::new(store);
            Ok((channel_store, vault))
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&Path>) -> Result<(ChannelAccountStoreRef, DistributionVaultRef)> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cli.signer.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let (channel_store, vault) = open_stores(cli.signer.db_path.as_deref())?;
    let tracker: LedgerNumberTrackerRef = Arc::new(ManualLedgerNumberTracker::new(
        cli.signer.ledger_number.unwrap_or_default(),
    ));
    let opts = cli
        .signer
        .router_options(channel_store.clone(), vault, tracker.clone());

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::ChannelAccounts { action } => {
            let router = SignerRouter::from_options(&opts, &[AccountType::ChannelAccountStellarDb])
                .into_diagnostic()?;
            let service =
                ChannelAccountsService::new(router, channel_store, tracker).into_diagnostic()?;

            match action {
                ChannelAccountsAction::Create { count } => {
                    for address in service.create_channel_accounts(count).await.into_diagnostic()? {
                        writeln!(out, "{address}").into_diagnostic()?;
                    }
                }
                ChannelAccountsAction::Ensure { count } => {
                    let total = service
                        .ensure_channel_accounts_count(count)
                        .await
                        .into_diagnostic()?;
                    writeln!(out, "{total}").into_diagnostic()?;
                }
                ChannelAccountsAction::View => {
                    let accounts = service.view_channel_accounts().await.into_diagnostic()?;
                    ChannelAccountWriter::new(&mut out)
                        .write_accounts(&accounts)
                        .into_diagnostic()?;
                }
                ChannelAccountsAction::Delete { address } => {
                    service
                        .delete_channel_account(&address)
                        .await
                        .into_diagnostic()?;
                }
                ChannelAccountsAction::DeleteAll => {
                    let deleted = service
                        .delete_all_channel_accounts()
                        .await
                        .into_diagnostic()?;
                    writeln!(out, "{deleted}").into_diagnostic()?;
                }
            }
        }
        Command::DistributionAccounts { action } => {
            let account_type = AccountType::DistributionAccountStellarDbVault;
            let router = SignerRouter::from_options(&opts, &[account_type]).into_diagnostic()?;

            match action {
                DistributionAccountsAction::Create { count } => {
                    let number = i64::try_from(count).into_diagnostic()?;
                    let accounts = router
                        .batch_insert(account_type, number)
                        .await
                        .into_diagnostic()?;
                    for account in accounts {
                        writeln!(out, "{}", account.address).into_diagnostic()?;
                    }
                }
                DistributionAccountsAction::Delete { address } => {
                    router
                        .delete(&TransactionAccount::new(account_type, address))
                        .await
                        .into_diagnostic()?;
                }
            }
        }
    }

    Ok(())
}
