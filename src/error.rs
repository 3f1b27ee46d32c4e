use crate::domain::account::AccountType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{entity} {key:?} not found")]
    NotFound { entity: &'static str, key: String },
    #[error("cannot decrypt private key: wrong passphrase or tampered ciphertext")]
    Authentication,
    #[error("no channel accounts available to lease")]
    PoolExhausted,
    #[error("lease on channel account {address:?} is not held: {reason}")]
    LeaseNotHeld { address: String, reason: String },
    /// No row for `address` carries the expected lease bound. Classified both as not found
    /// and as a lease conflict.
    #[error("channel account {address:?} not found locked until ledger number {locked_until}")]
    LeaseBoundMismatch { address: String, locked_until: u32 },
    #[error("type {0:?} is not supported by the signer router")]
    UnsupportedAccountType(AccountType),
    #[error("no accounts provided to sign the transaction")]
    NoAccounts,
    #[error("{operation} is not supported by signature client {client}")]
    UnsupportedCommand {
        operation: &'static str,
        client: String,
        /// Addresses the client already custodies, reported back on `batch_provision`.
        addresses: Vec<String>,
    },
    #[error("tenant {0:?} does not have a distribution account configured")]
    DistributionAccountNotConfigured(String),
    #[error("no tenant found in the current task context")]
    TenantNotInContext,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<SignerError>,
    },
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for SignerError {
    fn from(err: rocksdb::Error) -> Self {
        SignerError::Storage(err.into_string())
    }
}

impl SignerError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        SignerError::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn lease_not_held(address: impl Into<String>, reason: impl Into<String>) -> Self {
        SignerError::LeaseNotHeld {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn lease_bound_mismatch(address: impl Into<String>, locked_until: u32) -> Self {
        SignerError::LeaseBoundMismatch {
            address: address.into(),
            locked_until,
        }
    }

    /// Wraps this error with a description of the operation that failed.
    pub fn context(self, context: impl Into<String>) -> Self {
        SignerError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with every context layer peeled off.
    pub fn root(&self) -> &SignerError {
        match self {
            SignerError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            SignerError::NotFound { .. }
                | SignerError::DistributionAccountNotConfigured(_)
                | SignerError::LeaseBoundMismatch { .. }
        )
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self.root(), SignerError::Authentication)
    }

    pub fn is_lease_conflict(&self) -> bool {
        matches!(
            self.root(),
            SignerError::PoolExhausted
                | SignerError::LeaseNotHeld { .. }
                | SignerError::LeaseBoundMismatch { .. }
        )
    }

    pub fn is_unsupported_command(&self) -> bool {
        matches!(self.root(), SignerError::UnsupportedCommand { .. })
    }
}

pub type Result<T> = std::result::Result<T, SignerError>;

pub trait ResultExt<T> {
    /// Lazily attaches context to the error branch.
    fn context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|err| err.context(f()))
    }
}
