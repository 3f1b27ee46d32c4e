use crate::application::resolver::{
    DistributionAccountResolverImpl, DistributionAccountResolverOptions,
    DistributionAccountResolverRef,
};
use crate::application::signing::{SignerRouter, SignerRouterOptions};
use crate::domain::account::{AccountType, DistributionSignerType, TransactionAccount};
use crate::domain::envelope::{FeeBumpTransaction, Transaction};
use crate::domain::ports::TenantStoreRef;
use crate::error::{Result, SignerError};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SignatureServiceOptions {
    pub distribution_signer_type: DistributionSignerType,
    pub router: SignerRouterOptions,
    pub tenant_store: Option<TenantStoreRef>,
    pub host_distribution_account_public_key: String,
}

/// The router and resolver a submission worker needs, built from one configuration.
///
/// The router holds the host and channel account strategies plus the distribution
/// strategy picked by `distribution_signer_type`.
#[derive(Clone)]
pub struct SignatureService {
    router: SignerRouter,
    resolver: DistributionAccountResolverRef,
    distribution_signer_type: DistributionSignerType,
}

impl SignatureService {
    pub fn new(opts: SignatureServiceOptions) -> Result<Self> {
        let router = SignerRouter::from_options(
            &opts.router,
            &[
                AccountType::HostStellarEnv,
                AccountType::ChannelAccountStellarDb,
                opts.distribution_signer_type.account_type(),
            ],
        )?;
        let resolver = DistributionAccountResolverImpl::new(DistributionAccountResolverOptions {
            tenant_store: opts.tenant_store,
            host_distribution_account_public_key: opts.host_distribution_account_public_key,
        })?;
        Self::from_parts(router, Arc::new(resolver), opts.distribution_signer_type)
    }

    /// Bundles an already built router and resolver.
    pub fn from_parts(
        router: SignerRouter,
        resolver: DistributionAccountResolverRef,
        distribution_signer_type: DistributionSignerType,
    ) -> Result<Self> {
        let distribution_type = distribution_signer_type.account_type();
        for account_type in [AccountType::ChannelAccountStellarDb, distribution_type] {
            if router.route_signer(account_type).is_err() {
                return Err(SignerError::Config(format!(
                    "signature service needs a {account_type} strategy"
                )));
            }
        }
        Ok(Self {
            router,
            resolver,
            distribution_signer_type,
        })
    }

    pub fn router(&self) -> &SignerRouter {
        &self.router
    }

    pub fn resolver(&self) -> &DistributionAccountResolverRef {
        &self.resolver
    }

    pub fn network_passphrase(&self) -> &str {
        self.router.network_passphrase()
    }

    pub fn distribution_signer_type(&self) -> DistributionSignerType {
        self.distribution_signer_type
    }

    pub fn host_distribution_account(&self) -> &str {
        self.resolver.host_distribution_account()
    }

    /// Signs a payment with a leased channel account and the distribution account of
    /// the tenant scoped to the current task.
    pub async fn sign_payment(&self, tx: &Transaction, channel_account: &str) -> Result<Transaction> {
        let distribution = self.resolver.distribution_account_from_context().await?;
        self.sign_with(tx, channel_account, distribution).await
    }

    pub async fn sign_payment_for_tenant(
        &self,
        tx: &Transaction,
        tenant_id: &str,
        channel_account: &str,
    ) -> Result<Transaction> {
        let distribution = self.resolver.distribution_account(tenant_id).await?;
        self.sign_with(tx, channel_account, distribution).await
    }

    /// Signs a fee bump with the distribution account of the current tenant as fee payer.
    pub async fn sign_fee_bump(&self, tx: &FeeBumpTransaction) -> Result<FeeBumpTransaction> {
        let distribution = self.resolver.distribution_account_from_context().await?;
        self.router
            .sign_fee_bump_stellar_transaction(tx, &[distribution])
            .await
    }

    async fn sign_with(
        &self,
        tx: &Transaction,
        channel_account: &str,
        distribution: TransactionAccount,
    ) -> Result<Transaction> {
        debug!(
            channel_account,
            distribution_account = %distribution.address,
            account_type = %distribution.r#type,
            "signing payment"
        );
        let accounts = [TransactionAccount::channel(channel_account), distribution];
        self.router.sign_stellar_transaction(tx, &accounts).await
    }
}
