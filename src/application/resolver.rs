use crate::domain::account::TransactionAccount;
use crate::domain::keypair::is_valid_public_key;
use crate::domain::ports::TenantStoreRef;
use crate::domain::tenant::{Tenant, current_tenant};
use crate::error::{Result, ResultExt, SignerError};
use async_trait::async_trait;
use std::sync::Arc;

/// Answers which distribution account funds a tenant's payouts.
#[async_trait]
pub trait DistributionAccountResolver: Send + Sync {
    async fn distribution_account(&self, tenant_id: &str) -> Result<TransactionAccount>;
    /// Same as [`Self::distribution_account`] for the tenant scoped to the current task.
    async fn distribution_account_from_context(&self) -> Result<TransactionAccount>;
    /// The operator's own account, shared across tenants.
    fn host_distribution_account(&self) -> &str;
}

pub type DistributionAccountResolverRef = Arc<dyn DistributionAccountResolver>;

#[derive(Clone, Default)]
pub struct DistributionAccountResolverOptions {
    pub tenant_store: Option<TenantStoreRef>,
    pub host_distribution_account_public_key: String,
}

impl DistributionAccountResolverOptions {
    pub fn validate(&self) -> Result<()> {
        if self.tenant_store.is_none() {
            return Err(SignerError::Config("tenant store cannot be nil".into()));
        }
        if self.host_distribution_account_public_key.is_empty() {
            return Err(SignerError::Config(
                "host distribution account public key cannot be empty".into(),
            ));
        }
        if !is_valid_public_key(&self.host_distribution_account_public_key) {
            return Err(SignerError::Config(
                "host distribution account public key is not a valid Ed25519 public key".into(),
            ));
        }
        Ok(())
    }
}

/// Resolves tenant bindings on every call; nothing is cached, so a rotated
/// distribution account is picked up immediately.
pub struct DistributionAccountResolverImpl {
    tenant_store: TenantStoreRef,
    host_distribution_account_public_key: String,
}

impl DistributionAccountResolverImpl {
    pub fn new(opts: DistributionAccountResolverOptions) -> Result<Self> {
        opts.validate()?;
        let tenant_store = opts
            .tenant_store
            .ok_or_else(|| SignerError::Config("tenant store cannot be nil".into()))?;
        Ok(Self {
            tenant_store,
            host_distribution_account_public_key: opts.host_distribution_account_public_key,
        })
    }
}

fn account_for_tenant(tenant: Tenant) -> Result<TransactionAccount> {
    match tenant.distribution_account_address {
        Some(address) if !address.is_empty() => Ok(TransactionAccount {
            r#type: tenant.distribution_account_type,
            address,
            status: tenant.distribution_account_status,
        }),
        _ => Err(SignerError::DistributionAccountNotConfigured(tenant.id)),
    }
}

#[async_trait]
impl DistributionAccountResolver for DistributionAccountResolverImpl {
    async fn distribution_account(&self, tenant_id: &str) -> Result<TransactionAccount> {
        let tenant = self
            .tenant_store
            .tenant_by_id(tenant_id)
            .await
            .context(|| format!("getting tenant {tenant_id}"))?;
        account_for_tenant(tenant)
    }

    async fn distribution_account_from_context(&self) -> Result<TransactionAccount> {
        account_for_tenant(current_tenant()?)
    }

    fn host_distribution_account(&self) -> &str {
        &self.host_distribution_account_public_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{AccountStatus, AccountType};
    use crate::domain::keypair::Keypair;
    use crate::domain::tenant::with_tenant;
    use crate::infrastructure::in_memory::InMemoryTenantStore;

    fn resolver(store: &InMemoryTenantStore, host: &str) -> DistributionAccountResolverImpl {
        DistributionAccountResolverImpl::new(DistributionAccountResolverOptions {
            tenant_store: Some(Arc::new(store.clone())),
            host_distribution_account_public_key: host.into(),
        })
        .unwrap()
    }

    #[test]
    fn test_options_validation() {
        let store: TenantStoreRef = Arc::new(InMemoryTenantStore::new());
        for key in ["", "GINVALID"] {
            let opts = DistributionAccountResolverOptions {
                tenant_store: Some(store.clone()),
                host_distribution_account_public_key: key.into(),
            };
            assert!(matches!(
                DistributionAccountResolverImpl::new(opts),
                Err(SignerError::Config(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_distribution_account_by_id() {
        let store = InMemoryTenantStore::new();
        let host = Keypair::random();
        let resolver = resolver(&store, host.address());
        assert_eq!(resolver.host_distribution_account(), host.address());

        let address = Keypair::random().address().to_string();
        store
            .upsert(
                Tenant::new("tenant-1", "aid-org-1")
                    .with_distribution_account(&address, AccountType::DistributionAccountStellarDbVault),
            )
            .await;
        store.upsert(Tenant::new("tenant-2", "aid-org-2")).await;

        let account = resolver.distribution_account("tenant-1").await.unwrap();
        assert_eq!(account.address, address);
        assert_eq!(account.r#type, AccountType::DistributionAccountStellarDbVault);
        assert_eq!(account.status, AccountStatus::Active);

        let err = resolver.distribution_account("tenant-2").await.unwrap_err();
        assert!(matches!(err, SignerError::DistributionAccountNotConfigured(ref id) if id == "tenant-2"));

        let err = resolver.distribution_account("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err.root(), SignerError::NotFound { entity: "tenant", .. }));
    }

    #[tokio::test]
    async fn test_rotation_is_seen_immediately() {
        let store = InMemoryTenantStore::new();
        let resolver = resolver(&store, Keypair::random().address());

        let first = Keypair::random().address().to_string();
        let second = Keypair::random().address().to_string();
        let tenant = Tenant::new("tenant-1", "aid-org-1")
            .with_distribution_account(&first, AccountType::DistributionAccountStellarEnv);
        store.upsert(tenant.clone()).await;
        assert_eq!(resolver.distribution_account("tenant-1").await.unwrap().address, first);

        store
            .upsert(tenant.with_distribution_account(&second, AccountType::DistributionAccountStellarEnv))
            .await;
        assert_eq!(resolver.distribution_account("tenant-1").await.unwrap().address, second);
    }

    #[tokio::test]
    async fn test_distribution_account_from_context() {
        let resolver = resolver(&InMemoryTenantStore::new(), Keypair::random().address());
        assert!(matches!(
            resolver.distribution_account_from_context().await,
            Err(SignerError::TenantNotInContext)
        ));

        let address = Keypair::random().address().to_string();
        let tenant = Tenant::new("tenant-1", "aid-org-1")
            .with_distribution_account(&address, AccountType::DistributionAccountStellarEnv);
        let account = with_tenant(tenant, resolver.distribution_account_from_context())
            .await
            .unwrap();
        assert_eq!(account.address, address);
    }
}
