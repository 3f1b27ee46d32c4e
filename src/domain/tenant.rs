use super::account::{AccountStatus, AccountType};
use crate::error::{Result, SignerError};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A client organization and its distribution account binding.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub distribution_account_address: Option<String>,
    pub distribution_account_type: AccountType,
    #[serde(default)]
    pub distribution_account_status: AccountStatus,
}

impl Tenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            distribution_account_address: None,
            distribution_account_type: AccountType::DistributionAccountStellarEnv,
            distribution_account_status: AccountStatus::Active,
        }
    }

    pub fn with_distribution_account(
        mut self,
        address: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        self.distribution_account_address = Some(address.into());
        self.distribution_account_type = account_type;
        self
    }
}

tokio::task_local! {
    static CURRENT_TENANT: Tenant;
}

/// Runs `future` with `tenant` as the ambient tenant of the task.
pub async fn with_tenant<F: Future>(tenant: Tenant, future: F) -> F::Output {
    CURRENT_TENANT.scope(tenant, future).await
}

/// The tenant scoped by [`with_tenant`] around the current task.
pub fn current_tenant() -> Result<Tenant> {
    CURRENT_TENANT
        .try_with(Clone::clone)
        .map_err(|_| SignerError::TenantNotInContext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_current_tenant_is_task_scoped() {
        assert!(matches!(
            current_tenant(),
            Err(SignerError::TenantNotInContext)
        ));

        let tenant = Tenant::new("tenant-1", "aid-org-1");
        let seen = with_tenant(tenant.clone(), async { current_tenant() })
            .await
            .unwrap();
        assert_eq!(seen, tenant);

        assert!(current_tenant().is_err());
    }
}
