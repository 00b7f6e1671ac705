use async_trait::async_trait;
use std::sync::Arc;

use crate::core::error::CloudError;
use crate::core::models::account::AccountInfo;
use crate::core::models::cost::CostInfo;
use crate::core::models::resource::{Reservation, StoppedInstance, UnusedIp, UnusedVolume};
use crate::core::providers::Provider;

/// Account / project / subscription identity.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn account_info(&self) -> Result<AccountInfo, CloudError>;
}

/// Billing data.
#[async_trait]
pub trait CostSource: Send + Sync {
    async fn current_month_costs_by_service(&self) -> Result<CostInfo, CloudError>;
    async fn last_month_costs_by_service(&self) -> Result<CostInfo, CloudError>;
    /// Formatted as "<amount:.2> <UNIT>".
    async fn current_month_total(&self) -> Result<String, CloudError>;
    async fn last_month_total(&self) -> Result<String, CloudError>;
    /// Six monthly records, oldest first, each carrying only a "Total" entry.
    async fn last_six_months_costs(&self) -> Result<Vec<CostInfo>, CloudError>;
}

/// Idle-resource ("waste") inventory.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    async fn unused_volumes(&self) -> Result<Vec<UnusedVolume>, CloudError>;
    async fn unused_ips(&self) -> Result<Vec<UnusedIp>, CloudError>;
    /// Long-stopped instances plus the volumes still attached to them.
    async fn stopped_instances(
        &self,
    ) -> Result<(Vec<StoppedInstance>, Vec<UnusedVolume>), CloudError>;
    async fn expiring_reservations(&self) -> Result<Vec<Reservation>, CloudError>;
}

/// What one provider can answer for the current run.
///
/// Identity is mandatory; cost and resource capabilities are optional so a
/// provider wired only for waste detection carries no billing client at all.
#[derive(Clone)]
pub struct ProviderCapabilitySet {
    pub provider: Provider,
    pub identity: Arc<dyn IdentitySource>,
    pub cost: Option<Arc<dyn CostSource>>,
    pub resource: Option<Arc<dyn ResourceSource>>,
}

impl ProviderCapabilitySet {
    pub fn new(provider: Provider, identity: Arc<dyn IdentitySource>) -> Self {
        Self {
            provider,
            identity,
            cost: None,
            resource: None,
        }
    }

    pub fn with_cost(mut self, cost: Arc<dyn CostSource>) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_resource(mut self, resource: Arc<dyn ResourceSource>) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn require_cost(&self) -> Result<&dyn CostSource, CloudError> {
        self.cost.as_deref().ok_or(CloudError::CapabilityMissing {
            provider: self.provider,
            capability: "cost",
        })
    }

    pub fn require_resource(&self) -> Result<&dyn ResourceSource, CloudError> {
        self.resource.as_deref().ok_or(CloudError::CapabilityMissing {
            provider: self.provider,
            capability: "resource",
        })
    }
}

impl std::fmt::Debug for ProviderCapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCapabilitySet")
            .field("provider", &self.provider)
            .field("cost", &self.cost.is_some())
            .field("resource", &self.resource.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticIdentity;

    #[async_trait]
    impl IdentitySource for StaticIdentity {
        async fn account_info(&self) -> Result<AccountInfo, CloudError> {
            Ok(AccountInfo {
                provider: Provider::Gcp,
                account_id: "proj".into(),
                account_name: "Project".into(),
            })
        }
    }

    #[test]
    fn missing_capabilities_are_reported_not_dereferenced() {
        let caps = ProviderCapabilitySet::new(Provider::Gcp, Arc::new(StaticIdentity));
        let err = caps.require_cost().err().unwrap();
        assert_eq!(
            err,
            CloudError::CapabilityMissing {
                provider: Provider::Gcp,
                capability: "cost"
            }
        );
        assert!(caps.require_resource().is_err());
    }

    #[tokio::test]
    async fn identity_is_always_present() {
        let caps = ProviderCapabilitySet::new(Provider::Gcp, Arc::new(StaticIdentity));
        let info = caps.identity.account_info().await.unwrap();
        assert_eq!(info.account_id, "proj");
    }
}
