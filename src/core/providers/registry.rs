use std::sync::Arc;

use crate::core::error::CloudError;
use crate::core::invocation::Invocation;
use crate::core::providers::aws::AwsCli;
use crate::core::providers::azure::AzureApi;
use crate::core::providers::capability::ProviderCapabilitySet;
use crate::core::providers::gcp::GcpApi;
use crate::core::providers::Provider;

/// Builds the capability set for one provider from run parameters.
pub trait CapabilityFactory {
    fn build(&self, invocation: &Invocation, provider: Provider)
        -> Result<ProviderCapabilitySet, CloudError>;
}

/// Adapters talking to the real clouds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveProviders;

fn required(value: &Option<String>, provider: Provider, flag: &'static str) -> Result<String, CloudError> {
    value.clone().ok_or(CloudError::MissingIdentifier {
        provider,
        flag,
        help: None,
    })
}

impl CapabilityFactory for LiveProviders {
    fn build(
        &self,
        invocation: &Invocation,
        provider: Provider,
    ) -> Result<ProviderCapabilitySet, CloudError> {
        invocation.require(provider)?;
        let caps = match provider {
            Provider::Aws => {
                let cli = Arc::new(AwsCli::new(
                    invocation.aws.region.clone(),
                    invocation.aws.profile.clone(),
                ));
                ProviderCapabilitySet::new(provider, cli.clone())
                    .with_cost(cli.clone())
                    .with_resource(cli)
            }
            Provider::Gcp => {
                let project = required(&invocation.gcp.project, provider, "--project")?;
                let billing = invocation.gcp.billing_account.clone();
                let has_billing = billing.is_some();
                let api = Arc::new(GcpApi::new(project, billing));
                let caps = ProviderCapabilitySet::new(provider, api.clone()).with_resource(api.clone());
                if has_billing {
                    caps.with_cost(api)
                } else {
                    caps
                }
            }
            Provider::Azure => {
                let subscription =
                    required(&invocation.azure.subscription, provider, "--subscription")?;
                let api = Arc::new(AzureApi::new(subscription));
                ProviderCapabilitySet::new(provider, api.clone())
                    .with_cost(api.clone())
                    .with_resource(api)
            }
        };
        Ok(caps)
    }
}

/// Capability sets for every configured provider, in priority order.
pub fn build_configured(
    factory: &dyn CapabilityFactory,
    invocation: &Invocation,
) -> Result<Vec<ProviderCapabilitySet>, CloudError> {
    invocation
        .configured_providers()
        .into_iter()
        .map(|p| factory.build(invocation, p))
        .collect()
}
