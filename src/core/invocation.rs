//! Run parameters and the "is this provider configured?" rules.

use std::time::Duration;

use serde::Serialize;

use crate::core::config::AppConfig;
use crate::core::error::CloudError;
use crate::core::orchestrator::Workflow;
use crate::core::providers::Provider;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AwsTarget {
    pub region: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GcpTarget {
    pub project: Option<String>,
    pub billing_account: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AzureTarget {
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub workflow: Workflow,
    pub aws: AwsTarget,
    pub gcp: GcpTarget,
    pub azure: AzureTarget,
    pub timeout: Duration,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// First non-blank of a flag value and a config value.
pub fn pick(flag: Option<String>, config: &Option<String>) -> Option<String> {
    flag.filter(|v| !v.trim().is_empty())
        .or_else(|| config.clone().filter(|v| !v.trim().is_empty()))
}

const GCP_BILLING_HELP: &str = "Find your billing account ID with:\n  gcloud billing accounts list";
const AZURE_SUBSCRIPTION_HELP: &str = "List your subscriptions with:\n  az account list --output table";

impl Invocation {
    /// Identifiers from the config file only; flag values are layered on top by the CLI.
    pub fn from_config(workflow: Workflow, config: &AppConfig) -> Self {
        Self {
            workflow,
            aws: AwsTarget {
                region: pick(None, &config.aws.region),
                profile: pick(None, &config.aws.profile),
            },
            gcp: GcpTarget {
                project: pick(None, &config.gcp.project),
                billing_account: pick(None, &config.gcp.billing_account),
            },
            azure: AzureTarget {
                subscription: pick(None, &config.azure.subscription),
            },
            timeout: Duration::from_secs(config.settings.timeout_secs.max(1)),
        }
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.require(provider).is_ok()
    }

    /// Providers with every identifier this workflow needs, in priority order.
    pub fn configured_providers(&self) -> Vec<Provider> {
        Provider::all()
            .iter()
            .copied()
            .filter(|p| self.is_configured(*p))
            .collect()
    }

    /// Configuration error naming the first missing identifier for `provider`.
    pub fn require(&self, provider: Provider) -> Result<(), CloudError> {
        let missing = |flag, help| {
            Err(CloudError::MissingIdentifier {
                provider,
                flag,
                help,
            })
        };
        match provider {
            Provider::Aws => {
                if present(&self.aws.region) || present(&self.aws.profile) {
                    Ok(())
                } else {
                    missing("--region or --profile", None)
                }
            }
            Provider::Gcp => {
                if !present(&self.gcp.project) {
                    missing("--project", None)
                } else if self.workflow.needs_billing() && !present(&self.gcp.billing_account) {
                    missing("--billing-account", Some(GCP_BILLING_HELP))
                } else {
                    Ok(())
                }
            }
            Provider::Azure => {
                if present(&self.azure.subscription) {
                    Ok(())
                } else {
                    missing("--subscription", Some(AZURE_SUBSCRIPTION_HELP))
                }
            }
        }
    }
}
