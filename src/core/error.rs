use std::time::Duration;

use thiserror::Error;

use crate::core::orchestrator::Workflow;
use crate::core::providers::Provider;

/// Error taxonomy of the aggregation engine.
///
/// Per-provider variants (`MissingIdentifier`, `CapabilityMissing`, `Upstream`,
/// `Parse`, `Timeout`, `TaskFailed`) end up in that provider's result row.
/// `NoProvidersConfigured` and `AllProvidersFailed` abort the whole operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CloudError {
    #[error("no providers configured. Use {}", .workflow.required_flags())]
    NoProvidersConfigured { workflow: Workflow },

    #[error("{flag} flag is required for {provider}{}", format_help(.help))]
    MissingIdentifier {
        provider: Provider,
        flag: &'static str,
        help: Option<&'static str>,
    },

    #[error("{provider} has no {capability} capability configured")]
    CapabilityMissing {
        provider: Provider,
        capability: &'static str,
    },

    #[error("{message}")]
    Upstream { provider: Provider, message: String },

    #[error("could not parse cost total '{input}'")]
    Parse { input: String },

    #[error("{provider} did not respond within {limit:?}")]
    Timeout { provider: Provider, limit: Duration },

    #[error("{provider} worker stopped unexpectedly: {message}")]
    TaskFailed { provider: Provider, message: String },

    #[error("all {count} configured providers failed:\n{details}")]
    AllProvidersFailed { count: usize, details: String },
}

fn format_help(help: &Option<&'static str>) -> String {
    help.map(|h| format!("\n\n{}", h)).unwrap_or_default()
}

impl CloudError {
    /// Wrap an adapter failure, keeping the whole context chain in the message.
    pub fn upstream(provider: Provider, err: anyhow::Error) -> Self {
        Self::Upstream {
            provider,
            message: format!("{:#}", err),
        }
    }

    /// True for errors that abort a multi-provider operation as a whole.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Self::NoProvidersConfigured { .. } | Self::AllProvidersFailed { .. }
        )
    }
}
