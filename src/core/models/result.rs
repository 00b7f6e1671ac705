use serde::{Deserialize, Serialize};

use crate::core::error::CloudError;
use crate::core::models::cost::CostInfo;
use crate::core::models::resource::{Reservation, StoppedInstance, UnusedIp, UnusedVolume};
use crate::core::providers::Provider;

/// One provider's outcome in a multi-provider run.
///
/// A non-empty `error` is the only authoritative failure signal; any data
/// fields populated next to it must be ignored.
pub trait ProviderOutcome: Send + 'static {
    fn provider(&self) -> Provider;
    fn error(&self) -> Option<&str>;
    fn from_error(provider: Provider, err: &CloudError) -> Self;

    fn is_failed(&self) -> bool {
        self.error().is_some_and(|e| !e.is_empty())
    }
}

/// Outcome of the cost (default) or trend workflow for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCostResult {
    pub provider: Provider,
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_month: Option<CostInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_month: Option<CostInfo>,
    /// Formatted "<amount> <unit>" total of the current period
    #[serde(skip_serializing_if = "String::is_empty")]
    pub current_total: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_total: String,
    /// Monthly totals, oldest first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trend: Vec<CostInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderCostResult {
    pub fn empty(provider: Provider) -> Self {
        Self {
            provider,
            account_id: String::new(),
            current_month: None,
            last_month: None,
            current_total: String::new(),
            last_total: String::new(),
            trend: Vec::new(),
            error: None,
        }
    }
}

impl ProviderOutcome for ProviderCostResult {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn from_error(provider: Provider, err: &CloudError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::empty(provider)
        }
    }
}

/// Outcome of the waste workflow for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderWasteResult {
    pub provider: Provider,
    pub account_id: String,
    pub unused_volumes: Vec<UnusedVolume>,
    #[serde(rename = "volumes_attached_to_stopped_instances")]
    pub attached_volumes: Vec<UnusedVolume>,
    pub unused_ips: Vec<UnusedIp>,
    pub stopped_instances: Vec<StoppedInstance>,
    pub expiring_reservations: Vec<Reservation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderWasteResult {
    pub fn empty(provider: Provider) -> Self {
        Self {
            provider,
            account_id: String::new(),
            unused_volumes: Vec::new(),
            attached_volumes: Vec::new(),
            unused_ips: Vec::new(),
            stopped_instances: Vec::new(),
            expiring_reservations: Vec::new(),
            error: None,
        }
    }

    pub fn has_waste(&self) -> bool {
        !self.unused_volumes.is_empty()
            || !self.attached_volumes.is_empty()
            || !self.unused_ips.is_empty()
            || !self.stopped_instances.is_empty()
            || !self.expiring_reservations.is_empty()
    }
}

impl ProviderOutcome for ProviderWasteResult {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn from_error(provider: Provider, err: &CloudError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::empty(provider)
        }
    }
}
