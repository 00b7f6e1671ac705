//! Single-provider workflows.
//!
//! Each workflow runs its capability calls in a fixed order and stops at the
//! first failure; the failure becomes the provider's result row instead of
//! propagating to sibling providers.

use serde::Serialize;
use tracing::debug;

use crate::core::error::CloudError;
use crate::core::models::result::{ProviderCostResult, ProviderOutcome, ProviderWasteResult};
use crate::core::providers::capability::ProviderCapabilitySet;

/// What a run reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    /// Month-to-date vs previous month, per service.
    #[default]
    Cost,
    /// Six complete months of totals.
    Trend,
    /// Idle and expiring resources.
    Waste,
}

impl Workflow {
    /// `waste` wins over `trend`, which wins over the default cost comparison.
    pub fn from_flags(trend: bool, waste: bool) -> Self {
        if waste {
            Self::Waste
        } else if trend {
            Self::Trend
        } else {
            Self::Cost
        }
    }

    pub fn needs_billing(&self) -> bool {
        !matches!(self, Self::Waste)
    }

    /// Identifier flags each provider needs for this workflow.
    pub fn required_flags(&self) -> &'static str {
        match self {
            Self::Cost | Self::Trend => {
                "--region/--profile for AWS, --project/--billing-account for GCP, --subscription for Azure"
            }
            Self::Waste => "--region/--profile for AWS, --project for GCP, --subscription for Azure",
        }
    }
}

async fn cost_steps(caps: &ProviderCapabilitySet) -> Result<ProviderCostResult, CloudError> {
    let provider = caps.provider;
    let cost = caps.require_cost()?;

    debug!(%provider, "fetching current month costs by service");
    let current_month = cost.current_month_costs_by_service().await?;
    debug!(%provider, "fetching last month costs by service");
    let last_month = cost.last_month_costs_by_service().await?;
    debug!(%provider, "fetching period totals");
    let current_total = cost.current_month_total().await?;
    let last_total = cost.last_month_total().await?;
    debug!(%provider, "fetching account identity");
    let account = caps.identity.account_info().await?;

    Ok(ProviderCostResult {
        account_id: account.account_id,
        current_month: Some(current_month),
        last_month: Some(last_month),
        current_total,
        last_total,
        ..ProviderCostResult::empty(provider)
    })
}

async fn trend_steps(caps: &ProviderCapabilitySet) -> Result<ProviderCostResult, CloudError> {
    let provider = caps.provider;
    let cost = caps.require_cost()?;

    debug!(%provider, "fetching six month trend");
    let trend = cost.last_six_months_costs().await?;
    debug!(%provider, months = trend.len(), "fetching account identity");
    let account = caps.identity.account_info().await?;

    Ok(ProviderCostResult {
        account_id: account.account_id,
        trend,
        ..ProviderCostResult::empty(provider)
    })
}

async fn waste_steps(caps: &ProviderCapabilitySet) -> Result<ProviderWasteResult, CloudError> {
    let provider = caps.provider;
    let resource = caps.require_resource()?;

    debug!(%provider, "listing unused IPs");
    let unused_ips = resource.unused_ips().await?;
    debug!(%provider, "listing unused volumes");
    let unused_volumes = resource.unused_volumes().await?;
    debug!(%provider, "listing stopped instances");
    let (stopped_instances, attached_volumes) = resource.stopped_instances().await?;
    debug!(%provider, "listing expiring reservations");
    let expiring_reservations = resource.expiring_reservations().await?;
    debug!(%provider, "fetching account identity");
    let account = caps.identity.account_info().await?;

    Ok(ProviderWasteResult {
        provider,
        account_id: account.account_id,
        unused_volumes,
        attached_volumes,
        unused_ips,
        stopped_instances,
        expiring_reservations,
        error: None,
    })
}

/// Current vs last month, per service and in total.
pub async fn run_cost(caps: &ProviderCapabilitySet) -> ProviderCostResult {
    cost_steps(caps)
        .await
        .unwrap_or_else(|e| ProviderCostResult::from_error(caps.provider, &e))
}

/// Six-month total series.
pub async fn run_trend(caps: &ProviderCapabilitySet) -> ProviderCostResult {
    trend_steps(caps)
        .await
        .unwrap_or_else(|e| ProviderCostResult::from_error(caps.provider, &e))
}

/// Idle-resource inventory.
pub async fn run_waste(caps: &ProviderCapabilitySet) -> ProviderWasteResult {
    waste_steps(caps)
        .await
        .unwrap_or_else(|e| ProviderWasteResult::from_error(caps.provider, &e))
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Scripted capability implementations shared by orchestrator and collector tests.

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::core::error::CloudError;
    use crate::core::models::account::AccountInfo;
    use crate::core::models::cost::{CostGroup, CostInfo, Money};
    use crate::core::models::resource::{
        Reservation, StoppedInstance, UnusedIp, UnusedVolume, VolumeStatus,
    };
    use crate::core::providers::capability::{
        CostSource, IdentitySource, ProviderCapabilitySet, ResourceSource,
    };
    use crate::core::providers::Provider;

    /// Records every call in order and fails on the call named `fail_at`.
    pub struct Script {
        pub provider: Provider,
        pub fail_at: Option<&'static str>,
        pub delay: Duration,
        pub calls: Mutex<Vec<&'static str>>,
        pub panic_at: Option<&'static str>,
    }

    impl Script {
        pub fn new(provider: Provider) -> Arc<Self> {
            Arc::new(Self::plain(provider))
        }

        pub fn failing(provider: Provider, step: &'static str) -> Arc<Self> {
            Arc::new(Self {
                fail_at: Some(step),
                ..Self::plain(provider)
            })
        }

        pub fn slow(provider: Provider, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                ..Self::plain(provider)
            })
        }

        pub fn panicking(provider: Provider, step: &'static str) -> Arc<Self> {
            Arc::new(Self {
                panic_at: Some(step),
                ..Self::plain(provider)
            })
        }

        fn plain(provider: Provider) -> Self {
            Self {
                provider,
                fail_at: None,
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
                panic_at: None,
            }
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        async fn step(&self, name: &'static str) -> Result<(), CloudError> {
            self.calls.lock().unwrap().push(name);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.panic_at == Some(name) {
                panic!("{} exploded", name);
            }
            if self.fail_at == Some(name) {
                return Err(CloudError::Upstream {
                    provider: self.provider,
                    message: format!("{} failed", name),
                });
            }
            Ok(())
        }
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn month(costs: &[(&str, f64)], start: NaiveDate, end: NaiveDate) -> CostInfo {
        let mut group = CostGroup::new();
        for (name, amount) in costs {
            group.insert(name.to_string(), Money::new(*amount, "USD"));
        }
        CostInfo::new(start, end, group)
    }

    #[async_trait]
    impl IdentitySource for Script {
        async fn account_info(&self) -> Result<AccountInfo, CloudError> {
            self.step("identity").await?;
            Ok(AccountInfo {
                provider: self.provider,
                account_id: format!("{}-account", self.provider.id()),
                account_name: "fake".into(),
            })
        }
    }

    #[async_trait]
    impl CostSource for Script {
        async fn current_month_costs_by_service(&self) -> Result<CostInfo, CloudError> {
            self.step("current_costs").await?;
            Ok(month(
                &[("Compute", 80.0), ("Storage", 40.0)],
                date(2024, 6, 1),
                date(2024, 6, 15),
            ))
        }

        async fn last_month_costs_by_service(&self) -> Result<CostInfo, CloudError> {
            self.step("last_costs").await?;
            Ok(month(
                &[("Compute", 70.0), ("Network", 30.0)],
                date(2024, 5, 1),
                date(2024, 5, 15),
            ))
        }

        async fn current_month_total(&self) -> Result<String, CloudError> {
            self.step("current_total").await?;
            Ok("120.00 USD".into())
        }

        async fn last_month_total(&self) -> Result<String, CloudError> {
            self.step("last_total").await?;
            Ok("100.00 USD".into())
        }

        async fn last_six_months_costs(&self) -> Result<Vec<CostInfo>, CloudError> {
            self.step("trend").await?;
            Ok([100.0, 80.0, 120.0, 90.0, 150.0, 55.0]
                .iter()
                .enumerate()
                .map(|(i, amount)| {
                    let start = date(2024, i as u32 + 1, 1);
                    CostInfo::total_only(start, start, Money::new(*amount, "USD"))
                })
                .collect())
        }
    }

    #[async_trait]
    impl ResourceSource for Script {
        async fn unused_volumes(&self) -> Result<Vec<UnusedVolume>, CloudError> {
            self.step("volumes").await?;
            Ok(vec![UnusedVolume {
                id: "vol-1".into(),
                size_gb: 100,
                status: VolumeStatus::Available,
            }])
        }

        async fn unused_ips(&self) -> Result<Vec<UnusedIp>, CloudError> {
            self.step("ips").await?;
            Ok(vec![UnusedIp {
                address: "1.2.3.4".into(),
                allocation_id: "eip-1".into(),
            }])
        }

        async fn stopped_instances(
            &self,
        ) -> Result<(Vec<StoppedInstance>, Vec<UnusedVolume>), CloudError> {
            self.step("stopped").await?;
            Ok((
                vec![StoppedInstance {
                    id: "i-1".into(),
                    name: "batch".into(),
                    stopped_days: 45,
                }],
                vec![UnusedVolume {
                    id: "vol-2".into(),
                    size_gb: 8,
                    status: VolumeStatus::AttachedStopped,
                }],
            ))
        }

        async fn expiring_reservations(&self) -> Result<Vec<Reservation>, CloudError> {
            self.step("reservations").await?;
            Ok(Vec::new())
        }
    }

    pub fn full(script: &Arc<Script>) -> ProviderCapabilitySet {
        ProviderCapabilitySet::new(script.provider, script.clone())
            .with_cost(script.clone())
            .with_resource(script.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{full, Script};
    use super::*;
    use crate::core::providers::Provider;

    #[test]
    fn waste_flag_wins_over_trend() {
        assert_eq!(Workflow::from_flags(true, true), Workflow::Waste);
        assert_eq!(Workflow::from_flags(true, false), Workflow::Trend);
        assert_eq!(Workflow::from_flags(false, false), Workflow::Cost);
    }

    #[test]
    fn waste_hint_omits_billing_account() {
        assert!(!Workflow::Waste.required_flags().contains("--billing-account"));
        assert!(Workflow::Trend.required_flags().contains("--billing-account"));
        assert!(!Workflow::Waste.needs_billing());
    }

    #[tokio::test]
    async fn cost_runs_steps_in_order_with_identity_last() {
        let script = Script::new(Provider::Aws);
        let result = run_cost(&full(&script)).await;
        assert!(!result.is_failed());
        assert_eq!(
            script.calls(),
            vec!["current_costs", "last_costs", "current_total", "last_total", "identity"]
        );
        assert_eq!(result.account_id, "aws-account");
        assert_eq!(result.current_total, "120.00 USD");
        assert!(result.current_month.is_some());
    }

    #[tokio::test]
    async fn cost_failure_aborts_remaining_steps() {
        let script = Script::failing(Provider::Gcp, "last_costs");
        let result = run_cost(&full(&script)).await;
        assert_eq!(result.error.as_deref(), Some("last_costs failed"));
        assert_eq!(script.calls(), vec!["current_costs", "last_costs"]);
        assert!(result.current_month.is_none());
        assert!(result.current_total.is_empty());
    }

    #[tokio::test]
    async fn trend_fetches_series_then_identity() {
        let script = Script::new(Provider::Azure);
        let result = run_trend(&full(&script)).await;
        assert_eq!(script.calls(), vec!["trend", "identity"]);
        assert_eq!(result.trend.len(), 6);
        assert!(result.current_month.is_none());
    }

    #[tokio::test]
    async fn waste_runs_inventory_in_order() {
        let script = Script::new(Provider::Aws);
        let result = run_waste(&full(&script)).await;
        assert_eq!(
            script.calls(),
            vec!["ips", "volumes", "stopped", "reservations", "identity"]
        );
        assert!(result.has_waste());
        assert_eq!(result.attached_volumes.len(), 1);
        assert_eq!(result.stopped_instances[0].stopped_days, 45);
    }

    #[tokio::test]
    async fn identity_failure_discards_collected_inventory() {
        let script = Script::failing(Provider::Aws, "identity");
        let result = run_waste(&full(&script)).await;
        assert!(result.is_failed());
        assert!(!result.has_waste());
    }

    #[tokio::test]
    async fn missing_capability_fails_before_any_call() {
        let script = Script::new(Provider::Gcp);
        let caps = ProviderCapabilitySet::new(Provider::Gcp, script.clone());
        let result = run_waste(&caps).await;
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("no resource capability"));
        assert!(script.calls().is_empty());

        let result = run_cost(&caps).await;
        assert!(result.error.as_deref().unwrap().contains("no cost capability"));
        assert!(script.calls().is_empty());
    }
}
