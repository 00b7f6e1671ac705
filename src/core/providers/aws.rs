//! AWS through the `aws` CLI, so every credential source the CLI supports
//! (profiles, SSO, instance roles) works unchanged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::core::error::CloudError;
use crate::core::models::account::AccountInfo;
use crate::core::models::cost::CostInfo;
use crate::core::models::resource::{
    Reservation, StoppedInstance, UnusedIp, UnusedVolume, VolumeStatus,
};
use crate::core::normalize::aws as normalize;
use crate::core::period::{self, BillingPeriod};
use crate::core::process::{require_binary, run_json};
use crate::core::providers::capability::{CostSource, IdentitySource, ResourceSource};
use crate::core::providers::Provider;

const CLI: &str = "aws";
const CLI_TIMEOUT: Duration = Duration::from_secs(60);
const TREND_MONTHS: u32 = 6;

#[derive(Debug, Clone)]
pub struct AwsCli {
    region: Option<String>,
    profile: Option<String>,
}

fn upstream(err: anyhow::Error) -> CloudError {
    CloudError::upstream(Provider::Aws, err)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `Start=...,End=...` with an exclusive, never-empty end.
fn time_period_arg(period: &BillingPeriod) -> String {
    format!(
        "Start={},End={}",
        period.start_str(),
        period.exclusive_end().format("%Y-%m-%d")
    )
}

impl AwsCli {
    pub fn new(region: Option<String>, profile: Option<String>) -> Self {
        Self { region, profile }
    }

    /// Arguments for `aws <args...>` with output, region and profile appended.
    fn command_args(&self, args: &[&str]) -> Vec<String> {
        let mut full: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        full.extend(["--output".to_string(), "json".to_string()]);
        if let Some(region) = &self.region {
            full.extend(["--region".to_string(), region.clone()]);
        }
        if let Some(profile) = &self.profile {
            full.extend(["--profile".to_string(), profile.clone()]);
        }
        full
    }

    async fn call<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        require_binary(CLI, "install AWS CLI v2 and configure credentials")?;
        let full = self.command_args(args);
        let refs: Vec<&str> = full.iter().map(String::as_str).collect();
        run_json(CLI, &refs, CLI_TIMEOUT).await
    }

    async fn cost_and_usage(
        &self,
        period: &BillingPeriod,
        by_service: bool,
    ) -> Result<normalize::CostAndUsageResponse> {
        let time_period = time_period_arg(period);
        let mut args = vec![
            "ce",
            "get-cost-and-usage",
            "--time-period",
            time_period.as_str(),
            "--granularity",
            "MONTHLY",
            "--metrics",
            normalize::COST_METRIC,
        ];
        if by_service {
            args.extend(["--group-by", "Type=DIMENSION,Key=SERVICE"]);
        }
        self.call(&args)
            .await
            .context("Cost Explorer get-cost-and-usage failed")
    }

    async fn costs_by_service(&self, period: BillingPeriod) -> Result<CostInfo, CloudError> {
        let resp = self.cost_and_usage(&period, true).await.map_err(upstream)?;
        normalize::costs_by_service(&resp).map_err(upstream)
    }

    async fn total(&self, period: BillingPeriod) -> Result<String, CloudError> {
        let resp = self.cost_and_usage(&period, false).await.map_err(upstream)?;
        normalize::period_total(&resp).map_err(upstream)
    }

    async fn volumes_by_id(&self, ids: &[String]) -> Result<Vec<UnusedVolume>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["ec2", "describe-volumes", "--volume-ids"];
        args.extend(ids.iter().map(String::as_str));
        let resp: normalize::DescribeVolumes = self
            .call(&args)
            .await
            .context("describe-volumes for stopped instances failed")?;
        Ok(normalize::volumes(resp, VolumeStatus::AttachedStopped))
    }
}

#[async_trait]
impl IdentitySource for AwsCli {
    async fn account_info(&self) -> Result<AccountInfo, CloudError> {
        let identity: normalize::CallerIdentity = self
            .call(&["sts", "get-caller-identity"])
            .await
            .context("sts get-caller-identity failed")
            .map_err(upstream)?;
        Ok(normalize::account_info(identity))
    }
}

#[async_trait]
impl CostSource for AwsCli {
    async fn current_month_costs_by_service(&self) -> Result<CostInfo, CloudError> {
        self.costs_by_service(period::current_month(today())).await
    }

    async fn last_month_costs_by_service(&self) -> Result<CostInfo, CloudError> {
        self.costs_by_service(period::last_month(today())).await
    }

    async fn current_month_total(&self) -> Result<String, CloudError> {
        self.total(period::current_month(today())).await
    }

    async fn last_month_total(&self) -> Result<String, CloudError> {
        self.total(period::last_month(today())).await
    }

    async fn last_six_months_costs(&self) -> Result<Vec<CostInfo>, CloudError> {
        let today = today();
        let months = period::trailing_months(today, TREND_MONTHS);
        let span = match months.first() {
            Some(first) => BillingPeriod {
                start: first.start,
                end: period::first_of_month(today),
            },
            None => return Ok(Vec::new()),
        };
        let resp = self.cost_and_usage(&span, false).await.map_err(upstream)?;
        normalize::monthly_totals(&resp).map_err(upstream)
    }
}

#[async_trait]
impl ResourceSource for AwsCli {
    async fn unused_volumes(&self) -> Result<Vec<UnusedVolume>, CloudError> {
        let resp: normalize::DescribeVolumes = self
            .call(&[
                "ec2",
                "describe-volumes",
                "--filters",
                "Name=status,Values=available",
            ])
            .await
            .context("describe-volumes failed")
            .map_err(upstream)?;
        Ok(normalize::volumes(resp, VolumeStatus::Available))
    }

    async fn unused_ips(&self) -> Result<Vec<UnusedIp>, CloudError> {
        let resp: normalize::DescribeAddresses = self
            .call(&["ec2", "describe-addresses"])
            .await
            .context("describe-addresses failed")
            .map_err(upstream)?;
        Ok(normalize::unused_ips(resp))
    }

    async fn stopped_instances(
        &self,
    ) -> Result<(Vec<StoppedInstance>, Vec<UnusedVolume>), CloudError> {
        let resp: normalize::DescribeInstances = self
            .call(&[
                "ec2",
                "describe-instances",
                "--filters",
                "Name=instance-state-name,Values=stopped",
            ])
            .await
            .context("describe-instances failed")
            .map_err(upstream)?;
        let (stopped, volume_ids) = normalize::long_stopped_instances(resp, Utc::now());
        let attached = self.volumes_by_id(&volume_ids).await.map_err(upstream)?;
        Ok((stopped, attached))
    }

    async fn expiring_reservations(&self) -> Result<Vec<Reservation>, CloudError> {
        let resp: normalize::DescribeReservedInstances = self
            .call(&["ec2", "describe-reserved-instances"])
            .await
            .context("describe-reserved-instances failed")
            .map_err(upstream)?;
        Ok(normalize::expiring_reservations(resp, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_args_append_region_and_profile() {
        let cli = AwsCli::new(Some("eu-west-1".into()), Some("ops".into()));
        let args = cli.command_args(&["sts", "get-caller-identity"]);
        assert_eq!(
            args,
            vec![
                "sts",
                "get-caller-identity",
                "--output",
                "json",
                "--region",
                "eu-west-1",
                "--profile",
                "ops"
            ]
        );
    }

    #[test]
    fn command_args_without_optional_flags() {
        let cli = AwsCli::new(None, Some("ops".into()));
        let args = cli.command_args(&["ec2", "describe-addresses"]);
        assert!(!args.iter().any(|a| a == "--region"));
        assert!(args.iter().any(|a| a == "--profile"));
    }

    #[test]
    fn time_period_end_is_exclusive_and_non_empty() {
        let first = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let p = period::current_month(first);
        assert_eq!(time_period_arg(&p), "Start=2024-06-01,End=2024-06-02");

        let mid = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let p = period::current_month(mid);
        assert_eq!(time_period_arg(&p), "Start=2024-06-01,End=2024-06-15");
    }
}
