//! AWS Cost Explorer, STS and EC2 responses (as printed by `aws ... --output json`).

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use crate::core::models::account::AccountInfo;
use crate::core::models::cost::{CostGroup, CostInfo, Money};
use crate::core::models::resource::{
    Reservation, StoppedInstance, UnusedIp, UnusedVolume, VolumeStatus,
};
use crate::core::normalize::{
    accumulate, classify_reservation, drop_zero, format_total, long_stopped_days, parse_amount,
    unit_or_default,
};
use crate::core::providers::Provider;

/// Cost Explorer metric used for every query.
pub const COST_METRIC: &str = "UnblendedCost";

// --- Cost Explorer ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostAndUsageResponse {
    #[serde(default)]
    pub results_by_time: Vec<ResultByTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultByTime {
    pub time_period: DateInterval,
    #[serde(default)]
    pub total: HashMap<String, MetricValue>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DateInterval {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub metrics: HashMap<String, MetricValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricValue {
    pub amount: Option<String>,
    pub unit: Option<String>,
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("Invalid Cost Explorer date '{}'", raw))
}

fn first_result(resp: &CostAndUsageResponse) -> Result<&ResultByTime> {
    resp.results_by_time
        .first()
        .context("Cost Explorer returned no results for the period")
}

/// Per-service costs of the first (only) period in a SERVICE-grouped response.
pub fn costs_by_service(resp: &CostAndUsageResponse) -> Result<CostInfo> {
    let period = first_result(resp)?;
    let mut costs = CostGroup::new();
    for group in &period.groups {
        let Some(service) = group.keys.first() else {
            continue;
        };
        let Some(metric) = group.metrics.get(COST_METRIC) else {
            continue;
        };
        let Some(amount) = metric.amount.as_deref().and_then(parse_amount) else {
            continue;
        };
        accumulate(&mut costs, service, amount, metric.unit.as_deref());
    }
    Ok(CostInfo::new(
        parse_date(&period.time_period.start)?,
        parse_date(&period.time_period.end)?,
        drop_zero(costs),
    ))
}

/// Formatted total of the first period in an ungrouped response.
pub fn period_total(resp: &CostAndUsageResponse) -> Result<String> {
    let period = first_result(resp)?;
    let metric = period
        .total
        .get(COST_METRIC)
        .with_context(|| format!("Cost Explorer response has no {} total", COST_METRIC))?;
    let raw = metric.amount.as_deref().unwrap_or_default();
    let amount = parse_amount(raw)
        .with_context(|| format!("Could not parse total amount '{}'", raw))?;
    Ok(format_total(amount, metric.unit.as_deref()))
}

/// One total-only record per month of a MONTHLY-granularity response.
pub fn monthly_totals(resp: &CostAndUsageResponse) -> Result<Vec<CostInfo>> {
    resp.results_by_time
        .iter()
        .map(|period| {
            let metric = period.total.get(COST_METRIC);
            let raw = metric.and_then(|m| m.amount.as_deref()).unwrap_or("0");
            let amount = parse_amount(raw)
                .with_context(|| format!("Could not parse monthly total '{}'", raw))?;
            let unit = unit_or_default(metric.and_then(|m| m.unit.as_deref()));
            Ok(CostInfo::total_only(
                parse_date(&period.time_period.start)?,
                parse_date(&period.time_period.end)?,
                Money::new(amount, unit),
            ))
        })
        .collect()
}

// --- STS ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub account: String,
    #[serde(default)]
    pub arn: String,
}

pub fn account_info(identity: CallerIdentity) -> AccountInfo {
    AccountInfo {
        provider: Provider::Aws,
        account_id: identity.account,
        account_name: identity.arn,
    }
}

// --- EC2 ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeAddresses {
    #[serde(default)]
    pub addresses: Vec<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Address {
    pub public_ip: Option<String>,
    pub allocation_id: Option<String>,
    pub association_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeVolumes {
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    pub volume_id: String,
    #[serde(default)]
    pub size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstances {
    #[serde(default)]
    pub reservations: Vec<InstanceGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceGroup {
    #[serde(default)]
    pub instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instance {
    pub instance_id: String,
    pub state_transition_reason: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockDeviceMapping {
    pub ebs: Option<EbsDevice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EbsDevice {
    pub volume_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeReservedInstances {
    #[serde(default)]
    pub reserved_instances: Vec<ReservedInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReservedInstance {
    pub reserved_instances_id: String,
    #[serde(default)]
    pub instance_type: String,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: String,
}

/// Elastic IPs without an association.
pub fn unused_ips(resp: DescribeAddresses) -> Vec<UnusedIp> {
    resp.addresses
        .into_iter()
        .filter(|a| a.association_id.is_none())
        .map(|a| UnusedIp {
            address: a.public_ip.unwrap_or_default(),
            allocation_id: a.allocation_id.unwrap_or_default(),
        })
        .collect()
}

pub fn volumes(resp: DescribeVolumes, status: VolumeStatus) -> Vec<UnusedVolume> {
    resp.volumes
        .into_iter()
        .map(|v| UnusedVolume {
            id: v.volume_id,
            size_gb: v.size,
            status,
        })
        .collect()
}

/// Stop time embedded in a transition reason such as
/// `"User initiated (2024-01-15 10:30:00 GMT)"`.
pub fn parse_transition_date(reason: &str) -> Option<DateTime<Utc>> {
    let open = reason.find('(')?;
    let close = reason[open..].find(')')? + open;
    let inner = reason[open + 1..close].trim();
    let inner = inner.strip_suffix("GMT").unwrap_or(inner).trim();
    NaiveDateTime::parse_from_str(inner, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Instances stopped past the threshold, plus the EBS volume ids attached to them.
///
/// Instances whose stop time cannot be read from the transition reason are skipped.
pub fn long_stopped_instances(
    resp: DescribeInstances,
    now: DateTime<Utc>,
) -> (Vec<StoppedInstance>, Vec<String>) {
    let mut stopped = Vec::new();
    let mut volume_ids = Vec::new();

    for instance in resp.reservations.into_iter().flat_map(|r| r.instances) {
        let Some(stopped_at) = instance
            .state_transition_reason
            .as_deref()
            .and_then(parse_transition_date)
        else {
            continue;
        };
        let Some(days) = long_stopped_days(now, stopped_at) else {
            continue;
        };

        volume_ids.extend(
            instance
                .block_device_mappings
                .iter()
                .filter_map(|m| m.ebs.as_ref().and_then(|e| e.volume_id.clone())),
        );

        let name = instance
            .tags
            .iter()
            .find(|t| t.key == "Name")
            .map(|t| t.value.clone())
            .unwrap_or_else(|| instance.instance_id.clone());

        stopped.push(StoppedInstance {
            id: instance.instance_id,
            name,
            stopped_days: days,
        });
    }

    (stopped, volume_ids)
}

pub fn expiring_reservations(resp: DescribeReservedInstances, now: DateTime<Utc>) -> Vec<Reservation> {
    resp.reserved_instances
        .into_iter()
        .filter_map(|ri| {
            let end = ri.end?;
            classify_reservation(
                now,
                end,
                ri.state == "active",
                &ri.reserved_instances_id,
                &ri.instance_type,
            )
        })
        .collect()
}
