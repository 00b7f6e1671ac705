//! GCP billing export (BigQuery `jobs.query`), Compute Engine aggregated
//! lists and Resource Manager responses.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

use crate::core::models::account::AccountInfo;
use crate::core::models::cost::{CostGroup, CostInfo, Money};
use crate::core::models::resource::{
    Reservation, StoppedInstance, UnusedIp, UnusedVolume, VolumeStatus,
};
use crate::core::normalize::{
    accumulate, classify_reservation, drop_zero, format_total, long_stopped_days, parse_amount,
    trailing_segment, unit_or_default,
};
use crate::core::period::BillingPeriod;
use crate::core::providers::Provider;

// --- billing export ---

/// Fully-qualified standard billing export table for a billing account.
///
/// `billingAccounts/0123AB-CDEF01-234567` and `0123AB-CDEF01-234567` both map to
/// `<project>.billing_export.gcp_billing_export_v1_0123AB_CDEF01_234567`.
pub fn billing_table(project: &str, billing_account: &str) -> String {
    let account = billing_account
        .trim()
        .trim_start_matches("billingAccounts/")
        .replace('-', "_");
    format!("{}.billing_export.gcp_billing_export_v1_{}", project, account)
}

fn date_filter(period: &BillingPeriod) -> String {
    format!(
        "DATE(usage_start_time) BETWEEN '{}' AND '{}'",
        period.start_str(),
        period.end_str()
    )
}

pub fn services_query(table: &str, period: &BillingPeriod) -> String {
    format!(
        "SELECT service.description AS service_name, SUM(cost) AS total_cost, \
         ANY_VALUE(currency) AS currency FROM `{}` WHERE {} \
         GROUP BY service_name ORDER BY total_cost DESC",
        table,
        date_filter(period)
    )
}

pub fn total_query(table: &str, period: &BillingPeriod) -> String {
    format!(
        "SELECT SUM(cost) AS total_cost, ANY_VALUE(currency) AS currency FROM `{}` WHERE {}",
        table,
        date_filter(period)
    )
}

/// One row per month across `months`, which must be ordered oldest first.
pub fn monthly_query(table: &str, months: &[BillingPeriod]) -> Result<String> {
    let (Some(first), Some(last)) = (months.first(), months.last()) else {
        bail!("No months requested");
    };
    let span = BillingPeriod {
        start: first.start,
        end: last.end,
    };
    Ok(format!(
        "SELECT FORMAT_DATE('%Y-%m', DATE(usage_start_time)) AS month, SUM(cost) AS total_cost, \
         ANY_VALUE(currency) AS currency FROM `{}` WHERE {} GROUP BY month ORDER BY month",
        table,
        date_filter(&span)
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub rows: Vec<TableRow>,
    #[serde(default = "job_complete_default")]
    pub job_complete: bool,
}

fn job_complete_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
pub struct FieldSchema {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
pub struct TableCell {
    pub v: Option<serde_json::Value>,
}

impl QueryResponse {
    fn ensure_complete(&self) -> Result<()> {
        if !self.job_complete {
            bail!("BigQuery job did not complete in time");
        }
        Ok(())
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.schema
            .as_ref()?
            .fields
            .iter()
            .position(|f| f.name == name)
    }

    /// String value of column `name` in `row`; BigQuery encodes every scalar as a string.
    fn cell<'a>(&self, row: &'a TableRow, name: &str) -> Option<&'a str> {
        let idx = self.column(name)?;
        row.f.get(idx)?.v.as_ref()?.as_str()
    }

    fn amount(&self, row: &TableRow) -> Result<f64> {
        match self.cell(row, "total_cost") {
            None => Ok(0.0),
            Some(raw) => parse_amount(raw)
                .with_context(|| format!("Could not parse BigQuery cost '{}'", raw)),
        }
    }
}

pub fn costs_by_service(resp: &QueryResponse, period: &BillingPeriod) -> Result<CostInfo> {
    resp.ensure_complete()?;
    let mut costs = CostGroup::new();
    for row in &resp.rows {
        let Some(service) = resp.cell(row, "service_name") else {
            continue;
        };
        let amount = resp.amount(row)?;
        accumulate(&mut costs, service, amount, resp.cell(row, "currency"));
    }
    Ok(CostInfo::new(period.start, period.end, drop_zero(costs)))
}

/// Formatted period total; an export with no rows for the period totals zero.
pub fn period_total(resp: &QueryResponse) -> Result<String> {
    resp.ensure_complete()?;
    match resp.rows.first() {
        Some(row) => Ok(format_total(resp.amount(row)?, resp.cell(row, "currency"))),
        None => Ok(format_total(0.0, None)),
    }
}

/// One total-only record per requested month; months missing from the
/// export are reported as zero so the series always has `months.len()` entries.
pub fn monthly_totals(resp: &QueryResponse, months: &[BillingPeriod]) -> Result<Vec<CostInfo>> {
    resp.ensure_complete()?;
    let mut by_month: BTreeMap<String, Money> = BTreeMap::new();
    for row in &resp.rows {
        let Some(month) = resp.cell(row, "month") else {
            continue;
        };
        let amount = resp.amount(row)?;
        by_month.insert(
            month.to_string(),
            Money::new(amount, unit_or_default(resp.cell(row, "currency"))),
        );
    }

    let fallback_unit = by_month
        .values()
        .next()
        .map(|m| m.unit.clone())
        .unwrap_or_else(|| unit_or_default(None));

    Ok(months
        .iter()
        .map(|p| {
            let key = p.start.format("%Y-%m").to_string();
            let total = by_month
                .remove(&key)
                .unwrap_or_else(|| Money::new(0.0, fallback_unit.clone()));
            CostInfo::total_only(p.start, p.end, total)
        })
        .collect())
}

// --- Resource Manager ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: String,
    #[serde(default)]
    pub name: String,
}

pub fn account_info(project: Project) -> AccountInfo {
    AccountInfo {
        provider: Provider::Gcp,
        account_id: project.project_id,
        account_name: project.name,
    }
}

// --- Compute Engine ---

/// `*.aggregatedList` response; each scope (`zones/...`, `regions/...`)
/// carries one list whose key depends on the resource kind.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct AggregatedList<T> {
    #[serde(default)]
    pub items: BTreeMap<String, ScopedList<T>>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ScopedList<T> {
    #[serde(
        default = "Vec::new",
        alias = "disks",
        alias = "addresses",
        alias = "instances",
        alias = "commitments"
    )]
    pub entries: Vec<T>,
}

impl<T> AggregatedList<T> {
    pub fn into_entries(self) -> impl Iterator<Item = T> {
        self.items.into_values().flat_map(|scope| scope.entries)
    }
}

fn size_gb<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    // int64 fields arrive as JSON strings
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0) as u32,
        _ => 0,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub name: String,
    #[serde(default, deserialize_with = "size_gb")]
    pub size_gb: u32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeAddress {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeInstance {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    pub last_stop_timestamp: Option<String>,
    pub creation_timestamp: Option<String>,
    #[serde(default)]
    pub disks: Vec<AttachedDisk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    #[serde(default)]
    pub source: String,
    #[serde(default, deserialize_with = "size_gb")]
    pub disk_size_gb: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commitment {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub plan: Option<String>,
    #[serde(default)]
    pub status: String,
    pub end_timestamp: Option<String>,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Ready disks that no instance uses.
pub fn unused_disks(disks: impl IntoIterator<Item = Disk>) -> Vec<UnusedVolume> {
    disks
        .into_iter()
        .filter(|d| d.users.is_empty() && d.status == "READY")
        .map(|d| UnusedVolume {
            id: d.name,
            size_gb: d.size_gb,
            status: VolumeStatus::Available,
        })
        .collect()
}

/// Reserved static addresses that nothing uses.
pub fn unused_addresses(addresses: impl IntoIterator<Item = ComputeAddress>) -> Vec<UnusedIp> {
    addresses
        .into_iter()
        .filter(|a| a.users.is_empty() && a.status == "RESERVED")
        .map(|a| UnusedIp {
            address: a.address,
            allocation_id: a.name,
        })
        .collect()
}

/// Terminated instances stopped past the threshold, with their attached disks.
///
/// The stop time is `lastStopTimestamp`, falling back to `creationTimestamp`
/// for instances that were never started again after creation.
pub fn long_stopped_instances(
    instances: impl IntoIterator<Item = ComputeInstance>,
    now: DateTime<Utc>,
) -> (Vec<StoppedInstance>, Vec<UnusedVolume>) {
    let mut stopped = Vec::new();
    let mut attached = Vec::new();

    for instance in instances {
        if instance.status != "TERMINATED" {
            continue;
        }
        let Some(stopped_at) = instance
            .last_stop_timestamp
            .as_deref()
            .or(instance.creation_timestamp.as_deref())
            .and_then(parse_timestamp)
        else {
            continue;
        };
        let Some(days) = long_stopped_days(now, stopped_at) else {
            continue;
        };

        attached.extend(instance.disks.iter().map(|d| UnusedVolume {
            id: trailing_segment(&d.source).to_string(),
            size_gb: d.disk_size_gb,
            status: VolumeStatus::AttachedStopped,
        }));

        let id = if instance.id.is_empty() {
            instance.name.clone()
        } else {
            instance.id
        };
        stopped.push(StoppedInstance {
            id,
            name: instance.name,
            stopped_days: days,
        });
    }

    (stopped, attached)
}

pub fn expiring_commitments(
    commitments: impl IntoIterator<Item = Commitment>,
    now: DateTime<Utc>,
) -> Vec<Reservation> {
    commitments
        .into_iter()
        .filter_map(|c| {
            let end = c.end_timestamp.as_deref().and_then(parse_timestamp)?;
            let kind = c.kind.or(c.plan).unwrap_or_default();
            classify_reservation(now, end, c.status == "ACTIVE", &c.name, &kind)
        })
        .collect()
}
