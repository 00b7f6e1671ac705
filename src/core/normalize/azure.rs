//! Azure Cost Management query results and ARM resource listings.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::core::models::account::AccountInfo;
use crate::core::models::cost::{CostGroup, CostInfo, Money};
use crate::core::models::resource::{
    Reservation, StoppedInstance, UnusedIp, UnusedVolume, VolumeStatus,
};
use crate::core::normalize::{
    accumulate, classify_reservation, format_total, trailing_segment, unit_or_default,
};
use crate::core::period::BillingPeriod;
use crate::core::providers::Provider;

// --- Cost Management ---

fn time_period(period: &BillingPeriod) -> Value {
    json!({
        "from": format!("{}T00:00:00Z", period.start_str()),
        "to": format!("{}T23:59:59Z", period.end_str()),
    })
}

/// Actual cost for `period`, one row per service.
pub fn services_query(period: &BillingPeriod) -> Value {
    json!({
        "type": "ActualCost",
        "timeframe": "Custom",
        "timePeriod": time_period(period),
        "dataset": {
            "granularity": "None",
            "aggregation": {"totalCost": {"name": "Cost", "function": "Sum"}},
            "grouping": [{"type": "Dimension", "name": "ServiceName"}]
        }
    })
}

/// Actual cost for `period` as a single row.
pub fn total_query(period: &BillingPeriod) -> Value {
    json!({
        "type": "ActualCost",
        "timeframe": "Custom",
        "timePeriod": time_period(period),
        "dataset": {
            "granularity": "None",
            "aggregation": {"totalCost": {"name": "Cost", "function": "Sum"}}
        }
    })
}

/// One row per billing month across `months` (oldest first).
pub fn monthly_query(months: &[BillingPeriod]) -> Result<Value> {
    let (Some(first), Some(last)) = (months.first(), months.last()) else {
        bail!("No months requested");
    };
    let span = BillingPeriod {
        start: first.start,
        end: last.end,
    };
    Ok(json!({
        "type": "ActualCost",
        "timeframe": "Custom",
        "timePeriod": time_period(&span),
        "dataset": {
            "granularity": "Monthly",
            "aggregation": {"totalCost": {"name": "Cost", "function": "Sum"}}
        }
    }))
}

#[derive(Debug, Deserialize)]
pub struct QueryResult {
    pub properties: QueryProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryProperties {
    #[serde(default)]
    pub columns: Vec<QueryColumn>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryColumn {
    pub name: String,
}

impl QueryProperties {
    /// Column index by name, or `fallback` when the result carries no column list.
    fn index(&self, names: &[&str], fallback: Option<usize>) -> Option<usize> {
        if self.columns.is_empty() {
            return fallback;
        }
        self.columns
            .iter()
            .position(|c| names.iter().any(|n| c.name.eq_ignore_ascii_case(n)))
    }

    fn cost_index(&self) -> Option<usize> {
        self.index(&["Cost", "PreTaxCost", "totalCost"], Some(0))
    }

    fn currency(&self, row: &[Value]) -> Option<String> {
        let idx = self.index(&["Currency"], None)?;
        row.get(idx)?.as_str().map(str::to_string)
    }
}

fn number(value: Option<&Value>) -> Result<f64> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n.as_f64().context("Cost is not a finite number"),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .with_context(|| format!("Could not parse cost '{}'", s)),
        Some(other) => bail!("Unexpected cost value {}", other),
    }
}

/// Per-service costs; daily or per-meter rows of the same service are summed
/// and non-positive services are dropped.
pub fn costs_by_service(result: &QueryResult, period: &BillingPeriod) -> Result<CostInfo> {
    let props = &result.properties;
    let cost_idx = props.cost_index().context("Query result has no cost column")?;
    let service_idx = props
        .index(&["ServiceName"], Some(1))
        .context("Query result has no ServiceName column")?;

    let mut costs = CostGroup::new();
    for row in &props.rows {
        let amount = number(row.get(cost_idx))?;
        if amount <= 0.0 {
            continue;
        }
        let Some(service) = row.get(service_idx).and_then(Value::as_str) else {
            continue;
        };
        let unit = props.currency(row);
        accumulate(&mut costs, service, amount, unit.as_deref());
    }
    Ok(CostInfo::new(period.start, period.end, costs))
}

/// Sum of the cost column across all rows.
pub fn period_total(result: &QueryResult) -> Result<String> {
    let props = &result.properties;
    let cost_idx = props.cost_index().context("Query result has no cost column")?;
    let mut total = 0.0;
    let mut unit = None;
    for row in &props.rows {
        total += number(row.get(cost_idx))?;
        if unit.is_none() {
            unit = props.currency(row);
        }
    }
    Ok(format_total(total, unit.as_deref()))
}

/// One total-only record per requested month; months absent from the result are zero.
pub fn monthly_totals(result: &QueryResult, months: &[BillingPeriod]) -> Result<Vec<CostInfo>> {
    let props = &result.properties;
    let cost_idx = props.cost_index().context("Query result has no cost column")?;
    let month_idx = props
        .index(&["BillingMonth", "UsageDate"], Some(1))
        .context("Query result has no BillingMonth column")?;

    let mut by_month: BTreeMap<String, Money> = BTreeMap::new();
    for row in &props.rows {
        let Some(key) = row.get(month_idx).and_then(month_key) else {
            continue;
        };
        let amount = number(row.get(cost_idx))?;
        let unit = unit_or_default(props.currency(row).as_deref());
        by_month
            .entry(key)
            .and_modify(|m| m.amount += amount)
            .or_insert_with(|| Money::new(amount, unit));
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

/// `"2024-01-01T00:00:00"` or `20240101` -> `"2024-01"`.
fn month_key(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).take(6).collect();
    (digits.len() == 6).then(|| format!("{}-{}", &digits[..4], &digits[4..]))
}

// --- ARM listings ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: String,
}

pub fn account_info(sub: Subscription) -> AccountInfo {
    AccountInfo {
        provider: Provider::Azure,
        account_id: sub.subscription_id,
        account_name: sub.display_name,
    }
}

#[derive(Debug, Deserialize)]
pub struct ManagedDisk {
    pub name: String,
    #[serde(default)]
    pub properties: DiskProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskProperties {
    #[serde(rename = "diskSizeGB", default)]
    pub disk_size_gb: u32,
    #[serde(default)]
    pub disk_state: String,
}

#[derive(Debug, Deserialize)]
pub struct PublicIp {
    pub name: String,
    #[serde(default)]
    pub properties: PublicIpProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpProperties {
    pub ip_address: Option<String>,
    pub ip_configuration: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct VirtualMachine {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: VmProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    pub storage_profile: Option<StorageProfile>,
    pub instance_view: Option<InstanceView>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    pub os_disk: Option<VmDisk>,
    #[serde(default)]
    pub data_disks: Vec<VmDisk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmDisk {
    pub name: Option<String>,
    #[serde(rename = "diskSizeGB")]
    pub disk_size_gb: Option<u32>,
    pub managed_disk: Option<ManagedDiskRef>,
}

#[derive(Debug, Deserialize)]
pub struct ManagedDiskRef {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InstanceView {
    #[serde(default)]
    pub statuses: Vec<InstanceStatus>,
}

#[derive(Debug, Deserialize)]
pub struct InstanceStatus {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ReservationOrder {
    pub name: String,
    #[serde(default)]
    pub properties: ReservationOrderProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationOrderProperties {
    pub display_name: Option<String>,
    pub expiry_date: Option<String>,
    pub expiry_date_time: Option<String>,
    pub provisioning_state: Option<String>,
}

pub fn unattached_disks(disks: impl IntoIterator<Item = ManagedDisk>) -> Vec<UnusedVolume> {
    disks
        .into_iter()
        .filter(|d| d.properties.disk_state == "Unattached")
        .map(|d| UnusedVolume {
            id: d.name,
            size_gb: d.properties.disk_size_gb,
            status: VolumeStatus::Available,
        })
        .collect()
}

/// Public IPs bound to no network interface or load balancer.
pub fn unassociated_ips(ips: impl IntoIterator<Item = PublicIp>) -> Vec<UnusedIp> {
    ips.into_iter()
        .filter(|ip| ip.properties.ip_configuration.is_none())
        .map(|ip| UnusedIp {
            address: ip.properties.ip_address.unwrap_or_default(),
            allocation_id: ip.name,
        })
        .collect()
}

fn is_deallocated(vm: &VirtualMachine) -> bool {
    vm.properties
        .instance_view
        .as_ref()
        .is_some_and(|view| {
            view.statuses
                .iter()
                .any(|s| s.code.starts_with("PowerState/deallocated"))
        })
}

fn disk_volume(disk: &VmDisk) -> Option<UnusedVolume> {
    let id = disk
        .managed_disk
        .as_ref()
        .and_then(|m| m.id.as_deref())
        .map(trailing_segment)
        .or(disk.name.as_deref())?;
    Some(UnusedVolume {
        id: id.to_string(),
        size_gb: disk.disk_size_gb.unwrap_or(0),
        status: VolumeStatus::AttachedStopped,
    })
}

/// Deallocated VMs and their managed disks.
///
/// The instance view carries no deallocation timestamp, so every VM is
/// reported with an unknown stopped duration.
pub fn deallocated_vms(
    vms: impl IntoIterator<Item = VirtualMachine>,
) -> (Vec<StoppedInstance>, Vec<UnusedVolume>) {
    let mut stopped = Vec::new();
    let mut attached = Vec::new();

    for vm in vms.into_iter().filter(is_deallocated) {
        if let Some(profile) = &vm.properties.storage_profile {
            attached.extend(
                profile
                    .os_disk
                    .iter()
                    .chain(profile.data_disks.iter())
                    .filter_map(disk_volume),
            );
        }
        let id = if vm.id.is_empty() {
            vm.name.clone()
        } else {
            trailing_segment(&vm.id).to_string()
        };
        stopped.push(StoppedInstance::unknown_duration(id, vm.name));
    }

    (stopped, attached)
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

pub fn expiring_reservations(
    orders: impl IntoIterator<Item = ReservationOrder>,
    now: DateTime<Utc>,
) -> Vec<Reservation> {
    orders
        .into_iter()
        .filter_map(|order| {
            let props = &order.properties;
            let end = props
                .expiry_date_time
                .as_deref()
                .or(props.expiry_date.as_deref())
                .and_then(parse_expiry)?;
            let active = props.provisioning_state.as_deref() == Some("Succeeded");
            let kind = props.display_name.as_deref().unwrap_or_default();
            classify_reservation(now, end, active, &order.name, kind)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::resource::ReservationStatus;
    use crate::core::period::trailing_months;
    use chrono::TimeZone;

    fn june() -> BillingPeriod {
        BillingPeriod {
            start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
        }
    }

    #[test]
    fn services_query_groups_by_service() {
        let body = services_query(&june());
        assert_eq!(body["timePeriod"]["from"], "2024-06-01T00:00:00Z");
        assert_eq!(body["timePeriod"]["to"], "2024-06-15T23:59:59Z");
        assert_eq!(body["dataset"]["grouping"][0]["name"], "ServiceName");
    }

    #[test]
    fn costs_by_service_sums_rows_and_skips_non_positive() {
        let json = r#"{"properties": {
            "columns": [
                {"name": "Cost", "type": "Number"},
                {"name": "ServiceName", "type": "String"},
                {"name": "Currency", "type": "String"}
            ],
            "rows": [
                [10.5, "Storage", "EUR"],
                [2.0, "Storage", "EUR"],
                [0, "Bandwidth", "EUR"],
                [-1.5, "Virtual Machines", "EUR"]
            ]
        }}"#;
        let result: QueryResult = serde_json::from_str(json).unwrap();
        let info = costs_by_service(&result, &june()).unwrap();
        assert_eq!(info.costs.len(), 1);
        assert_eq!(info.costs["Storage"], Money::new(12.5, "EUR"));
    }

    #[test]
    fn positional_rows_without_columns() {
        let json = r#"{"properties": {"rows": [[3.25, "Key Vault"]]}}"#;
        let result: QueryResult = serde_json::from_str(json).unwrap();
        let info = costs_by_service(&result, &june()).unwrap();
        assert_eq!(info.costs["Key Vault"], Money::new(3.25, "USD"));
    }

    #[test]
    fn period_total_sums_cost_column() {
        let json = r#"{"properties": {
            "columns": [{"name": "Cost"}, {"name": "Currency"}],
            "rows": [[60.0, "USD"], [40.0, "USD"]]
        }}"#;
        let result: QueryResult = serde_json::from_str(json).unwrap();
        assert_eq!(period_total(&result).unwrap(), "100.00 USD");

        let empty: QueryResult = serde_json::from_str(r#"{"properties": {"rows": []}}"#).unwrap();
        assert_eq!(period_total(&empty).unwrap(), "0.00 USD");
    }

    #[test]
    fn period_total_rejects_non_numeric_cost() {
        let json = r#"{"properties": {"rows": [["lots"]]}}"#;
        let result: QueryResult = serde_json::from_str(json).unwrap();
        assert!(period_total(&result).is_err());
    }

    #[test]
    fn monthly_totals_key_on_billing_month() {
        let months = trailing_months(NaiveDate::from_ymd_opt(2024, 7, 2).unwrap(), 6);
        let json = r#"{"properties": {
            "columns": [{"name": "Cost"}, {"name": "BillingMonth"}, {"name": "Currency"}],
            "rows": [
                [100.0, "2024-01-01T00:00:00", "USD"],
                [250.0, "2024-06-01T00:00:00", "USD"]
            ]
        }}"#;
        let result: QueryResult = serde_json::from_str(json).unwrap();
        let series = monthly_totals(&result, &months).unwrap();
        assert_eq!(series.len(), 6);
        assert_eq!(series[0].total().unwrap().amount, 100.0);
        assert_eq!(series[3].total().unwrap().amount, 0.0);
        assert_eq!(series[5].total().unwrap().amount, 250.0);
    }

    #[test]
    fn month_key_accepts_dates_and_numbers() {
        assert_eq!(month_key(&json!("2024-03-01T00:00:00")), Some("2024-03".into()));
        assert_eq!(month_key(&json!(20240301)), Some("2024-03".into()));
        assert_eq!(month_key(&json!(true)), None);
    }

    #[test]
    fn unattached_disks_and_free_ips() {
        let disks = r#"{"value": [
            {"name": "spare", "properties": {"diskSizeGB": 128, "diskState": "Unattached"}},
            {"name": "os", "properties": {"diskSizeGB": 30, "diskState": "Attached"}}
        ]}"#;
        let list: ListResponse<ManagedDisk> = serde_json::from_str(disks).unwrap();
        let unused = unattached_disks(list.value);
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].size_gb, 128);

        let ips = r#"{"value": [
            {"name": "pip-free", "properties": {"ipAddress": "20.1.2.3"}},
            {"name": "pip-nic", "properties": {"ipAddress": "20.1.2.4", "ipConfiguration": {"id": "/x/nic"}}}
        ], "nextLink": null}"#;
        let list: ListResponse<PublicIp> = serde_json::from_str(ips).unwrap();
        let free = unassociated_ips(list.value);
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].allocation_id, "pip-free");
    }

    #[test]
    fn deallocated_vms_have_unknown_duration_and_report_disks() {
        let json = r#"{"value": [
            {"id": "/subscriptions/s/vm/web", "name": "web", "properties": {
                "storageProfile": {
                    "osDisk": {"name": "web_os", "diskSizeGB": 30,
                               "managedDisk": {"id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/disks/web_os"}},
                    "dataDisks": [{"name": "web_data", "diskSizeGB": 256, "managedDisk": {"id": "/x/disks/web_data"}}]
                },
                "instanceView": {"statuses": [
                    {"code": "ProvisioningState/succeeded"},
                    {"code": "PowerState/deallocated"}
                ]}
            }},
            {"id": "/subscriptions/s/vm/api", "name": "api", "properties": {
                "instanceView": {"statuses": [{"code": "PowerState/running"}]}
            }}
        ]}"#;
        let list: ListResponse<VirtualMachine> = serde_json::from_str(json).unwrap();
        let (stopped, attached) = deallocated_vms(list.value);
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].name, "web");
        assert_eq!(stopped[0].id, "web");
        assert_eq!(stopped[0].known_stopped_days(), None);
        let ids: Vec<_> = attached.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["web_os", "web_data"]);
        assert_eq!(attached[1].size_gb, 256);
    }

    #[test]
    fn reservation_orders_are_classified() {
        let json = r#"{"value": [
            {"name": "order-1", "properties": {"displayName": "VM_RI_D2s", "expiryDate": "2024-07-20", "provisioningState": "Succeeded"}},
            {"name": "order-2", "properties": {"displayName": "SQL_RI", "expiryDateTime": "2025-01-01T00:00:00Z", "provisioningState": "Succeeded"}},
            {"name": "order-3", "properties": {"displayName": "Old", "expiryDate": "2024-06-25", "provisioningState": "Expired"}}
        ]}"#;
        let list: ListResponse<ReservationOrder> = serde_json::from_str(json).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let reservations = expiring_reservations(list.value, now);
        assert_eq!(reservations.len(), 2);
        assert_eq!(reservations[0].id, "order-1");
        assert_eq!(reservations[0].status, ReservationStatus::Expiring);
        assert_eq!(reservations[0].days_until_expiry, 19);
        assert_eq!(reservations[1].status, ReservationStatus::Expired);
    }
}
