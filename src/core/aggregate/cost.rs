use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::core::aggregate::{cost_delta, parse_total, CostDelta};
use crate::core::error::CloudError;
use crate::core::models::cost::{CostGroup, DEFAULT_UNIT};
use crate::core::models::result::{ProviderCostResult, ProviderOutcome};
use crate::core::providers::Provider;

/// One service's spend in both periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceComparison {
    pub service: String,
    pub last: f64,
    pub current: f64,
    pub unit: String,
    pub delta: CostDelta,
}

/// Union of both periods' services; a service absent from one period counts as 0 there.
/// Sorted by current spend, highest first, then by name.
pub fn merge_services(last: &CostGroup, current: &CostGroup) -> Vec<ServiceComparison> {
    let names: BTreeSet<&String> = last.keys().chain(current.keys()).collect();

    let mut merged: Vec<ServiceComparison> = names
        .into_iter()
        .map(|name| {
            let last_amount = last.get(name).map(|m| m.amount).unwrap_or(0.0);
            let current_amount = current.get(name).map(|m| m.amount).unwrap_or(0.0);
            let unit = current
                .get(name)
                .or_else(|| last.get(name))
                .map(|m| m.unit.clone())
                .unwrap_or_else(|| DEFAULT_UNIT.to_string());
            ServiceComparison {
                service: name.clone(),
                last: last_amount,
                current: current_amount,
                unit,
                delta: cost_delta(current_amount, last_amount),
            }
        })
        .collect();

    merged.sort_by(|a, b| {
        b.current
            .partial_cmp(&a.current)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.service.cmp(&b.service))
    });
    merged
}

/// A provider row of the cost report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderCostSummary {
    pub provider: Provider,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub account_id: String,
    pub current_total: f64,
    pub last_total: f64,
    pub unit: String,
    pub delta: CostDelta,
    pub services: Vec<ServiceComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderCostSummary {
    fn failed(provider: Provider, error: String) -> Self {
        Self {
            provider,
            account_id: String::new(),
            current_total: 0.0,
            last_total: 0.0,
            unit: DEFAULT_UNIT.to_string(),
            delta: cost_delta(0.0, 0.0),
            services: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Cross-provider cost comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    pub rows: Vec<ProviderCostSummary>,
    pub current_total: f64,
    pub last_total: f64,
    pub currency: String,
    pub delta: CostDelta,
    pub succeeded: usize,
    pub failed: usize,
}

impl CostReport {
    /// Fails like the collector does when no row survived summarizing, e.g.
    /// every provider answered but none with a parseable total.
    pub fn ensure_usable(&self) -> Result<(), CloudError> {
        if self.succeeded > 0 || self.rows.is_empty() {
            return Ok(());
        }
        let details = self
            .rows
            .iter()
            .map(|r| format!("  - {}: {}", r.provider, r.error.as_deref().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join("\n");
        Err(CloudError::AllProvidersFailed {
            count: self.rows.len(),
            details,
        })
    }
}

fn summarize_row(result: &ProviderCostResult) -> ProviderCostSummary {
    if let Some(err) = result.error().filter(|e| !e.is_empty()) {
        return ProviderCostSummary::failed(result.provider, err.to_string());
    }

    let totals = parse_total(&result.current_total)
        .and_then(|current| parse_total(&result.last_total).map(|last| (current, last)));
    let (current, last) = match totals {
        Ok(pair) => pair,
        Err(e) => return ProviderCostSummary::failed(result.provider, e.to_string()),
    };

    let empty = CostGroup::new();
    let services = merge_services(
        result.last_month.as_ref().map(|c| &c.costs).unwrap_or(&empty),
        result.current_month.as_ref().map(|c| &c.costs).unwrap_or(&empty),
    );

    ProviderCostSummary {
        provider: result.provider,
        account_id: result.account_id.clone(),
        current_total: current.amount,
        last_total: last.amount,
        delta: cost_delta(current.amount, last.amount),
        unit: current.unit,
        services,
        error: None,
    }
}

/// Per-provider comparisons plus combined totals over the providers that succeeded.
///
/// A row whose totals cannot be parsed is reported as failed and contributes nothing.
pub fn summarize_costs(results: &[ProviderCostResult]) -> CostReport {
    let rows: Vec<ProviderCostSummary> = results.iter().map(summarize_row).collect();

    let ok = rows.iter().filter(|r| !r.is_failed());
    let current_total: f64 = ok.clone().map(|r| r.current_total).sum();
    let last_total: f64 = ok.clone().map(|r| r.last_total).sum();
    let currency = ok
        .clone()
        .next()
        .map(|r| r.unit.clone())
        .unwrap_or_else(|| DEFAULT_UNIT.to_string());
    let succeeded = ok.count();

    CostReport {
        failed: rows.len() - succeeded,
        succeeded,
        current_total,
        last_total,
        currency,
        delta: cost_delta(current_total, last_total),
        rows,
    }
}
