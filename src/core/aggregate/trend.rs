use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::models::cost::{CostInfo, DEFAULT_UNIT};
use crate::core::models::result::{ProviderCostResult, ProviderOutcome};
use crate::core::providers::Provider;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotal {
    /// `YYYY-MM`
    pub month: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub months: Vec<MonthTotal>,
    pub total: f64,
    pub average: f64,
    pub highest: Option<MonthTotal>,
    pub lowest: Option<MonthTotal>,
    pub currency: String,
}

fn summarize_months(months: Vec<MonthTotal>, currency: String) -> TrendSummary {
    let total: f64 = months.iter().map(|m| m.amount).sum();
    let average = if months.is_empty() {
        0.0
    } else {
        total / months.len() as f64
    };

    // strict comparisons keep the first month seen on ties
    let mut highest: Option<&MonthTotal> = None;
    let mut lowest: Option<&MonthTotal> = None;
    for m in &months {
        if highest.map_or(true, |h| m.amount > h.amount) {
            highest = Some(m);
        }
        if lowest.map_or(true, |l| m.amount < l.amount) {
            lowest = Some(m);
        }
    }

    TrendSummary {
        highest: highest.cloned(),
        lowest: lowest.cloned(),
        total,
        average,
        currency,
        months,
    }
}

/// Total, average and extreme months of a monthly series (oldest first).
pub fn summarize_trend(series: &[CostInfo]) -> TrendSummary {
    let months = series
        .iter()
        .map(|info| MonthTotal {
            month: info.month_label(),
            amount: info.total().map(|m| m.amount).unwrap_or(0.0),
        })
        .collect();
    let currency = series
        .iter()
        .find_map(|info| info.total().map(|m| m.unit.clone()))
        .unwrap_or_else(|| DEFAULT_UNIT.to_string());
    summarize_months(months, currency)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderTrend {
    pub provider: Provider,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<TrendSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub rows: Vec<ProviderTrend>,
    /// Month-by-month sum over the providers that succeeded.
    pub combined: TrendSummary,
}

pub fn summarize_trends(results: &[ProviderCostResult]) -> TrendReport {
    let rows: Vec<ProviderTrend> = results
        .iter()
        .map(|r| match r.error().filter(|e| !e.is_empty()) {
            Some(err) => ProviderTrend {
                provider: r.provider,
                account_id: String::new(),
                summary: None,
                error: Some(err.to_string()),
            },
            None => ProviderTrend {
                provider: r.provider,
                account_id: r.account_id.clone(),
                summary: Some(summarize_trend(&r.trend)),
                error: None,
            },
        })
        .collect();

    let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
    let mut currency = None;
    for summary in rows.iter().filter_map(|r| r.summary.as_ref()) {
        currency.get_or_insert_with(|| summary.currency.clone());
        for m in &summary.months {
            *by_month.entry(m.month.clone()).or_insert(0.0) += m.amount;
        }
    }
    let combined = summarize_months(
        by_month
            .into_iter()
            .map(|(month, amount)| MonthTotal { month, amount })
            .collect(),
        currency.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
    );

    TrendReport { rows, combined }
}
