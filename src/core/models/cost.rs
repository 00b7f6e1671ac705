use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved cost-group key holding a pre-aggregated period total.
pub const TOTAL_KEY: &str = "Total";

/// Currency used when a provider does not report one.
pub const DEFAULT_UNIT: &str = "USD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    /// Currency code (e.g., "USD")
    pub unit: String,
}

impl Money {
    pub fn new(amount: f64, unit: impl Into<String>) -> Self {
        Self {
            amount,
            unit: unit.into(),
        }
    }
}

/// Service name -> cost for one billing period.
pub type CostGroup = BTreeMap<String, Money>;

/// Cost data for exactly one billing period of one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub costs: CostGroup,
}

impl CostInfo {
    pub fn new(start: NaiveDate, end: NaiveDate, costs: CostGroup) -> Self {
        Self { start, end, costs }
    }

    /// Trend record carrying only the period total.
    pub fn total_only(start: NaiveDate, end: NaiveDate, total: Money) -> Self {
        let mut costs = CostGroup::new();
        costs.insert(TOTAL_KEY.to_string(), total);
        Self { start, end, costs }
    }

    pub fn total(&self) -> Option<&Money> {
        self.costs.get(TOTAL_KEY)
    }

    /// "YYYY-MM" label of the period start.
    pub fn month_label(&self) -> String {
        self.start.format("%Y-%m").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn total_only_uses_reserved_key() {
        let info = CostInfo::total_only(date(2024, 3, 1), date(2024, 3, 31), Money::new(42.0, "USD"));
        assert_eq!(info.costs.len(), 1);
        assert_eq!(info.total().unwrap().amount, 42.0);
    }

    #[test]
    fn month_label_is_year_and_month() {
        let info = CostInfo::new(date(2024, 11, 1), date(2024, 11, 30), CostGroup::new());
        assert_eq!(info.month_label(), "2024-11");
    }

    #[test]
    fn dates_serialize_as_iso_days() {
        let info = CostInfo::new(date(2024, 1, 1), date(2024, 1, 15), CostGroup::new());
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["start"], "2024-01-01");
        assert_eq!(json["end"], "2024-01-15");
    }
}
