//! Comparisons and cross-provider totals computed from collected rows.

pub mod cost;
pub mod trend;
pub mod waste;

use serde::Serialize;

use crate::core::error::CloudError;
use crate::core::models::cost::Money;
use crate::core::normalize::{parse_amount, unit_or_default};

/// Parse a `"<amount> [UNIT]"` total. A missing unit means USD.
pub fn parse_total(input: &str) -> Result<Money, CloudError> {
    let mut parts = input.split_whitespace();
    let amount = parts
        .next()
        .and_then(parse_amount)
        .ok_or_else(|| CloudError::Parse {
            input: input.to_string(),
        })?;
    Ok(Money::new(amount, unit_or_default(parts.next())))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostDelta {
    pub difference: f64,
    /// Zero whenever the previous amount is not positive.
    pub percent_change: f64,
}

pub fn cost_delta(current: f64, last: f64) -> CostDelta {
    let difference = current - last;
    let percent_change = if last > 0.0 {
        difference / last * 100.0
    } else {
        0.0
    };
    CostDelta {
        difference,
        percent_change,
    }
}
