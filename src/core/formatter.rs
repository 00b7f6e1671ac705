use crate::core::aggregate::CostDelta;
use crate::core::models::resource::StoppedInstance;

/// Returns "1234.50 USD".
pub fn format_money(amount: f64, unit: &str) -> String {
    format!("{:.2} {}", amount, unit)
}

/// Returns "+20.00 USD (+20.0%)", or "-5.00 USD" with no percentage when the
/// previous period had no spend.
pub fn format_delta(delta: &CostDelta, unit: &str, last: f64) -> String {
    let sign = if delta.difference >= 0.0 { "+" } else { "-" };
    let amount = format!("{}{:.2} {}", sign, delta.difference.abs(), unit);
    if last > 0.0 {
        format!("{} ({:+.1}%)", amount, delta.percent_change)
    } else {
        amount
    }
}

/// Returns "[████████░░░░]" where the filled share is `amount / max`.
/// Width is the number of block characters inside the brackets.
pub fn format_bar(amount: f64, max: f64, width: usize) -> String {
    let ratio = if max > 0.0 {
        (amount / max).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// "45 days", "1 day" or "unknown" when the provider does not expose a stop time.
pub fn format_stopped_for(instance: &StoppedInstance) -> String {
    match instance.known_stopped_days() {
        Some(1) => "1 day".to_string(),
        Some(days) => format!("{} days", days),
        None => "unknown".to_string(),
    }
}

/// "in 9 days", "today" or "11 days ago".
pub fn format_expiry(days_until_expiry: i64) -> String {
    match days_until_expiry {
        0 => "today".to_string(),
        1 => "in 1 day".to_string(),
        -1 => "1 day ago".to_string(),
        d if d > 0 => format!("in {} days", d),
        d => format!("{} days ago", -d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::cost_delta;

    #[test]
    fn format_money_two_decimals() {
        assert_eq!(format_money(123.456, "USD"), "123.46 USD");
        assert_eq!(format_money(0.0, "EUR"), "0.00 EUR");
    }

    #[test]
    fn format_delta_signs_and_percent() {
        assert_eq!(
            format_delta(&cost_delta(120.0, 100.0), "USD", 100.0),
            "+20.00 USD (+20.0%)"
        );
        assert_eq!(
            format_delta(&cost_delta(90.0, 100.0), "USD", 100.0),
            "-10.00 USD (-10.0%)"
        );
        assert_eq!(format_delta(&cost_delta(5.0, 0.0), "USD", 0.0), "+5.00 USD");
    }

    #[test]
    fn format_bar_width() {
        assert_eq!(format_bar(0.0, 100.0, 12), "[░░░░░░░░░░░░]");
        assert_eq!(format_bar(100.0, 100.0, 12), "[████████████]");
        assert_eq!(format_bar(50.0, 100.0, 12), "[██████░░░░░░]");
        assert_eq!(format_bar(10.0, 0.0, 4), "[░░░░]");
    }

    #[test]
    fn stopped_for_handles_unknown() {
        let known = StoppedInstance {
            id: "i".into(),
            name: "i".into(),
            stopped_days: 45,
        };
        assert_eq!(format_stopped_for(&known), "45 days");
        let unknown = StoppedInstance::unknown_duration("vm", "vm");
        assert_eq!(format_stopped_for(&unknown), "unknown");
    }

    #[test]
    fn expiry_wording() {
        assert_eq!(format_expiry(9), "in 9 days");
        assert_eq!(format_expiry(0), "today");
        assert_eq!(format_expiry(-11), "11 days ago");
        assert_eq!(format_expiry(1), "in 1 day");
    }
}
