//! Translation of provider-native billing and resource shapes into the
//! shared model.
//!
//! Rules shared by every provider live here; the per-provider modules hold
//! the serde mirrors of each API response and the conversions from them.

pub mod aws;
pub mod azure;
pub mod gcp;

use chrono::{DateTime, Utc};

use crate::core::models::cost::{CostGroup, Money, DEFAULT_UNIT};
use crate::core::models::resource::{Reservation, ReservationStatus};

/// Instances stopped for fewer days than this are not reported as waste.
pub const STOPPED_THRESHOLD_DAYS: i64 = 30;

/// Reservations ending within this many days (either side of now) are reported.
pub const RESERVATION_WINDOW_DAYS: i64 = 30;

/// Provider currency, or `"USD"` when none was returned.
pub fn unit_or_default(unit: Option<&str>) -> String {
    match unit.map(str::trim) {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => DEFAULT_UNIT.to_string(),
    }
}

/// Parse a provider amount string; `None` for anything that is not a finite number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|a| a.is_finite())
}

/// Add `amount` to the `service` entry, accumulating across rows.
/// Zero and negative rows (refunds, credits) never reach the group.
pub fn accumulate(group: &mut CostGroup, service: &str, amount: f64, unit: Option<&str>) {
    if amount <= 0.0 {
        return;
    }
    group
        .entry(service.to_string())
        .and_modify(|m| m.amount += amount)
        .or_insert_with(|| Money::new(amount, unit_or_default(unit)));
}

/// Drop entries that are not strictly positive.
pub fn drop_zero(mut group: CostGroup) -> CostGroup {
    group.retain(|_, m| m.amount > 0.0);
    group
}

/// Period total in the "<amount:.2> <UNIT>" form consumed by the comparator.
pub fn format_total(amount: f64, unit: Option<&str>) -> String {
    format!("{:.2} {}", amount, unit_or_default(unit))
}

/// Trailing segment of a resource path or URL
/// (`/subscriptions/.../disks/my-disk` -> `my-disk`).
pub fn trailing_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Whole days from `from` to `to`, truncated toward zero.
pub fn whole_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_hours() / 24
}

/// Days since `stopped_at` when it is past the stopped-instance threshold.
pub fn long_stopped_days(now: DateTime<Utc>, stopped_at: DateTime<Utc>) -> Option<i64> {
    let days = whole_days(stopped_at, now);
    let threshold = chrono::Duration::days(STOPPED_THRESHOLD_DAYS);
    (now - stopped_at > threshold).then_some(days)
}

/// Classify a reservation ending at `end`.
///
/// `active` reservations ending within the next window are "expiring";
/// any reservation that ended within the previous window is "expired".
pub fn classify_reservation(
    now: DateTime<Utc>,
    end: DateTime<Utc>,
    active: bool,
    id: &str,
    instance_type: &str,
) -> Option<Reservation> {
    let window = chrono::Duration::days(RESERVATION_WINDOW_DAYS);
    let status = if end > now {
        (active && end < now + window).then_some(ReservationStatus::Expiring)
    } else {
        (end > now - window).then_some(ReservationStatus::Expired)
    };
    let status = status?;
    Some(Reservation {
        id: id.to_string(),
        instance_type: instance_type.to_string(),
        status,
        days_until_expiry: whole_days(now, end),
    })
}
