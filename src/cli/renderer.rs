use colored::{control, ColoredString, Colorize};

use crate::core::aggregate::cost::{CostReport, ProviderCostSummary};
use crate::core::aggregate::trend::{TrendReport, TrendSummary};
use crate::core::aggregate::waste::{longest_stopped, WasteReport, WasteStatus};
use crate::core::aggregate::CostDelta;
use crate::core::formatter::{
    format_bar, format_delta, format_expiry, format_money, format_stopped_for,
};
use crate::core::models::resource::ReservationStatus;
use crate::core::models::result::ProviderWasteResult;
use crate::core::providers::Provider;

const BAR_WIDTH: usize = 24;

fn header(provider: Provider, account_id: &str) -> String {
    let text = if account_id.is_empty() {
        format!(" {}", provider.display_name())
    } else {
        format!(
            " {} ({} {})",
            provider.display_name(),
            provider.account_label(),
            account_id
        )
    };
    text.bold().to_string()
}

fn failed_block(provider: Provider, error: &str) -> String {
    let header = format!(" {} (error)", provider.display_name());
    format!("{}\n  {}", header.bold(), error.red())
}

/// Rising spend is red, falling spend green.
fn color_delta(delta: &CostDelta, text: String) -> ColoredString {
    if delta.difference > 0.0 {
        text.red()
    } else if delta.difference < 0.0 {
        text.green()
    } else {
        text.normal()
    }
}

fn label(text: &str) -> ColoredString {
    format!("{:<9}", text).cyan()
}

/// Render the month-over-month comparison.
///
/// Layout:
/// ```text
///  AWS (Account 123456789012)
///   Current   120.00 USD
///   Last      100.00 USD
///   Change    +20.00 USD (+20.0%)
///   Services:
///     Amazon EC2                   80.00 USD     70.00 USD  +10.00 USD (+14.3%)
/// ```
pub fn render_cost_report(report: &CostReport, use_color: bool) -> String {
    control::set_override(use_color);

    let mut sections: Vec<String> = report.rows.iter().map(render_cost_row).collect();

    let mut total = vec![" Total".bold().to_string()];
    total.push(format!(
        "  {} {}",
        label("Current"),
        format_money(report.current_total, &report.currency)
    ));
    total.push(format!(
        "  {} {}",
        label("Last"),
        format_money(report.last_total, &report.currency)
    ));
    total.push(format!(
        "  {} {}",
        label("Change"),
        color_delta(
            &report.delta,
            format_delta(&report.delta, &report.currency, report.last_total)
        )
    ));
    if report.failed > 0 {
        total.push(format!(
            "  {} {} ok, {} failed",
            label("Providers"),
            report.succeeded,
            report.failed.to_string().red()
        ));
    }
    sections.push(total.join("\n"));

    sections.join("\n\n")
}

fn render_cost_row(row: &ProviderCostSummary) -> String {
    if let Some(err) = &row.error {
        return failed_block(row.provider, err);
    }

    let mut lines = vec![header(row.provider, &row.account_id)];
    lines.push(format!(
        "  {} {}",
        label("Current"),
        format_money(row.current_total, &row.unit)
    ));
    lines.push(format!(
        "  {} {}",
        label("Last"),
        format_money(row.last_total, &row.unit)
    ));
    lines.push(format!(
        "  {} {}",
        label("Change"),
        color_delta(&row.delta, format_delta(&row.delta, &row.unit, row.last_total))
    ));

    if !row.services.is_empty() {
        lines.push(format!("  {}:", "Services".cyan()));
        for s in &row.services {
            lines.push(format!(
                "    {:<28} {:>14} {:>14}  {}",
                truncate(&s.service, 28),
                format_money(s.current, &s.unit),
                format_money(s.last, &s.unit),
                color_delta(&s.delta, format_delta(&s.delta, &s.unit, s.last))
            ));
        }
    }

    lines.join("\n")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Render six-month trends per provider, plus the combined series when more
/// than one provider reported.
pub fn render_trend_report(report: &TrendReport, use_color: bool) -> String {
    control::set_override(use_color);

    let mut sections = Vec::new();
    for row in &report.rows {
        match (&row.error, &row.summary) {
            (Some(err), _) => sections.push(failed_block(row.provider, err)),
            (None, Some(summary)) => {
                let mut lines = vec![header(row.provider, &row.account_id)];
                render_trend_summary(&mut lines, summary);
                sections.push(lines.join("\n"));
            }
            (None, None) => {}
        }
    }

    let reporting = report.rows.iter().filter(|r| r.summary.is_some()).count();
    if reporting > 1 {
        let mut lines = vec![" All providers".bold().to_string()];
        render_trend_summary(&mut lines, &report.combined);
        sections.push(lines.join("\n"));
    }

    sections.join("\n\n")
}

fn render_trend_summary(lines: &mut Vec<String>, summary: &TrendSummary) {
    let max = summary
        .months
        .iter()
        .map(|m| m.amount)
        .fold(0.0_f64, f64::max);
    for m in &summary.months {
        lines.push(format!(
            "  {}  {:>14} {}",
            m.month.cyan(),
            format_money(m.amount, &summary.currency),
            format_bar(m.amount, max, BAR_WIDTH).magenta()
        ));
    }
    lines.push(format!(
        "  {} {}",
        label("Total"),
        format_money(summary.total, &summary.currency)
    ));
    lines.push(format!(
        "  {} {}",
        label("Average"),
        format_money(summary.average, &summary.currency)
    ));
    if let Some(high) = &summary.highest {
        lines.push(format!(
            "  {} {} ({})",
            label("Highest"),
            high.month,
            format_money(high.amount, &summary.currency)
        ));
    }
    if let Some(low) = &summary.lowest {
        lines.push(format!(
            "  {} {} ({})",
            label("Lowest"),
            low.month,
            format_money(low.amount, &summary.currency)
        ));
    }
}

fn status_text(status: WasteStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        WasteStatus::Healthy => text.green(),
        WasteStatus::WasteFound => text.yellow(),
        WasteStatus::Failed => text.red(),
    }
}

/// Render the waste inventory of every provider followed by the cross-provider totals.
pub fn render_waste_report(
    report: &WasteReport,
    results: &[ProviderWasteResult],
    use_color: bool,
) -> String {
    control::set_override(use_color);

    let mut sections = Vec::new();
    for (row, result) in report.rows.iter().zip(results) {
        if let Some(err) = &row.error {
            sections.push(failed_block(row.provider, err));
            continue;
        }
        let mut lines = vec![format!(
            "{}  {}",
            header(row.provider, &row.account_id),
            status_text(row.status)
        )];
        render_waste_items(&mut lines, result);
        sections.push(lines.join("\n"));
    }

    let totals = &report.totals;
    let mut summary = vec![" Summary".bold().to_string()];
    summary.push(format!("  {} {}", label("Volumes"), totals.volumes));
    summary.push(format!("  {} {}", label("IPs"), totals.ips));
    summary.push(format!("  {} {}", label("Stopped"), totals.stopped_instances));
    summary.push(format!("  {} {}", label("Reserved"), totals.reservations));

    let stopped: Vec<_> = results
        .iter()
        .filter(|r| r.error.is_none())
        .flat_map(|r| r.stopped_instances.iter().cloned())
        .collect();
    if let Some(longest) = longest_stopped(&stopped) {
        summary.push(format!(
            "  {} {} ({})",
            label("Longest"),
            longest.name,
            format_stopped_for(longest)
        ));
    }
    let overall = if report.all_healthy {
        "All healthy".green()
    } else {
        format!("{} item(s) need attention", totals.total()).yellow()
    };
    summary.push(format!("  {}", overall));
    sections.push(summary.join("\n"));

    sections.join("\n\n")
}

fn render_waste_items(lines: &mut Vec<String>, result: &ProviderWasteResult) {
    let volumes: Vec<_> = result
        .unused_volumes
        .iter()
        .chain(result.attached_volumes.iter())
        .collect();
    if !volumes.is_empty() {
        lines.push(format!("  {}:", "Volumes".cyan()));
        for v in volumes {
            lines.push(format!("    {:<32} {:>6} GB  {}", v.id, v.size_gb, v.status));
        }
    }
    if !result.unused_ips.is_empty() {
        lines.push(format!("  {}:", "Unused IPs".cyan()));
        for ip in &result.unused_ips {
            lines.push(format!("    {:<32} {}", ip.address, ip.allocation_id.dimmed()));
        }
    }
    if !result.stopped_instances.is_empty() {
        lines.push(format!("  {}:", "Stopped instances".cyan()));
        for inst in &result.stopped_instances {
            lines.push(format!(
                "    {:<32} stopped {}",
                inst.name,
                format_stopped_for(inst)
            ));
        }
    }
    if !result.expiring_reservations.is_empty() {
        lines.push(format!("  {}:", result.provider.reservation_label().cyan()));
        for r in &result.expiring_reservations {
            let status = format!("{} ({})", r.status, format_expiry(r.days_until_expiry));
            let status = match r.status {
                ReservationStatus::Expiring => status.yellow(),
                ReservationStatus::Expired => status.red(),
            };
            lines.push(format!("    {:<32} {:<16} {}", r.id, r.instance_type, status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::cost::summarize_costs;
    use crate::core::aggregate::trend::summarize_trends;
    use crate::core::aggregate::waste::summarize_waste;
    use crate::core::error::CloudError;
    use crate::core::models::cost::{CostGroup, CostInfo, Money};
    use crate::core::models::resource::StoppedInstance;
    use crate::core::models::result::{ProviderCostResult, ProviderOutcome};
    use chrono::NaiveDate;

    fn cost_row() -> ProviderCostResult {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut current = CostGroup::new();
        current.insert("Amazon EC2".into(), Money::new(80.0, "USD"));
        let mut last = CostGroup::new();
        last.insert("Amazon S3".into(), Money::new(10.0, "USD"));
        ProviderCostResult {
            account_id: "123456789012".into(),
            current_total: "120.00 USD".into(),
            last_total: "100.00 USD".into(),
            current_month: Some(CostInfo::new(day, day, current)),
            last_month: Some(CostInfo::new(day, day, last)),
            ..ProviderCostResult::empty(Provider::Aws)
        }
    }

    fn gcp_failure() -> CloudError {
        CloudError::Upstream {
            provider: Provider::Gcp,
            message: "permission denied".into(),
        }
    }

    #[test]
    fn cost_report_shows_rows_totals_and_failures() {
        let report = summarize_costs(&[
            cost_row(),
            ProviderCostResult::from_error(Provider::Gcp, &gcp_failure()),
        ]);
        let output = render_cost_report(&report, false);
        assert!(output.contains("AWS (Account 123456789012)"));
        assert!(output.contains("+20.00 USD (+20.0%)"));
        assert!(output.contains("Amazon EC2"));
        assert!(output.contains("Amazon S3"));
        assert!(output.contains("GCP (error)"));
        assert!(output.contains("permission denied"));
        assert!(output.contains("1 ok, 1 failed"));
    }

    #[test]
    fn render_no_ansi_when_color_false() {
        let report = summarize_costs(&[cost_row()]);
        let output = render_cost_report(&report, false);
        // ANSI escape sequences start with ESC (0x1b)
        assert!(!output.contains('\x1b'), "output should not contain ANSI codes");
    }

    #[test]
    fn trend_report_lists_months_and_extremes() {
        let series = [100.0, 90.0, 110.0, 95.0, 120.0, 80.0]
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let start = NaiveDate::from_ymd_opt(2024, i as u32 + 1, 1).unwrap();
                CostInfo::total_only(start, start, Money::new(*a, "USD"))
            })
            .collect();
        let row = ProviderCostResult {
            account_id: "acme".into(),
            trend: series,
            ..ProviderCostResult::empty(Provider::Gcp)
        };
        let output = render_trend_report(&summarize_trends(&[row]), false);
        assert!(output.contains("GCP (Project acme)"));
        assert!(output.contains("2024-01"));
        assert!(output.contains("595.00 USD"));
        assert!(output.contains("99.17 USD"));
        assert!(output.contains("Highest   2024-05 (120.00 USD)"));
        assert!(!output.contains("All providers"));
    }

    #[test]
    fn waste_report_prints_unknown_stop_duration() {
        let mut azure = ProviderWasteResult::empty(Provider::Azure);
        azure.account_id = "sub-1".into();
        azure
            .stopped_instances
            .push(StoppedInstance::unknown_duration("/vm/web", "web"));
        let results = vec![azure];
        let report = summarize_waste(&results);
        let output = render_waste_report(&report, &results, false);
        assert!(output.contains("Azure (Subscription sub-1)"));
        assert!(output.contains("stopped unknown"));
        assert!(output.contains("Waste found"));
        assert!(!output.contains("Longest"));
    }

    #[test]
    fn waste_report_all_healthy() {
        let results = vec![ProviderWasteResult::empty(Provider::Aws)];
        let report = summarize_waste(&results);
        let output = render_waste_report(&report, &results, false);
        assert!(output.contains("Healthy"));
        assert!(output.contains("All healthy"));
    }
}
