use chrono::{Datelike, Days, Months, NaiveDate};

/// A calendar window `[start, end]` used to query one provider billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingPeriod {
    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    /// End bound for APIs that treat `end` as exclusive and reject empty ranges.
    pub fn exclusive_end(&self) -> NaiveDate {
        if self.end <= self.start {
            self.start + Days::new(1)
        } else {
            self.end
        }
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(date)
}

/// Month to date: first of the month up to `today`.
pub fn current_month(today: NaiveDate) -> BillingPeriod {
    BillingPeriod {
        start: first_of_month(today),
        end: today,
    }
}

/// The same month-to-date window one month earlier, so both periods cover
/// a comparable number of days.
pub fn last_month(today: NaiveDate) -> BillingPeriod {
    let end = today.checked_sub_months(Months::new(1)).unwrap_or(today);
    BillingPeriod {
        start: first_of_month(end),
        end,
    }
}

/// The `count` complete months before the current one, oldest first.
pub fn trailing_months(today: NaiveDate, count: u32) -> Vec<BillingPeriod> {
    let this_month = first_of_month(today);
    (1..=count)
        .rev()
        .filter_map(|back| this_month.checked_sub_months(Months::new(back)))
        .map(|start| BillingPeriod {
            start,
            end: last_of_month(start),
        })
        .collect()
}
