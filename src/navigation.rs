use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::calculator::BillDateError;

/// Base calendar granularity of a recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    HalfYear,
    Yearly,
}

enum Step {
    Days(u64),
    Months(u32),
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Quarterly => "quarterly",
            Period::HalfYear => "half-year",
            Period::Yearly => "yearly",
        }
    }

    fn step(self) -> Step {
        match self {
            Period::Daily => Step::Days(1),
            Period::Weekly => Step::Days(7),
            Period::Monthly => Step::Months(1),
            Period::Quarterly => Step::Months(3),
            Period::HalfYear => Step::Months(6),
            Period::Yearly => Step::Months(12),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = BillDateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            "quarterly" => Ok(Period::Quarterly),
            "half-year" | "half_year" | "halfyear" => Ok(Period::HalfYear),
            "yearly" => Ok(Period::Yearly),
            _ => Err(BillDateError::InvalidRecurrencePeriod(raw.to_string())),
        }
    }
}

/// Moves `date` forward by `n` whole periods.
///
/// Month-based periods keep the day-of-month when the target month has it and
/// otherwise land on that month's last day (Jan 31 + 1 month = Feb 28/29).
/// Returns `None` once the result leaves the representable calendar.
pub fn add_periods(date: NaiveDate, period: Period, n: u64) -> Option<NaiveDate> {
    match period.step() {
        Step::Days(days) => date.checked_add_days(Days::new(days.checked_mul(n)?)),
        Step::Months(months) => {
            let total = u64::from(months).checked_mul(n)?;
            date.checked_add_months(Months::new(u32::try_from(total).ok()?))
        }
    }
}

/// First day of the calendar period containing `date`. Weeks start on Monday.
pub fn start_of_period(date: NaiveDate, period: Period) -> Option<NaiveDate> {
    match period {
        Period::Daily => Some(date),
        Period::Weekly => {
            date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
        }
        Period::Monthly => date.with_day(1),
        Period::Quarterly => {
            let month = (date.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1)
        }
        Period::HalfYear => {
            let month = if date.month() <= 6 { 1 } else { 7 };
            NaiveDate::from_ymd_opt(date.year(), month, 1)
        }
        Period::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
    }
}

/// Last day of the calendar period containing `date`.
pub fn end_of_period(date: NaiveDate, period: Period) -> Option<NaiveDate> {
    let start = start_of_period(date, period)?;
    add_periods(start, period, 1)?.pred_opt()
}

/// Whole periods that fit between `from` and `to`.
///
/// This is a lower bound: clamped month ends may allow one more period than
/// reported, so callers walk forward from here.
pub fn periods_between(from: NaiveDate, to: NaiveDate, period: Period) -> u64 {
    if to <= from {
        return 0;
    }
    match period.step() {
        Step::Days(days) => {
            let elapsed = u64::try_from((to - from).num_days()).unwrap_or(0);
            elapsed / days
        }
        Step::Months(months) => {
            let mut elapsed = i64::from(to.year() - from.year()) * 12
                + i64::from(to.month0())
                - i64::from(from.month0());
            if to.day() < from.day() {
                elapsed -= 1;
            }
            u64::try_from(elapsed).unwrap_or(0) / u64::from(months)
        }
    }
}
