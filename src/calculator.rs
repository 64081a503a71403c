use chrono::NaiveDate;
use thiserror::Error;
use tracing::trace;

use crate::navigation::{Period, add_periods, periods_between};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillDateError {
    #[error(
        "Invalid recurrence period '{0}'. Expected one of: daily, weekly, monthly, quarterly, half-year, yearly"
    )]
    InvalidRecurrencePeriod(String),

    #[error("Invalid date window: earliest {earliest} is after latest {latest}")]
    InvalidDateWindow {
        earliest: NaiveDate,
        latest: NaiveDate,
    },
}

/// Inclusive date range. Construction rejects `earliest > latest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    earliest: NaiveDate,
    latest: NaiveDate,
}

impl DateWindow {
    pub fn new(earliest: NaiveDate, latest: NaiveDate) -> Result<Self, BillDateError> {
        if earliest > latest {
            return Err(BillDateError::InvalidDateWindow { earliest, latest });
        }
        Ok(Self { earliest, latest })
    }

    pub fn earliest(&self) -> NaiveDate {
        self.earliest
    }

    pub fn latest(&self) -> NaiveDate {
        self.latest
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub anchor: NaiveDate,
    pub period: Period,
    /// Occurrences dropped between two kept ones.
    pub skip: u32,
}

impl RecurrenceRule {
    pub fn new(anchor: NaiveDate, period: Period, skip: u32) -> Self {
        Self {
            anchor,
            period,
            skip,
        }
    }

    /// Base periods between two kept occurrences.
    pub fn stride(&self) -> u64 {
        u64::from(self.skip) + 1
    }

    /// The `index`-th kept occurrence, projected from the anchor so clamped
    /// month ends do not carry over into later occurrences.
    pub fn occurrence(&self, index: u64) -> Option<NaiveDate> {
        add_periods(self.anchor, self.period, index.checked_mul(self.stride())?)
    }

    /// Index of the first kept occurrence on or after `date`.
    pub fn first_index_on_or_after(&self, date: NaiveDate) -> u64 {
        if date <= self.anchor {
            return 0;
        }
        let mut index = (periods_between(self.anchor, date, self.period) / self.stride())
            .saturating_sub(1);
        while let Some(occurrence) = self.occurrence(index) {
            if occurrence >= date {
                break;
            }
            index += 1;
        }
        index
    }

    /// Kept occurrences in ascending order, starting at `index`.
    pub fn occurrences_from_index(&self, index: u64) -> Occurrences {
        Occurrences {
            rule: *self,
            next: index,
        }
    }

    /// Kept occurrences in ascending order, starting with the first one on or after `date`.
    pub fn occurrences_from(&self, date: NaiveDate) -> Occurrences {
        self.occurrences_from_index(self.first_index_on_or_after(date))
    }
}

/// Iterator over the kept occurrences of a [`RecurrenceRule`]. Ends when the
/// calendar runs out.
#[derive(Debug, Clone)]
pub struct Occurrences {
    rule: RecurrenceRule,
    next: u64,
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let date = self.rule.occurrence(self.next)?;
        self.next = self.next.checked_add(1)?;
        Some(date)
    }
}

/// Expected pay dates of a bill inside `window`, leaving out everything at or
/// before `last_paid`.
pub fn pay_dates(
    window: DateWindow,
    rule: &RecurrenceRule,
    last_paid: Option<NaiveDate>,
) -> Vec<NaiveDate> {
    let dates: Vec<NaiveDate> = rule
        .occurrences_from(window.earliest())
        .take_while(|date| *date <= window.latest())
        .filter(|date| last_paid.is_none_or(|paid| *date > paid))
        .collect();

    trace!(
        anchor = %rule.anchor,
        period = %rule.period,
        skip = rule.skip,
        earliest = %window.earliest(),
        latest = %window.latest(),
        found = dates.len(),
        "computed pay dates"
    );
    dates
}

/// Untyped entry point: parses `period` and validates the window before
/// delegating to [`pay_dates`].
pub fn get_pay_dates(
    earliest: NaiveDate,
    latest: NaiveDate,
    bill_start: NaiveDate,
    period: &str,
    skip: u32,
    last_paid: Option<NaiveDate>,
) -> Result<Vec<NaiveDate>, BillDateError> {
    let period: Period = period.parse()?;
    let window = DateWindow::new(earliest, latest)?;
    let rule = RecurrenceRule::new(bill_start, period, skip);
    Ok(pay_dates(window, &rule, last_paid))
}
