use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::trace;

use crate::calculator::{DateWindow, pay_dates};
use crate::domain::{Bill, Payment};
use crate::navigation::{add_periods, end_of_period, start_of_period};

/// The calendar period that holds one kept occurrence of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub due: NaiveDate,
}

impl BillRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

fn range_for(bill: &Bill, due: NaiveDate) -> Option<BillRange> {
    Some(BillRange {
        start: start_of_period(due, bill.repeat_freq)?,
        end: end_of_period(due, bill.repeat_freq)?,
        due,
    })
}

/// Billing periods that overlap `window`, oldest first.
pub fn ranges(bill: &Bill, window: DateWindow) -> Vec<BillRange> {
    let rule = bill.rule();
    // Occurrences land in distinct periods, so only the one right before the
    // window can have a period reaching into it.
    let first = rule
        .first_index_on_or_after(window.earliest())
        .saturating_sub(1);

    let mut out = Vec::new();
    for due in rule.occurrences_from_index(first) {
        let Some(range) = range_for(bill, due) else {
            break;
        };
        if range.start > window.latest() {
            break;
        }
        if range.end >= window.earliest() {
            out.push(range);
        }
    }
    out
}

fn linked<'a>(bill: &'a Bill, payments: &'a [Payment]) -> impl Iterator<Item = &'a Payment> + 'a {
    payments.iter().filter(move |p| p.bill_id == Some(bill.id))
}

/// Date of the most recent payment linked to the bill.
pub fn last_found_match(bill: &Bill, payments: &[Payment]) -> Option<NaiveDate> {
    linked(bill, payments).map(|p| p.date).max()
}

/// Sum of linked payments dated within `[start, end]`.
pub fn payments_in_range(
    bill: &Bill,
    payments: &[Payment],
    start: NaiveDate,
    end: NaiveDate,
) -> Decimal {
    linked(bill, payments)
        .filter(|p| start <= p.date && p.date <= end)
        .map(|p| p.amount)
        .sum()
}

/// Expected dates still to be paid inside `window`.
pub fn due_dates(bill: &Bill, payments: &[Payment], window: DateWindow) -> Vec<NaiveDate> {
    pay_dates(window, &bill.rule(), last_found_match(bill, payments))
}

/// The next occurrence whose billing period has no linked payment yet.
///
/// Looks from the period containing `today` up to one full stride past it, so
/// an unpaid current period wins over a later one. Inactive bills never expect
/// a payment.
pub fn next_expected_match(bill: &Bill, payments: &[Payment], today: NaiveDate) -> Option<NaiveDate> {
    if !bill.active {
        return None;
    }

    let rule = bill.rule();
    let floor = start_of_period(today, bill.repeat_freq)?;
    let horizon = add_periods(today, bill.repeat_freq, rule.stride())?;
    let first = rule.first_index_on_or_after(floor).saturating_sub(1);

    for due in rule.occurrences_from_index(first) {
        let range = range_for(bill, due)?;
        if range.start > horizon {
            break;
        }
        if range.end < floor {
            continue;
        }
        let paid = linked(bill, payments).any(|p| range.contains(p.date));
        trace!(bill = %bill.name, due = %range.due, paid, "checking billing period");
        if !paid {
            return Some(range.due);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStatus {
    Paid,
    Unpaid,
}

#[derive(Debug, Clone)]
pub struct OverviewEntry<'a> {
    pub bill: &'a Bill,
    pub range: BillRange,
    pub status: RangeStatus,
    pub paid_amount: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct Overview<'a> {
    pub entries: Vec<OverviewEntry<'a>>,
    /// Paid totals keyed by currency.
    pub paid_totals: BTreeMap<String, Decimal>,
    /// Expected (max amount) totals of unpaid periods keyed by currency.
    pub unpaid_totals: BTreeMap<String, Decimal>,
}

impl<'a> Overview<'a> {
    pub fn unpaid(&self) -> impl Iterator<Item = &OverviewEntry<'a>> {
        self.entries
            .iter()
            .filter(|e| e.status == RangeStatus::Unpaid)
    }

    pub fn paid(&self) -> impl Iterator<Item = &OverviewEntry<'a>> {
        self.entries.iter().filter(|e| e.status == RangeStatus::Paid)
    }
}

/// Classifies every billing period of every active bill inside `window` as
/// paid or unpaid.
pub fn overview<'a>(bills: &'a [Bill], payments: &[Payment], window: DateWindow) -> Overview<'a> {
    let mut out = Overview::default();
    for bill in bills.iter().filter(|b| b.active) {
        for range in ranges(bill, window) {
            let hits = linked(bill, payments).filter(|p| range.contains(p.date)).count();
            let paid_amount = payments_in_range(bill, payments, range.start, range.end);
            let status = if hits == 0 {
                *out
                    .unpaid_totals
                    .entry(bill.currency.clone())
                    .or_insert(Decimal::ZERO) += bill.amount_max;
                RangeStatus::Unpaid
            } else {
                *out
                    .paid_totals
                    .entry(bill.currency.clone())
                    .or_insert(Decimal::ZERO) += paid_amount;
                RangeStatus::Paid
            };
            out.entries.push(OverviewEntry {
                bill,
                range,
                status,
                paid_amount,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Period;
    use chrono::Utc;
    use uuid::Uuid;

    fn d(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn bill(name: &str, anchor: &str, period: Period, skip: u32) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            name: name.to_string(),
            match_words: name.to_lowercase(),
            amount_min: Decimal::from(40),
            amount_max: Decimal::from(60),
            currency: "EUR".to_string(),
            date: d(anchor),
            repeat_freq: period,
            skip,
            automatch: true,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn paid(bill: &Bill, date: &str, amount: i64) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            bill_id: Some(bill.id),
            description: bill.name.clone(),
            account: "Shop".to_string(),
            amount: Decimal::from(amount),
            currency: bill.currency.clone(),
            date: d(date),
            created_at: Utc::now(),
        }
    }

    fn window(a: &str, b: &str) -> DateWindow {
        DateWindow::new(d(a), d(b)).unwrap()
    }

    #[test]
    fn ranges_cover_periods_overlapping_window() {
        let b = bill("Phone", "2023-01-15", Period::Monthly, 0);
        let out = ranges(&b, window("2023-03-10", "2023-05-05"));
        assert_eq!(
            out,
            vec![
                BillRange { start: d("2023-03-01"), end: d("2023-03-31"), due: d("2023-03-15") },
                BillRange { start: d("2023-04-01"), end: d("2023-04-30"), due: d("2023-04-15") },
                BillRange { start: d("2023-05-01"), end: d("2023-05-31"), due: d("2023-05-15") },
            ]
        );
    }

    #[test]
    fn ranges_include_period_of_occurrence_before_window() {
        let b = bill("Insurance", "2020-03-15", Period::Yearly, 0);
        let out = ranges(&b, window("2023-06-01", "2023-06-30"));
        assert_eq!(
            out,
            vec![BillRange { start: d("2023-01-01"), end: d("2023-12-31"), due: d("2023-03-15") }]
        );
    }

    #[test]
    fn ranges_respect_skip() {
        let b = bill("Water", "2023-01-10", Period::Monthly, 2);
        let out = ranges(&b, window("2023-01-01", "2023-12-31"));
        let dues: Vec<_> = out.iter().map(|r| r.due).collect();
        assert_eq!(dues, vec![d("2023-01-10"), d("2023-04-10"), d("2023-07-10"), d("2023-10-10")]);
    }

    #[test]
    fn due_dates_skip_what_was_paid() {
        let b = bill("Gym", "2023-01-05", Period::Monthly, 0);
        let payments = vec![paid(&b, "2023-03-05", 50)];
        let out = due_dates(&b, &payments, window("2023-03-01", "2023-05-31"));
        assert_eq!(out, vec![d("2023-04-05"), d("2023-05-05")]);
    }

    #[test]
    fn next_expected_match_returns_current_period_when_unpaid() {
        let b = bill("Gym", "2023-01-05", Period::Monthly, 0);
        assert_eq!(next_expected_match(&b, &[], d("2023-03-20")), Some(d("2023-03-05")));
    }

    #[test]
    fn next_expected_match_moves_past_paid_period() {
        let b = bill("Gym", "2023-01-05", Period::Monthly, 0);
        let payments = vec![paid(&b, "2023-03-07", 50)];
        assert_eq!(next_expected_match(&b, &payments, d("2023-03-20")), Some(d("2023-04-05")));
    }

    #[test]
    fn next_expected_match_with_skip_and_future_anchor() {
        let b = bill("Water", "2023-01-10", Period::Monthly, 1);
        assert_eq!(next_expected_match(&b, &[], d("2023-02-15")), Some(d("2023-03-10")));

        let later = bill("Tax", "2024-06-01", Period::Yearly, 0);
        assert_eq!(next_expected_match(&later, &[], d("2022-12-01")), None);
        assert_eq!(next_expected_match(&later, &[], d("2023-07-01")), Some(d("2024-06-01")));
    }

    #[test]
    fn inactive_bill_expects_nothing() {
        let mut b = bill("Gym", "2023-01-05", Period::Monthly, 0);
        b.active = false;
        assert_eq!(next_expected_match(&b, &[], d("2023-03-20")), None);
    }

    #[test]
    fn last_match_and_totals_ignore_other_bills() {
        let gym = bill("Gym", "2023-01-05", Period::Monthly, 0);
        let phone = bill("Phone", "2023-01-20", Period::Monthly, 0);
        let payments = vec![
            paid(&gym, "2023-02-05", 50),
            paid(&gym, "2023-03-06", 45),
            paid(&phone, "2023-04-20", 30),
        ];
        assert_eq!(last_found_match(&gym, &payments), Some(d("2023-03-06")));
        assert_eq!(
            payments_in_range(&gym, &payments, d("2023-02-01"), d("2023-03-31")),
            Decimal::from(95)
        );
        assert_eq!(
            payments_in_range(&gym, &payments, d("2023-03-07"), d("2023-12-31")),
            Decimal::ZERO
        );
    }

    #[test]
    fn overview_splits_paid_and_unpaid() {
        let gym = bill("Gym", "2023-01-05", Period::Monthly, 0);
        let mut old = bill("Old", "2023-01-01", Period::Monthly, 0);
        old.active = false;
        let bills = vec![gym.clone(), old];
        let payments = vec![paid(&gym, "2023-02-05", 50)];

        let out = overview(&bills, &payments, window("2023-02-01", "2023-03-31"));
        let paid: Vec<_> = out.paid().map(|e| e.range.due).collect();
        let unpaid: Vec<_> = out.unpaid().map(|e| e.range.due).collect();
        assert_eq!(paid, vec![d("2023-02-05")]);
        assert_eq!(unpaid, vec![d("2023-03-05")]);
        assert_eq!(out.paid_totals.get("EUR"), Some(&Decimal::from(50)));
        assert_eq!(out.unpaid_totals.get("EUR"), Some(&Decimal::from(60)));
    }
}
