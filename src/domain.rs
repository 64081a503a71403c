use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::calculator::RecurrenceRule;
use crate::navigation::Period;

#[derive(Debug, Clone)]
pub struct Bill {
    pub id: Uuid,
    pub name: String,
    /// Comma-separated keywords; a payment must contain all of them to match.
    pub match_words: String,
    pub amount_min: Decimal,
    pub amount_max: Decimal,
    pub currency: String,
    /// Anchor date of the recurrence.
    pub date: NaiveDate,
    pub repeat_freq: Period,
    pub skip: u32,
    pub automatch: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    pub fn rule(&self) -> RecurrenceRule {
        RecurrenceRule::new(self.date, self.repeat_freq, self.skip)
    }

    pub fn keywords(&self) -> Vec<String> {
        parse_keywords(&self.match_words)
    }
}

#[derive(Debug, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub bill_id: Option<Uuid>,
    pub description: String,
    /// Account the money went to (the payee).
    pub account: String,
    /// Positive amounts are money out.
    pub amount: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The payment matches and should point at the bill.
    Linked,
    /// The payment used to point at the bill but no longer matches.
    Unlinked,
    Unchanged,
}

pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// True when every keyword occurs in `haystack` (case-insensitive).
pub fn word_match(keywords: &[String], haystack: &str) -> bool {
    let haystack = haystack.to_lowercase();
    keywords.iter().all(|w| haystack.contains(w.as_str()))
}

pub fn amount_match(amount: Decimal, min: Decimal, max: Decimal) -> bool {
    let amount = amount.abs();
    amount >= min && amount <= max
}

/// Decides whether `payment` belongs to `bill`.
pub fn scan(bill: &Bill, payment: &Payment) -> ScanOutcome {
    let haystack = format!("{} {}", payment.description, payment.account);
    let words = word_match(&bill.keywords(), &haystack);
    let amount = amount_match(payment.amount, bill.amount_min, bill.amount_max);

    if words && amount {
        return ScanOutcome::Linked;
    }

    debug!(
        bill = %bill.name,
        payment = %payment.id,
        word_match = words,
        amount_match = amount,
        "payment does not match bill"
    );

    if payment.bill_id == Some(bill.id) {
        ScanOutcome::Unlinked
    } else {
        ScanOutcome::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bill(words: &str, min: i64, max: i64) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            name: "Rent".to_string(),
            match_words: words.to_string(),
            amount_min: Decimal::from(min),
            amount_max: Decimal::from(max),
            currency: "EUR".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            repeat_freq: Period::Monthly,
            skip: 0,
            automatch: true,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn payment(description: &str, account: &str, amount: i64) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            bill_id: None,
            description: description.to_string(),
            account: account.to_string(),
            amount: Decimal::from(amount),
            currency: "EUR".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn keywords_are_trimmed_lowercased_and_non_empty() {
        assert_eq!(
            parse_keywords(" Rent, ACME Housing ,,"),
            vec!["rent".to_string(), "acme housing".to_string()]
        );
        assert!(parse_keywords("").is_empty());
    }

    #[test]
    fn all_keywords_must_match() {
        let words = parse_keywords("rent,acme");
        assert!(word_match(&words, "February RENT acme housing"));
        assert!(!word_match(&words, "February rent"));
        assert!(word_match(&[], "anything"));
    }

    #[test]
    fn amount_range_is_inclusive_and_sign_agnostic() {
        let min = Decimal::from(100);
        let max = Decimal::from(120);
        assert!(amount_match(Decimal::from(100), min, max));
        assert!(amount_match(Decimal::from(120), min, max));
        assert!(amount_match(Decimal::from(-110), min, max));
        assert!(!amount_match(Decimal::from(121), min, max));
        assert!(!amount_match(Decimal::from(99), min, max));
    }

    #[test]
    fn keywords_can_match_the_account() {
        let b = bill("rent,acme", 900, 1000);
        let p = payment("February rent", "Acme Housing", 950);
        assert_eq!(scan(&b, &p), ScanOutcome::Linked);
    }

    #[test]
    fn mismatch_unlinks_previously_linked_payment() {
        let b = bill("rent", 900, 1000);
        let mut p = payment("February rent", "Landlord", 1200);
        assert_eq!(scan(&b, &p), ScanOutcome::Unchanged);

        p.bill_id = Some(b.id);
        assert_eq!(scan(&b, &p), ScanOutcome::Unlinked);
    }
}
