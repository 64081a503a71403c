use crate::config::{AppPaths, workspace_slug};
use crate::domain::{Bill, Payment};
use crate::navigation::Period;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

const DATE_FMT: &str = "%Y-%m-%d";

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(paths: &AppPaths, workspace: &str) -> Result<(Self, PathBuf)> {
        let slug = workspace_slug(workspace);
        let ws_dir = paths.data_dir.join("workspaces").join(slug);
        fs::create_dir_all(&ws_dir)
            .with_context(|| format!("Failed to create workspace dir {}", ws_dir.display()))?;

        let db_path = ws_dir.join("billdue.sqlite3");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open DB {}", db_path.display()))?;

        let db = Self { conn };
        db.migrate()?;
        debug!(path = %db_path.display(), "opened workspace database");
        Ok((db, db_path))
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS bills (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                match_words TEXT NOT NULL,
                amount_min TEXT NOT NULL,
                amount_max TEXT NOT NULL,
                currency TEXT NOT NULL,
                date TEXT NOT NULL,
                repeat_freq TEXT NOT NULL,
                skip INTEGER NOT NULL DEFAULT 0,
                automatch INTEGER NOT NULL DEFAULT 1,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_bills_name ON bills(name);

            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                bill_id TEXT REFERENCES bills(id) ON DELETE SET NULL,
                description TEXT NOT NULL,
                account TEXT NOT NULL,
                amount TEXT NOT NULL,
                currency TEXT NOT NULL,
                date TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_payments_bill ON payments(bill_id);
            CREATE INDEX IF NOT EXISTS idx_payments_date ON payments(date);
            "#,
        )?;
        Ok(())
    }

    pub fn insert_bill(&self, bill: &Bill) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO bills (id, name, match_words, amount_min, amount_max, currency, date, repeat_freq, skip, automatch, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                bill.id.to_string(),
                bill.name,
                bill.match_words,
                bill.amount_min.to_string(),
                bill.amount_max.to_string(),
                bill.currency,
                bill.date.format(DATE_FMT).to_string(),
                bill.repeat_freq.as_str(),
                bill.skip,
                bill.automatch,
                bill.active,
                bill.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Overwrites every mutable column of the bill with the same id.
    pub fn update_bill(&self, bill: &Bill) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE bills
            SET name = ?2, match_words = ?3, amount_min = ?4, amount_max = ?5, currency = ?6,
                date = ?7, repeat_freq = ?8, skip = ?9, automatch = ?10, active = ?11
            WHERE id = ?1
            "#,
            params![
                bill.id.to_string(),
                bill.name,
                bill.match_words,
                bill.amount_min.to_string(),
                bill.amount_max.to_string(),
                bill.currency,
                bill.date.format(DATE_FMT).to_string(),
                bill.repeat_freq.as_str(),
                bill.skip,
                bill.automatch,
                bill.active,
            ],
        )?;
        Ok(())
    }

    /// Deletes the bill; its payments stay but lose the link.
    pub fn delete_bill(&self, id: Uuid) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE payments SET bill_id = NULL WHERE bill_id = ?1",
            params![id.to_string()],
        )?;
        let changed = tx.execute("DELETE FROM bills WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(changed)
    }

    pub fn get_bill_by_name(&self, name: &str) -> Result<Option<Bill>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {BILL_COLUMNS} FROM bills WHERE name = ?1"),
                params![name],
                RawBill::from_row,
            )
            .optional()?;
        raw.map(RawBill::into_bill).transpose()
    }

    /// All bills, active ones first, then by name ignoring case.
    pub fn list_bills(&self) -> Result<Vec<Bill>> {
        self.query_bills(&format!(
            "SELECT {BILL_COLUMNS} FROM bills ORDER BY active DESC, lower(name) ASC"
        ))
    }

    pub fn list_active_bills(&self) -> Result<Vec<Bill>> {
        self.query_bills(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE active = 1 ORDER BY lower(name) ASC"
        ))
    }

    fn query_bills(&self, sql: &str) -> Result<Vec<Bill>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], RawBill::from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_bill()?);
        }
        Ok(out)
    }

    pub fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO payments (id, bill_id, description, account, amount, currency, date, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                payment.id.to_string(),
                payment.bill_id.map(|id| id.to_string()),
                payment.description,
                payment.account,
                payment.amount.to_string(),
                payment.currency,
                payment.date.format(DATE_FMT).to_string(),
                payment.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn set_payment_bill(&self, payment_id: Uuid, bill_id: Option<Uuid>) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE payments SET bill_id = ?2 WHERE id = ?1",
            params![payment_id.to_string(), bill_id.map(|id| id.to_string())],
        )?;
        Ok(changed)
    }

    /// Payments ordered by date, oldest first.
    pub fn list_payments(&self) -> Result<Vec<Payment>> {
        self.query_payments(
            &format!("SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY date ASC, created_at ASC"),
            None,
        )
    }

    pub fn payments_for_bill(&self, bill_id: Uuid) -> Result<Vec<Payment>> {
        self.query_payments(
            &format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE bill_id = ?1 ORDER BY date ASC, created_at ASC"
            ),
            Some(bill_id),
        )
    }

    fn query_payments(&self, sql: &str, bill_id: Option<Uuid>) -> Result<Vec<Payment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raws: Vec<RawPayment> = match bill_id {
            Some(id) => stmt
                .query_map(params![id.to_string()], RawPayment::from_row)?
                .collect::<rusqlite::Result<_>>()?,
            None => stmt
                .query_map([], RawPayment::from_row)?
                .collect::<rusqlite::Result<_>>()?,
        };
        raws.into_iter().map(RawPayment::into_payment).collect()
    }
}

const BILL_COLUMNS: &str = "id, name, match_words, amount_min, amount_max, currency, date, repeat_freq, skip, automatch, active, created_at";
const PAYMENT_COLUMNS: &str =
    "id, bill_id, description, account, amount, currency, date, created_at";

/// Column values as SQLite hands them back, before parsing.
struct RawBill {
    id: String,
    name: String,
    match_words: String,
    amount_min: String,
    amount_max: String,
    currency: String,
    date: String,
    repeat_freq: String,
    skip: u32,
    automatch: bool,
    active: bool,
    created_at: String,
}

impl RawBill {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            match_words: row.get(2)?,
            amount_min: row.get(3)?,
            amount_max: row.get(4)?,
            currency: row.get(5)?,
            date: row.get(6)?,
            repeat_freq: row.get(7)?,
            skip: row.get(8)?,
            automatch: row.get(9)?,
            active: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn into_bill(self) -> Result<Bill> {
        Ok(Bill {
            id: Uuid::parse_str(&self.id).context("Invalid bill UUID")?,
            amount_min: self
                .amount_min
                .parse::<Decimal>()
                .context("Invalid decimal amount_min in bills table")?,
            amount_max: self
                .amount_max
                .parse::<Decimal>()
                .context("Invalid decimal amount_max in bills table")?,
            date: NaiveDate::parse_from_str(&self.date, DATE_FMT)
                .context("Invalid date in bills table")?,
            repeat_freq: self
                .repeat_freq
                .parse::<Period>()
                .context("Invalid repeat_freq in bills table")?,
            created_at: parse_timestamp(&self.created_at, "bills")?,
            name: self.name,
            match_words: self.match_words,
            currency: self.currency,
            skip: self.skip,
            automatch: self.automatch,
            active: self.active,
        })
    }
}

struct RawPayment {
    id: String,
    bill_id: Option<String>,
    description: String,
    account: String,
    amount: String,
    currency: String,
    date: String,
    created_at: String,
}

impl RawPayment {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            bill_id: row.get(1)?,
            description: row.get(2)?,
            account: row.get(3)?,
            amount: row.get(4)?,
            currency: row.get(5)?,
            date: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_payment(self) -> Result<Payment> {
        let bill_id = self
            .bill_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .context("Invalid bill UUID in payments table")?;
        Ok(Payment {
            id: Uuid::parse_str(&self.id).context("Invalid payment UUID")?,
            bill_id,
            amount: self
                .amount
                .parse::<Decimal>()
                .context("Invalid decimal amount in payments table")?,
            date: NaiveDate::parse_from_str(&self.date, DATE_FMT)
                .context("Invalid date in payments table")?,
            created_at: parse_timestamp(&self.created_at, "payments")?,
            description: self.description,
            account: self.account,
            currency: self.currency,
        })
    }
}

fn parse_timestamp(raw: &str, table: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid created_at in {table} table"))?
        .with_timezone(&Utc))
}
