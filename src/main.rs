mod calculator;
mod cli;
mod config;
mod db;
mod domain;
mod navigation;
mod schedule;

use anyhow::{Context, Result, anyhow};
use chrono::{Days, NaiveDate, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::calculator::{DateWindow, get_pay_dates};
use crate::cli::{BillCmd, CalcArgs, Cli, Command, PayArgs, PaymentsArgs, WsCmd};
use crate::config::{AppConfig, AppPaths, app_paths, load_or_init_config, today_utc, write_config};
use crate::db::Db;
use crate::domain::{Bill, Payment, ScanOutcome, scan};
use crate::navigation::Period;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let paths = app_paths(cli.home.clone())?;
    let (mut cfg, cfg_path) = load_or_init_config(&paths)?;
    init_logging(cli.verbose, cfg.log_filter.as_deref());

    match cli.command {
        Command::Calc(args) => handle_calc(args),
        Command::Ws(args) => handle_ws(args.cmd, &paths, &mut cfg, &cfg_path),
        cmd => {
            let (db, db_path) = Db::open(&paths, &cfg.current_workspace)?;
            debug!(workspace = %cfg.current_workspace, db = %db_path.display(), "using workspace");

            match cmd {
                Command::Bill(args) => handle_bill(&db, &cfg, args.cmd),
                Command::Pay(args) => handle_pay(&db, &cfg, args),
                Command::Payments(args) => handle_payments(&db, args),
                Command::Calc(_) | Command::Ws(_) => unreachable!(),
            }
        }
    }
}

fn init_logging(verbose: u8, configured: Option<&str>) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = log_directive(rust_log.as_deref(), verbose, configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Picks the log filter: `RUST_LOG`, then `-v`/`-vv`, then the configured filter, then `warn`.
fn log_directive(rust_log: Option<&str>, verbose: u8, configured: Option<&str>) -> String {
    if let Some(env) = rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        return env.to_string();
    }
    match verbose {
        0 => configured
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("warn")
            .to_string(),
        1 => "billdue=debug".to_string(),
        _ => "billdue=trace".to_string(),
    }
}

fn handle_calc(args: CalcArgs) -> Result<()> {
    let earliest = parse_date(&args.earliest, "earliest")?;
    let latest = parse_date(&args.latest, "latest")?;
    let start = parse_date(&args.start, "start")?;
    let last_paid = args
        .last_paid
        .as_deref()
        .map(|raw| parse_date(raw, "last-paid"))
        .transpose()?;

    let dates = get_pay_dates(earliest, latest, start, &args.period, args.skip, last_paid)?;
    for date in dates {
        println!("{date}");
    }
    Ok(())
}

fn handle_bill(db: &Db, cfg: &AppConfig, cmd: BillCmd) -> Result<()> {
    match cmd {
        BillCmd::Create {
            name,
            match_words,
            min,
            max,
            date,
            period,
            skip,
            currency,
            no_automatch,
            inactive,
        } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(anyhow!("Bill name must not be empty"));
            }

            let bill = Bill {
                id: Uuid::new_v4(),
                name: name.clone(),
                match_words,
                amount_min: parse_decimal(min, "min")?,
                amount_max: parse_decimal(max, "max")?,
                currency: currency
                    .unwrap_or_else(|| cfg.default_currency.clone())
                    .to_ascii_uppercase(),
                date: parse_date(&date, "date")?,
                repeat_freq: parse_period(&period)?,
                skip,
                automatch: !no_automatch,
                active: !inactive,
                created_at: Utc::now(),
            };
            validate_bill(&bill)?;

            db.insert_bill(&bill)
                .with_context(|| format!("Failed to create bill '{name}'"))?;
            info!(bill = %bill.name, id = %bill.id, "created bill");
            println!(
                "Created bill '{}' {} from {} ({}..{} {}).",
                bill.name,
                describe_recurrence(&bill),
                bill.date,
                bill.amount_min,
                bill.amount_max,
                bill.currency
            );
            Ok(())
        }
        BillCmd::Update {
            name,
            rename,
            match_words,
            min,
            max,
            date,
            period,
            skip,
            currency,
            automatch,
            active,
        } => {
            let mut bill = require_bill(db, &name)?;

            if let Some(new_name) = rename {
                let new_name = new_name.trim().to_string();
                if new_name.is_empty() {
                    return Err(anyhow!("Bill name must not be empty"));
                }
                bill.name = new_name;
            }
            if let Some(words) = match_words {
                bill.match_words = words;
            }
            if let Some(min) = min {
                bill.amount_min = parse_decimal(min, "min")?;
            }
            if let Some(max) = max {
                bill.amount_max = parse_decimal(max, "max")?;
            }
            if let Some(date) = date {
                bill.date = parse_date(&date, "date")?;
            }
            if let Some(period) = period {
                bill.repeat_freq = parse_period(&period)?;
            }
            if let Some(skip) = skip {
                bill.skip = skip;
            }
            if let Some(currency) = currency {
                bill.currency = currency.to_ascii_uppercase();
            }
            if let Some(automatch) = automatch {
                bill.automatch = automatch;
            }
            if let Some(active) = active {
                bill.active = active;
            }
            validate_bill(&bill)?;

            db.update_bill(&bill)
                .with_context(|| format!("Failed to update bill '{name}'"))?;
            println!("Updated bill '{}'.", bill.name);
            Ok(())
        }
        BillCmd::Delete { name } => {
            let bill = require_bill(db, &name)?;
            db.delete_bill(bill.id)?;
            info!(bill = %bill.name, id = %bill.id, "deleted bill");
            println!("Deleted bill '{name}'.");
            Ok(())
        }
        BillCmd::List => {
            let bills = db.list_bills()?;
            if bills.is_empty() {
                println!("(no bills)");
                return Ok(());
            }

            println!("name\tperiod\tskip\tdate\tmin\tmax\tcurrency\tactive\tautomatch\tmatch");
            for b in bills {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    b.name,
                    b.repeat_freq,
                    b.skip,
                    b.date,
                    b.amount_min,
                    b.amount_max,
                    b.currency,
                    yes_no(b.active),
                    yes_no(b.automatch),
                    b.match_words
                );
            }
            Ok(())
        }
        BillCmd::Show { name, today } => {
            let bill = require_bill(db, &name)?;
            let today = parse_date_or_today(today.as_deref(), "today")?;
            let payments = db.payments_for_bill(bill.id)?;

            let last_paid = schedule::last_found_match(&bill, &payments);
            let next = schedule::next_expected_match(&bill, &payments, today);

            println!("name\t{}", bill.name);
            println!("match\t{}", bill.match_words);
            println!(
                "amount\t{}..{} {}",
                bill.amount_min, bill.amount_max, bill.currency
            );
            println!("repeats\t{}", describe_recurrence(&bill));
            println!("anchor\t{}", bill.date);
            println!("active\t{}", yes_no(bill.active));
            println!("automatch\t{}", yes_no(bill.automatch));
            println!("payments\t{}", payments.len());
            println!("last paid\t{}", display_opt_date(last_paid, "(never)"));
            println!("next expected\t{}", display_opt_date(next, "(none)"));
            Ok(())
        }
        BillCmd::Due { name, from, to } => {
            let from = parse_date_or_today(from.as_deref(), "from")?;
            let to = match to {
                Some(raw) => parse_date(&raw, "to")?,
                None => from
                    .checked_add_days(Days::new(u64::from(cfg.due_window_days())))
                    .ok_or_else(|| anyhow!("Due window runs past the supported calendar"))?,
            };
            let window = DateWindow::new(from, to)?;

            let bills = match name {
                Some(name) => {
                    let bill = require_bill(db, &name)?;
                    if bill.active { vec![bill] } else { Vec::new() }
                }
                None => db.list_active_bills()?,
            };
            let payments = db.list_payments()?;

            let mut rows: Vec<(NaiveDate, &Bill)> = Vec::new();
            for bill in &bills {
                for date in schedule::due_dates(bill, &payments, window) {
                    rows.push((date, bill));
                }
            }
            rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));

            if rows.is_empty() {
                println!("(no due dates)");
                return Ok(());
            }

            println!("date\tbill\tamount\tcurrency");
            for (date, bill) in rows {
                println!(
                    "{}\t{}\t{}\t{}",
                    date, bill.name, bill.amount_max, bill.currency
                );
            }
            Ok(())
        }
        BillCmd::Ranges { name, from, to } => {
            let bill = require_bill(db, &name)?;
            let window = DateWindow::new(parse_date(&from, "from")?, parse_date(&to, "to")?)?;
            let payments = db.payments_for_bill(bill.id)?;

            let ranges = schedule::ranges(&bill, window);
            if ranges.is_empty() {
                println!("(no billing periods)");
                return Ok(());
            }

            println!("start\tend\tdue\tpaid");
            for r in ranges {
                let paid = schedule::payments_in_range(&bill, &payments, r.start, r.end);
                println!("{}\t{}\t{}\t{}", r.start, r.end, r.due, paid);
            }
            Ok(())
        }
        BillCmd::Next { name, today } => {
            let today = parse_date_or_today(today.as_deref(), "today")?;
            let bills = match name {
                Some(name) => vec![require_bill(db, &name)?],
                None => db.list_active_bills()?,
            };
            if bills.is_empty() {
                println!("(no bills)");
                return Ok(());
            }

            let payments = db.list_payments()?;
            println!("bill\tnext");
            for bill in &bills {
                let next = schedule::next_expected_match(bill, &payments, today);
                println!("{}\t{}", bill.name, display_opt_date(next, "(none)"));
            }
            Ok(())
        }
        BillCmd::Scan { name } => {
            let bill = require_bill(db, &name)?;
            let payments = db.list_payments()?;

            let mut linked = 0usize;
            let mut unlinked = 0usize;
            for payment in &payments {
                match scan(&bill, payment) {
                    ScanOutcome::Linked if payment.bill_id != Some(bill.id) => {
                        db.set_payment_bill(payment.id, Some(bill.id))?;
                        debug!(bill = %bill.name, payment = %payment.id, "linked payment");
                        linked += 1;
                    }
                    ScanOutcome::Unlinked => {
                        db.set_payment_bill(payment.id, None)?;
                        debug!(bill = %bill.name, payment = %payment.id, "unlinked payment");
                        unlinked += 1;
                    }
                    _ => {}
                }
            }

            println!(
                "Scanned {} payments for bill '{}': {} linked, {} unlinked.",
                payments.len(),
                bill.name,
                linked,
                unlinked
            );
            Ok(())
        }
        BillCmd::Overview { from, to } => {
            let window = DateWindow::new(parse_date(&from, "from")?, parse_date(&to, "to")?)?;
            let bills = db.list_bills()?;
            let payments = db.list_payments()?;

            let overview = schedule::overview(&bills, &payments, window);
            if overview.entries.is_empty() {
                println!("(no billing periods)");
                return Ok(());
            }

            println!("status\tbill\tstart\tend\tdue\tamount\tcurrency");
            for e in overview.paid() {
                println!(
                    "paid\t{}\t{}\t{}\t{}\t{}\t{}",
                    e.bill.name, e.range.start, e.range.end, e.range.due, e.paid_amount, e.bill.currency
                );
            }
            for e in overview.unpaid() {
                println!(
                    "unpaid\t{}\t{}\t{}\t{}\t{}\t{}",
                    e.bill.name,
                    e.range.start,
                    e.range.end,
                    e.range.due,
                    e.bill.amount_max,
                    e.bill.currency
                );
            }
            for (currency, total) in &overview.paid_totals {
                println!("(total paid)\t{currency}\t{total}");
            }
            for (currency, total) in &overview.unpaid_totals {
                println!("(total unpaid)\t{currency}\t{total}");
            }
            Ok(())
        }
    }
}

fn handle_pay(db: &Db, cfg: &AppConfig, args: PayArgs) -> Result<()> {
    let amount = parse_decimal(args.amount, "amount")?;
    if amount == Decimal::ZERO {
        return Err(anyhow!("Payment amount must not be zero"));
    }
    let date = parse_date_or_today(args.date.as_deref(), "date")?;

    let mut payment = Payment {
        id: Uuid::new_v4(),
        bill_id: None,
        description: args.description,
        account: args.account,
        amount,
        currency: args
            .currency
            .unwrap_or_else(|| cfg.default_currency.clone())
            .to_ascii_uppercase(),
        date,
        created_at: Utc::now(),
    };

    let bill = match args.bill {
        Some(name) => Some(require_bill(db, &name)?),
        None => db
            .list_active_bills()?
            .into_iter()
            .filter(|b| b.automatch)
            .find(|b| scan(b, &payment) == ScanOutcome::Linked),
    };
    payment.bill_id = bill.as_ref().map(|b| b.id);

    db.insert_payment(&payment)?;
    match bill {
        Some(bill) => {
            info!(payment = %payment.id, bill = %bill.name, "recorded payment");
            println!(
                "Recorded payment {} {} {} on {} for bill '{}'.",
                payment.id, payment.amount, payment.currency, payment.date, bill.name
            );
        }
        None => {
            info!(payment = %payment.id, "recorded payment without bill");
            println!(
                "Recorded payment {} {} {} on {} (no matching bill).",
                payment.id, payment.amount, payment.currency, payment.date
            );
        }
    }
    Ok(())
}

fn handle_payments(db: &Db, args: PaymentsArgs) -> Result<()> {
    let payments = match args.bill.as_deref() {
        Some(name) => db.payments_for_bill(require_bill(db, name)?.id)?,
        None => db.list_payments()?,
    };
    if payments.is_empty() {
        println!("(no payments)");
        return Ok(());
    }

    let names: HashMap<Uuid, String> = db
        .list_bills()?
        .into_iter()
        .map(|b| (b.id, b.name))
        .collect();

    println!("date\tdescription\taccount\tamount\tcurrency\tbill");
    for p in payments {
        let bill = p
            .bill_id
            .and_then(|id| names.get(&id).cloned())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            p.date, p.description, p.account, p.amount, p.currency, bill
        );
    }
    Ok(())
}

fn handle_ws(cmd: WsCmd, paths: &AppPaths, cfg: &mut AppConfig, cfg_path: &Path) -> Result<()> {
    match cmd {
        WsCmd::Check => {
            println!("You are currently in workspace: {}", cfg.current_workspace);
        }
        WsCmd::Add { name } => {
            // Creating a workspace is just creating its db.
            let _ = Db::open(paths, &name)?;
            println!("Added workspace: {name}");
        }
        WsCmd::Checkout { name } => {
            let _ = Db::open(paths, &name)?;
            cfg.current_workspace = name.clone();
            write_config(cfg_path, cfg)?;
            println!("Checked out workspace: {name}");
        }
    }
    Ok(())
}

fn require_bill(db: &Db, name: &str) -> Result<Bill> {
    db.get_bill_by_name(name)?
        .ok_or_else(|| anyhow!("No such bill: '{name}'"))
}

fn validate_bill(bill: &Bill) -> Result<()> {
    if bill.amount_min < Decimal::ZERO || bill.amount_max < Decimal::ZERO {
        return Err(anyhow!("Bill amounts must be >= 0"));
    }
    if bill.amount_min > bill.amount_max {
        return Err(anyhow!(
            "Bill minimum amount ({}) must not exceed maximum amount ({})",
            bill.amount_min,
            bill.amount_max
        ));
    }
    Ok(())
}

fn describe_recurrence(bill: &Bill) -> String {
    match bill.skip {
        0 => bill.repeat_freq.to_string(),
        skip => format!("{} (skip {skip})", bill.repeat_freq),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn display_opt_date(date: Option<NaiveDate>, fallback: &str) -> String {
    date.map(|d| d.to_string())
        .unwrap_or_else(|| fallback.to_string())
}

fn parse_period(raw: &str) -> Result<Period> {
    Ok(raw.parse::<Period>()?)
}

fn parse_decimal(raw: String, field: &'static str) -> Result<Decimal> {
    raw.parse::<Decimal>()
        .with_context(|| format!("Invalid decimal for {field}: {raw}"))
}

fn parse_date(raw: &str, field: &'static str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date for {field}: {raw}. Expected YYYY-MM-DD"))
}

fn parse_date_or_today(raw: Option<&str>, field: &'static str) -> Result<NaiveDate> {
    match raw {
        None => Ok(today_utc()),
        Some(s) => parse_date(s, field),
    }
}
