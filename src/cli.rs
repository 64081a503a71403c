use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "billdue")]
#[command(about = "Local-first bill tracker with recurring due dates", long_about = None)]
pub struct Cli {
    /// Override billdue home directory (config/data subdirs will be created inside it).
    #[arg(long, env = "BILLDUE_HOME")]
    pub home: Option<std::path::PathBuf>,

    /// More log output on stderr (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute expected pay dates for an ad-hoc recurrence.
    Calc(CalcArgs),
    Bill(BillArgs),
    /// Record a payment, optionally against a bill.
    Pay(PayArgs),
    /// List recorded payments.
    Payments(PaymentsArgs),
    Ws(WsArgs),
}

#[derive(Debug, Args)]
pub struct CalcArgs {
    /// First day of the window (YYYY-MM-DD).
    #[arg(long)]
    pub earliest: String,

    /// Last day of the window (YYYY-MM-DD).
    #[arg(long)]
    pub latest: String,

    /// Anchor date of the recurrence (YYYY-MM-DD).
    #[arg(long)]
    pub start: String,

    /// daily, weekly, monthly, quarterly, half-year or yearly.
    #[arg(long)]
    pub period: String,

    /// Occurrences to skip between two kept ones.
    #[arg(long, default_value_t = 0)]
    pub skip: u32,

    /// Date of the last settled occurrence (YYYY-MM-DD).
    #[arg(long)]
    pub last_paid: Option<String>,
}

#[derive(Debug, Args)]
pub struct BillArgs {
    #[command(subcommand)]
    pub cmd: BillCmd,
}

#[derive(Debug, Subcommand)]
pub enum BillCmd {
    Create {
        name: String,
        /// Comma-separated keywords a payment must contain.
        #[arg(long = "match")]
        match_words: String,
        #[arg(long)]
        min: String,
        #[arg(long)]
        max: String,
        /// Anchor date of the recurrence (YYYY-MM-DD).
        #[arg(long)]
        date: String,
        #[arg(long)]
        period: String,
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long)]
        currency: Option<String>,
        /// Do not match new payments against this bill automatically.
        #[arg(long)]
        no_automatch: bool,
        #[arg(long)]
        inactive: bool,
    },
    Update {
        name: String,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long = "match")]
        match_words: Option<String>,
        #[arg(long)]
        min: Option<String>,
        #[arg(long)]
        max: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        skip: Option<u32>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        automatch: Option<bool>,
        #[arg(long)]
        active: Option<bool>,
    },
    Delete {
        name: String,
    },
    List,
    Show {
        name: String,
        /// Reference date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        today: Option<String>,
    },
    /// Expected, still unpaid dates of active bills.
    Due {
        name: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Billing periods of a bill that overlap a window.
    Ranges {
        name: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Next payment each active bill is waiting for.
    Next {
        name: Option<String>,
        #[arg(long)]
        today: Option<String>,
    },
    /// Re-match every recorded payment against one bill.
    Scan {
        name: String,
    },
    /// Paid and unpaid billing periods of all active bills.
    Overview {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
}

#[derive(Debug, Args)]
pub struct PayArgs {
    pub description: String,
    pub amount: String,

    /// Payee account.
    #[arg(long)]
    pub account: String,

    /// Link to this bill instead of matching automatically.
    #[arg(long)]
    pub bill: Option<String>,

    /// Payment date (YYYY-MM-DD). Defaults to today (UTC).
    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub currency: Option<String>,
}

#[derive(Debug, Args)]
pub struct PaymentsArgs {
    #[arg(long)]
    pub bill: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum WsCmd {
    Check,
    Add { name: String },
    Checkout { name: String },
}

#[derive(Debug, Args)]
pub struct WsArgs {
    #[command(subcommand)]
    pub cmd: WsCmd,
}
