use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::i18n::Lang;
use crate::session::SessionOverrides;

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "US/KR stock watch-list dashboard", long_about = None)]
pub struct Cli {
    /// Display language
    #[arg(long, value_enum, global = true)]
    pub lang: Option<Lang>,

    /// Top-N by market cap per market (10-100)
    #[arg(long, global = true)]
    pub rank: Option<usize>,

    /// Valuation threshold in percent (5-30)
    #[arg(long, global = true)]
    pub threshold: Option<f64>,

    /// Only show rows whose trend is confirmed
    #[arg(long, global = true)]
    pub trend_only: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> SessionOverrides {
        let (refresh_secs, no_auto_refresh) = match &self.command {
            Commands::Watch { interval, once } => (*interval, *once),
            _ => (None, false),
        };
        SessionOverrides {
            lang: self.lang,
            rank: self.rank,
            threshold_pct: self.threshold,
            trend_only: self.trend_only,
            refresh_secs,
            no_auto_refresh,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MarketArg {
    Us,
    Kr,
    All,
}

#[derive(Subcommand)]
pub enum Commands {
    /// VIX, Fear & Greed and the sector map link
    Market,
    /// Scan the top-N of both lists
    Scan {
        /// Also write the table as CSV (defaults to scan_live.csv in the data dir)
        #[arg(long)]
        export: Option<Option<PathBuf>>,
        /// Also write the table as XLSX (defaults to scan_live.xlsx in the data dir)
        #[arg(long)]
        export_xlsx: Option<Option<PathBuf>>,
    },
    /// Upcoming earnings for the top-N of both lists
    Earnings {
        /// Window in days (0-365)
        #[arg(long, default_value_t = 14, value_parser = clap::value_parser!(i64).range(0..=365))]
        days: i64,
    },
    /// Market headlines by recency
    News {
        #[arg(long, value_enum, default_value_t = MarketArg::All)]
        market: MarketArg,
    },
    /// Position sizes and rebalance suggestions
    Portfolio {
        #[arg(long, default_value_t = 100_000.0)]
        capital: f64,
        /// Risk per trade in percent (0.2-5.0)
        #[arg(long, default_value_t = 1.0)]
        risk: f64,
    },
    /// Show or replace the ticker lists
    Tickers(TickersArgs),
    /// Show or replace holdings
    Holdings(HoldingsArgs),
    /// Rebuild both lists from the largest-companies screener
    RefreshTop {
        #[arg(long, default_value_t = 100)]
        count: usize,
    },
    /// Re-run the scan on an interval
    Watch {
        /// Seconds between refreshes (10-120)
        #[arg(long)]
        interval: Option<u64>,
        /// Run a single scan and exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Args)]
pub struct TickersArgs {
    #[command(subcommand)]
    pub action: TickersAction,
}

#[derive(Subcommand)]
pub enum TickersAction {
    Show,
    /// Replace one or both lists, comma-separated
    Set {
        #[arg(long)]
        us: Option<String>,
        #[arg(long)]
        kr: Option<String>,
    },
}

#[derive(Args)]
pub struct HoldingsArgs {
    #[command(subcommand)]
    pub action: HoldingsAction,
}

#[derive(Subcommand)]
pub enum HoldingsAction {
    Show,
    /// Replace holdings from `TICKER:QTY, TICKER:QTY` text
    Set { text: String },
}
