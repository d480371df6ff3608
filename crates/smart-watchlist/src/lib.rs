//! Smart Watchlist Module
//!
//! Scans the US/KR watch-lists: fetches quotes and history, scores trend and
//! valuation, ranks by market cap and builds the earnings calendar.

pub mod earnings;
pub mod export;
pub mod indicators;
pub mod ranker;
pub mod refresh;
pub mod scanner;
pub mod scorer;

pub use earnings::{build_calendar, calendar_from_rows, earnings_calendar, DEFAULT_DAYS_AHEAD};
pub use export::{
    export_scan_csv, export_scan_xlsx, write_scan_csv, write_scan_xlsx, DEFAULT_EXPORT_FILE, DEFAULT_XLSX_EXPORT_FILE,
};
pub use ranker::{
    clamp_rank, rank_by_market_cap, refresh_top_lists, select_by_rank, MarketCapCache,
    RankedSelection, RankedTicker, RefreshReport, DEFAULT_RANK,
};
pub use refresh::{RefreshGate, RefreshTicket, SingleFlight};
pub use scanner::{MarketScanner, ScanOptions};
pub use scorer::{clamp_threshold, trend_ok, valuation_flag, DEFAULT_THRESHOLD};
