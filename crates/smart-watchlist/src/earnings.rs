use chrono::{Duration, NaiveDate};
use dashboard_core::{BatchOutcome, EarningsEntry, QuoteProvider, QuoteSnapshot, ScanRow};

use crate::scanner::fetch_quotes_batched;

pub const DEFAULT_DAYS_AHEAD: i64 = 14;

/// A window past the last representable date has no upper bound.
fn within(date: NaiveDate, today: NaiveDate, days_ahead: i64) -> bool {
    let last = Duration::try_days(days_ahead.max(0)).and_then(|d| today.checked_add_signed(d));
    date >= today && last.map_or(true, |last| date <= last)
}

fn sort_by_date(entries: &mut [EarningsEntry]) {
    // stable: same-day reports keep list order
    entries.sort_by_key(|e| e.next_earnings);
}

/// Upcoming reports among `quotes`, soonest first. Quotes without a known
/// date are skipped.
pub fn build_calendar(quotes: &[QuoteSnapshot], today: NaiveDate, days_ahead: i64) -> Vec<EarningsEntry> {
    let mut entries: Vec<EarningsEntry> = quotes
        .iter()
        .filter_map(|q| {
            let date = q.next_earnings.filter(|d| within(*d, today, days_ahead))?;
            Some(EarningsEntry {
                ticker: q.symbol.clone(),
                name: q.display_name(),
                next_earnings: date,
            })
        })
        .collect();
    sort_by_date(&mut entries);
    entries
}

/// Same as [`build_calendar`] but from rows of a finished scan.
pub fn calendar_from_rows(rows: &[ScanRow], today: NaiveDate, days_ahead: i64) -> Vec<EarningsEntry> {
    let mut entries: Vec<EarningsEntry> = rows
        .iter()
        .filter_map(|r| {
            let date = r.next_earnings.filter(|d| within(*d, today, days_ahead))?;
            Some(EarningsEntry {
                ticker: r.ticker.clone(),
                name: r.name.clone(),
                next_earnings: date,
            })
        })
        .collect();
    sort_by_date(&mut entries);
    entries
}

/// Fetch quotes for `tickers` and build the calendar. Tickers in a failed
/// quote batch are listed as failures; the rest still produce entries.
pub async fn earnings_calendar(
    provider: &dyn QuoteProvider,
    tickers: &[String],
    days_ahead: i64,
    today: NaiveDate,
) -> BatchOutcome<EarningsEntry> {
    let mut outcome = BatchOutcome::new(tickers.len());
    if tickers.is_empty() {
        return outcome;
    }

    let (quotes, failures) = fetch_quotes_batched(provider, tickers).await;
    // input order, so ties on date follow the watch-list
    let ordered: Vec<QuoteSnapshot> = tickers
        .iter()
        .filter_map(|t| quotes.get(t).cloned())
        .collect();

    outcome.items = build_calendar(&ordered, today, days_ahead);
    outcome.failures = failures;

    tracing::info!(
        "Earnings calendar: {} of {} tickers report within {} days",
        outcome.items.len(),
        tickers.len(),
        days_ahead
    );
    outcome
}
