//! Batch fetch-and-score over a ticker list.

use chrono::NaiveDate;
use dashboard_core::{
    today_kst, BatchOutcome, Bar, DashboardError, ItemFailure, QuoteProvider, QuoteSnapshot,
    RowStatus, ScanRow,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::scorer::{clamp_threshold, score_row, DEFAULT_THRESHOLD};

/// Symbols per quote request. Yahoo accepts more, but long URLs get rejected.
pub const QUOTE_BATCH_SIZE: usize = 50;
pub const DEFAULT_CONCURRENCY: usize = 8;
/// One year of daily bars, enough for SMA200.
pub const HISTORY_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub threshold: f64,
    /// Keep only rows whose trend test passed
    pub trend_only: bool,
    pub history_days: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            trend_only: false,
            history_days: HISTORY_DAYS,
        }
    }
}

/// Fetch quotes in fixed-size batches. A failing batch is reported per
/// symbol and does not affect the other batches.
pub(crate) async fn fetch_quotes_batched(
    provider: &dyn QuoteProvider,
    symbols: &[String],
) -> (HashMap<String, QuoteSnapshot>, Vec<ItemFailure>) {
    let mut quotes = HashMap::with_capacity(symbols.len());
    let mut failures = Vec::new();

    for chunk in symbols.chunks(QUOTE_BATCH_SIZE) {
        match provider.quotes(chunk).await {
            Ok(batch) => {
                for quote in batch {
                    quotes.insert(quote.symbol.to_ascii_uppercase(), quote);
                }
            }
            Err(e) => {
                tracing::warn!("Quote batch of {} failed: {}", chunk.len(), e);
                failures.extend(chunk.iter().map(|s| ItemFailure {
                    key: s.clone(),
                    reason: e.to_string(),
                }));
            }
        }
    }

    (quotes, failures)
}

pub struct MarketScanner {
    provider: Arc<dyn QuoteProvider>,
    concurrency: usize,
}

impl MarketScanner {
    pub fn new(provider: Arc<dyn QuoteProvider>) -> Self {
        Self {
            provider,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn scan(&self, symbols: &[String], options: &ScanOptions) -> BatchOutcome<ScanRow> {
        self.scan_at(symbols, options, today_kst()).await
    }

    /// Scan as of `today`. Rows come back in input order, one per symbol,
    /// unless `trend_only` filters them.
    pub async fn scan_at(
        &self,
        symbols: &[String],
        options: &ScanOptions,
        today: NaiveDate,
    ) -> BatchOutcome<ScanRow> {
        let mut outcome = BatchOutcome::new(symbols.len());
        if symbols.is_empty() {
            return outcome;
        }

        let threshold = clamp_threshold(options.threshold);
        tracing::info!("Scanning {} tickers (concurrency {})", symbols.len(), self.concurrency);

        let (quotes, quote_failures) = fetch_quotes_batched(self.provider.as_ref(), symbols).await;
        let quote_errors: HashMap<String, String> = quote_failures
            .into_iter()
            .map(|f| (f.key, f.reason))
            .collect();

        let histories = self.fetch_histories(symbols, options.history_days).await;

        for (symbol, history) in symbols.iter().zip(histories) {
            let quote = quotes.get(symbol);
            let quote_reason = || {
                quote_errors
                    .get(symbol)
                    .cloned()
                    .unwrap_or_else(|| "no quote returned".to_string())
            };

            let row = match (quote, history) {
                (Some(q), Ok(bars)) => score_row(symbol, Some(q), Some(&bars), threshold, today),
                (Some(q), Err(e)) => {
                    let mut row = score_row(symbol, Some(q), None, threshold, today);
                    row.status = RowStatus::Partial(format!("history unavailable: {}", e));
                    row
                }
                (None, Ok(bars)) => {
                    let mut row = score_row(symbol, None, Some(&bars), threshold, today);
                    row.status = RowStatus::Partial(format!("quote unavailable: {}", quote_reason()));
                    row
                }
                (None, Err(e)) => {
                    let reason = format!("{}; {}", quote_reason(), e);
                    tracing::warn!("Scan failed for {}: {}", symbol, reason);
                    outcome.fail(symbol.clone(), reason.clone());
                    ScanRow::failed(symbol, reason)
                }
            };
            outcome.items.push(row);
        }

        if options.trend_only {
            outcome.items.retain(|row| row.trend_ok);
        }

        tracing::info!(
            "Scan complete: {} rows, {} failed, status {:?}",
            outcome.items.len(),
            outcome.failures.len(),
            outcome.status()
        );
        outcome
    }

    /// One history per symbol, in input order.
    async fn fetch_histories(
        &self,
        symbols: &[String],
        days: u32,
    ) -> Vec<Result<Vec<Bar>, DashboardError>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let symbol = symbol.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| DashboardError::Api(e.to_string()))?;
                provider.daily_history(&symbol, days).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = match handle.await {
                Ok(r) => r,
                Err(e) => Err(DashboardError::Api(format!("history task failed: {}", e))),
            };
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use dashboard_core::BatchStatus;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory provider with per-symbol failure switches.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub quotes: HashMap<String, QuoteSnapshot>,
        pub closes: HashMap<String, Vec<f64>>,
        pub failing_history: HashSet<String>,
        pub fail_quote_batches: bool,
        pub quote_calls: AtomicUsize,
    }

    impl FakeProvider {
        pub fn with_quote(mut self, symbol: &str, price: f64, market_cap: Option<f64>) -> Self {
            self.quotes.insert(
                symbol.to_string(),
                QuoteSnapshot {
                    symbol: symbol.to_string(),
                    price: Some(price),
                    market_cap,
                    ..Default::default()
                },
            );
            self
        }

        pub fn with_closes(mut self, symbol: &str, closes: Vec<f64>) -> Self {
            self.closes.insert(symbol.to_string(), closes);
            self
        }
    }

    #[async_trait]
    impl QuoteProvider for FakeProvider {
        async fn quotes(&self, symbols: &[String]) -> Result<Vec<QuoteSnapshot>, DashboardError> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_quote_batches {
                return Err(DashboardError::RateLimited("429".to_string()));
            }
            Ok(symbols.iter().filter_map(|s| self.quotes.get(s).cloned()).collect())
        }

        async fn daily_history(&self, symbol: &str, _days: u32) -> Result<Vec<Bar>, DashboardError> {
            if self.failing_history.contains(symbol) {
                return Err(DashboardError::Api("timeout".to_string()));
            }
            // later symbols finish first to shake out ordering bugs
            tokio::time::sleep(std::time::Duration::from_millis(
                (10 - symbol.len().min(10)) as u64,
            ))
            .await;
            let closes = self
                .closes
                .get(symbol)
                .ok_or_else(|| DashboardError::NoData(symbol.to_string()))?;
            let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
            Ok(closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar {
                    timestamp: start + Duration::days(i as i64),
                    open: c,
                    high: c + 1.0,
                    low: c - 1.0,
                    close: c,
                    volume: 1.0,
                })
                .collect())
        }
    }

    fn rising() -> Vec<f64> {
        (0..260).map(|i| 100.0 + i as f64).collect()
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_one_failing_ticker_among_n() {
        let mut provider = FakeProvider::default()
            .with_quote("AAPL", 359.0, Some(3.0e12))
            .with_quote("MSFT", 359.0, Some(3.1e12))
            .with_closes("AAPL", rising())
            .with_closes("MSFT", rising());
        provider.failing_history.insert("ZZZZ".to_string());

        let scanner = MarketScanner::new(Arc::new(provider)).with_concurrency(2);
        let outcome = scanner
            .scan_at(&symbols(&["AAPL", "ZZZZ", "MSFT"]), &ScanOptions::default(), today())
            .await;

        assert_eq!(outcome.items.len(), 3);
        let tickers: Vec<_> = outcome.items.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "ZZZZ", "MSFT"]);
        assert!(outcome.items[1].status.is_failed());
        assert_eq!(outcome.items[0].status, RowStatus::Ok);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].key, "ZZZZ");
        assert_eq!(outcome.status(), BatchStatus::Partial);
    }

    #[tokio::test]
    async fn test_history_failure_gives_partial_row() {
        let mut provider = FakeProvider::default().with_quote("TSLA", 180.0, Some(5.7e11));
        provider.failing_history.insert("TSLA".to_string());

        let scanner = MarketScanner::new(Arc::new(provider));
        let outcome = scanner
            .scan_at(&symbols(&["TSLA"]), &ScanOptions::default(), today())
            .await;

        let row = &outcome.items[0];
        assert!(matches!(row.status, RowStatus::Partial(_)));
        assert_eq!(row.price, Some(180.0));
        assert!(row.sma20.is_none());
        assert_eq!(outcome.status(), BatchStatus::Complete);
    }

    #[tokio::test]
    async fn test_failed_quote_batch_degrades_to_history_only() {
        let mut provider = FakeProvider::default().with_closes("AMZN", rising());
        provider.fail_quote_batches = true;

        let scanner = MarketScanner::new(Arc::new(provider));
        let outcome = scanner
            .scan_at(&symbols(&["AMZN", "META"]), &ScanOptions::default(), today())
            .await;

        assert_eq!(outcome.items.len(), 2);
        assert!(matches!(outcome.items[0].status, RowStatus::Partial(_)));
        assert_eq!(outcome.items[0].price, Some(359.0));
        assert!(outcome.items[1].status.is_failed());
    }

    #[tokio::test]
    async fn test_quotes_are_batched() {
        let list: Vec<String> = (0..120).map(|i| format!("T{}", i)).collect();
        let provider = Arc::new(FakeProvider::default());
        let scanner = MarketScanner::new(provider.clone());
        let outcome = scanner.scan_at(&list, &ScanOptions::default(), today()).await;

        assert_eq!(provider.quote_calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.items.len(), 120);
        assert_eq!(outcome.status(), BatchStatus::Failed);
    }

    #[tokio::test]
    async fn test_trend_only_filter() {
        let falling: Vec<f64> = rising().into_iter().rev().collect();
        let provider = FakeProvider::default()
            .with_quote("UP", 359.0, None)
            .with_quote("DOWN", 101.0, None)
            .with_closes("UP", rising())
            .with_closes("DOWN", falling);

        let scanner = MarketScanner::new(Arc::new(provider));
        let options = ScanOptions {
            trend_only: true,
            ..Default::default()
        };
        let outcome = scanner.scan_at(&symbols(&["DOWN", "UP"]), &options, today()).await;

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].ticker, "UP");
    }

    #[tokio::test]
    async fn test_empty_list() {
        let provider = Arc::new(FakeProvider::default());
        let scanner = MarketScanner::new(provider.clone());
        let outcome = scanner.scan_at(&[], &ScanOptions::default(), today()).await;
        assert!(outcome.items.is_empty());
        assert_eq!(provider.quote_calls.load(Ordering::SeqCst), 0);
    }
}
