use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Equity market a ticker trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    US,
    KR,
}

impl Market {
    pub const ALL: [Market; 2] = [Market::US, Market::KR];

    /// Infer the market from a Yahoo-style symbol (`005930.KS`, `035720.KQ`).
    pub fn of_symbol(symbol: &str) -> Market {
        let upper = symbol.to_ascii_uppercase();
        if upper.ends_with(".KS") || upper.ends_with(".KQ") {
            Market::KR
        } else {
            Market::US
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::US => "US",
            Market::KR => "KR",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trim and upper-case a ticker. Returns `None` for blank input.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_ascii_uppercase())
    }
}

fn dedupe_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .filter_map(|s| normalize_symbol(s.as_ref()))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// The two watch-lists that define what gets scanned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerUniverse {
    #[serde(rename = "US", default)]
    pub us: Vec<String>,
    #[serde(rename = "KR", default)]
    pub kr: Vec<String>,
}

impl TickerUniverse {
    /// Build a universe, normalizing symbols and dropping duplicates (first wins).
    pub fn new<I, J, S, T>(us: I, kr: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            us: dedupe_symbols(us),
            kr: dedupe_symbols(kr),
        }
    }

    pub fn normalized(self) -> Self {
        Self::new(self.us, self.kr)
    }

    pub fn list(&self, market: Market) -> &[String] {
        match market {
            Market::US => &self.us,
            Market::KR => &self.kr,
        }
    }

    pub fn set_list(&mut self, market: Market, symbols: Vec<String>) {
        let cleaned = dedupe_symbols(symbols);
        match market {
            Market::US => self.us = cleaned,
            Market::KR => self.kr = cleaned,
        }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.us.iter().chain(self.kr.iter()).any(|s| s == symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.us.is_empty() && self.kr.is_empty()
    }

    /// US symbols followed by KR symbols.
    pub fn all(&self) -> Vec<String> {
        self.us.iter().chain(self.kr.iter()).cloned().collect()
    }
}

/// Current holdings: ticker -> quantity.
pub type Holdings = BTreeMap<String, f64>;

/// Daily OHLCV bar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Point-in-time quote and fundamentals for one symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub fifty_day_average: Option<f64>,
    pub two_hundred_day_average: Option<f64>,
    pub next_earnings: Option<NaiveDate>,
}

impl QuoteSnapshot {
    /// Human-facing name, falling back to the ticker itself.
    pub fn display_name(&self) -> String {
        let usable = |name: &Option<String>| {
            name.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        usable(&self.short_name)
            .or_else(|| usable(&self.long_name))
            .unwrap_or_else(|| self.symbol.clone())
    }
}

/// Valuation judgement from comparing price deviation against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValuationFlag {
    Cheap,
    Fair,
    Expensive,
}

impl ValuationFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValuationFlag::Cheap => "cheap",
            ValuationFlag::Fair => "fair",
            ValuationFlag::Expensive => "expensive",
        }
    }
}

impl fmt::Display for ValuationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowStatus {
    Ok,
    /// History could not be fetched; quote-derived fields only.
    Partial(String),
    Failed(String),
}

impl RowStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, RowStatus::Failed(_))
    }

    pub fn label(&self) -> String {
        match self {
            RowStatus::Ok => "ok".to_string(),
            RowStatus::Partial(reason) => format!("partial: {}", reason),
            RowStatus::Failed(reason) => format!("failed: {}", reason),
        }
    }
}

/// One scored ticker in a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRow {
    pub ticker: String,
    pub name: String,
    pub market: Market,
    pub price: Option<f64>,
    pub change_pct: Option<f64>,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub rsi14: Option<f64>,
    /// Fractional deviation of price from its 200-day average.
    pub deviation: Option<f64>,
    pub trend_ok: bool,
    pub valuation: ValuationFlag,
    pub entry: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub market_cap: Option<f64>,
    pub per: Option<f64>,
    pub next_earnings: Option<NaiveDate>,
    pub earnings_alert: bool,
    pub status: RowStatus,
}

impl ScanRow {
    /// A row with every data field blank.
    pub fn empty(ticker: &str, status: RowStatus) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: ticker.to_string(),
            market: Market::of_symbol(ticker),
            price: None,
            change_pct: None,
            sma20: None,
            sma50: None,
            sma200: None,
            rsi14: None,
            deviation: None,
            trend_ok: false,
            valuation: ValuationFlag::Fair,
            entry: None,
            stop_loss: None,
            take_profit: None,
            market_cap: None,
            per: None,
            next_earnings: None,
            earnings_alert: false,
            status,
        }
    }

    pub fn failed(ticker: &str, reason: impl Into<String>) -> Self {
        Self::empty(ticker, RowStatus::Failed(reason.into()))
    }
}

/// CNN Fear & Greed reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreedReading {
    pub score: i64,
    pub rating: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub vix: Option<f64>,
    pub fear_greed_score: Option<i64>,
    pub fear_greed_rating: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// A news headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub timestamp: DateTime<Utc>,
}

/// Recency bucket for headlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NewsBucket {
    Live,
    Yesterday,
    Week,
}

impl NewsBucket {
    pub const ALL: [NewsBucket; 3] = [NewsBucket::Live, NewsBucket::Yesterday, NewsBucket::Week];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsEntry {
    pub ticker: String,
    pub name: String,
    pub next_earnings: NaiveDate,
}

/// Per-item failure inside a fan-out call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Complete,
    Partial,
    Failed,
}

/// Result of a fan-out call: what came back plus what did not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome<T> {
    pub items: Vec<T>,
    pub failures: Vec<ItemFailure>,
    pub attempted: usize,
}

impl<T> BatchOutcome<T> {
    pub fn new(attempted: usize) -> Self {
        Self {
            items: Vec::with_capacity(attempted),
            failures: Vec::new(),
            attempted,
        }
    }

    pub fn fail(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(ItemFailure {
            key: key.into(),
            reason: reason.into(),
        });
    }

    pub fn status(&self) -> BatchStatus {
        if self.failures.is_empty() {
            BatchStatus::Complete
        } else if self.failures.len() >= self.attempted {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_inference() {
        assert_eq!(Market::of_symbol("005930.KS"), Market::KR);
        assert_eq!(Market::of_symbol("035720.kq"), Market::KR);
        assert_eq!(Market::of_symbol("NVDA"), Market::US);
        assert_eq!(Market::of_symbol("BRK.B"), Market::US);
    }

    #[test]
    fn test_universe_normalizes_and_dedupes() {
        let u = TickerUniverse::new(vec![" nvda", "AAPL", "NVDA", ""], vec!["005930.ks"]);
        assert_eq!(u.us, vec!["NVDA", "AAPL"]);
        assert_eq!(u.kr, vec!["005930.KS"]);
        assert!(u.contains("AAPL"));
        assert_eq!(u.all(), vec!["NVDA", "AAPL", "005930.KS"]);
    }

    #[test]
    fn test_universe_json_keys() {
        let u = TickerUniverse::new(vec!["MSFT"], vec!["000660.KS"]);
        let json = serde_json::to_string(&u).unwrap();
        assert_eq!(json, r#"{"US":["MSFT"],"KR":["000660.KS"]}"#);

        let missing_kr: TickerUniverse = serde_json::from_str(r#"{"US":["A"]}"#).unwrap();
        assert!(missing_kr.kr.is_empty());
    }

    #[test]
    fn test_display_name_fallback() {
        let mut q = QuoteSnapshot {
            symbol: "AAPL".to_string(),
            ..Default::default()
        };
        assert_eq!(q.display_name(), "AAPL");
        q.long_name = Some("Apple Inc.".to_string());
        assert_eq!(q.display_name(), "Apple Inc.");
        q.short_name = Some("Apple".to_string());
        assert_eq!(q.display_name(), "Apple");
    }

    #[test]
    fn test_blank_short_name_falls_back_to_long_name() {
        let q = QuoteSnapshot {
            symbol: "005930.KS".to_string(),
            short_name: Some("   ".to_string()),
            long_name: Some(" Samsung Electronics Co., Ltd. ".to_string()),
            ..Default::default()
        };
        assert_eq!(q.display_name(), "Samsung Electronics Co., Ltd.");
    }

    #[test]
    fn test_batch_status() {
        let mut b: BatchOutcome<u32> = BatchOutcome::new(2);
        assert_eq!(b.status(), BatchStatus::Complete);
        b.fail("A", "timeout");
        assert_eq!(b.status(), BatchStatus::Partial);
        b.fail("B", "timeout");
        assert_eq!(b.status(), BatchStatus::Failed);
    }
}
