//! Market-cap Ranking Module
//!
//! Orders each watch-list by market capitalisation and keeps the top N.
//! Also rebuilds the lists from the "largest companies" screener on demand.

use dashboard_core::{DashboardError, Market, QuoteProvider, TickerUniverse, TopListScreener};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use ticker_store::TickerStore;

use crate::scanner::fetch_quotes_batched;

pub const MIN_RANK: usize = 10;
pub const MAX_RANK: usize = 100;
pub const DEFAULT_RANK: usize = 20;
pub const CAP_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

pub fn clamp_rank(n: usize) -> usize {
    n.clamp(MIN_RANK, MAX_RANK)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTicker {
    pub symbol: String,
    pub market_cap: Option<f64>,
    pub cap_missing: bool,
}

/// Top-N slice of one market's list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSelection {
    pub market: Market,
    pub tickers: Vec<RankedTicker>,
}

impl RankedSelection {
    pub fn symbols(&self) -> Vec<String> {
        self.tickers.iter().map(|t| t.symbol.clone()).collect()
    }
}

/// Sort `list` by cap, largest first, and keep `n`. The sort is stable so
/// equal caps keep list order; symbols without a cap go last.
pub fn rank_by_market_cap(list: &[String], caps: &HashMap<String, f64>, n: usize) -> Vec<RankedTicker> {
    let mut ranked: Vec<RankedTicker> = list
        .iter()
        .map(|symbol| {
            let market_cap = caps.get(symbol).copied().filter(|c| c.is_finite() && *c > 0.0);
            RankedTicker {
                symbol: symbol.clone(),
                market_cap,
                cap_missing: market_cap.is_none(),
            }
        })
        .collect();

    ranked.sort_by(|a, b| match (a.market_cap, b.market_cap) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    ranked.truncate(n);
    ranked
}

/// Shared market-cap cache. `None` means the quote arrived without a cap.
pub struct MarketCapCache {
    entries: DashMap<String, (Option<f64>, Instant)>,
    ttl: Duration,
}

impl Default for MarketCapCache {
    fn default() -> Self {
        Self::new(CAP_CACHE_TTL)
    }
}

impl MarketCapCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// `Some(entry)` when a fresh entry exists
    pub fn get(&self, symbol: &str) -> Option<Option<f64>> {
        let entry = self.entries.get(symbol)?;
        let (cap, stored_at) = *entry;
        if stored_at.elapsed() < self.ttl {
            Some(cap)
        } else {
            None
        }
    }

    pub fn insert(&self, symbol: &str, market_cap: Option<f64>) {
        self.entries
            .insert(symbol.to_string(), (market_cap, Instant::now()));
    }

    /// Symbols with no fresh entry.
    pub fn missing(&self, symbols: &[String]) -> Vec<String> {
        symbols
            .iter()
            .filter(|s| self.get(s).is_none())
            .cloned()
            .collect()
    }

    pub fn caps_for(&self, symbols: &[String]) -> HashMap<String, f64> {
        symbols
            .iter()
            .filter_map(|s| self.get(s).flatten().map(|cap| (s.clone(), cap)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fill the cache for every symbol that is missing or stale.
    pub async fn refresh(&self, provider: &dyn QuoteProvider, symbols: &[String]) {
        let missing = self.missing(symbols);
        if missing.is_empty() {
            return;
        }
        tracing::debug!("Fetching market caps for {} uncached symbols", missing.len());

        let (quotes, failures) = fetch_quotes_batched(provider, &missing).await;
        for symbol in &missing {
            if let Some(quote) = quotes.get(symbol) {
                self.insert(symbol, quote.market_cap);
            }
        }
        if !failures.is_empty() {
            tracing::warn!("Market cap unavailable for {} symbols", failures.len());
        }
    }
}

/// Top-N per market, largest caps first.
pub async fn select_by_rank(
    provider: &dyn QuoteProvider,
    cache: &MarketCapCache,
    universe: &TickerUniverse,
    n: usize,
) -> (RankedSelection, RankedSelection) {
    let n = clamp_rank(n);
    cache.refresh(provider, &universe.all()).await;

    let select = |market: Market| {
        let list = universe.list(market);
        let caps = cache.caps_for(list);
        RankedSelection {
            market,
            tickers: rank_by_market_cap(list, &caps, n),
        }
    };

    (select(Market::US), select(Market::KR))
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub refreshed: Vec<Market>,
    /// Markets that kept their previous list, with the reason
    pub kept: Vec<(Market, String)>,
    pub universe: TickerUniverse,
}

/// Replace each market's list with the screener's `n` largest companies.
/// A market whose screener call fails or comes back empty keeps its list.
pub async fn refresh_top_lists(
    screener: &dyn TopListScreener,
    store: &TickerStore,
    n: usize,
) -> Result<RefreshReport, DashboardError> {
    let n = clamp_rank(n);
    let mut universe = store.load();
    let mut refreshed = Vec::new();
    let mut kept = Vec::new();

    for market in Market::ALL {
        match screener.largest_companies(market, n).await {
            Ok(symbols) if !symbols.is_empty() => {
                tracing::info!("Refreshed {} list with {} symbols", market, symbols.len());
                universe.set_list(market, symbols);
                refreshed.push(market);
            }
            Ok(_) => {
                tracing::warn!("Screener returned no {} symbols, keeping current list", market);
                kept.push((market, "screener returned nothing".to_string()));
            }
            Err(e) => {
                tracing::warn!("Screener failed for {} ({}), keeping current list", market, e);
                kept.push((market, e.to_string()));
            }
        }
    }

    if !refreshed.is_empty() {
        store.save(&universe)?;
    }

    Ok(RefreshReport {
        refreshed,
        kept,
        universe,
    })
}
