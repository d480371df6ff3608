use async_trait::async_trait;
use crate::{Bar, DashboardError, FearGreedReading, Market, NewsItem, QuoteSnapshot};

/// Quote and price-history source for the scanner
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Quotes for the given symbols in one request. Symbols the provider does
    /// not know are simply absent from the result. Callers keep batches small
    /// (see `smart_watchlist::scanner::QUOTE_BATCH_SIZE`).
    async fn quotes(&self, symbols: &[String]) -> Result<Vec<QuoteSnapshot>, DashboardError>;

    /// Daily bars covering roughly the last `days` calendar days, oldest first.
    async fn daily_history(&self, symbol: &str, days: u32) -> Result<Vec<Bar>, DashboardError>;
}

/// "Largest companies" screener used to rebuild the watch-lists
#[async_trait]
pub trait TopListScreener: Send + Sync {
    async fn largest_companies(&self, market: Market, count: usize) -> Result<Vec<String>, DashboardError>;
}

#[async_trait]
pub trait VolatilityIndexSource: Send + Sync {
    async fn vix(&self) -> Result<f64, DashboardError>;
}

#[async_trait]
pub trait FearGreedSource: Send + Sync {
    async fn fear_greed(&self) -> Result<FearGreedReading, DashboardError>;
}

/// Headline feed for one market
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn headlines(&self, market: Market) -> Result<Vec<NewsItem>, DashboardError>;
}
