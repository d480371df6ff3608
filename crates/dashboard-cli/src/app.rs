use dashboard_core::{BatchOutcome, ScanRow};
use market_sentiment::CnnFearGreedClient;
use news_feed::{GoogleNewsFeed, NewsAggregator};
use smart_watchlist::{select_by_rank, MarketCapCache, MarketScanner, RankedSelection, ScanOptions};
use std::sync::Arc;
use ticker_store::{HoldingsStore, TickerStore};
use yahoo_client::YahooClient;

use crate::config::DashboardConfig;
use crate::session::SessionContext;

/// Long-lived clients and stores shared by every command.
pub struct App {
    pub config: DashboardConfig,
    pub yahoo: Arc<YahooClient>,
    pub fear_greed: CnnFearGreedClient,
    pub news: NewsAggregator,
    pub tickers: TickerStore,
    pub holdings: HoldingsStore,
    pub caps: MarketCapCache,
    pub scanner: MarketScanner,
}

impl App {
    pub fn new(config: DashboardConfig) -> Self {
        let timeout = config.http_timeout();
        let yahoo = Arc::new(YahooClient::new(config.yahoo_rate_limit, timeout));

        Self {
            fear_greed: CnnFearGreedClient::new(timeout),
            news: NewsAggregator::new(Arc::new(GoogleNewsFeed::new(timeout)))
                .with_max_items(config.news_max_items),
            tickers: TickerStore::new(&config.tickers_path),
            holdings: HoldingsStore::new(&config.holdings_path),
            caps: MarketCapCache::default(),
            scanner: MarketScanner::new(yahoo.clone()).with_concurrency(config.scan_concurrency),
            yahoo,
            config,
        }
    }

    /// Top-N of each stored list by market cap.
    pub async fn selection(&self, session: &SessionContext) -> (RankedSelection, RankedSelection) {
        let universe = self.tickers.load();
        select_by_rank(self.yahoo.as_ref(), &self.caps, &universe, session.rank).await
    }

    /// Scan the ranked selection, US rows first.
    pub async fn scan_with(&self, session: &SessionContext, options: &ScanOptions) -> BatchOutcome<ScanRow> {
        let (us, kr) = self.selection(session).await;
        let mut symbols = us.symbols();
        symbols.extend(kr.symbols());
        self.scanner.scan(&symbols, options).await
    }

    pub async fn scan(&self, session: &SessionContext) -> BatchOutcome<ScanRow> {
        self.scan_with(session, &session.scan_options()).await
    }
}
