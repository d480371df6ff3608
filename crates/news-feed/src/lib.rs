//! Headline aggregation for the US and KR markets.
//!
//! Headlines are grouped into three recency buckets (live, yesterday, week),
//! deduplicated by link and ordered newest first. Any upstream failure yields
//! empty buckets; callers render those as "-".

pub mod google;

use chrono::{DateTime, Duration, Utc};
use dashboard_core::{kst_date, HeadlineSource, Market, NewsBucket, NewsItem};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

pub use google::GoogleNewsFeed;

pub const DEFAULT_MAX_ITEMS: usize = 12;

/// Whether `ts` belongs in `bucket` as seen at `now`.
pub fn in_bucket(ts: DateTime<Utc>, bucket: NewsBucket, now: DateTime<Utc>) -> bool {
    let age = now - ts;
    match bucket {
        NewsBucket::Live => age < Duration::hours(24),
        NewsBucket::Yesterday => kst_date(ts).succ_opt() == Some(kst_date(now)),
        NewsBucket::Week => age <= Duration::days(7),
    }
}

/// Filter to one bucket, drop repeated links, newest first, at most `max_items`.
pub fn bucket_items(
    items: &[NewsItem],
    bucket: NewsBucket,
    now: DateTime<Utc>,
    max_items: usize,
) -> Vec<NewsItem> {
    let mut selected: Vec<NewsItem> = items
        .iter()
        .filter(|item| in_bucket(item.timestamp, bucket, now))
        .cloned()
        .collect();

    // newest first, so the surviving copy of a duplicate link is the latest one
    selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut seen = HashSet::new();
    selected.retain(|item| seen.insert(item.link.clone()));
    selected.truncate(max_items);
    selected
}

/// All three buckets for a market
#[derive(Debug, Clone, Default, Serialize)]
pub struct MarketNews {
    pub live: Vec<NewsItem>,
    pub yesterday: Vec<NewsItem>,
    pub week: Vec<NewsItem>,
}

impl MarketNews {
    pub fn bucket(&self, bucket: NewsBucket) -> &[NewsItem] {
        match bucket {
            NewsBucket::Live => &self.live,
            NewsBucket::Yesterday => &self.yesterday,
            NewsBucket::Week => &self.week,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty() && self.yesterday.is_empty() && self.week.is_empty()
    }
}

pub struct NewsAggregator {
    source: Arc<dyn HeadlineSource>,
    max_items: usize,
}

impl NewsAggregator {
    pub fn new(source: Arc<dyn HeadlineSource>) -> Self {
        Self {
            source,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    async fn fetch(&self, market: Market) -> Vec<NewsItem> {
        match self.source.headlines(market).await {
            Ok(items) => {
                tracing::debug!("Fetched {} {} headlines", items.len(), market);
                items
            }
            Err(e) => {
                tracing::warn!("{} news feed unavailable: {}", market, e);
                Vec::new()
            }
        }
    }

    /// One bucket for one market. Empty when the feed is down.
    pub async fn bucket(&self, market: Market, bucket: NewsBucket) -> Vec<NewsItem> {
        let items = self.fetch(market).await;
        bucket_items(&items, bucket, Utc::now(), self.max_items)
    }

    pub async fn news_live(&self, market: Market) -> Vec<NewsItem> {
        self.bucket(market, NewsBucket::Live).await
    }

    pub async fn news_yesterday(&self, market: Market) -> Vec<NewsItem> {
        self.bucket(market, NewsBucket::Yesterday).await
    }

    pub async fn news_week(&self, market: Market) -> Vec<NewsItem> {
        self.bucket(market, NewsBucket::Week).await
    }

    /// All buckets for a market from a single feed fetch.
    pub async fn market_news(&self, market: Market) -> MarketNews {
        let items = self.fetch(market).await;
        let now = Utc::now();
        MarketNews {
            live: bucket_items(&items, NewsBucket::Live, now, self.max_items),
            yesterday: bucket_items(&items, NewsBucket::Yesterday, now, self.max_items),
            week: bucket_items(&items, NewsBucket::Week, now, self.max_items),
        }
    }

    /// US and KR digests, fetched concurrently.
    pub async fn all_markets(&self) -> (MarketNews, MarketNews) {
        tokio::join!(self.market_news(Market::US), self.market_news(Market::KR))
    }
}
