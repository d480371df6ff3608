use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashboard_core::{DashboardError, HeadlineSource, Market, NewsItem};
use reqwest::Client;
use std::time::Duration;

const US_FEED_URL: &str =
    "https://news.google.com/rss/search?q=stock+market+economy+when:7d&hl=en-US&gl=US&ceid=US:en";
// query: 증시 경제 (stock market, economy)
const KR_FEED_URL: &str =
    "https://news.google.com/rss/search?q=%EC%A6%9D%EC%8B%9C+%EA%B2%BD%EC%A0%9C+when:7d&hl=ko&gl=KR&ceid=KR:ko";

/// Parse an RSS document into headlines. Items without a title, link or a
/// parseable RFC 2822 date are skipped.
pub fn parse_feed(content: &[u8]) -> Result<Vec<NewsItem>, DashboardError> {
    let channel = rss::Channel::read_from(content)
        .map_err(|e| DashboardError::Parse(format!("Failed to parse RSS feed: {}", e)))?;

    Ok(channel
        .items()
        .iter()
        .filter_map(|item| {
            let title = item.title()?.trim();
            let link = item.link()?.trim();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            let timestamp = DateTime::parse_from_rfc2822(item.pub_date()?.trim())
                .ok()?
                .with_timezone(&Utc);
            Some(NewsItem {
                title: title.to_string(),
                link: link.to_string(),
                timestamp,
            })
        })
        .collect())
}

/// Google News RSS search feeds, one per market.
#[derive(Clone)]
pub struct GoogleNewsFeed {
    client: Client,
}

impl GoogleNewsFeed {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    fn feed_url(market: Market) -> &'static str {
        match market {
            Market::US => US_FEED_URL,
            Market::KR => KR_FEED_URL,
        }
    }
}

impl Default for GoogleNewsFeed {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl HeadlineSource for GoogleNewsFeed {
    async fn headlines(&self, market: Market) -> Result<Vec<NewsItem>, DashboardError> {
        let response = self
            .client
            .get(Self::feed_url(market))
            .send()
            .await
            .map_err(|e| DashboardError::Api(format!("Failed to fetch RSS feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DashboardError::Api(format!("RSS HTTP {}", response.status())));
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| DashboardError::Api(format!("Failed to read RSS content: {}", e)))?;

        parse_feed(&content[..])
    }
}
