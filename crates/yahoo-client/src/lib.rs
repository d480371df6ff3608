pub mod parse;
pub mod rate_limiter;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dashboard_core::{
    today_kst, Bar, DashboardError, Market, QuoteProvider, QuoteSnapshot, TopListScreener,
    VolatilityIndexSource,
};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub use rate_limiter::{RateLimiter, RetryPolicy};

const COOKIE_URL: &str = "https://fc.yahoo.com";
const QUERY1_URL: &str = "https://query1.finance.yahoo.com";
const QUERY2_URL: &str = "https://query2.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Screener page size ceiling.
const SCREENER_MAX: usize = 250;
pub const VIX_SYMBOL: &str = "^VIX";

#[derive(Debug, Clone)]
struct Endpoints {
    /// Any page on this host sets the session cookie the crumb is bound to.
    cookie: String,
    crumb: String,
    quote: String,
    chart: String,
    screener: String,
}

impl Endpoints {
    fn yahoo() -> Self {
        Self {
            cookie: COOKIE_URL.to_string(),
            crumb: format!("{}/v1/test/getcrumb", QUERY1_URL),
            quote: format!("{}/v7/finance/quote", QUERY1_URL),
            chart: format!("{}/v8/finance/chart", QUERY2_URL),
            screener: format!("{}/v1/finance/screener", QUERY2_URL),
        }
    }

    fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            cookie: format!("{}/", base),
            crumb: format!("{}/v1/test/getcrumb", base),
            quote: format!("{}/v7/finance/quote", base),
            chart: format!("{}/v8/finance/chart", base),
            screener: format!("{}/v1/finance/screener", base),
        }
    }
}

#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
    endpoints: Arc<Endpoints>,
    /// Session crumb required by the quote and screener endpoints.
    crumb: Arc<Mutex<Option<String>>>,
}

impl YahooClient {
    pub fn new(requests_per_minute: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            rate_limiter: RateLimiter::per_minute(requests_per_minute),
            retry: RetryPolicy::default(),
            endpoints: Arc::new(Endpoints::yahoo()),
            crumb: Arc::new(Mutex::new(None)),
        }
    }

    /// Serve every endpoint from `base` instead of the Yahoo hosts.
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.endpoints = Arc::new(Endpoints::rooted_at(base));
        self
    }

    /// Cached crumb, fetched on first use. Holding the lock while fetching
    /// keeps concurrent callers from racing for separate crumbs.
    async fn crumb(&self) -> Result<String, DashboardError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // the cookie host answers 404 but still sets the cookie
        self.rate_limiter.acquire().await;
        if let Err(e) = self.client.get(&self.endpoints.cookie).send().await {
            tracing::debug!("Yahoo cookie request failed: {}", e);
        }

        self.rate_limiter.acquire().await;
        let response = self
            .client
            .get(&self.endpoints.crumb)
            .send()
            .await
            .map_err(|e| DashboardError::Api(format!("getcrumb: {}", e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DashboardError::Api(format!("getcrumb: {}", e)))?;
        let crumb = body.trim();
        if !status.is_success() || crumb.is_empty() || crumb.contains('<') {
            return Err(DashboardError::Unauthorized(format!("getcrumb: HTTP {}", status.as_u16())));
        }

        tracing::debug!("Obtained Yahoo crumb");
        *cached = Some(crumb.to_string());
        Ok(crumb.to_string())
    }

    /// Drop `rejected` unless another caller already replaced it.
    async fn invalidate_crumb(&self, rejected: &str) {
        let mut cached = self.crumb.lock().await;
        if cached.as_deref() == Some(rejected) {
            *cached = None;
        }
    }

    /// Send a crumb-protected request. A 401 means the crumb expired: fetch
    /// a fresh one and try once more.
    async fn send_with_crumb<F>(&self, build: F) -> Result<Value, DashboardError>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let crumb = self.crumb().await?;
        match self.send_json(build(&crumb)).await {
            Err(DashboardError::Unauthorized(reason)) => {
                tracing::info!("Yahoo rejected crumb ({}), refreshing", reason);
                self.invalidate_crumb(&crumb).await;
                let crumb = self.crumb().await?;
                self.send_json(build(&crumb)).await
            }
            other => other,
        }
    }

    /// Send a request with rate limiting, retrying 429/5xx and transport
    /// errors with exponential backoff. 401 is returned as `Unauthorized`.
    async fn send_json(&self, builder: reqwest::RequestBuilder) -> Result<Value, DashboardError> {
        let request = builder.build().map_err(|e| DashboardError::Api(e.to_string()))?;
        let url = request.url().path().to_string();
        let mut last_error = DashboardError::Api(format!("{}: no attempt made", url));

        for attempt in 0..self.retry.max_attempts {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| DashboardError::Api("Cannot clone request".to_string()))?;

            match self.client.execute(req_clone).await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .map_err(|e| DashboardError::Parse(e.to_string()));
                    }
                    if status == 401 {
                        return Err(DashboardError::Unauthorized(format!("{}: HTTP 401", url)));
                    }
                    if !RetryPolicy::should_retry(status) {
                        return Err(DashboardError::Api(format!("{}: HTTP {}", url, status)));
                    }
                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    last_error = if status == 429 {
                        DashboardError::RateLimited(format!("{}: HTTP 429", url))
                    } else {
                        DashboardError::Api(format!("{}: HTTP {}", url, status))
                    };
                    if attempt + 1 < self.retry.max_attempts {
                        let wait = self.retry.delay_for(attempt, retry_after);
                        tracing::warn!(
                            "Yahoo {} returned {}, waiting {:.1}s before retry {}/{}",
                            url,
                            status,
                            wait.as_secs_f64(),
                            attempt + 1,
                            self.retry.max_attempts - 1
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
                Err(e) => {
                    last_error = DashboardError::Api(format!("{}: {}", url, e));
                    if attempt + 1 < self.retry.max_attempts {
                        let wait = self.retry.delay_for(attempt, None);
                        tracing::debug!("Yahoo {} transport error ({}), retrying in {:.1}s", url, e, wait.as_secs_f64());
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    /// Quotes for `symbols` in a single request. Splitting long lists is up
    /// to the caller.
    pub async fn get_quotes(&self, symbols: &[String]) -> Result<Vec<QuoteSnapshot>, DashboardError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let joined = symbols.join(",");
        let json = self
            .send_with_crumb(|crumb| {
                self.client
                    .get(&self.endpoints.quote)
                    .query(&[("symbols", joined.as_str()), ("crumb", crumb)])
            })
            .await?;
        parse::parse_quotes(&json, today_kst())
    }

    /// Daily bars for the last `days` calendar days.
    pub async fn get_daily_history(&self, symbol: &str, days: u32) -> Result<Vec<Bar>, DashboardError> {
        let now = Utc::now();
        let period1 = (now - ChronoDuration::days(i64::from(days))).timestamp();
        let period2 = now.timestamp();
        let url = format!("{}/{}", self.endpoints.chart, symbol);

        let json = self
            .send_json(self.client.get(&url).query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("includePrePost", "false".to_string()),
            ]))
            .await?;

        parse::parse_chart(&json)
    }

    /// Largest equities by intraday market cap for a region.
    pub async fn get_largest_companies(&self, market: Market, count: usize) -> Result<Vec<String>, DashboardError> {
        let region = match market {
            Market::US => "us",
            Market::KR => "kr",
        };
        let body = screener_query(region, count.min(SCREENER_MAX));

        let json = self
            .send_with_crumb(|crumb| {
                self.client
                    .post(&self.endpoints.screener)
                    .query(&[("formatted", "false"), ("lang", "en-US"), ("region", "US"), ("crumb", crumb)])
                    .json(&body)
            })
            .await?;

        let mut symbols = parse::parse_screener(&json)?;
        if market == Market::KR {
            // the KR region also lists foreign listings; keep KOSPI/KOSDAQ only
            symbols.retain(|s| Market::of_symbol(s) == Market::KR);
        }
        symbols.truncate(count);
        Ok(symbols)
    }
}

fn screener_query(region: &str, size: usize) -> Value {
    json!({
        "size": size,
        "offset": 0,
        "sortField": "intradaymarketcap",
        "sortType": "DESC",
        "quoteType": "EQUITY",
        "query": {
            "operator": "AND",
            "operands": [
                { "operator": "eq", "operands": ["region", region] }
            ]
        },
        "userId": "",
        "userIdType": "guid"
    })
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new(120, Duration::from_secs(20))
    }
}

#[async_trait]
impl QuoteProvider for YahooClient {
    async fn quotes(&self, symbols: &[String]) -> Result<Vec<QuoteSnapshot>, DashboardError> {
        self.get_quotes(symbols).await
    }

    async fn daily_history(&self, symbol: &str, days: u32) -> Result<Vec<Bar>, DashboardError> {
        self.get_daily_history(symbol, days).await
    }
}

#[async_trait]
impl TopListScreener for YahooClient {
    async fn largest_companies(&self, market: Market, count: usize) -> Result<Vec<String>, DashboardError> {
        self.get_largest_companies(market, count).await
    }
}

#[async_trait]
impl VolatilityIndexSource for YahooClient {
    async fn vix(&self) -> Result<f64, DashboardError> {
        let quotes = self.get_quotes(&[VIX_SYMBOL.to_string()]).await?;
        quotes
            .into_iter()
            .find(|q| q.symbol == VIX_SYMBOL)
            .and_then(|q| q.price)
            .ok_or_else(|| DashboardError::NoData("VIX quote missing".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> YahooClient {
        let mut client = YahooClient::new(600, Duration::from_secs(5)).with_base_url(&server.uri());
        client.retry = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::ZERO,
            max_delay: Duration::from_secs(5),
        };
        client
    }

    fn chart_body() -> Value {
        json!({
            "chart": {
                "result": [{
                    "timestamp": [1704240000, 1704326400],
                    "indicators": { "quote": [{
                        "open": [10.0, 11.0], "high": [11.0, 12.0], "low": [9.0, 10.0],
                        "close": [10.5, 11.5], "volume": [1000, 1200]
                    }]}
                }],
                "error": null
            }
        })
    }

    fn quote_body(symbol: &str, price: f64) -> Value {
        json!({ "quoteResponse": { "result": [{ "symbol": symbol, "regularMarketPrice": price }] } })
    }

    async fn mount_crumb(server: &MockServer, crumb: &str, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(200).set_body_string(crumb));
        match times {
            Some(n) => mock.up_to_n_times(n).mount(server).await,
            None => mock.mount(server).await,
        }
    }

    #[test]
    fn test_screener_query_shape() {
        let q = screener_query("kr", 100);
        assert_eq!(q["size"], 100);
        assert_eq!(q["sortField"], "intradaymarketcap");
        assert_eq!(q["query"]["operands"][0]["operands"][1], "kr");
    }

    #[test]
    fn test_endpoints_rooted_at_base() {
        let e = Endpoints::rooted_at("http://127.0.0.1:9000/");
        assert_eq!(e.quote, "http://127.0.0.1:9000/v7/finance/quote");
        assert_eq!(e.chart, "http://127.0.0.1:9000/v8/finance/chart");
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body()))
            .expect(1)
            .mount(&server)
            .await;

        let bars = test_client(&server).get_daily_history("AAPL", 30).await.unwrap();
        assert_eq!(bars.len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/NOPE"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server).get_daily_history("NOPE", 30).await.unwrap_err();
        assert!(matches!(err, DashboardError::Api(ref m) if m.contains("404")));
    }

    #[tokio::test]
    async fn test_rate_limited_after_last_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(429))
            .expect(4)
            .mount(&server)
            .await;

        let err = test_client(&server).get_daily_history("AAPL", 30).await.unwrap_err();
        assert!(matches!(err, DashboardError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_retry_after_header_is_honoured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body()))
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        test_client(&server).get_daily_history("AAPL", 30).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_quotes_carry_cached_crumb() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(200).set_body_string("abc123"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("crumb", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(quote_body("AAPL", 190.0)))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let symbols = vec!["AAPL".to_string()];
        for _ in 0..2 {
            let quotes = client.get_quotes(&symbols).await.unwrap();
            assert_eq!(quotes[0].price, Some(190.0));
        }
    }

    #[tokio::test]
    async fn test_expired_crumb_is_refreshed_once() {
        let server = MockServer::start().await;
        mount_crumb(&server, "old", Some(1)).await;
        mount_crumb(&server, "new", None).await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("crumb", "old"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("crumb", "new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(quote_body("MSFT", 410.0)))
            .expect(1)
            .mount(&server)
            .await;

        let quotes = test_client(&server).get_quotes(&["MSFT".to_string()]).await.unwrap();
        assert_eq!(quotes[0].symbol, "MSFT");
    }

    #[tokio::test]
    async fn test_missing_crumb_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(403).set_body_string("<html>denied</html>"))
            .mount(&server)
            .await;

        let err = test_client(&server).get_quotes(&["AAPL".to_string()]).await.unwrap_err();
        assert!(matches!(err, DashboardError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_long_symbol_list_is_one_request() {
        let server = MockServer::start().await;
        mount_crumb(&server, "abc123", None).await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_json(quote_body("S0", 1.0)))
            .expect(1)
            .mount(&server)
            .await;

        let symbols: Vec<String> = (0..60).map(|i| format!("S{}", i)).collect();
        let quotes = test_client(&server).get_quotes(&symbols).await.unwrap();
        assert_eq!(quotes.len(), 1);
    }

    #[tokio::test]
    async fn test_screener_sends_crumb() {
        let server = MockServer::start().await;
        mount_crumb(&server, "abc123", None).await;
        Mock::given(method("POST"))
            .and(path("/v1/finance/screener"))
            .and(query_param("crumb", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "finance": { "result": [{ "quotes": [
                    { "symbol": "005930.KS" }, { "symbol": "TSM" }, { "symbol": "000660.KS" }
                ]}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let symbols = test_client(&server)
            .get_largest_companies(Market::KR, 10)
            .await
            .unwrap();
        assert_eq!(symbols, vec!["005930.KS", "000660.KS"]);
    }
}
