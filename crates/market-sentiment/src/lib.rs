//! Market context: VIX and CNN Fear & Greed scalars.
//!
//! Both sources are best-effort. A failing source leaves its field empty in
//! the snapshot; the snapshot itself is always produced.

use async_trait::async_trait;
use chrono::Utc;
use dashboard_core::{
    DashboardError, FearGreedReading, FearGreedSource, SentimentSnapshot, VolatilityIndexSource,
};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const CNN_FEAR_GREED_URL: &str = "https://production.dataviz.cnn.io/index/fearandgreed/graphdata";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Finviz S&P 500 sector heat map.
pub const FINVIZ_SEC_MAP_URL: &str = "https://finviz.com/map.ashx?t=sec";

#[derive(Debug, Deserialize)]
struct GraphData {
    fear_and_greed: Option<FearGreedBlock>,
}

#[derive(Debug, Deserialize)]
struct FearGreedBlock {
    score: Option<f64>,
    rating: Option<String>,
}

/// CNN's published bands, used when the payload omits a rating.
pub fn rating_for_score(score: i64) -> &'static str {
    match score {
        s if s < 25 => "extreme fear",
        s if s < 45 => "fear",
        s if s <= 55 => "neutral",
        s if s <= 75 => "greed",
        _ => "extreme greed",
    }
}

/// Parse the CNN graph-data payload.
pub fn parse_fear_greed(body: &str) -> Result<FearGreedReading, DashboardError> {
    let data: GraphData = serde_json::from_str(body)?;
    let block = data
        .fear_and_greed
        .ok_or_else(|| DashboardError::NoData("fear_and_greed block missing".to_string()))?;
    let score = block
        .score
        .filter(|s| s.is_finite())
        .ok_or_else(|| DashboardError::NoData("fear_and_greed.score missing".to_string()))?
        .round() as i64;
    let rating = block
        .rating
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| rating_for_score(score).to_string());

    Ok(FearGreedReading { score, rating })
}

#[derive(Clone)]
pub struct CnnFearGreedClient {
    client: Client,
}

impl CnnFearGreedClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for CnnFearGreedClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl FearGreedSource for CnnFearGreedClient {
    async fn fear_greed(&self) -> Result<FearGreedReading, DashboardError> {
        let response = self
            .client
            .get(CNN_FEAR_GREED_URL)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| DashboardError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DashboardError::Api(format!("CNN HTTP {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DashboardError::Api(e.to_string()))?;
        parse_fear_greed(&body)
    }
}

/// Fetch VIX and Fear & Greed concurrently. Never fails.
pub async fn fetch_snapshot(
    vix_source: &dyn VolatilityIndexSource,
    fear_greed_source: &dyn FearGreedSource,
) -> SentimentSnapshot {
    let (vix, fg) = tokio::join!(vix_source.vix(), fear_greed_source.fear_greed());

    let vix = match vix {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("VIX unavailable: {}", e);
            None
        }
    };

    let (fear_greed_score, fear_greed_rating) = match fg {
        Ok(reading) => (Some(reading.score), Some(reading.rating)),
        Err(e) => {
            tracing::warn!("Fear & Greed unavailable: {}", e);
            (None, None)
        }
    };

    SentimentSnapshot {
        vix,
        fear_greed_score,
        fear_greed_rating,
        fetched_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct FixedVix(Result<f64, DashboardError>);

    #[async_trait]
    impl VolatilityIndexSource for FixedVix {
        async fn vix(&self) -> Result<f64, DashboardError> {
            self.0.clone()
        }
    }

    struct FixedFearGreed(Result<FearGreedReading, DashboardError>);

    #[async_trait]
    impl FearGreedSource for FixedFearGreed {
        async fn fear_greed(&self) -> Result<FearGreedReading, DashboardError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_parse_fear_greed() {
        let body = r#"{"fear_and_greed":{"score":62.457,"rating":"greed","timestamp":"2024-05-01T00:00:00+00:00"}}"#;
        let reading = parse_fear_greed(body).unwrap();
        assert_eq!(reading.score, 62);
        assert_eq!(reading.rating, "greed");
    }

    #[test]
    fn test_parse_fear_greed_missing_rating_uses_bands() {
        let reading = parse_fear_greed(r#"{"fear_and_greed":{"score":12.0}}"#).unwrap();
        assert_eq!(reading.rating, "extreme fear");
    }

    #[test]
    fn test_parse_fear_greed_malformed() {
        assert!(parse_fear_greed("<html>blocked</html>").is_err());
        assert!(parse_fear_greed(r#"{"other":{}}"#).is_err());
        assert!(parse_fear_greed(r#"{"fear_and_greed":{"rating":"fear"}}"#).is_err());
    }

    #[test]
    fn test_rating_bands() {
        assert_eq!(rating_for_score(0), "extreme fear");
        assert_eq!(rating_for_score(44), "fear");
        assert_eq!(rating_for_score(50), "neutral");
        assert_eq!(rating_for_score(70), "greed");
        assert_eq!(rating_for_score(90), "extreme greed");
    }

    #[tokio::test]
    async fn test_snapshot_degrades_per_source() {
        let vix = FixedVix(Ok(14.25));
        let fg = FixedFearGreed(Err(DashboardError::Api("timeout".to_string())));

        let snap = fetch_snapshot(&vix, &fg).await;
        assert_relative_eq!(snap.vix.unwrap(), 14.25);
        assert!(snap.fear_greed_score.is_none());
        assert!(snap.fear_greed_rating.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_all_sources_down() {
        let vix = FixedVix(Err(DashboardError::RateLimited("429".to_string())));
        let fg = FixedFearGreed(Err(DashboardError::NoData("empty".to_string())));

        let snap = fetch_snapshot(&vix, &fg).await;
        assert!(snap.vix.is_none());
        assert!(snap.fear_greed_score.is_none());
    }
}
