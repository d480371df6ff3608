use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::i18n::Lang;

pub const MIN_REFRESH_SECS: u64 = 10;
pub const MAX_REFRESH_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    // Storage
    pub data_dir: PathBuf,
    pub tickers_path: PathBuf,
    pub holdings_path: PathBuf,

    // Fetching
    pub scan_concurrency: usize,   // 8
    pub yahoo_rate_limit: usize,   // requests per minute
    pub http_timeout_secs: u64,    // 20
    pub news_max_items: usize,     // 12

    // Session defaults
    pub lang: Lang,
    pub auto_refresh_secs: u64,    // 30
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("watchlist-dashboard"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        let data_dir = env::var("DASHBOARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let config = Self {
            tickers_path: env::var("DASHBOARD_TICKERS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("tickers.json")),
            holdings_path: env::var("DASHBOARD_HOLDINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("holdings.json")),
            data_dir,

            scan_concurrency: env::var("SCAN_CONCURRENCY")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .context("SCAN_CONCURRENCY must be a positive integer")?,
            yahoo_rate_limit: env::var("YAHOO_RATE_LIMIT")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .context("YAHOO_RATE_LIMIT must be a positive integer")?,
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("HTTP_TIMEOUT_SECS must be a positive integer")?,
            news_max_items: env::var("NEWS_MAX_ITEMS")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .context("NEWS_MAX_ITEMS must be a positive integer")?,

            lang: env::var("DASHBOARD_LANG")
                .unwrap_or_else(|_| "ko".to_string())
                .parse()
                .context("DASHBOARD_LANG must be ko or en")?,
            auto_refresh_secs: env::var("AUTO_REFRESH_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("AUTO_REFRESH_SECS must be an integer")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_concurrency == 0 {
            bail!("SCAN_CONCURRENCY must be at least 1");
        }
        if self.yahoo_rate_limit == 0 {
            bail!("YAHOO_RATE_LIMIT must be at least 1");
        }
        if self.http_timeout_secs == 0 {
            bail!("HTTP_TIMEOUT_SECS must be at least 1");
        }
        if self.news_max_items == 0 {
            bail!("NEWS_MAX_ITEMS must be at least 1");
        }
        if !(MIN_REFRESH_SECS..=MAX_REFRESH_SECS).contains(&self.auto_refresh_secs) {
            bail!(
                "AUTO_REFRESH_SECS must be between {} and {}",
                MIN_REFRESH_SECS,
                MAX_REFRESH_SECS
            );
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DashboardConfig {
        DashboardConfig {
            data_dir: PathBuf::from("/tmp/dash"),
            tickers_path: PathBuf::from("/tmp/dash/tickers.json"),
            holdings_path: PathBuf::from("/tmp/dash/holdings.json"),
            scan_concurrency: 8,
            yahoo_rate_limit: 120,
            http_timeout_secs: 20,
            news_max_items: 12,
            lang: Lang::Ko,
            auto_refresh_secs: 30,
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut c = valid();
        c.scan_concurrency = 0;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.auto_refresh_secs = 5;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.auto_refresh_secs = 121;
        assert!(c.validate().is_err());
    }
}
