use smart_watchlist::{clamp_rank, clamp_threshold, ScanOptions, DEFAULT_RANK, DEFAULT_THRESHOLD};
use std::time::Duration;

use crate::config::{DashboardConfig, MAX_REFRESH_SECS, MIN_REFRESH_SECS};
use crate::i18n::Lang;

/// Per-run view settings, built once from config and flags and passed down.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub lang: Lang,
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    pub rank: usize,
    /// Fraction, e.g. 0.10
    pub threshold: f64,
    pub trend_only: bool,
}

/// Flags that override config values for this run
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    pub lang: Option<Lang>,
    pub rank: Option<usize>,
    /// Percent, e.g. 10 for 10%
    pub threshold_pct: Option<f64>,
    pub trend_only: bool,
    pub refresh_secs: Option<u64>,
    pub no_auto_refresh: bool,
}

impl SessionContext {
    pub fn new(config: &DashboardConfig, overrides: &SessionOverrides) -> Self {
        let refresh_secs = overrides
            .refresh_secs
            .unwrap_or(config.auto_refresh_secs)
            .clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS);

        Self {
            lang: overrides.lang.unwrap_or(config.lang),
            auto_refresh: !overrides.no_auto_refresh,
            refresh_interval: Duration::from_secs(refresh_secs),
            rank: clamp_rank(overrides.rank.unwrap_or(DEFAULT_RANK)),
            threshold: overrides
                .threshold_pct
                .map(|pct| clamp_threshold(pct / 100.0))
                .unwrap_or(DEFAULT_THRESHOLD),
            trend_only: overrides.trend_only,
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            threshold: self.threshold,
            trend_only: self.trend_only,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> DashboardConfig {
        DashboardConfig {
            data_dir: PathBuf::from("data"),
            tickers_path: PathBuf::from("data/tickers.json"),
            holdings_path: PathBuf::from("data/holdings.json"),
            scan_concurrency: 8,
            yahoo_rate_limit: 120,
            http_timeout_secs: 20,
            news_max_items: 12,
            lang: Lang::Ko,
            auto_refresh_secs: 30,
        }
    }

    #[test]
    fn test_defaults_from_config() {
        let session = SessionContext::new(&config(), &SessionOverrides::default());
        assert_eq!(session.lang, Lang::Ko);
        assert_eq!(session.rank, DEFAULT_RANK);
        assert!((session.threshold - DEFAULT_THRESHOLD).abs() < 1e-12);
        assert_eq!(session.refresh_interval, Duration::from_secs(30));
        assert!(session.auto_refresh);
    }

    #[test]
    fn test_overrides_are_clamped() {
        let overrides = SessionOverrides {
            lang: Some(Lang::En),
            rank: Some(500),
            threshold_pct: Some(2.0),
            trend_only: true,
            refresh_secs: Some(1),
            no_auto_refresh: true,
        };
        let session = SessionContext::new(&config(), &overrides);
        assert_eq!(session.lang, Lang::En);
        assert_eq!(session.rank, 100);
        assert!((session.threshold - 0.05).abs() < 1e-12);
        assert_eq!(session.refresh_interval, Duration::from_secs(10));
        assert!(!session.auto_refresh);
        assert!(session.scan_options().trend_only);
    }
}
