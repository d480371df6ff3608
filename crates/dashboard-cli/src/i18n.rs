//! Korean / English labels for the rendered views.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Lang {
    Ko,
    En,
}

impl FromStr for Lang {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ko" | "kr" => Ok(Lang::Ko),
            "en" => Ok(Lang::En),
            other => anyhow::bail!("unknown language: {}", other),
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lang::Ko => "ko",
            Lang::En => "en",
        })
    }
}

/// Label for `key`. Unknown keys render as the key itself.
pub fn t(key: &str, lang: Lang) -> &str {
    let pair = match key {
        "app_title" => ("미국·한국 주식 대시보드", "US & KR Stock Dashboard"),
        "subtitle" => (
            "추세 · 밸류에이션 · 실적 일정 · 뉴스를 한 화면에서",
            "Trend, valuation, earnings dates and news in one view",
        ),
        "update_time" => ("업데이트 시각", "Updated"),
        "market" => ("시장 지표", "Market"),
        "vix" => ("VIX (변동성 지수)", "VIX (CBOE Volatility Index)"),
        "fear_greed" => ("CNN 공포·탐욕 지수", "CNN Fear & Greed"),
        "fear_greed_unavailable" => (
            "CNN 공포·탐욕 지수를 불러오지 못했습니다. (잠시 후 다시 시도)",
            "Could not load CNN Fear & Greed. Try again shortly.",
        ),
        "sector_map" => ("Finviz 섹터 맵", "Finviz Sector Map"),
        "scan_result" => ("스캔 결과", "Scan result"),
        "no_data" => ("데이터가 없습니다.", "No data."),
        "failed_rows" => ("가져오지 못한 종목", "Tickers that failed"),
        "exported" => ("CSV 저장 완료", "CSV saved"),
        "earnings" => ("실적 발표 일정", "Earnings calendar"),
        "earnings_none" => ("기간 내 실적 발표가 없습니다.", "No earnings in the window."),
        "news_us" => ("미국 경제 뉴스", "US market news"),
        "news_kr" => ("한국 경제 뉴스", "KR market news"),
        "news_live" => ("실시간", "Live"),
        "news_yesterday" => ("전일", "Yesterday"),
        "news_week" => ("최근 1주", "Past week"),
        "portfolio" => ("포트폴리오 제안", "Portfolio plan"),
        "capital" => ("투자 가능 금액", "Capital"),
        "risk_per_trade" => ("거래당 위험(%)", "Risk per trade (%)"),
        "rebalance" => ("리밸런싱", "Rebalance"),
        "holdings" => ("보유 종목", "Holdings"),
        "holdings_saved" => ("보유 종목을 저장했습니다.", "Holdings saved."),
        "tickers" => ("종목 리스트", "Ticker lists"),
        "tickers_saved" => ("종목 리스트를 저장했습니다.", "Ticker lists saved."),
        "refresh_done" => ("시가총액 상위 리스트 갱신", "Top lists refreshed"),
        "refresh_kept" => ("기존 리스트 유지", "Kept previous list"),
        "watch_started" => ("자동 갱신 시작 (Ctrl+C 로 종료)", "Auto-refresh started (Ctrl+C to stop)"),
        "beginner_tip" => (
            "초보자 팁: 추세(Trend_OK)가 참이고 저평가(cheap)인 종목부터 살펴보세요.",
            "Beginner tip: start with rows where the trend is OK and valuation is cheap.",
        ),
        "tip_entry" => (
            "진입가: 현재가와 20일 이동평균 중 낮은 값 (눌림목 진입)",
            "Entry: the lower of price and the 20-day average (buy the pull-back)",
        ),
        "tip_tp_sl" => (
            "손절가 = 진입가 − 2×ATR14, 목표가 = 진입가 + 3×ATR14",
            "Stop = entry − 2×ATR14, target = entry + 3×ATR14",
        ),
        "tip_trend" => (
            "추세 OK: 종가 > 50일선 그리고 50일선 > 200일선",
            "Trend OK: close above SMA50 and SMA50 above SMA200",
        ),
        "tip_valuation" => (
            "밸류에이션: 200일선 대비 괴리율이 임계값보다 낮으면 cheap, 높으면 expensive",
            "Valuation: cheap below −threshold from SMA200, expensive above +threshold",
        ),
        "cheap" => ("저평가", "cheap"),
        "fair" => ("적정", "fair"),
        "expensive" => ("고평가", "expensive"),
        "buy" => ("매수", "buy"),
        "sell" => ("매도", "sell"),
        "hold" => ("유지", "hold"),
        "review" => ("확인 필요", "review"),
        _ => return key,
    };
    match lang {
        Lang::Ko => pair.0,
        Lang::En => pair.1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_fallback() {
        assert_eq!(t("news_live", Lang::Ko), "실시간");
        assert_eq!(t("news_live", Lang::En), "Live");
        assert_eq!(t("no_such_key", Lang::Ko), "no_such_key");
    }

    #[test]
    fn test_parse_lang() {
        assert_eq!("KO".parse::<Lang>().unwrap(), Lang::Ko);
        assert_eq!(" en ".parse::<Lang>().unwrap(), Lang::En);
        assert!("fr".parse::<Lang>().is_err());
    }
}
