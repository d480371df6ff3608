//! Plain-text views written to stdout.

use dashboard_core::{
    format_kst, now_kst, to_kst, EarningsEntry, Holdings, ItemFailure, Market, NewsBucket, ScanRow,
    SentimentSnapshot, TickerUniverse, ValuationFlag,
};
use market_sentiment::FINVIZ_SEC_MAP_URL;
use news_feed::MarketNews;
use portfolio_planner::{PortfolioPlan, RebalanceAction, RebalanceReport};
use std::fmt::Write;
use ticker_store::holdings_text;

use crate::i18n::{t, Lang};

pub fn num(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}", decimals, v),
        _ => "-".to_string(),
    }
}

/// Fraction as a percentage, `0.123` -> `12.3%`.
pub fn pct(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.1}%", v * 100.0),
        _ => "-".to_string(),
    }
}

pub fn market_cap(value: Option<f64>) -> String {
    match value {
        Some(v) if v >= 1e12 => format!("{:.2}T", v / 1e12),
        Some(v) if v >= 1e9 => format!("{:.1}B", v / 1e9),
        Some(v) if v >= 1e6 => format!("{:.1}M", v / 1e6),
        Some(v) if v.is_finite() => format!("{:.0}", v),
        _ => "-".to_string(),
    }
}

fn valuation_label(flag: ValuationFlag, lang: Lang) -> &'static str {
    t(flag.as_str(), lang)
}

fn action_label(action: RebalanceAction, lang: Lang) -> &'static str {
    t(action.as_str(), lang)
}

/// Left-aligned text table sized to its widest cells.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let cols = self.headers.len();
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().take(cols).enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let mut out = String::new();
        let line = |cells: &[String], out: &mut String| {
            let padded: Vec<String> = (0..cols)
                .map(|i| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    let pad = widths[i].saturating_sub(cell.chars().count());
                    format!("{}{}", cell, " ".repeat(pad))
                })
                .collect();
            out.push_str(padded.join("  ").trim_end());
            out.push('\n');
        };

        line(self.headers.as_slice(), &mut out);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        line(rule.as_slice(), &mut out);
        for row in &self.rows {
            line(row.as_slice(), &mut out);
        }
        out
    }
}

pub fn header(lang: Lang) -> String {
    format!(
        "{}\n{}\n{}: {}\n",
        t("app_title", lang),
        t("subtitle", lang),
        t("update_time", lang),
        format_kst(now_kst())
    )
}

pub fn market(snapshot: &SentimentSnapshot, lang: Lang) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## {}", t("market", lang));
    let _ = writeln!(out, "{}: {}", t("vix", lang), num(snapshot.vix, 2));
    match (snapshot.fear_greed_score, snapshot.fear_greed_rating.as_deref()) {
        (Some(score), rating) => {
            let _ = writeln!(out, "{}: {} ({})", t("fear_greed", lang), score, rating.unwrap_or("-"));
        }
        (None, _) => {
            let _ = writeln!(out, "{}: {}", t("fear_greed", lang), t("fear_greed_unavailable", lang));
        }
    }
    let _ = writeln!(out, "{}: {}", t("sector_map", lang), FINVIZ_SEC_MAP_URL);
    out
}

pub fn tips(lang: Lang) -> String {
    ["beginner_tip", "tip_entry", "tip_tp_sl", "tip_trend", "tip_valuation"]
        .iter()
        .map(|k| format!("* {}\n", t(k, lang)))
        .collect()
}

pub fn scan(rows: &[ScanRow], lang: Lang) -> String {
    if rows.is_empty() {
        return format!("{}\n", t("no_data", lang));
    }

    let mut table = Table::new([
        "Ticker", "Name", "Price", "Chg%", "SMA20", "SMA50", "SMA200", "RSI14", "Dev", "Trend_OK",
        "Valuation", "Entry", "Stop", "Target", "MktCap", "PER", "NextEarnings", "",
    ]);
    for row in rows {
        if row.status.is_failed() {
            table.push(vec![row.ticker.clone(), row.name.clone(), "-".to_string()]);
            continue;
        }
        table.push(vec![
            row.ticker.clone(),
            row.name.clone(),
            num(row.price, 2),
            num(row.change_pct, 2),
            num(row.sma20, 2),
            num(row.sma50, 2),
            num(row.sma200, 2),
            num(row.rsi14, 1),
            pct(row.deviation),
            if row.trend_ok { "Y" } else { "N" }.to_string(),
            valuation_label(row.valuation, lang).to_string(),
            num(row.entry, 2),
            num(row.stop_loss, 2),
            num(row.take_profit, 2),
            market_cap(row.market_cap),
            num(row.per, 1),
            row.next_earnings
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            if row.earnings_alert { "🔔" } else { "" }.to_string(),
        ]);
    }

    format!("## {}\n{}", t("scan_result", lang), table.render())
}

pub fn failures(failures: &[ItemFailure], lang: Lang) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let mut out = format!("{}:\n", t("failed_rows", lang));
    for f in failures {
        let _ = writeln!(out, "  {} ({})", f.key, f.reason);
    }
    out
}

pub fn earnings(market: Market, entries: &[EarningsEntry], lang: Lang) -> String {
    let mut out = format!("## {} [{}]\n", t("earnings", lang), market);
    if entries.is_empty() {
        let _ = writeln!(out, "{}", t("earnings_none", lang));
        return out;
    }
    let mut table = Table::new(["Date", "Ticker", "Name"]);
    for e in entries {
        table.push(vec![e.next_earnings.to_string(), e.ticker.clone(), e.name.clone()]);
    }
    out.push_str(&table.render());
    out
}

pub fn news(market: Market, news: &MarketNews, lang: Lang) -> String {
    let title = match market {
        Market::US => t("news_us", lang),
        Market::KR => t("news_kr", lang),
    };
    let mut out = format!("## {}\n", title);

    for bucket in NewsBucket::ALL {
        let label = match bucket {
            NewsBucket::Live => t("news_live", lang),
            NewsBucket::Yesterday => t("news_yesterday", lang),
            NewsBucket::Week => t("news_week", lang),
        };
        let _ = writeln!(out, "### {}", label);
        let items = news.bucket(bucket);
        if items.is_empty() {
            out.push_str("-\n");
            continue;
        }
        for item in items {
            let stamp = to_kst(item.timestamp).format("%Y-%m-%d %H:%M");
            let _ = writeln!(out, "- {} ({})\n  {}", item.title, stamp, item.link);
        }
    }
    out
}

pub fn plan(plan: &PortfolioPlan, lang: Lang) -> String {
    let mut out = format!(
        "## {}\n{}: {:.0}  {}: {:.1}%\n",
        t("portfolio", lang),
        t("capital", lang),
        plan.capital,
        t("risk_per_trade", lang),
        plan.risk_pct * 100.0
    );
    if plan.suggestions.is_empty() {
        let _ = writeln!(out, "{}", t("no_data", lang));
        return out;
    }

    let mut table = Table::new(["Ticker", "Name", "Entry", "Stop", "Shares", "Value", "Risk", "Weight", "Note"]);
    for s in &plan.suggestions {
        table.push(vec![
            s.ticker.clone(),
            s.name.clone(),
            num(Some(s.entry), 2),
            format!("{:.2}{}", s.stop_loss, if s.default_stop { "*" } else { "" }),
            s.shares.to_string(),
            num(Some(s.position_value), 0),
            num(Some(s.risk_amount), 0),
            pct(Some(s.fraction)),
            s.reasoning.clone(),
        ]);
    }
    out.push_str(&table.render());
    let _ = writeln!(
        out,
        "Σ {:.0} / {:.0} (risk {:.0}, cash {:.0})",
        plan.total_allocated,
        plan.capital,
        plan.total_risk,
        plan.cash_remaining()
    );
    out
}

pub fn rebalance(report: &RebalanceReport, lang: Lang) -> String {
    let mut out = format!("## {}\n", t("rebalance", lang));
    if report.lines.is_empty() {
        let _ = writeln!(out, "{}", t("no_data", lang));
        return out;
    }

    let mut table = Table::new(["Ticker", "Qty", "Value", "Target", "Weight", "TargetW", "Δ Shares", "Action", "Note"]);
    for line in &report.lines {
        table.push(vec![
            line.ticker.clone(),
            format!("{}", line.quantity),
            num(line.current_value, 0),
            num(line.target_value, 0),
            pct(line.current_weight),
            pct(line.target_weight),
            num(line.shares_delta, 1),
            action_label(line.action, lang).to_string(),
            line.note.clone().unwrap_or_default(),
        ]);
    }
    out.push_str(&table.render());
    let _ = writeln!(out, "Turnover: {}", pct(Some(report.estimated_turnover)));
    out
}

pub fn universe(universe: &TickerUniverse, lang: Lang) -> String {
    format!(
        "## {}\nUS ({}): {}\nKR ({}): {}\n",
        t("tickers", lang),
        universe.us.len(),
        universe.us.join(", "),
        universe.kr.len(),
        universe.kr.join(", ")
    )
}

pub fn holdings(holdings: &Holdings, lang: Lang) -> String {
    format!("## {}\n{}\n", t("holdings", lang), holdings_text::format(holdings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_core::RowStatus;

    #[test]
    fn test_number_formats() {
        assert_eq!(num(Some(1.23456), 2), "1.23");
        assert_eq!(num(None, 2), "-");
        assert_eq!(num(Some(f64::NAN), 2), "-");
        assert_eq!(pct(Some(-0.1234)), "-12.3%");
        assert_eq!(market_cap(Some(3.1e12)), "3.10T");
        assert_eq!(market_cap(Some(4.5e9)), "4.5B");
        assert_eq!(market_cap(None), "-");
    }

    #[test]
    fn test_table_aligns_columns() {
        let mut table = Table::new(["A", "Long header"]);
        table.push(vec!["wide cell".to_string(), "x".to_string()]);
        let text = table.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A          Long header");
        assert_eq!(lines[1], "---------  -----------");
        assert_eq!(lines[2], "wide cell  x");
    }

    #[test]
    fn test_scan_view_marks_failed_rows() {
        let mut ok = ScanRow::empty("AAPL", RowStatus::Ok);
        ok.price = Some(190.5);
        ok.earnings_alert = true;
        let rows = vec![ok, ScanRow::failed("ZZZZ", "timeout")];

        let text = scan(&rows, Lang::En);
        assert!(text.contains("190.50"));
        assert!(text.contains("🔔"));
        assert!(text.lines().any(|l| l.starts_with("ZZZZ")));
        assert_eq!(scan(&[], Lang::Ko).trim(), "데이터가 없습니다.");
    }

    #[test]
    fn test_empty_news_buckets_render_dash() {
        let text = news(Market::KR, &MarketNews::default(), Lang::Ko);
        assert!(text.starts_with("## 한국 경제 뉴스"));
        assert_eq!(text.lines().filter(|l| *l == "-").count(), 3);
    }
}
