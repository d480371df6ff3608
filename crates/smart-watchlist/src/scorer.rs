//! Per-ticker signals: trend, valuation and trade levels.
//!
//! Everything here is pure. The scanner feeds it a quote plus (optionally)
//! daily bars and gets back a finished [`ScanRow`].

use chrono::NaiveDate;
use dashboard_core::{Bar, Market, QuoteSnapshot, RowStatus, ScanRow, ValuationFlag};
use serde::{Deserialize, Serialize};

use crate::indicators::{atr, last_sma, rsi};

pub const DEFAULT_THRESHOLD: f64 = 0.10;
pub const MIN_THRESHOLD: f64 = 0.05;
pub const MAX_THRESHOLD: f64 = 0.30;

/// Closes needed before the 50/200 trend test means anything.
pub const TREND_MIN_CLOSES: usize = 200;
pub const EARNINGS_ALERT_DAYS: i64 = 7;

const ATR_STOP_MULTIPLE: f64 = 2.0;
const ATR_TARGET_MULTIPLE: f64 = 3.0;

pub fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_nan() {
        return DEFAULT_THRESHOLD;
    }
    threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Fractional deviation of `price` from `average`.
pub fn deviation(price: Option<f64>, average: Option<f64>) -> Option<f64> {
    match (price, average) {
        (Some(p), Some(avg)) if avg > 0.0 && p.is_finite() => Some((p - avg) / avg),
        _ => None,
    }
}

pub fn classify_deviation(deviation: Option<f64>, threshold: f64) -> ValuationFlag {
    match deviation {
        Some(d) if d < -threshold => ValuationFlag::Cheap,
        Some(d) if d > threshold => ValuationFlag::Expensive,
        _ => ValuationFlag::Fair,
    }
}

pub fn valuation_flag(row: &ScanRow, threshold: f64) -> ValuationFlag {
    classify_deviation(row.deviation, threshold)
}

/// Latest close above SMA50 and SMA50 above SMA200.
pub fn trend_ok(closes: &[f64]) -> bool {
    if closes.len() < TREND_MIN_CLOSES {
        return false;
    }
    let (Some(sma50), Some(sma200), Some(&last)) =
        (last_sma(closes, 50), last_sma(closes, 200), closes.last())
    else {
        return false;
    };
    last > sma50 && sma50 > sma200
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

/// Pull-back entry at the lower of price and SMA20, with ATR-based exits.
pub fn trade_levels(price: Option<f64>, sma20: Option<f64>, atr14: Option<f64>) -> Option<TradeLevels> {
    let price = price.filter(|p| p.is_finite() && *p > 0.0)?;
    let entry = match sma20 {
        Some(avg) if avg > 0.0 => price.min(avg),
        _ => price,
    };

    let atr14 = atr14.filter(|a| a.is_finite() && *a > 0.0);
    let stop_loss = atr14
        .map(|a| entry - ATR_STOP_MULTIPLE * a)
        .filter(|s| *s > 0.0);
    let take_profit = atr14.map(|a| entry + ATR_TARGET_MULTIPLE * a);

    Some(TradeLevels {
        entry,
        stop_loss,
        take_profit,
    })
}

pub fn earnings_alert(next_earnings: Option<NaiveDate>, today: NaiveDate) -> bool {
    match next_earnings {
        Some(date) => {
            let days = (date - today).num_days();
            (0..=EARNINGS_ALERT_DAYS).contains(&days)
        }
        None => false,
    }
}

/// Build a row for `symbol` from whatever arrived. `bars` is `None` when
/// history could not be fetched.
pub fn score_row(
    symbol: &str,
    quote: Option<&QuoteSnapshot>,
    bars: Option<&[Bar]>,
    threshold: f64,
    today: NaiveDate,
) -> ScanRow {
    let closes: Vec<f64> = bars
        .map(|b| b.iter().map(|bar| bar.close).collect())
        .unwrap_or_default();

    let price = quote
        .and_then(|q| q.price)
        .or_else(|| closes.last().copied());

    let sma20 = last_sma(&closes, 20);
    let sma50 = last_sma(&closes, 50).or_else(|| quote.and_then(|q| q.fifty_day_average));
    let history_sma200 = last_sma(&closes, 200);
    let sma200 = history_sma200.or_else(|| quote.and_then(|q| q.two_hundred_day_average));
    let rsi14 = rsi(&closes, 14).last().copied();
    let atr14 = bars.and_then(|b| atr(b, 14).last().copied());

    let dev = deviation(price, sma200);
    let levels = trade_levels(price, sma20, atr14);
    let next_earnings = quote.and_then(|q| q.next_earnings);

    ScanRow {
        ticker: symbol.to_string(),
        name: quote
            .map(|q| q.display_name())
            .unwrap_or_else(|| symbol.to_string()),
        market: Market::of_symbol(symbol),
        price,
        change_pct: quote.and_then(|q| q.change_percent),
        sma20,
        sma50,
        sma200,
        rsi14,
        deviation: dev,
        trend_ok: trend_ok(&closes),
        valuation: classify_deviation(dev, threshold),
        entry: levels.map(|l| l.entry),
        stop_loss: levels.and_then(|l| l.stop_loss),
        take_profit: levels.and_then(|l| l.take_profit),
        market_cap: quote.and_then(|q| q.market_cap),
        per: quote.and_then(|q| q.trailing_pe),
        next_earnings,
        earnings_alert: earnings_alert(next_earnings, today),
        status: RowStatus::Ok,
    }
}
