//! Yahoo Finance JSON payloads -> domain types.
//!
//! Yahoo returns loosely-typed JSON where any field may be missing or null,
//! so everything is read through `serde_json::Value` and absent fields become
//! `None` rather than errors. Only a missing top-level envelope is an error.

use chrono::{DateTime, NaiveDate};
use dashboard_core::{Bar, DashboardError, QuoteSnapshot};
use serde_json::Value;

fn f64_field(data: &Value, key: &str) -> Option<f64> {
    data.get(key).and_then(|v| v.as_f64()).filter(|v| v.is_finite())
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Earliest announced earnings date that is not in the past.
fn next_earnings_date(data: &Value, today: NaiveDate) -> Option<NaiveDate> {
    ["earningsTimestampStart", "earningsTimestamp", "earningsTimestampEnd"]
        .iter()
        .filter_map(|key| data.get(*key).and_then(|v| v.as_i64()))
        .filter_map(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive())
        .filter(|d| *d >= today)
        .min()
}

/// Parse a `/v7/finance/quote` response.
pub fn parse_quotes(json: &Value, today: NaiveDate) -> Result<Vec<QuoteSnapshot>, DashboardError> {
    let results = json
        .get("quoteResponse")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| DashboardError::Parse("quoteResponse.result missing".to_string()))?;

    Ok(results
        .iter()
        .filter_map(|data| {
            let symbol = str_field(data, "symbol")?;
            Some(QuoteSnapshot {
                symbol: symbol.to_ascii_uppercase(),
                short_name: str_field(data, "shortName"),
                long_name: str_field(data, "longName"),
                price: f64_field(data, "regularMarketPrice"),
                change_percent: f64_field(data, "regularMarketChangePercent"),
                market_cap: f64_field(data, "marketCap").filter(|c| *c > 0.0),
                trailing_pe: f64_field(data, "trailingPE"),
                fifty_day_average: f64_field(data, "fiftyDayAverage"),
                two_hundred_day_average: f64_field(data, "twoHundredDayAverage"),
                next_earnings: next_earnings_date(data, today),
            })
        })
        .collect())
}

fn series<'a>(quotes: &'a Value, key: &str) -> Result<&'a Vec<Value>, DashboardError> {
    quotes
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| DashboardError::Parse(format!("No {} series", key)))
}

/// Parse a `/v8/finance/chart` response into daily bars, oldest first.
/// Bars with any null OHLC value are skipped (Yahoo emits those for halts).
pub fn parse_chart(json: &Value) -> Result<Vec<Bar>, DashboardError> {
    if let Some(err) = json
        .get("chart")
        .and_then(|v| v.get("error"))
        .filter(|e| !e.is_null())
    {
        let description = err
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("unknown chart error");
        return Err(DashboardError::NoData(description.to_string()));
    }

    let chart = json
        .get("chart")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| DashboardError::NoData("No chart data found".to_string()))?;

    let timestamps = match chart.get("timestamp").and_then(|v| v.as_array()) {
        Some(ts) => ts,
        None => return Ok(Vec::new()),
    };

    let quotes = chart
        .get("indicators")
        .and_then(|v| v.get("quote"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| DashboardError::Parse("No quote indicators".to_string()))?;

    let opens = series(quotes, "open")?;
    let highs = series(quotes, "high")?;
    let lows = series(quotes, "low")?;
    let closes = series(quotes, "close")?;
    let volumes = series(quotes, "volume")?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let value = |s: &Vec<Value>| s.get(i).and_then(|v| v.as_f64());
        if let (Some(ts), Some(o), Some(h), Some(l), Some(c)) = (
            ts.as_i64(),
            value(opens),
            value(highs),
            value(lows),
            value(closes),
        ) {
            let Some(timestamp) = DateTime::from_timestamp(ts, 0) else {
                continue;
            };
            bars.push(Bar {
                timestamp,
                open: o,
                high: h,
                low: l,
                close: c,
                volume: value(volumes).unwrap_or(0.0),
            });
        }
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

/// Parse a `/v1/finance/screener` response into symbols, in returned order.
pub fn parse_screener(json: &Value) -> Result<Vec<String>, DashboardError> {
    let quotes = json
        .get("finance")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|r| r.get("quotes"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| DashboardError::Parse("finance.result[0].quotes missing".to_string()))?;

    Ok(quotes
        .iter()
        .filter_map(|q| str_field(q, "symbol"))
        .map(|s| s.to_ascii_uppercase())
        .collect())
}
