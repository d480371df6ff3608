//! The human-editable `TICKER:QTY, TICKER:QTY` form of holdings.
//!
//! Parsing is tolerant: a token that is not exactly `symbol:number` with a
//! finite, non-negative number is skipped. A repeated symbol keeps its last
//! quantity.

use dashboard_core::{normalize_symbol, Holdings};

fn parse_token(token: &str) -> Option<(String, f64)> {
    let mut parts = token.split(':');
    let symbol = normalize_symbol(parts.next()?)?;
    let qty: f64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() || !qty.is_finite() || qty < 0.0 {
        return None;
    }
    Some((symbol, qty))
}

pub fn parse(text: &str) -> Holdings {
    text.split(',').filter_map(parse_token).collect()
}

/// Inverse of [`parse`] for display in the edit box.
pub fn format(holdings: &Holdings) -> String {
    holdings
        .iter()
        .map(|(symbol, qty)| format!("{}:{}", symbol, qty))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_drops_token_without_colon() {
        let h = parse("AAPL:10, BAD, MSFT:5.5");
        assert_eq!(h.len(), 2);
        assert_relative_eq!(h["AAPL"], 10.0);
        assert_relative_eq!(h["MSFT"], 5.5);
    }

    #[test]
    fn test_drops_bad_numbers() {
        let h = parse("AAPL:ten, MSFT:, NVDA:1e3, TSLA:-2, AMD:NaN, META:inf");
        assert_eq!(h.len(), 1);
        assert_relative_eq!(h["NVDA"], 1000.0);
    }

    #[test]
    fn test_drops_empty_symbol_and_extra_colons() {
        let h = parse(":5, A:B:3, 005930.ks : 12 ");
        assert_eq!(h.len(), 1);
        assert_relative_eq!(h["005930.KS"], 12.0);
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(parse("").is_empty());
        assert!(parse(" ,  , ").is_empty());
    }

    #[test]
    fn test_last_duplicate_wins() {
        let h = parse("AAPL:1, aapl:3");
        assert_eq!(h.len(), 1);
        assert_relative_eq!(h["AAPL"], 3.0);
    }

    #[test]
    fn test_format_then_parse() {
        let h = parse("MSFT:5.5, AAPL:10");
        assert_eq!(format(&h), "AAPL:10, MSFT:5.5");
        assert_eq!(parse(&format(&h)), h);
    }
}
