use dashboard_core::{Holdings, ScanRow, TickerUniverse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::sizing::PortfolioPlan;

/// Allowed gap between current and target weight before trading.
pub const DEFAULT_DRIFT_TOLERANCE: f64 = 0.05;

/// Differences smaller than this are not worth a trade.
const MIN_TRADE_VALUE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalanceAction {
    Buy,
    Sell,
    Hold,
    /// Holding that cannot be valued against the current universe
    Review,
}

impl RebalanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebalanceAction::Buy => "buy",
            RebalanceAction::Sell => "sell",
            RebalanceAction::Hold => "hold",
            RebalanceAction::Review => "review",
        }
    }
}

impl fmt::Display for RebalanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceLine {
    pub ticker: String,
    pub quantity: f64,
    pub price: Option<f64>,
    pub current_value: Option<f64>,
    pub target_value: Option<f64>,
    pub current_weight: Option<f64>,
    pub target_weight: Option<f64>,
    /// Shares to buy (positive) or sell (negative)
    pub shares_delta: Option<f64>,
    pub action: RebalanceAction,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub capital: f64,
    pub lines: Vec<RebalanceLine>,
    pub estimated_turnover: f64,
}

impl RebalanceReport {
    pub fn needs_review(&self) -> impl Iterator<Item = &RebalanceLine> {
        self.lines
            .iter()
            .filter(|l| l.action == RebalanceAction::Review)
    }
}

pub struct RebalanceCalculator {
    drift_tolerance: f64,
}

impl Default for RebalanceCalculator {
    fn default() -> Self {
        Self {
            drift_tolerance: DEFAULT_DRIFT_TOLERANCE,
        }
    }
}

impl RebalanceCalculator {
    pub fn with_drift_tolerance(drift_tolerance: f64) -> Self {
        Self {
            drift_tolerance: drift_tolerance.max(0.0),
        }
    }

    /// Compare holdings with an equal-weight split of the plan's capital
    /// across its candidates. Holdings outside the universe or without a
    /// price are listed as `Review`.
    pub fn calculate(
        &self,
        plan: &PortfolioPlan,
        rows: &[ScanRow],
        holdings: &Holdings,
        universe: &TickerUniverse,
    ) -> RebalanceReport {
        let capital = plan.capital;
        let prices: HashMap<&str, f64> = rows
            .iter()
            .filter_map(|r| {
                r.price
                    .filter(|p| p.is_finite() && *p > 0.0)
                    .map(|p| (r.ticker.as_str(), p))
            })
            .collect();

        let candidates: Vec<&str> = plan.candidates().collect();
        let target_weight = if capital > 0.0 && !candidates.is_empty() {
            Some(1.0 / candidates.len() as f64)
        } else {
            None
        };
        let target_for = |ticker: &str| -> Option<f64> {
            let w = target_weight?;
            Some(if candidates.iter().any(|c| *c == ticker) { w } else { 0.0 })
        };

        let mut lines = Vec::new();
        let mut turnover = 0.0;

        for (ticker, &quantity) in holdings {
            if !universe.contains(ticker) {
                lines.push(review_line(ticker, quantity, "not in the current ticker lists"));
                continue;
            }
            let Some(&price) = prices.get(ticker.as_str()) else {
                lines.push(review_line(ticker, quantity, "no price from the latest scan"));
                continue;
            };

            let line = self.compare(ticker, quantity, price, capital, target_for(ticker.as_str()));
            if let Some(delta) = line.shares_delta {
                if line.action != RebalanceAction::Hold {
                    turnover += (delta * price).abs();
                }
            }
            lines.push(line);
        }

        // candidates not held yet
        for ticker in &candidates {
            if holdings.contains_key(*ticker) {
                continue;
            }
            let Some(&price) = prices.get(ticker) else {
                continue;
            };
            let line = self.compare(ticker, 0.0, price, capital, target_for(*ticker));
            if let Some(delta) = line.shares_delta {
                if line.action != RebalanceAction::Hold {
                    turnover += (delta * price).abs();
                }
            }
            lines.push(line);
        }

        let estimated_turnover = if capital > 0.0 { turnover / capital } else { 0.0 };
        let review = lines
            .iter()
            .filter(|l| l.action == RebalanceAction::Review)
            .count();
        if review > 0 {
            tracing::info!("{} holdings need review", review);
        }

        RebalanceReport {
            capital,
            lines,
            estimated_turnover,
        }
    }

    fn compare(
        &self,
        ticker: &str,
        quantity: f64,
        price: f64,
        capital: f64,
        target_weight: Option<f64>,
    ) -> RebalanceLine {
        let current_value = quantity * price;

        let Some(target_weight) = target_weight else {
            return RebalanceLine {
                ticker: ticker.to_string(),
                quantity,
                price: Some(price),
                current_value: Some(current_value),
                target_value: None,
                current_weight: None,
                target_weight: None,
                shares_delta: None,
                action: RebalanceAction::Hold,
                note: Some("no capital to allocate".to_string()),
            };
        };

        let target_value = capital * target_weight;
        let current_weight = current_value / capital;
        let diff_value = target_value - current_value;
        let drift = current_weight - target_weight;

        let action = if drift.abs() <= self.drift_tolerance || diff_value.abs() < MIN_TRADE_VALUE {
            RebalanceAction::Hold
        } else if diff_value > 0.0 {
            RebalanceAction::Buy
        } else {
            RebalanceAction::Sell
        };

        RebalanceLine {
            ticker: ticker.to_string(),
            quantity,
            price: Some(price),
            current_value: Some(current_value),
            target_value: Some(target_value),
            current_weight: Some(current_weight),
            target_weight: Some(target_weight),
            shares_delta: Some(diff_value / price),
            action,
            note: None,
        }
    }
}

fn review_line(ticker: &str, quantity: f64, note: &str) -> RebalanceLine {
    RebalanceLine {
        ticker: ticker.to_string(),
        quantity,
        price: None,
        current_value: None,
        target_value: None,
        current_weight: None,
        target_weight: None,
        shares_delta: None,
        action: RebalanceAction::Review,
        note: Some(note.to_string()),
    }
}

pub fn build_rebalance_report(
    plan: &PortfolioPlan,
    rows: &[ScanRow],
    holdings: &Holdings,
    universe: &TickerUniverse,
) -> RebalanceReport {
    RebalanceCalculator::default().calculate(plan, rows, holdings, universe)
}
