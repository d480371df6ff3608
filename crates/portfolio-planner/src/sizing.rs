use dashboard_core::{DashboardError, RowStatus, ScanRow};
use serde::{Deserialize, Serialize};

pub const MIN_RISK_PCT: f64 = 0.002;
pub const MAX_RISK_PCT: f64 = 0.05;
pub const DEFAULT_RISK_PCT: f64 = 0.01;
pub const DEFAULT_CAPITAL: f64 = 100_000.0;

pub fn clamp_risk_pct(risk_pct: f64) -> f64 {
    if risk_pct.is_nan() {
        return DEFAULT_RISK_PCT;
    }
    risk_pct.clamp(MIN_RISK_PCT, MAX_RISK_PCT)
}

/// Fixed-fractional risk sizing against each candidate's stop-loss.
///
/// shares = floor(capital × risk_pct / (entry − stop)), then capped so a
/// single position never exceeds `max_position_fraction` of capital.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPlanner {
    /// Largest share of capital a single position may take (e.g. 0.25 = 25%)
    pub max_position_fraction: f64,

    /// Stop distance as a fraction of entry, used when the scan has no stop
    pub default_stop_distance: f64,
}

impl Default for PortfolioPlanner {
    fn default() -> Self {
        Self {
            max_position_fraction: 0.25,
            default_stop_distance: 0.08,
        }
    }
}

/// Suggested buy for one scan row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSuggestion {
    pub ticker: String,
    pub name: String,
    pub entry: f64,
    pub stop_loss: f64,
    /// True when `stop_loss` came from the default distance
    pub default_stop: bool,

    /// Number of shares to buy (rounded down)
    pub shares: u64,

    pub position_value: f64,

    /// Loss if the stop is hit
    pub risk_amount: f64,

    /// Fraction of capital allocated
    pub fraction: f64,

    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPlan {
    pub capital: f64,
    pub risk_pct: f64,
    pub suggestions: Vec<PositionSuggestion>,
    pub total_allocated: f64,
    pub total_risk: f64,
}

impl PortfolioPlan {
    pub fn cash_remaining(&self) -> f64 {
        (self.capital - self.total_allocated).max(0.0)
    }

    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.suggestions.iter().map(|s| s.ticker.as_str())
    }
}

/// Rows the planner sizes: trend-confirmed rows when there are any,
/// otherwise every usable row with a price.
pub fn select_candidates(rows: &[ScanRow]) -> Vec<&ScanRow> {
    let usable: Vec<&ScanRow> = rows
        .iter()
        .filter(|r| !matches!(r.status, RowStatus::Failed(_)))
        .filter(|r| r.price.map_or(false, |p| p.is_finite() && p > 0.0))
        .collect();

    if usable.iter().any(|r| r.trend_ok) {
        usable.into_iter().filter(|r| r.trend_ok).collect()
    } else {
        usable
    }
}

impl PortfolioPlanner {
    pub fn new(max_position_fraction: f64, default_stop_distance: f64) -> Result<Self, DashboardError> {
        if max_position_fraction <= 0.0 || max_position_fraction > 1.0 {
            return Err(DashboardError::InvalidInput(
                "max_position_fraction must be between 0 and 1".to_string(),
            ));
        }
        if default_stop_distance <= 0.0 || default_stop_distance >= 1.0 {
            return Err(DashboardError::InvalidInput(
                "default_stop_distance must be between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            max_position_fraction,
            default_stop_distance,
        })
    }

    fn size_row(&self, row: &ScanRow, capital: f64, risk_pct: f64) -> Option<PositionSuggestion> {
        let price = row.price?;
        let entry = row.entry.filter(|e| *e > 0.0).unwrap_or(price);

        let (stop_loss, default_stop) = match row.stop_loss {
            Some(stop) if stop > 0.0 && stop < entry => (stop, false),
            _ => (entry * (1.0 - self.default_stop_distance), true),
        };
        let per_share_risk = entry - stop_loss;

        let risk_budget = capital * risk_pct;
        let by_risk = (risk_budget / per_share_risk).floor();
        let by_cap = (capital * self.max_position_fraction / entry).floor();
        let shares = by_risk.min(by_cap).max(0.0) as u64;

        let position_value = shares as f64 * entry;
        let risk_amount = shares as f64 * per_share_risk;
        let fraction = if capital > 0.0 { position_value / capital } else { 0.0 };

        let reasoning = if shares == 0 {
            if capital <= 0.0 {
                "No capital set".to_string()
            } else {
                format!(
                    "Risk budget {:.2} is below one share's risk {:.2}",
                    risk_budget, per_share_risk
                )
            }
        } else if by_cap < by_risk {
            format!(
                "Capped at {:.0}% of capital; risk {:.2} of budget {:.2}",
                self.max_position_fraction * 100.0,
                risk_amount,
                risk_budget
            )
        } else {
            format!(
                "Risk {:.2} ({:.2}% of capital) with stop {:.2} below entry",
                risk_amount,
                risk_pct * 100.0,
                per_share_risk
            )
        };

        Some(PositionSuggestion {
            ticker: row.ticker.clone(),
            name: row.name.clone(),
            entry,
            stop_loss,
            default_stop,
            shares,
            position_value,
            risk_amount,
            fraction,
            reasoning,
        })
    }

    /// Size every candidate row. `capital` below zero is treated as zero.
    pub fn plan(&self, rows: &[ScanRow], capital: f64, risk_pct: f64) -> PortfolioPlan {
        let capital = if capital.is_finite() { capital.max(0.0) } else { 0.0 };
        let risk_pct = clamp_risk_pct(risk_pct);

        let suggestions: Vec<PositionSuggestion> = select_candidates(rows)
            .into_iter()
            .filter_map(|row| self.size_row(row, capital, risk_pct))
            .collect();

        let total_allocated = suggestions.iter().map(|s| s.position_value).sum::<f64>();
        let total_risk = suggestions.iter().map(|s| s.risk_amount).sum::<f64>();

        if total_allocated > capital {
            tracing::warn!(
                "Plan allocates {:.0} against capital {:.0}; positions are sized independently",
                total_allocated,
                capital
            );
        }

        PortfolioPlan {
            capital,
            risk_pct,
            suggestions,
            total_allocated,
            total_risk,
        }
    }
}

pub fn build_portfolio_plan(rows: &[ScanRow], capital: f64, risk_pct: f64) -> PortfolioPlan {
    PortfolioPlanner::default().plan(rows, capital, risk_pct)
}
