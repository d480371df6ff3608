//! Position sizing and rebalancing for the watch-list portfolio.

pub mod rebalance;
pub mod sizing;

pub use rebalance::{
    build_rebalance_report, RebalanceAction, RebalanceCalculator, RebalanceLine, RebalanceReport,
    DEFAULT_DRIFT_TOLERANCE,
};
pub use sizing::{
    build_portfolio_plan, clamp_risk_pct, select_candidates, PortfolioPlan, PortfolioPlanner,
    PositionSuggestion, DEFAULT_CAPITAL, DEFAULT_RISK_PCT,
};
