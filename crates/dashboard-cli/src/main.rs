//! dashboard: terminal front-end for the US/KR watch-list dashboard.
//!
//! Usage:
//!   dashboard market
//!   dashboard scan --rank 30 --threshold 12 --export
//!   dashboard tickers set --us "NVDA, AAPL, MSFT" --kr "005930.KS, 000660.KS"
//!   dashboard holdings set "AAPL:10, MSFT:5.5"
//!   dashboard watch --interval 60

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

mod app;
mod cli;
mod commands;
mod config;
mod i18n;
mod render;
mod session;

use app::App;
use cli::{Cli, Commands};
use config::DashboardConfig;
use session::SessionContext;

const DEFAULT_LOG_FILTER: &str = "warn,dashboard=info,smart_watchlist=info,yahoo_client=warn";

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    // stdout carries the rendered views
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = DashboardConfig::from_env().context("Invalid configuration")?;
    tracing::debug!("Data dir: {}", config.data_dir.display());

    let session = SessionContext::new(&config, &cli.overrides());
    let app = Arc::new(App::new(config));

    match cli.command {
        Commands::Market => commands::market(&app, &session).await,
        Commands::Scan { export, export_xlsx } => commands::scan(&app, &session, export, export_xlsx).await,
        Commands::Earnings { days } => commands::earnings(&app, &session, days).await,
        Commands::News { market } => commands::news(&app, &session, market).await,
        Commands::Portfolio { capital, risk } => commands::portfolio(&app, &session, capital, risk).await,
        Commands::Tickers(args) => commands::tickers(&app, &session, args.action),
        Commands::Holdings(args) => commands::holdings(&app, &session, args.action),
        Commands::RefreshTop { count } => commands::refresh_top(&app, &session, count).await,
        Commands::Watch { .. } => commands::watch(app, session).await,
    }
}
