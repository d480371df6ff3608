use anyhow::{Context, Result};
use dashboard_core::{today_kst, Market, TickerUniverse};
use market_sentiment::fetch_snapshot;
use portfolio_planner::{build_portfolio_plan, build_rebalance_report};
use smart_watchlist::{
    earnings_calendar, export_scan_csv, export_scan_xlsx, refresh_top_lists, RefreshGate, SingleFlight,
    DEFAULT_EXPORT_FILE, DEFAULT_XLSX_EXPORT_FILE,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use ticker_store::parse_ticker_text;

use crate::app::App;
use crate::cli::{HoldingsAction, MarketArg, TickersAction};
use crate::i18n::t;
use crate::render;
use crate::session::SessionContext;

pub async fn market(app: &App, session: &SessionContext) -> Result<()> {
    let snapshot = fetch_snapshot(app.yahoo.as_ref(), &app.fear_greed).await;
    print!("{}", render::header(session.lang));
    print!("{}", render::market(&snapshot, session.lang));
    Ok(())
}

async fn scan_view(app: &App, session: &SessionContext) -> (String, Vec<dashboard_core::ScanRow>) {
    let outcome = app.scan(session).await;
    let mut view = render::header(session.lang);
    view.push_str(&render::tips(session.lang));
    view.push_str(&render::scan(&outcome.items, session.lang));
    view.push_str(&render::failures(&outcome.failures, session.lang));
    (view, outcome.items)
}

pub async fn scan(
    app: &App,
    session: &SessionContext,
    export: Option<Option<PathBuf>>,
    export_xlsx: Option<Option<PathBuf>>,
) -> Result<()> {
    let (view, rows) = scan_view(app, session).await;
    print!("{}", view);

    if let Some(path) = export {
        let path = path.unwrap_or_else(|| app.config.data_dir.join(DEFAULT_EXPORT_FILE));
        export_scan_csv(&path, &rows)
            .with_context(|| format!("Failed to export scan to {}", path.display()))?;
        println!("{}: {}", t("exported", session.lang), path.display());
    }
    if let Some(path) = export_xlsx {
        let path = path.unwrap_or_else(|| app.config.data_dir.join(DEFAULT_XLSX_EXPORT_FILE));
        export_scan_xlsx(&path, &rows)
            .with_context(|| format!("Failed to export scan to {}", path.display()))?;
        println!("{}: {}", t("exported", session.lang), path.display());
    }
    Ok(())
}

pub async fn earnings(app: &App, session: &SessionContext, days: i64) -> Result<()> {
    let (us, kr) = app.selection(session).await;
    let today = today_kst();
    let lists = [(Market::US, us.symbols()), (Market::KR, kr.symbols())];

    let calendars = futures::future::join_all(
        lists
            .iter()
            .map(|(_, symbols)| earnings_calendar(app.yahoo.as_ref(), symbols, days, today)),
    )
    .await;

    for ((market, _), outcome) in lists.iter().zip(calendars) {
        print!("{}", render::earnings(*market, &outcome.items, session.lang));
        print!("{}", render::failures(&outcome.failures, session.lang));
    }
    Ok(())
}

pub async fn news(app: &App, session: &SessionContext, market: MarketArg) -> Result<()> {
    match market {
        MarketArg::Us => {
            let us = app.news.market_news(Market::US).await;
            print!("{}", render::news(Market::US, &us, session.lang));
        }
        MarketArg::Kr => {
            let kr = app.news.market_news(Market::KR).await;
            print!("{}", render::news(Market::KR, &kr, session.lang));
        }
        MarketArg::All => {
            let (us, kr) = app.news.all_markets().await;
            print!("{}", render::news(Market::US, &us, session.lang));
            print!("{}", render::news(Market::KR, &kr, session.lang));
        }
    }
    Ok(())
}

pub async fn portfolio(app: &App, session: &SessionContext, capital: f64, risk_pct: f64) -> Result<()> {
    // the planner picks trend rows itself, so scan without the filter
    let mut options = session.scan_options();
    options.trend_only = false;
    let outcome = app.scan_with(session, &options).await;

    let plan = build_portfolio_plan(&outcome.items, capital, risk_pct / 100.0);
    let holdings = app.holdings.load();
    let universe = app.tickers.load();
    let report = build_rebalance_report(&plan, &outcome.items, &holdings, &universe);

    print!("{}", render::plan(&plan, session.lang));
    print!("{}", render::rebalance(&report, session.lang));
    print!("{}", render::failures(&outcome.failures, session.lang));
    Ok(())
}

pub fn tickers(app: &App, session: &SessionContext, action: TickersAction) -> Result<()> {
    match action {
        TickersAction::Show => {
            print!("{}", render::universe(&app.tickers.load(), session.lang));
        }
        TickersAction::Set { us, kr } => {
            let current = app.tickers.load();
            let updated = TickerUniverse::new(
                us.map(|text| parse_ticker_text(&text)).unwrap_or(current.us),
                kr.map(|text| parse_ticker_text(&text)).unwrap_or(current.kr),
            );
            app.tickers
                .save(&updated)
                .context("Failed to save ticker lists")?;
            println!("{}", t("tickers_saved", session.lang));
            print!("{}", render::universe(&updated, session.lang));
        }
    }
    Ok(())
}

pub fn holdings(app: &App, session: &SessionContext, action: HoldingsAction) -> Result<()> {
    match action {
        HoldingsAction::Show => {
            print!("{}", render::holdings(&app.holdings.load(), session.lang));
        }
        HoldingsAction::Set { text } => {
            let saved = app
                .holdings
                .save_text(&text)
                .context("Failed to save holdings")?;
            println!("{}", t("holdings_saved", session.lang));
            print!("{}", render::holdings(&saved, session.lang));
        }
    }
    Ok(())
}

pub async fn refresh_top(app: &App, session: &SessionContext, count: usize) -> Result<()> {
    let report = refresh_top_lists(app.yahoo.as_ref(), &app.tickers, count)
        .await
        .context("Failed to save refreshed ticker lists")?;

    for market in &report.refreshed {
        println!("{}: {}", t("refresh_done", session.lang), market);
    }
    for (market, reason) in &report.kept {
        println!("{}: {} ({})", t("refresh_kept", session.lang), market, reason);
    }
    print!("{}", render::universe(&report.universe, session.lang));
    Ok(())
}

/// Scan now and then every interval until Ctrl+C. A tick that fires while
/// the previous scan is still running is skipped; the gate keeps an older
/// result from replacing a newer one on screen.
pub async fn watch(app: Arc<App>, session: SessionContext) -> Result<()> {
    if !session.auto_refresh {
        return scan(&app, &session, None, None).await;
    }

    let gate: Arc<RefreshGate<String>> = Arc::new(RefreshGate::new());
    let mut flight = SingleFlight::new();
    let mut interval = tokio::time::interval(session.refresh_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let session = Arc::new(session);
    println!("{}", t("watch_started", session.lang));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if flight.is_busy() {
                    tracing::info!("Previous scan still running, skipping this refresh");
                } else {
                    let ticket = gate.trigger();
                    tracing::debug!("Refresh #{} triggered", ticket.id());

                    let app = Arc::clone(&app);
                    let gate = Arc::clone(&gate);
                    let session = Arc::clone(&session);
                    flight.try_spawn(async move {
                        let (view, _) = scan_view(&app, &session).await;
                        gate.complete_with(ticket, view, |v| print!("{}", v));
                    });
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping auto-refresh");
                flight.cancel();
                break;
            }
        }
    }
    Ok(())
}
