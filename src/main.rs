// ===============================
// src/main.rs
// ===============================
/*
 # jalankan 2 strategi dengan mock feed/venue, berhenti setelah 5 tick
 EVALUATION_INTERVAL_SECS=1 cargo run -- --strategy ma_crossover,pairs_spread --max-ticks 5

 # konfigurasi yang aktif
 curl -s localhost:9898/metrics | egrep '^config_(feed_mode|venue_mode|strategy_active)'

 # aktivitas per strategi
 curl -s localhost:9898/metrics | egrep '^(decisions_total|order_legs_total|pnl_realized)'
*/
/*
=============================================================================
Project : signal_bot_rust — polling signal/strategy engine in Rust
Module  : main.rs
Version : 0.5.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
License : MIT (see LICENSE)

Summary : Polls a price endpoint on a fixed interval, runs pluggable signal
          strategies (MA, bands, momentum, RSI, breakout, pairs, RL, learned
          policy), drives a per-strategy position state machine with single or
          multi-leg execution, tracks P&L, exposes Prometheus metrics, and
          records JSONL events.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::future::join_all;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use signal_bot_rust::config::{self, Args, MarketMode, StrategyParams};
use signal_bot_rust::domain::Event;
use signal_bot_rust::engine::{self, EngineSettings, StrategyEngine};
use signal_bot_rust::execution::{OrderExecutionCoordinator, OrderSink};
use signal_bot_rust::feed::{HttpFeed, MarketDataSource, MockFeed};
use signal_bot_rust::gateway::{HttpOrderSink, MockOrderSink};
use signal_bot_rust::{metrics, recorder, strategy};

const MOCK_FILL_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Parser)]
#[command(name = "signal_bot_rust", version, about = "Polling signal/strategy engine")]
struct Cli {
    /// Extra .env file loaded before the environment is read
    #[arg(long)]
    env_file: Option<PathBuf>,
    /// Comma separated strategies; overrides STRATEGIES / STRATEGY
    #[arg(long)]
    strategy: Option<String>,
    /// Stop every strategy after N ticks
    #[arg(long)]
    max_ticks: Option<u64>,
}

type Instance = (StrategyEngine, Arc<dyn MarketDataSource>);

/// Builds every strategy instance up front so any config problem fails at startup.
fn build_instances(
    args: &Args,
    params: &StrategyParams,
    rec_tx: Option<&mpsc::Sender<Event>>,
) -> Result<Vec<Instance>, Box<dyn std::error::Error>> {
    let mut out = Vec::new();
    for mode in &args.strategy_modes {
        let strat = strategy::build(*mode, params)?;
        let symbols: Vec<String> = strat.instruments().symbols().into_iter().map(String::from).collect();

        // tiap instance punya feed & sink sendiri
        let feed: Arc<dyn MarketDataSource> = match args.feed_mode {
            MarketMode::Mock => Arc::new(MockFeed::new(&symbols)),
            MarketMode::Http => Arc::new(HttpFeed::new(args.market_data_url.clone(), args.http_timeout)?),
        };
        let sink: Arc<dyn OrderSink> = match args.venue_mode {
            MarketMode::Mock => Arc::new(MockOrderSink::new(args.mock_fill_failure_rate, MOCK_FILL_DELAY)),
            MarketMode::Http => {
                Arc::new(HttpOrderSink::new(args.trade_api_url.clone(), args.user_id.clone(), args.http_timeout)?)
            }
        };

        let settings = EngineSettings {
            trade_amount: args.trade_amount,
            initial_cash: args.initial_cash,
            cooldown: args.cooldown,
        };
        let mut eng = StrategyEngine::new(strat, OrderExecutionCoordinator::new(sink, args.http_timeout), settings);
        if let Some(tx) = rec_tx {
            eng = eng.with_recorder(tx.clone());
        }
        out.push((eng, feed));
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ---- Logging ----
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ---- Load config ----
    if let Some(path) = &cli.env_file {
        if let Err(e) = dotenvy::from_path(path) {
            error!(path = %path.display(), error = %e, "cannot load env file");
            return ExitCode::from(2);
        }
    }
    let (args, params) = match config::load(cli.strategy.as_deref()) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "config error");
            return ExitCode::from(2);
        }
    };

    // ---- Metrics ----
    metrics::init();
    let port = args.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::serve_metrics(port).await {
            error!(error = %e, port, "metrics server stopped");
        }
    });

    // ---- Startup info + export config to metrics ----
    let strategy_names: Vec<&'static str> = args.strategy_modes.iter().map(|m| m.label()).collect();
    info!(
        feed_mode = args.feed_mode.label(),
        venue_mode = args.venue_mode.label(),
        market_data = %args.market_data_url,
        trade_api = %args.trade_api_url,
        symbol = %params.symbol,
        pair = ?(&params.pair_y, &params.pair_x),
        strategies = ?strategy_names,
        interval_secs = args.interval.as_secs(),
        "startup config"
    );
    metrics::CONFIG_FEED_MODE.with_label_values(&[args.feed_mode.label()]).set(1);
    metrics::CONFIG_VENUE_MODE.with_label_values(&[args.venue_mode.label()]).set(1);
    for name in &strategy_names {
        metrics::CONFIG_STRATEGY_ACTIVE.with_label_values(&[name]).set(1);
    }

    // ---- Recorder (optional) ----
    let (rec_tx, rec_task) = match args.record_file.clone() {
        Some(path) => {
            let (tx, rx) = mpsc::channel::<Event>(8192);
            let task = tokio::spawn(async move {
                if let Err(e) = recorder::run(rx, path).await {
                    error!(error = %e, "recorder stopped");
                }
            });
            (Some(tx), Some(task))
        }
        None => (None, None),
    };

    // ---- Strategy instances ----
    let instances = match build_instances(&args, &params, rec_tx.as_ref()) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "cannot build strategies");
            return ExitCode::from(2);
        }
    };
    if let Some(tx) = &rec_tx {
        let _ = tx.try_send(Event::Note(format!("started: {}", strategy_names.join(","))));
    }
    drop(rec_tx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles: Vec<_> = instances
        .into_iter()
        .map(|(eng, feed)| tokio::spawn(engine::run(eng, feed, args.interval, cli.max_ticks, shutdown_rx.clone())))
        .collect();

    // ---- Ctrl-C: loops stop between ticks ----
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, stopping after current tick");
            let _ = shutdown_tx.send(true);
        }
    });

    for res in join_all(handles).await {
        match res {
            Ok(eng) => info!(
                strategy = eng.name(),
                realized = eng.accountant().realized(),
                trades = eng.positions().ledger().len(),
                "final"
            ),
            Err(e) => error!(error = %e, "strategy task failed"),
        }
    }

    if let Some(task) = rec_task {
        let _ = task.await;
    }
    ExitCode::SUCCESS
}
