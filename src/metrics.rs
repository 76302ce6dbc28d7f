// ===============================
// src/metrics.rs
// ===============================
use std::convert::Infallible;
use std::net::SocketAddr;

use hyper::service::{make_service_fn, service_fn};
use hyper::{header, Body, Request, Response, Server};
use once_cell::sync::Lazy;
use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::info;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Evaluation loop --------
pub static TICKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("ticks_total", "evaluation ticks per strategy"), &["strategy"]).unwrap()
});

pub static TICKS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticks_skipped_total", "ticks skipped (labels: strategy, reason)"),
        &["strategy", "reason"],
    )
    .unwrap()
});

pub static DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("decisions_total", "strategy decisions (labels: strategy, kind)"),
        &["strategy", "kind"],
    )
    .unwrap()
});

// -------- Execution --------
pub static ORDER_LEGS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("order_legs_total", "submitted legs (labels: strategy, status)"),
        &["strategy", "status"],
    )
    .unwrap()
});

pub static PARTIAL_FILLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("partial_fills_total", "multi-leg actions with some legs unfilled"), &["strategy"])
        .unwrap()
});

// -------- Position & PnL --------
pub static POSITION_SIDE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("position_side", "current side: 1 long, -1 short, 0 flat"),
        &["strategy"],
    )
    .unwrap()
});

pub static PNL_REALIZED: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(Opts::new("pnl_realized", "realized profit per strategy"), &["strategy"]).unwrap()
});

pub static PORTFOLIO_VALUE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(Opts::new("portfolio_value", "cash + unrealized per strategy"), &["strategy"]).unwrap()
});

// ---- Config visibility (feed / venue / strategies) ----
pub static CONFIG_FEED_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("config_feed_mode", "feed mode (label: mode)"), &["mode"]).unwrap()
});

pub static CONFIG_VENUE_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("config_venue_mode", "venue mode (label: mode)"), &["mode"]).unwrap()
});

pub static CONFIG_STRATEGY_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("config_strategy_active", "active strategies (label: strategy)"), &["strategy"])
        .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry; re-registration is ignored
    for m in [
        REGISTRY.register(Box::new(TICKS.clone())),
        REGISTRY.register(Box::new(TICKS_SKIPPED.clone())),
        REGISTRY.register(Box::new(DECISIONS.clone())),
        REGISTRY.register(Box::new(ORDER_LEGS.clone())),
        REGISTRY.register(Box::new(PARTIAL_FILLS.clone())),
        REGISTRY.register(Box::new(POSITION_SIDE.clone())),
        REGISTRY.register(Box::new(PNL_REALIZED.clone())),
        REGISTRY.register(Box::new(PORTFOLIO_VALUE.clone())),
        // Config visibility
        REGISTRY.register(Box::new(CONFIG_FEED_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_VENUE_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_STRATEGY_ACTIVE.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Any path answers with the full exposition
async fn handle(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let mut rsp = Response::new(Body::from(encode_metrics()));
    if let Ok(v) = header::HeaderValue::from_str(TextEncoder::new().format_type()) {
        rsp.headers_mut().insert(header::CONTENT_TYPE, v);
    }
    Ok(rsp)
}

/// Serves `/metrics` (and every other path) until the process exits.
pub async fn serve_metrics(port: u16) -> Result<(), hyper::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(handle)) });
    let server = Server::try_bind(&addr)?.serve(make);
    info!(%addr, "metrics listening (any path)");
    server.await
}
