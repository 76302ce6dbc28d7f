// ===============================
// src/error.rs
// ===============================
use thiserror::Error;

use crate::domain::{OrderResult, PositionSide};

/// Per-tick failures. None of these stop the loop; the tick is skipped or the
/// transition is abandoned and the next tick starts from the prior state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("market data fetch failed: {0}")]
    DataFetch(String),
    #[error("symbol {0} missing from market data")]
    MissingSymbol(String),
    #[error("invalid price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },
    #[error("insufficient data: need {need}, have {have}")]
    InsufficientData { need: usize, have: usize },
    #[error("order failed: {}", describe(.0))]
    OrderFailure(Vec<OrderResult>),
    #[error("partial fill: {} leg(s) filled, {} failed", .filled.len(), .failed.len())]
    PartialFill { filled: Vec<OrderResult>, failed: Vec<OrderResult> },
    #[error("illegal transition: {decision} while {side}")]
    IllegalTransition { decision: &'static str, side: PositionSide },
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::DataFetch(_) => "data_fetch",
            EngineError::MissingSymbol(_) => "missing_symbol",
            EngineError::InvalidPrice { .. } => "invalid_price",
            EngineError::InsufficientData { .. } => "insufficient_data",
            EngineError::OrderFailure(_) => "order_failure",
            EngineError::PartialFill { .. } => "partial_fill",
            EngineError::IllegalTransition { .. } => "illegal_transition",
        }
    }
}

fn describe(results: &[OrderResult]) -> String {
    results
        .iter()
        .map(|r| match &r.error {
            Some(e) => format!("{} {} ({e})", r.leg.side.as_str(), r.leg.symbol),
            None => format!("{} {}", r.leg.side.as_str(), r.leg.symbol),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Startup-time configuration problems; the only fatal errors in the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("bad url for {key}: {source}")]
    Url { key: &'static str, #[source] source: url::ParseError },
    #[error("policy weights: {0}")]
    Policy(String),
    #[error("unknown strategy {0:?}")]
    UnknownStrategy(String),
}
