// ===============================
// src/domain.rs
// ===============================
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Order side as understood by the trade API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side { Buy, Sell }

impl Side {
    pub fn sign(&self) -> f64 { match self { Side::Buy => 1.0, Side::Sell => -1.0 } }
    pub fn opposite(&self) -> Side { match self { Side::Buy => Side::Sell, Side::Sell => Side::Buy } }
    pub fn as_str(&self) -> &'static str { match self { Side::Buy => "buy", Side::Sell => "sell" } }
}

/// Direction a strategy wants to hold. For pairs strategies Long means "long spread".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction { Long, Short }

impl Direction {
    pub fn sign(&self) -> f64 { match self { Direction::Long => 1.0, Direction::Short => -1.0 } }
    pub fn opposite(&self) -> Direction {
        match self { Direction::Long => Direction::Short, Direction::Short => Direction::Long }
    }
}

/// Position state as seen from outside the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PositionSide {
    #[default]
    Flat,
    Long,
    Short,
    LongSpread,
    ShortSpread,
}

impl PositionSide {
    pub fn held(direction: Direction, multi_leg: bool) -> Self {
        match (direction, multi_leg) {
            (Direction::Long, false) => PositionSide::Long,
            (Direction::Short, false) => PositionSide::Short,
            (Direction::Long, true) => PositionSide::LongSpread,
            (Direction::Short, true) => PositionSide::ShortSpread,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            PositionSide::Flat => None,
            PositionSide::Long | PositionSide::LongSpread => Some(Direction::Long),
            PositionSide::Short | PositionSide::ShortSpread => Some(Direction::Short),
        }
    }

    pub fn is_flat(&self) -> bool { matches!(self, PositionSide::Flat) }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionSide::Flat => "flat",
            PositionSide::Long => "long",
            PositionSide::Short => "short",
            PositionSide::LongSpread => "long_spread",
            PositionSide::ShortSpread => "short_spread",
        };
        f.write_str(s)
    }
}

/// One market data poll: symbol -> last price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub ts: DateTime<Utc>,
    pub prices: HashMap<String, f64>,
}

impl Observation {
    pub fn new(ts: DateTime<Utc>, prices: HashMap<String, f64>) -> Self { Self { ts, prices } }

    pub fn price(&self, symbol: &str) -> Result<f64, EngineError> {
        let px = *self
            .prices
            .get(symbol)
            .ok_or_else(|| EngineError::MissingSymbol(symbol.to_string()))?;
        if !px.is_finite() || px <= 0.0 {
            return Err(EngineError::InvalidPrice { symbol: symbol.to_string(), price: px });
        }
        Ok(px)
    }
}

/// Atomic unit submitted to the trade API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg { pub symbol: String, pub side: Side, pub amount: f64, pub price: f64 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderErrorKind {
    Timeout,
    Transport(String),
    Rejected(String),
}

impl fmt::Display for OrderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderErrorKind::Timeout => f.write_str("timeout"),
            OrderErrorKind::Transport(e) => write!(f, "transport: {e}"),
            OrderErrorKind::Rejected(r) => write!(f, "rejected: {r}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub leg: Leg,
    pub success: bool,
    pub executed_price: Option<f64>,
    pub error: Option<OrderErrorKind>,
}

impl OrderResult {
    pub fn filled(leg: Leg, px: f64) -> Self {
        Self { leg, success: true, executed_price: Some(px), error: None }
    }
    pub fn failed(leg: Leg, error: OrderErrorKind) -> Self {
        Self { leg, success: false, executed_price: None, error: Some(error) }
    }
}

/// Output of a signal strategy for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Hold,
    Enter(Direction),
    Exit,
    Flip(Direction),
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Hold => "hold",
            Decision::Enter(_) => "enter",
            Decision::Exit => "exit",
            Decision::Flip(_) => "flip",
        }
    }
}

/// Fill of one leg of a held position: entry or exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegFill { pub symbol: String, pub side: Side, pub amount: f64, pub price: f64 }

/// Ledger entry written when a position (or part of one) closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: PositionSide,
    pub entry_legs: Vec<LegFill>,
    pub exit_legs: Vec<LegFill>,
    pub realized_profit: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Obs { strategy: String, obs: Observation },
    Decision { strategy: String, ts: DateTime<Utc>, decision: Decision, side: PositionSide },
    Exec { strategy: String, ts: DateTime<Utc>, results: Vec<OrderResult> },
    Trade { strategy: String, trade: TradeRecord },
    Note(String),
}
