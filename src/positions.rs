// ===============================
// src/positions.rs (position state machine & P&L per leg)
// ===============================
//
// Flat <-> Long/Short (single leg) or Flat <-> LongSpread/ShortSpread (pairs).
// The side is derived from the open position itself, so "Flat" and "no entry
// price" are the same state and cannot drift apart.
//
// P&L per leg = sign(entry side) * (exit - entry) * amount * weight
//   weight = 1 for single-leg positions and the Y leg of a pair,
//            hedge ratio (or entry ratio) for the X leg.
//
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::{Decision, Direction, Leg, LegFill, Observation, OrderResult, PositionSide, Side, TradeRecord};
use crate::error::EngineError;
use crate::execution::ExecutionReport;
use crate::pnl::PnlAccountant;
use crate::strategy::Instruments;

#[derive(Debug, Clone, PartialEq)]
pub struct HeldLeg {
    pub fill: LegFill,
    pub weight: f64,
}

impl HeldLeg {
    pub fn pnl(&self, exit_px: f64) -> f64 {
        self.fill.side.sign() * (exit_px - self.fill.price) * self.fill.amount * self.weight
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub side: PositionSide,
    /// Legs still open.
    pub legs: Vec<HeldLeg>,
    pub opened_at: DateTime<Utc>,
    entry_fills: Vec<LegFill>,
    exit_fills: Vec<LegFill>,
    realized: f64,
}

impl OpenPosition {
    /// Profit already booked from legs closed by an earlier partial exit.
    pub fn realized(&self) -> f64 { self.realized }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    Closed(TradeRecord),
    /// Some legs closed; the rest stay open under the same side.
    Partial { realized: f64, filled: Vec<OrderResult>, failed: Vec<OrderResult> },
}

/// Orders that open `direction` on `instruments` at this tick's prices.
/// Long spread = buy Y + sell X; short spread is the mirror.
pub fn entry_legs(
    instruments: &Instruments,
    direction: Direction,
    amount: f64,
    obs: &Observation,
) -> Result<Vec<Leg>, EngineError> {
    let first = match direction { Direction::Long => Side::Buy, Direction::Short => Side::Sell };
    let sides = [first, first.opposite()];
    instruments
        .symbols()
        .into_iter()
        .zip(sides)
        .map(|(sym, side)| Ok(Leg { symbol: sym.to_string(), side, amount, price: obs.price(sym)? }))
        .collect()
}

#[derive(Debug, Default)]
pub struct PositionStateMachine {
    multi_leg: bool,
    open: Option<OpenPosition>,
    ledger: Vec<TradeRecord>,
}

impl PositionStateMachine {
    pub fn new(multi_leg: bool) -> Self { Self { multi_leg, open: None, ledger: Vec::new() } }

    pub fn side(&self) -> PositionSide {
        self.open.as_ref().map(|p| p.side).unwrap_or(PositionSide::Flat)
    }

    pub fn position(&self) -> Option<&OpenPosition> { self.open.as_ref() }

    /// Entry price of the first open leg; `None` exactly when Flat.
    pub fn entry_price(&self) -> Option<f64> {
        self.open.as_ref().and_then(|p| p.legs.first()).map(|l| l.fill.price)
    }

    pub fn ledger(&self) -> &[TradeRecord] { &self.ledger }

    /// Maps a raw decision onto a legal transition for the current side.
    /// Flip while Flat becomes Enter; anything without a legal transition is an error
    /// the caller downgrades to Hold.
    pub fn normalize(&self, decision: Decision) -> Result<Decision, EngineError> {
        let side = self.side();
        let illegal = || EngineError::IllegalTransition { decision: decision.label(), side };
        match (decision, side.direction()) {
            (Decision::Hold, _) => Ok(Decision::Hold),
            (Decision::Enter(d), None) | (Decision::Flip(d), None) => Ok(Decision::Enter(d)),
            (Decision::Exit, Some(_)) => Ok(Decision::Exit),
            (Decision::Flip(d), Some(held)) if d != held => Ok(Decision::Flip(d)),
            _ => Err(illegal()),
        }
    }

    /// Mark-to-market of the open legs. A leg without a usable quote is marked at entry.
    pub fn unrealized(&self, obs: &Observation) -> f64 {
        self.open
            .as_ref()
            .map(|p| p.legs.iter().map(|l| obs.price(&l.fill.symbol).map(|px| l.pnl(px)).unwrap_or(0.0)).sum())
            .unwrap_or(0.0)
    }

    /// Closing orders for every open leg at this tick's prices.
    pub fn exit_legs(&self, obs: &Observation) -> Result<Vec<Leg>, EngineError> {
        let p = self
            .open
            .as_ref()
            .ok_or(EngineError::IllegalTransition { decision: "exit", side: PositionSide::Flat })?;
        p.legs
            .iter()
            .map(|l| {
                Ok(Leg {
                    symbol: l.fill.symbol.clone(),
                    side: l.fill.side.opposite(),
                    amount: l.fill.amount,
                    price: obs.price(&l.fill.symbol)?,
                })
            })
            .collect()
    }

    /// Opens the position only when every leg filled; otherwise stays Flat and
    /// returns `OrderFailure` / `PartialFill` carrying the per-leg results.
    /// `weights` line up with the submitted legs.
    pub fn apply_entry(
        &mut self,
        direction: Direction,
        weights: &[f64],
        report: &ExecutionReport,
        ts: DateTime<Utc>,
    ) -> Result<PositionSide, EngineError> {
        if let Some(p) = &self.open {
            return Err(EngineError::IllegalTransition { decision: "enter", side: p.side });
        }
        if !report.all_filled() {
            return Err(report.to_error());
        }
        let legs: Vec<HeldLeg> = report
            .results
            .iter()
            .enumerate()
            .map(|(i, r)| HeldLeg {
                fill: fill_of(r),
                weight: weights.get(i).copied().unwrap_or(1.0),
            })
            .collect();
        let side = PositionSide::held(direction, self.multi_leg);
        info!(%side, legs = legs.len(), "position opened");
        self.open = Some(OpenPosition {
            side,
            entry_fills: legs.iter().map(|l| l.fill.clone()).collect(),
            legs,
            opened_at: ts,
            exit_fills: Vec::new(),
            realized: 0.0,
        });
        Ok(side)
    }

    /// Closes every filled leg and credits its P&L in the same step. Nothing
    /// filled: state unchanged and `OrderFailure`. All legs gone: the trade is
    /// appended to the ledger and the machine is Flat.
    pub fn apply_exit(
        &mut self,
        report: &ExecutionReport,
        ts: DateTime<Utc>,
        acct: &mut PnlAccountant,
    ) -> Result<ExitOutcome, EngineError> {
        let Some(pos) = self.open.as_mut() else {
            return Err(EngineError::IllegalTransition { decision: "exit", side: PositionSide::Flat });
        };
        let filled = report.filled();
        if filled.is_empty() {
            return Err(report.to_error());
        }

        let mut realized = 0.0;
        for r in &filled {
            let px = r.executed_price.unwrap_or(r.leg.price);
            if let Some(i) = pos.legs.iter().position(|l| l.fill.symbol == r.leg.symbol) {
                let held = pos.legs.remove(i);
                realized += held.pnl(px);
                pos.exit_fills.push(fill_of(r));
            }
        }
        acct.credit(realized);
        pos.realized += realized;

        if !pos.legs.is_empty() {
            debug!(realized, remaining = pos.legs.len(), "partial exit");
            return Ok(ExitOutcome::Partial { realized, filled, failed: report.failed() });
        }

        let Some(pos) = self.open.take() else {
            return Err(EngineError::IllegalTransition { decision: "exit", side: PositionSide::Flat });
        };
        let trade = TradeRecord {
            side: pos.side,
            entry_legs: pos.entry_fills,
            exit_legs: pos.exit_fills,
            realized_profit: pos.realized,
            opened_at: pos.opened_at,
            closed_at: ts,
        };
        info!(side = %trade.side, profit = trade.realized_profit, "position closed");
        self.ledger.push(trade.clone());
        Ok(ExitOutcome::Closed(trade))
    }
}

fn fill_of(r: &OrderResult) -> LegFill {
    LegFill {
        symbol: r.leg.symbol.clone(),
        side: r.leg.side,
        amount: r.leg.amount,
        price: r.executed_price.unwrap_or(r.leg.price),
    }
}
