// ===============================
// src/engine.rs
// ===============================
//
// One StrategyEngine per strategy instance. Per tick, strictly sequential:
//   fetch -> observe -> indicators -> decide -> normalize -> cooldown
//        -> execute legs -> apply to position machine -> credit P&L
//
// Nothing here is shared between instances; every engine owns its buffers,
// position, accountant and policy state. Any single tick may fail; the loop
// keeps going and the next tick starts from the state the failure left.
//
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::{Decision, Direction, Event, Leg, Observation, PositionSide, TradeRecord};
use crate::error::EngineError;
use crate::execution::{ExecStatus, ExecutionReport, OrderExecutionCoordinator};
use crate::feed::MarketDataSource;
use crate::indicators::IndicatorSnapshot;
use crate::metrics::{
    DECISIONS, ORDER_LEGS, PARTIAL_FILLS, PNL_REALIZED, PORTFOLIO_VALUE, POSITION_SIDE, TICKS, TICKS_SKIPPED,
};
use crate::pnl::PnlAccountant;
use crate::positions::{entry_legs, ExitOutcome, PositionStateMachine};
use crate::risk::CooldownGuard;
use crate::strategy::{DecisionContext, Instruments, SignalStrategy};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub trade_amount: f64,
    pub initial_cash: f64,
    pub cooldown: Duration,
}

/// What one tick did. Returned for tests and the loop's log line.
#[derive(Debug)]
pub enum TickOutcome {
    /// Fetch or observation failed; buffers and position untouched.
    Skipped(EngineError),
    WarmingUp { need: usize, have: usize },
    Hold,
    CoolingDown,
    Entered(PositionSide),
    Exited(TradeRecord),
    /// Some exit legs filled (P&L booked), the rest remain open.
    PartialExit { realized: f64, error: EngineError },
    Flipped { closed: TradeRecord, side: PositionSide },
    /// The old side was closed but the new one could not be opened. Ends Flat.
    FlipIncomplete { closed: TradeRecord, error: EngineError },
    /// Order failure or partial fill; the transition was not taken.
    Failed(EngineError),
}

pub struct StrategyEngine {
    name: &'static str,
    strategy: Box<dyn SignalStrategy>,
    positions: PositionStateMachine,
    accountant: PnlAccountant,
    coordinator: OrderExecutionCoordinator,
    guard: CooldownGuard,
    trade_amount: f64,
    rec_tx: Option<mpsc::Sender<Event>>,
}

impl StrategyEngine {
    pub fn new(strategy: Box<dyn SignalStrategy>, coordinator: OrderExecutionCoordinator, s: EngineSettings) -> Self {
        Self {
            name: strategy.name(),
            positions: PositionStateMachine::new(strategy.instruments().is_multi_leg()),
            strategy,
            accountant: PnlAccountant::new(s.initial_cash),
            coordinator,
            guard: CooldownGuard::new(s.cooldown),
            trade_amount: s.trade_amount,
            rec_tx: None,
        }
    }

    pub fn with_recorder(mut self, tx: mpsc::Sender<Event>) -> Self {
        self.rec_tx = Some(tx);
        self
    }

    pub fn name(&self) -> &'static str { self.name }

    pub fn side(&self) -> PositionSide { self.positions.side() }

    pub fn positions(&self) -> &PositionStateMachine { &self.positions }

    pub fn accountant(&self) -> &PnlAccountant { &self.accountant }

    fn record(&self, ev: Event) {
        if let Some(tx) = &self.rec_tx {
            let _ = tx.try_send(ev);
        }
    }

    fn skip(&self, e: EngineError) -> TickOutcome {
        warn!(strategy = self.name, reason = e.kind(), error = %e, "tick skipped");
        TICKS_SKIPPED.with_label_values(&[self.name, e.kind()]).inc();
        TickOutcome::Skipped(e)
    }

    /// One scheduled tick: fetch then evaluate.
    pub async fn tick(&mut self, feed: &dyn MarketDataSource) -> TickOutcome {
        match feed.fetch().await {
            Ok(obs) => self.on_observation(&obs).await,
            Err(e) => {
                TICKS.with_label_values(&[self.name]).inc();
                self.skip(e)
            }
        }
    }

    pub async fn on_observation(&mut self, obs: &Observation) -> TickOutcome {
        TICKS.with_label_values(&[self.name]).inc();
        if let Err(e) = self.strategy.observe(obs) {
            return self.skip(e);
        }
        self.record(Event::Obs { strategy: self.name.to_string(), obs: obs.clone() });

        let snap = match self.strategy.indicators() {
            Ok(s) => s,
            Err(EngineError::InsufficientData { need, have }) => {
                debug!(strategy = self.name, need, have, "warming up");
                return TickOutcome::WarmingUp { need, have };
            }
            Err(e) => return self.skip(e),
        };

        let side = self.positions.side();
        let portfolio_value = self.accountant.portfolio_value(self.positions.unrealized(obs));
        PORTFOLIO_VALUE.with_label_values(&[self.name]).set(portfolio_value);

        let raw = self.strategy.decide(&DecisionContext { obs, indicators: &snap, position: side, portfolio_value });
        DECISIONS.with_label_values(&[self.name, raw.label()]).inc();
        let decision = self.positions.normalize(raw).unwrap_or_else(|e| {
            debug!(strategy = self.name, error = %e, "decision downgraded to hold");
            Decision::Hold
        });
        self.record(Event::Decision { strategy: self.name.to_string(), ts: obs.ts, decision, side });

        if !self.guard.allows(&decision, obs.ts) {
            debug!(strategy = self.name, decision = decision.label(), "cooling down");
            return TickOutcome::CoolingDown;
        }

        let outcome = match decision {
            Decision::Hold => TickOutcome::Hold,
            Decision::Enter(d) => match self.enter(d, &snap, obs).await {
                Ok(side) => TickOutcome::Entered(side),
                Err(e) => TickOutcome::Failed(e),
            },
            Decision::Exit => match self.exit(obs).await {
                Ok(ExitOutcome::Closed(t)) => TickOutcome::Exited(t),
                Ok(ExitOutcome::Partial { realized, filled, failed }) => {
                    TickOutcome::PartialExit { realized, error: EngineError::PartialFill { filled, failed } }
                }
                Err(e) => TickOutcome::Failed(e),
            },
            // Flip = Exit lalu Enter di tick yang sama
            Decision::Flip(d) => match self.exit(obs).await {
                Ok(ExitOutcome::Closed(closed)) => match self.enter(d, &snap, obs).await {
                    Ok(side) => TickOutcome::Flipped { closed, side },
                    Err(error) => TickOutcome::FlipIncomplete { closed, error },
                },
                Ok(ExitOutcome::Partial { realized, filled, failed }) => {
                    TickOutcome::PartialExit { realized, error: EngineError::PartialFill { filled, failed } }
                }
                Err(e) => TickOutcome::Failed(e),
            },
        };

        if matches!(
            outcome,
            TickOutcome::Entered(_)
                | TickOutcome::Exited(_)
                | TickOutcome::Flipped { .. }
                | TickOutcome::FlipIncomplete { .. }
        ) {
            self.guard.record_trade(obs.ts);
        }
        self.log_outcome(&outcome, obs);
        outcome
    }

    async fn enter(
        &mut self,
        direction: Direction,
        snap: &IndicatorSnapshot,
        obs: &Observation,
    ) -> Result<PositionSide, EngineError> {
        let legs = entry_legs(self.strategy.instruments(), direction, self.trade_amount, obs)?;
        let weights = match self.strategy.instruments() {
            Instruments::Single(_) => vec![1.0],
            Instruments::Pair { .. } => vec![1.0, snap.hedge_ratio.unwrap_or(1.0)],
        };
        let report = self.execute(legs, obs).await;
        self.positions.apply_entry(direction, &weights, &report, obs.ts)
    }

    async fn exit(&mut self, obs: &Observation) -> Result<ExitOutcome, EngineError> {
        let legs = self.positions.exit_legs(obs)?;
        let report = self.execute(legs, obs).await;
        let out = self.positions.apply_exit(&report, obs.ts, &mut self.accountant)?;
        PNL_REALIZED.with_label_values(&[self.name]).set(self.accountant.realized());
        if let ExitOutcome::Closed(t) = &out {
            self.record(Event::Trade { strategy: self.name.to_string(), trade: t.clone() });
        }
        Ok(out)
    }

    async fn execute(&self, legs: Vec<Leg>, obs: &Observation) -> ExecutionReport {
        let report = self.coordinator.execute(legs).await;
        for r in &report.results {
            let status = if r.success { "filled" } else { "failed" };
            ORDER_LEGS.with_label_values(&[self.name, status]).inc();
        }
        if report.status() == ExecStatus::PartialFill {
            PARTIAL_FILLS.with_label_values(&[self.name]).inc();
        }
        self.record(Event::Exec { strategy: self.name.to_string(), ts: obs.ts, results: report.results.clone() });
        report
    }

    fn log_outcome(&self, outcome: &TickOutcome, obs: &Observation) {
        let side = self.positions.side();
        POSITION_SIDE
            .with_label_values(&[self.name])
            .set(side.direction().map(|d| d.sign() as i64).unwrap_or(0));
        let realized = self.accountant.realized();
        match outcome {
            TickOutcome::Hold => debug!(strategy = self.name, %side, "hold"),
            TickOutcome::Entered(s) => info!(strategy = self.name, side = %s, ts = %obs.ts, "entered"),
            TickOutcome::Exited(t) => {
                info!(strategy = self.name, profit = t.realized_profit, realized, "exited")
            }
            TickOutcome::Flipped { closed, side } => {
                info!(strategy = self.name, profit = closed.realized_profit, side = %side, realized, "flipped")
            }
            TickOutcome::FlipIncomplete { closed, error } => error!(
                strategy = self.name,
                profit = closed.realized_profit,
                error = %error,
                "flip closed old side but entry failed, now flat"
            ),
            TickOutcome::PartialExit { realized: part, error } => {
                error!(strategy = self.name, booked = part, %side, error = %error, "partial exit, unfilled legs stay open")
            }
            TickOutcome::Failed(e @ EngineError::PartialFill { .. }) => {
                error!(strategy = self.name, error = %e, %side, "partial fill, transition not taken")
            }
            TickOutcome::Failed(e) => warn!(strategy = self.name, error = %e, %side, "order failed, transition not taken"),
            TickOutcome::Skipped(_) | TickOutcome::WarmingUp { .. } | TickOutcome::CoolingDown => {}
        }
    }
}

/// Evaluation loop: one tick per `every` until shutdown or `max_ticks`.
/// Shutdown is only observed between ticks. Returns the engine for a final summary.
pub async fn run(
    mut engine: StrategyEngine,
    feed: Arc<dyn MarketDataSource>,
    every: Duration,
    max_ticks: Option<u64>,
    mut shutdown: watch::Receiver<bool>,
) -> StrategyEngine {
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(strategy = engine.name, every_secs = every.as_secs_f64(), "evaluation loop started");

    let mut n: u64 = 0;
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = shutdown.changed() => break,
        }
        engine.tick(feed.as_ref()).await;
        n += 1;
        if max_ticks.is_some_and(|m| n >= m) {
            break;
        }
    }

    info!(
        strategy = engine.name,
        ticks = n,
        side = %engine.side(),
        realized = engine.accountant.realized(),
        trades = engine.positions.ledger().len(),
        "evaluation loop stopped"
    );
    engine
}
