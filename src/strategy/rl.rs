// ===============================
// src/strategy/rl.rs
// ===============================
//
// TABULAR Q-LEARNING
//   state  = (position side, trend) where trend comes from the deviation of
//            price from its own SMA: > +tau "up", < -tau "down", else "neutral"
//   action = Hold | Buy | Sell, epsilon-greedy, ties -> first in that order
//   reward = change in portfolio value (cash + unrealized) between decisions
//   Q(s,a) += alpha * (reward + gamma * max_a' Q(s',a') - Q(s,a))
//
// The table is only ever grown and updated in place.
//
use ahash::AHashMap as HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::domain::{Decision, Direction, Observation, PositionSide};
use crate::error::EngineError;
use crate::indicators::{sma, IndicatorSnapshot};
use crate::series::RollingSeriesBuffer;

use super::{quotes, DecisionContext, Instruments, SignalStrategy};

#[derive(Debug, Clone)]
pub struct RlParams {
    pub ma_window: usize,
    pub trend_threshold: f64,
    pub epsilon: f64,
    pub alpha: f64,
    pub gamma: f64,
    pub seed: Option<u64>,
}

impl Default for RlParams {
    fn default() -> Self {
        Self { ma_window: 20, trend_threshold: 0.01, epsilon: 0.1, alpha: 0.1, gamma: 0.99, seed: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Trend { Up, Neutral, Down }

impl Trend {
    pub fn classify(price: f64, ma: f64, tau: f64) -> Trend {
        if ma == 0.0 {
            return Trend::Neutral;
        }
        let dev = (price - ma) / ma;
        if dev > tau {
            Trend::Up
        } else if dev < -tau {
            Trend::Down
        } else {
            Trend::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action { Hold, Buy, Sell }

impl Action {
    pub const ALL: [Action; 3] = [Action::Hold, Action::Buy, Action::Sell];

    fn idx(&self) -> usize {
        match self { Action::Hold => 0, Action::Buy => 1, Action::Sell => 2 }
    }

    /// Buy/Sell open from Flat, flip from the opposite side, hold otherwise.
    pub fn to_decision(&self, side: PositionSide) -> Decision {
        let want = match self {
            Action::Hold => return Decision::Hold,
            Action::Buy => Direction::Long,
            Action::Sell => Direction::Short,
        };
        match side.direction() {
            None => Decision::Enter(want),
            Some(d) if d != want => Decision::Flip(want),
            Some(_) => Decision::Hold,
        }
    }
}

pub type RlState = (PositionSide, Trend);

/// Q-table: state -> value per action (indexed like `Action::ALL`).
#[derive(Debug, Default)]
pub struct PolicyState {
    q: HashMap<RlState, [f64; 3]>,
}

impl PolicyState {
    pub fn values(&mut self, s: RlState) -> &mut [f64; 3] { self.q.entry(s).or_insert([0.0; 3]) }

    pub fn value(&self, s: RlState, a: Action) -> f64 {
        self.q.get(&s).map(|v| v[a.idx()]).unwrap_or(0.0)
    }

    pub fn best(&mut self, s: RlState) -> Action {
        let v = *self.values(s);
        let mut best = 0;
        for i in 1..v.len() {
            if v[i] > v[best] {
                best = i;
            }
        }
        Action::ALL[best]
    }

    pub fn update(&mut self, s: RlState, a: Action, reward: f64, next: RlState, alpha: f64, gamma: f64) {
        let max_next = self.values(next).iter().copied().fold(f64::MIN, f64::max);
        let q = &mut self.values(s)[a.idx()];
        *q += alpha * (reward + gamma * max_next - *q);
    }

    pub fn len(&self) -> usize { self.q.len() }
    pub fn is_empty(&self) -> bool { self.q.is_empty() }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    state: RlState,
    action: Action,
    value: f64,
}

pub struct TabularRl {
    instruments: Instruments,
    params: RlParams,
    prices: RollingSeriesBuffer,
    policy: PolicyState,
    pending: Option<Pending>,
    rng: StdRng,
}

impl TabularRl {
    pub fn new(instruments: Instruments, params: RlParams) -> Self {
        let ma_window = params.ma_window.max(1);
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            instruments,
            prices: RollingSeriesBuffer::new(ma_window),
            params: RlParams { ma_window, ..params },
            policy: PolicyState::default(),
            pending: None,
            rng,
        }
    }

    pub fn policy(&self) -> &PolicyState { &self.policy }

    fn choose(&mut self, s: RlState) -> Action {
        if self.rng.gen::<f64>() < self.params.epsilon {
            Action::ALL[self.rng.gen_range(0..Action::ALL.len())]
        } else {
            self.policy.best(s)
        }
    }
}

impl SignalStrategy for TabularRl {
    fn name(&self) -> &'static str { "rl_tabular" }

    fn instruments(&self) -> &Instruments { &self.instruments }

    fn observe(&mut self, obs: &Observation) -> Result<(), EngineError> {
        let px = quotes(&self.instruments, obs)?[0];
        self.prices.push(px);
        Ok(())
    }

    fn indicators(&self) -> Result<IndicatorSnapshot, EngineError> {
        let win = self.prices.window(self.params.ma_window)?;
        let ma = sma(&win)?;
        Ok(IndicatorSnapshot { mean: Some(ma), ..IndicatorSnapshot::of(win[win.len() - 1]) })
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Decision {
        let Some(ma) = ctx.indicators.mean else { return Decision::Hold };
        let state = (ctx.position, Trend::classify(ctx.indicators.value, ma, self.params.trend_threshold));

        if let Some(p) = self.pending.take() {
            let reward = ctx.portfolio_value - p.value;
            self.policy.update(p.state, p.action, reward, state, self.params.alpha, self.params.gamma);
            debug!(?p.state, ?p.action, reward, q = self.policy.value(p.state, p.action), "q update");
        }

        let action = self.choose(state);
        self.pending = Some(Pending { state, action, value: ctx.portfolio_value });
        action.to_decision(ctx.position)
    }
}
