// ===============================
// src/strategy/mod.rs
// ===============================
//
// Strategi yang tersedia (pilih via STRATEGY / STRATEGIES):
// - ma_crossover     : fast SMA vs slow SMA, always in the market once warm
// - band_breakout    : Bollinger breakout, exit back through the mean
// - band_reversion   : Bollinger fade, exit on reversion to the mean
// - momentum         : price change over N ticks vs threshold
// - rsi              : RSI oversold / overbought, exit at the mid level
// - range_breakout   : break of prior N-tick high/low, exit through the SMA
// - pairs_spread     : two-leg mean reversion on Y - beta*X (or Y/X)
// - rl_tabular       : epsilon-greedy Q-table over (position, trend)
// - learned_policy   : fixed-weight feed-forward net, long only
//
// Each strategy owns the rolling buffers it needs. The engine calls, per tick:
//   observe(obs) -> indicators() -> decide(ctx)
//
pub mod bands;
pub mod breakout;
pub mod crossover;
pub mod momentum;
pub mod pairs;
pub mod policy;
pub mod rl;

use crate::config::{StrategyMode, StrategyParams};
use crate::domain::{Decision, Observation, PositionSide};
use crate::error::{ConfigError, EngineError};
use crate::indicators::IndicatorSnapshot;

/// What a strategy trades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruments {
    Single(String),
    /// Long spread = buy `y`, sell `x`.
    Pair { y: String, x: String },
}

impl Instruments {
    pub fn symbols(&self) -> Vec<&str> {
        match self {
            Instruments::Single(s) => vec![s.as_str()],
            Instruments::Pair { y, x } => vec![y.as_str(), x.as_str()],
        }
    }

    pub fn is_multi_leg(&self) -> bool { matches!(self, Instruments::Pair { .. }) }
}

/// Everything a strategy may look at when deciding.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub obs: &'a Observation,
    pub indicators: &'a IndicatorSnapshot,
    pub position: PositionSide,
    /// Cash + realized + unrealized, marked at this tick's prices.
    pub portfolio_value: f64,
}

pub trait SignalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn instruments(&self) -> &Instruments;

    /// Records this tick into the strategy's buffers. All symbols are checked
    /// before any buffer is touched, so an error leaves the buffers as they were.
    fn observe(&mut self, obs: &Observation) -> Result<(), EngineError>;

    /// Indicators for the latest observation; `InsufficientData` while warming up.
    fn indicators(&self) -> Result<IndicatorSnapshot, EngineError>;

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Decision;
}

/// Reads every traded symbol from `obs` or fails without side effects.
pub(crate) fn quotes(instruments: &Instruments, obs: &Observation) -> Result<Vec<f64>, EngineError> {
    instruments.symbols().into_iter().map(|s| obs.price(s)).collect()
}

pub fn build(mode: StrategyMode, p: &StrategyParams) -> Result<Box<dyn SignalStrategy>, ConfigError> {
    let single = || Instruments::Single(p.symbol.clone());
    let pair = || Instruments::Pair { y: p.pair_y.clone(), x: p.pair_x.clone() };
    let s: Box<dyn SignalStrategy> = match mode {
        StrategyMode::MACrossover => {
            Box::new(crossover::Crossover::new(single(), p.fast_window, p.slow_window))
        }
        StrategyMode::TrendFollowing => {
            Box::new(crossover::Crossover::long_only(single(), p.fast_window, p.slow_window))
        }
        StrategyMode::BandBreakout => Box::new(bands::Bands::new(
            single(),
            bands::BandMode::Breakout,
            p.band_window,
            p.band_std_mult,
        )),
        StrategyMode::BandReversion => Box::new(bands::Bands::new(
            single(),
            bands::BandMode::Reversion,
            p.band_window,
            p.band_std_mult,
        )),
        StrategyMode::Momentum => Box::new(momentum::Momentum::new(
            single(),
            p.momentum_period,
            p.momentum_threshold,
        )),
        StrategyMode::Rsi => Box::new(momentum::RsiThreshold::new(
            single(),
            p.rsi_period,
            p.rsi_oversold,
            p.rsi_overbought,
            p.rsi_exit,
        )),
        StrategyMode::RangeBreakout => {
            Box::new(breakout::RangeBreakout::new(single(), p.breakout_lookback))
        }
        StrategyMode::PairsSpread => Box::new(pairs::PairsSpread::new(
            pair(),
            p.pairs_model,
            p.pairs_calibration_window,
            p.pairs_rolling_window,
            p.pairs_threshold,
        )),
        StrategyMode::RlTabular => Box::new(rl::TabularRl::new(single(), p.rl.clone())),
        StrategyMode::LearnedPolicy => {
            let path = p.policy_weights_file.as_deref().ok_or_else(|| ConfigError::Invalid {
                key: "POLICY_WEIGHTS_FILE",
                reason: "required for learned_policy".into(),
            })?;
            let net = policy::FeedForward::from_file(path)?;
            Box::new(policy::LearnedPolicy::new(single(), net))
        }
    };
    Ok(s)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;

    pub fn obs(pairs: &[(&str, f64)]) -> Observation {
        let prices: HashMap<String, f64> = pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect();
        Observation::new(Utc::now(), prices)
    }

    pub fn decide_with(
        s: &mut dyn SignalStrategy,
        snap: &IndicatorSnapshot,
        position: PositionSide,
    ) -> Decision {
        let o = obs(&[]);
        s.decide(&DecisionContext { obs: &o, indicators: snap, position, portfolio_value: 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_picks_the_crossover_flavour() {
        let p = StrategyParams::default();
        assert_eq!(build(StrategyMode::MACrossover, &p).unwrap().name(), "ma_crossover");
        assert_eq!(build(StrategyMode::TrendFollowing, &p).unwrap().name(), "trend_following");
        assert!(!build(StrategyMode::TrendFollowing, &p).unwrap().instruments().is_multi_leg());
    }
}
