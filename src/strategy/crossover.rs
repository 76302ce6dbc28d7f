// ===============================
// src/strategy/crossover.rs
// ===============================
//
// MOVING AVERAGE CROSSOVER (Trend-Following)
//   fast SMA > slow SMA -> Long, fast < slow -> Short, equal -> Hold.
//   Once in a position the opposite inequality flips it in the same tick.
//   FAST_WINDOW=1 turns this into "price vs SMA".
//
// Long-only (trend_following): fast > slow opens Long from Flat,
//   fast < slow closes the Long; never goes Short.
//
use crate::domain::{Decision, Direction, Observation};
use crate::error::EngineError;
use crate::indicators::{sma_of, IndicatorSnapshot};
use crate::series::RollingSeriesBuffer;

use super::{quotes, DecisionContext, Instruments, SignalStrategy};

pub struct Crossover {
    instruments: Instruments,
    prices: RollingSeriesBuffer,
    fast_w: usize,
    slow_w: usize,
    long_only: bool,
}

impl Crossover {
    pub fn new(instruments: Instruments, fast_w: usize, slow_w: usize) -> Self {
        let slow_w = slow_w.max(fast_w).max(1);
        Self { instruments, prices: RollingSeriesBuffer::new(slow_w), fast_w: fast_w.max(1), slow_w, long_only: false }
    }

    pub fn long_only(instruments: Instruments, fast_w: usize, slow_w: usize) -> Self {
        Self { long_only: true, ..Self::new(instruments, fast_w, slow_w) }
    }
}

impl SignalStrategy for Crossover {
    fn name(&self) -> &'static str {
        if self.long_only { "trend_following" } else { "ma_crossover" }
    }

    fn instruments(&self) -> &Instruments { &self.instruments }

    fn observe(&mut self, obs: &Observation) -> Result<(), EngineError> {
        let px = quotes(&self.instruments, obs)?[0];
        self.prices.push(px);
        Ok(())
    }

    fn indicators(&self) -> Result<IndicatorSnapshot, EngineError> {
        let slow = sma_of(&self.prices, self.slow_w)?;
        let fast = sma_of(&self.prices, self.fast_w)?;
        let last = self.prices.last().unwrap_or_default();
        Ok(IndicatorSnapshot { fast_ma: Some(fast), slow_ma: Some(slow), ..IndicatorSnapshot::of(last) })
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Decision {
        let (Some(fast), Some(slow)) = (ctx.indicators.fast_ma, ctx.indicators.slow_ma) else {
            return Decision::Hold;
        };
        let want = if fast > slow {
            Direction::Long
        } else if fast < slow {
            Direction::Short
        } else {
            return Decision::Hold;
        };
        if self.long_only {
            return match (ctx.position.direction(), want) {
                (None, Direction::Long) => Decision::Enter(Direction::Long),
                (Some(Direction::Long), Direction::Short) => Decision::Exit,
                _ => Decision::Hold,
            };
        }
        match ctx.position.direction() {
            None => Decision::Enter(want),
            Some(held) if held != want => Decision::Flip(want),
            Some(_) => Decision::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PositionSide;
    use crate::strategy::testutil::{decide_with, obs};

    fn snap(fast: f64, slow: f64) -> IndicatorSnapshot {
        IndicatorSnapshot { fast_ma: Some(fast), slow_ma: Some(slow), ..IndicatorSnapshot::of(fast) }
    }

    #[test]
    fn enters_long_when_fast_above_slow_and_flat() {
        let mut s = Crossover::new(Instruments::Single("BTC".into()), 10, 50);
        assert_eq!(decide_with(&mut s, &snap(105.0, 100.0), PositionSide::Flat), Decision::Enter(Direction::Long));
        assert_eq!(decide_with(&mut s, &snap(95.0, 100.0), PositionSide::Flat), Decision::Enter(Direction::Short));
    }

    #[test]
    fn flips_on_reversal_and_holds_on_equality() {
        let mut s = Crossover::new(Instruments::Single("BTC".into()), 10, 50);
        assert_eq!(decide_with(&mut s, &snap(95.0, 100.0), PositionSide::Long), Decision::Flip(Direction::Short));
        assert_eq!(decide_with(&mut s, &snap(105.0, 100.0), PositionSide::Short), Decision::Flip(Direction::Long));
        assert_eq!(decide_with(&mut s, &snap(105.0, 100.0), PositionSide::Long), Decision::Hold);
        assert_eq!(decide_with(&mut s, &snap(100.0, 100.0), PositionSide::Flat), Decision::Hold);
        assert_eq!(decide_with(&mut s, &snap(100.0, 100.0), PositionSide::Short), Decision::Hold);
    }

    #[test]
    fn long_only_never_goes_short() {
        let mut s = Crossover::long_only(Instruments::Single("BTC".into()), 10, 50);
        assert_eq!(s.name(), "trend_following");
        assert_eq!(decide_with(&mut s, &snap(105.0, 100.0), PositionSide::Flat), Decision::Enter(Direction::Long));
        assert_eq!(decide_with(&mut s, &snap(95.0, 100.0), PositionSide::Flat), Decision::Hold);
        assert_eq!(decide_with(&mut s, &snap(95.0, 100.0), PositionSide::Long), Decision::Exit);
        assert_eq!(decide_with(&mut s, &snap(105.0, 100.0), PositionSide::Long), Decision::Hold);
        assert_eq!(decide_with(&mut s, &snap(100.0, 100.0), PositionSide::Long), Decision::Hold);
    }

    #[test]
    fn warms_up_until_slow_window_is_filled() {
        let mut s = Crossover::new(Instruments::Single("BTC".into()), 2, 3);
        s.observe(&obs(&[("BTC", 1.0)])).unwrap();
        s.observe(&obs(&[("BTC", 2.0)])).unwrap();
        assert!(matches!(s.indicators(), Err(EngineError::InsufficientData { .. })));
        s.observe(&obs(&[("BTC", 6.0)])).unwrap();
        let snap = s.indicators().unwrap();
        assert_eq!(snap.fast_ma, Some(4.0));
        assert_eq!(snap.slow_ma, Some(3.0));
    }

    #[test]
    fn missing_symbol_leaves_buffer_untouched() {
        let mut s = Crossover::new(Instruments::Single("BTC".into()), 1, 2);
        s.observe(&obs(&[("BTC", 1.0)])).unwrap();
        assert!(matches!(s.observe(&obs(&[("ETH", 1.0)])), Err(EngineError::MissingSymbol(_))));
        assert_eq!(s.prices.len(), 1);
    }
}
