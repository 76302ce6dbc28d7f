// ===============================
// src/strategy/breakout.rs
// ===============================
//
// RANGE BREAKOUT
//   Level dari N tick sebelumnya (tick sekarang tidak ikut):
//     price > prior high -> Long, price < prior low -> Short.
//   Exit lewat SMA N tick terakhir (termasuk tick sekarang):
//     Long exits when price < SMA, Short exits when price > SMA.
//
use crate::domain::{Decision, Direction, Observation};
use crate::error::EngineError;
use crate::indicators::{high_low, sma, IndicatorSnapshot};
use crate::series::RollingSeriesBuffer;

use super::{quotes, DecisionContext, Instruments, SignalStrategy};

pub struct RangeBreakout {
    instruments: Instruments,
    prices: RollingSeriesBuffer,
    lookback: usize,
}

impl RangeBreakout {
    pub fn new(instruments: Instruments, lookback: usize) -> Self {
        let lookback = lookback.max(1);
        Self { instruments, prices: RollingSeriesBuffer::new(lookback + 1), lookback }
    }
}

impl SignalStrategy for RangeBreakout {
    fn name(&self) -> &'static str { "range_breakout" }

    fn instruments(&self) -> &Instruments { &self.instruments }

    fn observe(&mut self, obs: &Observation) -> Result<(), EngineError> {
        let px = quotes(&self.instruments, obs)?[0];
        self.prices.push(px);
        Ok(())
    }

    fn indicators(&self) -> Result<IndicatorSnapshot, EngineError> {
        let win = self.prices.window(self.lookback + 1)?;
        let (hi, lo) = high_low(&win[..self.lookback])?;
        let ma = sma(&win[1..])?;
        Ok(IndicatorSnapshot {
            prior_high: Some(hi),
            prior_low: Some(lo),
            mean: Some(ma),
            ..IndicatorSnapshot::of(win[self.lookback])
        })
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Decision {
        let ind = ctx.indicators;
        let (Some(hi), Some(lo), Some(ma)) = (ind.prior_high, ind.prior_low, ind.mean) else {
            return Decision::Hold;
        };
        let px = ind.value;
        match ctx.position.direction() {
            None if px > hi => Decision::Enter(Direction::Long),
            None if px < lo => Decision::Enter(Direction::Short),
            Some(Direction::Long) if px < ma => Decision::Exit,
            Some(Direction::Short) if px > ma => Decision::Exit,
            _ => Decision::Hold,
        }
    }
}
