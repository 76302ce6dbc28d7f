// ===============================
// src/strategy/bands.rs
// ===============================
//
// BOLLINGER BANDS, two flavours over the same indicators:
//   Breakout : price > upper -> Long, price < lower -> Short,
//              exit Long when price < mean, exit Short when price > mean.
//   Reversion: price < lower -> Long, price > upper -> Short,
//              exit Long when price >= mean, exit Short when price <= mean.
// Band width uses the sample stdev.
//
use crate::domain::{Decision, Direction, Observation};
use crate::error::EngineError;
use crate::indicators::{bands, IndicatorSnapshot, StdevKind};
use crate::series::RollingSeriesBuffer;

use super::{quotes, DecisionContext, Instruments, SignalStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandMode { Breakout, Reversion }

pub struct Bands {
    instruments: Instruments,
    mode: BandMode,
    prices: RollingSeriesBuffer,
    w: usize,
    mult: f64,
}

impl Bands {
    pub fn new(instruments: Instruments, mode: BandMode, w: usize, mult: f64) -> Self {
        let w = w.max(2);
        Self { instruments, mode, prices: RollingSeriesBuffer::new(w), w, mult }
    }
}

impl SignalStrategy for Bands {
    fn name(&self) -> &'static str {
        match self.mode {
            BandMode::Breakout => "band_breakout",
            BandMode::Reversion => "band_reversion",
        }
    }

    fn instruments(&self) -> &Instruments { &self.instruments }

    fn observe(&mut self, obs: &Observation) -> Result<(), EngineError> {
        let px = quotes(&self.instruments, obs)?[0];
        self.prices.push(px);
        Ok(())
    }

    fn indicators(&self) -> Result<IndicatorSnapshot, EngineError> {
        let win = self.prices.window(self.w)?;
        let (mean, sd, upper, lower) = bands(&win, self.mult, StdevKind::Sample)?;
        Ok(IndicatorSnapshot {
            mean: Some(mean),
            stdev: Some(sd),
            upper: Some(upper),
            lower: Some(lower),
            ..IndicatorSnapshot::of(win[win.len() - 1])
        })
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Decision {
        let ind = ctx.indicators;
        let (Some(mean), Some(upper), Some(lower)) = (ind.mean, ind.upper, ind.lower) else {
            return Decision::Hold;
        };
        let px = ind.value;
        match (self.mode, ctx.position.direction()) {
            (BandMode::Breakout, None) if px > upper => Decision::Enter(Direction::Long),
            (BandMode::Breakout, None) if px < lower => Decision::Enter(Direction::Short),
            (BandMode::Breakout, Some(Direction::Long)) if px < mean => Decision::Exit,
            (BandMode::Breakout, Some(Direction::Short)) if px > mean => Decision::Exit,
            (BandMode::Reversion, None) if px < lower => Decision::Enter(Direction::Long),
            (BandMode::Reversion, None) if px > upper => Decision::Enter(Direction::Short),
            (BandMode::Reversion, Some(Direction::Long)) if px >= mean => Decision::Exit,
            (BandMode::Reversion, Some(Direction::Short)) if px <= mean => Decision::Exit,
            _ => Decision::Hold,
        }
    }
}
