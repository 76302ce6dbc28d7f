// ===============================
// src/strategy/momentum.rs
// ===============================
//
// Two oscillator-style strategies on a single symbol.
//
// MOMENTUM: m = last price - first price of the trailing N prices
//   (N - 1 ticks back), trades as soon as N prices are in
//   Flat: m > +T -> Long, m < -T -> Short
//   Long exits once m < 0, Short exits once m > 0.
//
// RSI: Flat: rsi < oversold -> Long, rsi > overbought -> Short
//   Long exits when rsi > exit level, Short exits when rsi < exit level.
//
use crate::domain::{Decision, Direction, Observation};
use crate::error::EngineError;
use crate::indicators::{self, IndicatorSnapshot};
use crate::series::RollingSeriesBuffer;

use super::{quotes, DecisionContext, Instruments, SignalStrategy};

pub struct Momentum {
    instruments: Instruments,
    prices: RollingSeriesBuffer,
    period: usize,
    threshold: f64,
}

impl Momentum {
    /// `period` below 2 would always read 0, so it is raised to 2.
    pub fn new(instruments: Instruments, period: usize, threshold: f64) -> Self {
        let period = period.max(2);
        Self { instruments, prices: RollingSeriesBuffer::new(period), period, threshold: threshold.abs() }
    }
}

impl SignalStrategy for Momentum {
    fn name(&self) -> &'static str { "momentum" }

    fn instruments(&self) -> &Instruments { &self.instruments }

    fn observe(&mut self, obs: &Observation) -> Result<(), EngineError> {
        let px = quotes(&self.instruments, obs)?[0];
        self.prices.push(px);
        Ok(())
    }

    fn indicators(&self) -> Result<IndicatorSnapshot, EngineError> {
        let win = self.prices.window(self.period)?;
        let m = indicators::momentum(&win, self.period)?;
        Ok(IndicatorSnapshot { momentum: Some(m), ..IndicatorSnapshot::of(win[win.len() - 1]) })
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Decision {
        let Some(m) = ctx.indicators.momentum else { return Decision::Hold };
        match ctx.position.direction() {
            None if m > self.threshold => Decision::Enter(Direction::Long),
            None if m < -self.threshold => Decision::Enter(Direction::Short),
            Some(Direction::Long) if m < 0.0 => Decision::Exit,
            Some(Direction::Short) if m > 0.0 => Decision::Exit,
            _ => Decision::Hold,
        }
    }
}

pub struct RsiThreshold {
    instruments: Instruments,
    prices: RollingSeriesBuffer,
    period: usize,
    oversold: f64,
    overbought: f64,
    exit_level: f64,
}

impl RsiThreshold {
    pub fn new(instruments: Instruments, period: usize, oversold: f64, overbought: f64, exit_level: f64) -> Self {
        let period = period.max(1);
        Self {
            instruments,
            prices: RollingSeriesBuffer::new(period + 1),
            period,
            oversold,
            overbought,
            exit_level,
        }
    }
}

impl SignalStrategy for RsiThreshold {
    fn name(&self) -> &'static str { "rsi" }

    fn instruments(&self) -> &Instruments { &self.instruments }

    fn observe(&mut self, obs: &Observation) -> Result<(), EngineError> {
        let px = quotes(&self.instruments, obs)?[0];
        self.prices.push(px);
        Ok(())
    }

    fn indicators(&self) -> Result<IndicatorSnapshot, EngineError> {
        let win = self.prices.window(self.period + 1)?;
        let r = indicators::rsi(&win, self.period)?;
        Ok(IndicatorSnapshot { rsi: Some(r), ..IndicatorSnapshot::of(win[win.len() - 1]) })
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Decision {
        let Some(r) = ctx.indicators.rsi else { return Decision::Hold };
        match ctx.position.direction() {
            None if r < self.oversold => Decision::Enter(Direction::Long),
            None if r > self.overbought => Decision::Enter(Direction::Short),
            Some(Direction::Long) if r > self.exit_level => Decision::Exit,
            Some(Direction::Short) if r < self.exit_level => Decision::Exit,
            _ => Decision::Hold,
        }
    }
}
