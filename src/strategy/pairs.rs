// ===============================
// src/strategy/pairs.rs
// ===============================
//
// PAIRS / SPREAD (two legs, opposite sides)
//   Hedge model: beta = OLS slope of Y on X over the first CALIBRATION ticks,
//                frozen afterwards; spread = Y - beta*X; population stdev.
//   Ratio model: spread = Y / X, no calibration; sample stdev. The ratio at
//                entry takes the place of beta when P&L is computed.
//   Flat: spread > mean + k*sd -> short spread (sell Y, buy X)
//         spread < mean - k*sd -> long spread  (buy Y, sell X)
//   Long spread exits when spread >= mean, short spread when spread <= mean.
//
use tracing::info;

use crate::domain::{Decision, Direction, Observation};
use crate::error::EngineError;
use crate::indicators::{bands, hedge_ratio, IndicatorSnapshot, StdevKind};
use crate::series::RollingSeriesBuffer;

use super::{quotes, DecisionContext, Instruments, SignalStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairsModel { Hedge, Ratio }

impl PairsModel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hedge" | "ols" | "spread" => Some(PairsModel::Hedge),
            "ratio" => Some(PairsModel::Ratio),
            _ => None,
        }
    }
}

pub struct PairsSpread {
    instruments: Instruments,
    model: PairsModel,
    calib_y: RollingSeriesBuffer,
    calib_x: RollingSeriesBuffer,
    beta: Option<f64>,
    spread: RollingSeriesBuffer,
    last_ratio: f64,
    rolling_w: usize,
    threshold: f64,
}

impl PairsSpread {
    pub fn new(
        instruments: Instruments,
        model: PairsModel,
        calibration_w: usize,
        rolling_w: usize,
        threshold: f64,
    ) -> Self {
        let calibration_w = calibration_w.max(2);
        let rolling_w = rolling_w.max(2);
        Self {
            instruments,
            model,
            calib_y: RollingSeriesBuffer::new(calibration_w),
            calib_x: RollingSeriesBuffer::new(calibration_w),
            beta: None,
            spread: RollingSeriesBuffer::new(rolling_w),
            last_ratio: 0.0,
            rolling_w,
            threshold,
        }
    }

    pub fn beta(&self) -> Option<f64> { self.beta }
}

impl SignalStrategy for PairsSpread {
    fn name(&self) -> &'static str { "pairs_spread" }

    fn instruments(&self) -> &Instruments { &self.instruments }

    fn observe(&mut self, obs: &Observation) -> Result<(), EngineError> {
        let q = quotes(&self.instruments, obs)?;
        let (y, x) = (q[0], q[1]);
        self.last_ratio = y / x;
        match self.model {
            PairsModel::Ratio => self.spread.push(y / x),
            PairsModel::Hedge => {
                if self.beta.is_none() {
                    self.calib_y.push(y);
                    self.calib_x.push(x);
                    if self.calib_y.full() {
                        let n = self.calib_y.capacity();
                        let b = hedge_ratio(&self.calib_y.window(n)?, &self.calib_x.window(n)?)?;
                        info!(beta = b, window = n, "hedge ratio estimated");
                        self.beta = Some(b);
                    }
                }
                if let Some(b) = self.beta {
                    self.spread.push(y - b * x);
                }
            }
        }
        Ok(())
    }

    fn indicators(&self) -> Result<IndicatorSnapshot, EngineError> {
        let (hedge, kind) = match self.model {
            PairsModel::Hedge => {
                let b = self.beta.ok_or(EngineError::InsufficientData {
                    need: self.calib_y.capacity(),
                    have: self.calib_y.len(),
                })?;
                (b, StdevKind::Population)
            }
            PairsModel::Ratio => (self.last_ratio, StdevKind::Sample),
        };
        let win = self.spread.window(self.rolling_w)?;
        let (mean, sd, upper, lower) = bands(&win, self.threshold, kind)?;
        Ok(IndicatorSnapshot {
            mean: Some(mean),
            stdev: Some(sd),
            upper: Some(upper),
            lower: Some(lower),
            hedge_ratio: Some(hedge),
            ..IndicatorSnapshot::of(win[win.len() - 1])
        })
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Decision {
        let ind = ctx.indicators;
        let (Some(mean), Some(upper), Some(lower)) = (ind.mean, ind.upper, ind.lower) else {
            return Decision::Hold;
        };
        let s = ind.value;
        match ctx.position.direction() {
            None if s > upper => Decision::Enter(Direction::Short),
            None if s < lower => Decision::Enter(Direction::Long),
            Some(Direction::Long) if s >= mean => Decision::Exit,
            Some(Direction::Short) if s <= mean => Decision::Exit,
            _ => Decision::Hold,
        }
    }
}
