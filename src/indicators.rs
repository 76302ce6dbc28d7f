// ===============================
// src/indicators.rs
// ===============================
//
// Pure functions over a buffer window (oldest first). Same input, same output;
// nothing here keeps state between calls.
//
use serde::Serialize;

use crate::error::EngineError;
use crate::series::RollingSeriesBuffer;

/// Divisor used for the standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdevKind {
    /// n - 1
    Sample,
    /// n
    Population,
}

/// Values derived for the current tick. Rebuilt every tick, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    /// Value the strategy trades on: price, spread or ratio.
    pub value: f64,
    pub fast_ma: Option<f64>,
    pub slow_ma: Option<f64>,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub upper: Option<f64>,
    pub lower: Option<f64>,
    pub rsi: Option<f64>,
    pub momentum: Option<f64>,
    pub prior_high: Option<f64>,
    pub prior_low: Option<f64>,
    pub hedge_ratio: Option<f64>,
    pub features: Option<Vec<f64>>,
}

impl IndicatorSnapshot {
    pub fn of(value: f64) -> Self { Self { value, ..Default::default() } }
}

fn need(values: &[f64], n: usize) -> Result<(), EngineError> {
    if values.len() < n {
        return Err(EngineError::InsufficientData { need: n, have: values.len() });
    }
    Ok(())
}

pub fn sma(values: &[f64]) -> Result<f64, EngineError> {
    need(values, 1)?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn stdev(values: &[f64], kind: StdevKind) -> Result<f64, EngineError> {
    let min = match kind { StdevKind::Sample => 2, StdevKind::Population => 1 };
    need(values, min)?;
    let mean = sma(values)?;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    let n = match kind {
        StdevKind::Sample => values.len() - 1,
        StdevKind::Population => values.len(),
    };
    Ok((ss / n as f64).sqrt())
}

/// Mean +/- mult * stdev over `values`: (mean, stdev, upper, lower).
pub fn bands(values: &[f64], mult: f64, kind: StdevKind) -> Result<(f64, f64, f64, f64), EngineError> {
    let mean = sma(values)?;
    let sd = stdev(values, kind)?;
    Ok((mean, sd, mean + mult * sd, mean - mult * sd))
}

/// RSI over the last `period` differences (needs period + 1 values).
///
/// Simple averages of gains and losses. With no losses the RSI is 100; with
/// neither gains nor losses (flat series) it is 50.
pub fn rsi(values: &[f64], period: usize) -> Result<f64, EngineError> {
    let period = period.max(1);
    need(values, period + 1)?;
    let tail = &values[values.len() - (period + 1)..];
    let (mut gain, mut loss) = (0.0, 0.0);
    for w in tail.windows(2) {
        let d = w[1] - w[0];
        if d > 0.0 { gain += d } else { loss -= d }
    }
    let avg_gain = gain / period as f64;
    let avg_loss = loss / period as f64;
    if avg_loss == 0.0 {
        return Ok(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

/// Last value minus the first of the trailing `period` values,
/// i.e. `period - 1` ticks back. Needs `period` values.
pub fn momentum(values: &[f64], period: usize) -> Result<f64, EngineError> {
    let period = period.max(1);
    need(values, period)?;
    let last = values[values.len() - 1];
    let first = values[values.len() - period];
    Ok(last - first)
}

/// OLS slope of `y` on `x`: cov(y, x) / var(x), 0 when x does not move.
pub fn hedge_ratio(y: &[f64], x: &[f64]) -> Result<f64, EngineError> {
    let n = y.len().min(x.len());
    need(&y[..n], 2)?;
    let (y, x) = (&y[..n], &x[..n]);
    let my = sma(y)?;
    let mx = sma(x)?;
    let mut cov = 0.0;
    let mut var = 0.0;
    for i in 0..n {
        cov += (y[i] - my) * (x[i] - mx);
        var += (x[i] - mx).powi(2);
    }
    if var == 0.0 {
        return Ok(0.0);
    }
    Ok(cov / var)
}

/// (max, min) of the window.
pub fn high_low(values: &[f64]) -> Result<(f64, f64), EngineError> {
    need(values, 1)?;
    let hi = values.iter().copied().fold(f64::MIN, f64::max);
    let lo = values.iter().copied().fold(f64::MAX, f64::min);
    Ok((hi, lo))
}

/// SMA over the most recent `k` values of a buffer.
pub fn sma_of(buf: &RollingSeriesBuffer, k: usize) -> Result<f64, EngineError> {
    sma(&buf.window(k)?)
}
