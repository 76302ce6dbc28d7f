// ===============================
// src/strategy/policy.rs
// ===============================
//
// LEARNED POLICY (pretrained, frozen weights)
//   inputs : [price / baseline, tick return, volume / baseline, trades / baseline, in_position]
//   outputs: [hold, buy, sell] -> arg-max
//   Long only: Buy while Flat enters, Sell while Long exits.
//
// The market data endpoint only reports prices, so the volume and trade-count
// inputs stay at their baseline ratio of 1.0.
//
// Weights file (JSON):
//   {"layers": [{"weights": [[..5 inputs..], ...], "biases": [...], "activation": "tanh"}, ...]}
//
use std::path::Path;

use serde::Deserialize;

use crate::domain::{Decision, Direction, Observation, PositionSide};
use crate::error::{ConfigError, EngineError};
use crate::indicators::IndicatorSnapshot;
use crate::series::RollingSeriesBuffer;

use super::{quotes, DecisionContext, Instruments, SignalStrategy};

pub const N_INPUTS: usize = 5;
pub const N_OUTPUTS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Identity,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Identity => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DenseLayer {
    /// One row per output unit.
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedForward {
    pub layers: Vec<DenseLayer>,
}

impl FeedForward {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let net: FeedForward = serde_json::from_str(s).map_err(|e| ConfigError::Policy(e.to_string()))?;
        net.validate()?;
        Ok(net)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Policy(format!("read {}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut width = N_INPUTS;
        for (i, l) in self.layers.iter().enumerate() {
            if l.weights.len() != l.biases.len() {
                return Err(ConfigError::Policy(format!("layer {i}: {} rows vs {} biases", l.weights.len(), l.biases.len())));
            }
            if let Some(row) = l.weights.iter().find(|r| r.len() != width) {
                return Err(ConfigError::Policy(format!("layer {i}: row of {} inputs, expected {width}", row.len())));
            }
            width = l.biases.len();
        }
        if self.layers.is_empty() || width != N_OUTPUTS {
            return Err(ConfigError::Policy(format!("network must end in {N_OUTPUTS} outputs")));
        }
        Ok(())
    }

    pub fn forward(&self, inputs: &[f64]) -> Vec<f64> {
        let mut x = inputs.to_vec();
        for l in &self.layers {
            x = l
                .weights
                .iter()
                .zip(&l.biases)
                .map(|(row, b)| l.activation.apply(row.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>() + b))
                .collect();
        }
        x
    }
}

/// Index of the largest score; earliest wins ties.
fn argmax(v: &[f64]) -> usize {
    let mut best = 0;
    for (i, s) in v.iter().enumerate() {
        if *s > v[best] {
            best = i;
        }
    }
    best
}

pub struct LearnedPolicy {
    instruments: Instruments,
    net: FeedForward,
    baseline: Option<f64>,
    prices: RollingSeriesBuffer,
}

impl LearnedPolicy {
    pub fn new(instruments: Instruments, net: FeedForward) -> Self {
        Self { instruments, net, baseline: None, prices: RollingSeriesBuffer::new(2) }
    }
}

impl SignalStrategy for LearnedPolicy {
    fn name(&self) -> &'static str { "learned_policy" }

    fn instruments(&self) -> &Instruments { &self.instruments }

    fn observe(&mut self, obs: &Observation) -> Result<(), EngineError> {
        let px = quotes(&self.instruments, obs)?[0];
        self.baseline.get_or_insert(px);
        self.prices.push(px);
        Ok(())
    }

    fn indicators(&self) -> Result<IndicatorSnapshot, EngineError> {
        let px = self.prices.last().ok_or(EngineError::InsufficientData { need: 1, have: 0 })?;
        let base = self.baseline.unwrap_or(px);
        let prev = if self.prices.full() { self.prices.window(2)?[0] } else { px };
        let ret = if prev != 0.0 { (px - prev) / prev } else { 0.0 };
        Ok(IndicatorSnapshot { features: Some(vec![px / base, ret, 1.0, 1.0]), ..IndicatorSnapshot::of(px) })
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Decision {
        let Some(features) = ctx.indicators.features.as_ref() else { return Decision::Hold };
        let mut inputs = features.clone();
        inputs.push(if ctx.position == PositionSide::Long { 1.0 } else { 0.0 });
        match (argmax(&self.net.forward(&inputs)), ctx.position) {
            (1, PositionSide::Flat) => Decision::Enter(Direction::Long),
            (2, PositionSide::Long) => Decision::Exit,
            _ => Decision::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testutil::{decide_with, obs};

    // buy when price is above baseline, sell when below; flag input pushes to hold
    const NET: &str = r#"{"layers":[{"weights":[[0,0,0,0,0.5],[10,0,0,0,0],[-10,0,0,0,0]],
        "biases":[0,-10,10],"activation":"identity"}]}"#;

    #[test]
    fn rejects_wrong_shapes() {
        assert!(FeedForward::from_json(r#"{"layers":[{"weights":[[1,2]],"biases":[0]}]}"#).is_err());
        assert!(FeedForward::from_json(r#"{"layers":[]}"#).is_err());
        assert!(FeedForward::from_json(NET).is_ok());
    }

    #[test]
    fn forward_applies_activation() {
        let net = FeedForward::from_json(
            r#"{"layers":[{"weights":[[1,1,1,1,1],[-1,0,0,0,0],[0,0,0,0,0]],"biases":[0,0,0],"activation":"relu"}]}"#,
        )
        .unwrap();
        assert_eq!(net.forward(&[1.0, 1.0, 1.0, 1.0, 1.0]), vec![5.0, 0.0, 0.0]);
    }

    #[test]
    fn features_use_first_price_as_baseline() {
        let mut p = LearnedPolicy::new(Instruments::Single("BTC".into()), FeedForward::from_json(NET).unwrap());
        p.observe(&obs(&[("BTC", 100.0)])).unwrap();
        assert_eq!(p.indicators().unwrap().features, Some(vec![1.0, 0.0, 1.0, 1.0]));
        p.observe(&obs(&[("BTC", 110.0)])).unwrap();
        let f = p.indicators().unwrap().features.unwrap();
        assert!((f[0] - 1.1).abs() < 1e-12);
        assert!((f[1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn long_only_decisions() {
        let mut p = LearnedPolicy::new(Instruments::Single("BTC".into()), FeedForward::from_json(NET).unwrap());
        let up = IndicatorSnapshot { features: Some(vec![1.2, 0.0, 1.0, 1.0]), ..IndicatorSnapshot::of(120.0) };
        let down = IndicatorSnapshot { features: Some(vec![0.8, 0.0, 1.0, 1.0]), ..IndicatorSnapshot::of(80.0) };
        assert_eq!(decide_with(&mut p, &up, PositionSide::Flat), Decision::Enter(Direction::Long));
        assert_eq!(decide_with(&mut p, &up, PositionSide::Long), Decision::Hold);
        assert_eq!(decide_with(&mut p, &down, PositionSide::Long), Decision::Exit);
        assert_eq!(decide_with(&mut p, &down, PositionSide::Flat), Decision::Hold);
    }
}
