// ===============================
// src/series.rs
// ===============================
//
// Fixed-capacity rolling window. Element i is always one tick older than
// element i+1; the oldest value is evicted first.
//
use std::collections::VecDeque;

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct RollingSeriesBuffer {
    window: VecDeque<f64>,
    cap: usize,
}

impl RollingSeriesBuffer {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { window: VecDeque::with_capacity(cap), cap }
    }

    pub fn push(&mut self, v: f64) {
        if self.window.len() == self.cap {
            self.window.pop_front();
        }
        self.window.push_back(v);
    }

    /// Most recent `k` values, oldest first.
    pub fn window(&self, k: usize) -> Result<Vec<f64>, EngineError> {
        let have = self.window.len();
        if k > have || k == 0 {
            return Err(EngineError::InsufficientData { need: k.max(1), have });
        }
        Ok(self.window.iter().skip(have - k).copied().collect())
    }

    pub fn last(&self) -> Option<f64> { self.window.back().copied() }

    pub fn full(&self) -> bool { self.window.len() == self.cap }
    pub fn len(&self) -> usize { self.window.len() }
    pub fn is_empty(&self) -> bool { self.window.is_empty() }
    pub fn capacity(&self) -> usize { self.cap }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn evicts_oldest_first() {
        let mut b = RollingSeriesBuffer::new(3);
        for v in [10.0, 20.0, 30.0, 40.0] {
            b.push(v);
        }
        assert_eq!(b.window(3).unwrap(), vec![20.0, 30.0, 40.0]);
        assert!(b.full());
    }

    #[test]
    fn window_larger_than_len_is_insufficient() {
        let mut b = RollingSeriesBuffer::new(5);
        b.push(1.0);
        b.push(2.0);
        match b.window(3) {
            Err(EngineError::InsufficientData { need: 3, have: 2 }) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert!(!b.full());
        assert_eq!(b.window(1).unwrap(), vec![2.0]);
    }

    proptest! {
        #[test]
        fn keeps_n_most_recent_in_order(cap in 1usize..32, values in prop::collection::vec(-1e6f64..1e6, 0..200)) {
            let mut b = RollingSeriesBuffer::new(cap);
            for v in &values {
                b.push(*v);
                prop_assert!(b.len() <= cap);
            }
            let expect: Vec<f64> = values.iter().rev().take(cap).rev().copied().collect();
            if !expect.is_empty() {
                prop_assert_eq!(b.window(expect.len()).unwrap(), expect);
            }
        }
    }
}
