// ===============================
// src/execution.rs
// ===============================
//
// Order execution coordinator:
// - every leg of a decision is submitted concurrently (join_all)
// - each leg is bounded by its own timeout
// - the report waits for all legs; no leg's outcome is ever dropped
//
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::time::timeout;
use tracing::debug;

use crate::domain::{Leg, OrderErrorKind, OrderResult};
use crate::error::EngineError;

/// Execution endpoint for single legs. `Ok` carries the executed price.
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit(&self, leg: &Leg) -> Result<f64, OrderErrorKind>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Filled,
    Rejected,
    PartialFill,
}

impl ExecStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ExecStatus::Filled => "filled",
            ExecStatus::Rejected => "rejected",
            ExecStatus::PartialFill => "partial_fill",
        }
    }
}

/// Per-leg results in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub results: Vec<OrderResult>,
}

impl ExecutionReport {
    pub fn status(&self) -> ExecStatus {
        let ok = self.results.iter().filter(|r| r.success).count();
        match ok {
            0 => ExecStatus::Rejected,
            n if n == self.results.len() => ExecStatus::Filled,
            _ => ExecStatus::PartialFill,
        }
    }

    pub fn all_filled(&self) -> bool { self.status() == ExecStatus::Filled }

    pub fn filled(&self) -> Vec<OrderResult> { self.results.iter().filter(|r| r.success).cloned().collect() }

    pub fn failed(&self) -> Vec<OrderResult> { self.results.iter().filter(|r| !r.success).cloned().collect() }

    /// `OrderFailure` when nothing filled, `PartialFill` when some legs did.
    /// Not meaningful for a fully filled report.
    pub fn to_error(&self) -> EngineError {
        match self.status() {
            ExecStatus::PartialFill => EngineError::PartialFill { filled: self.filled(), failed: self.failed() },
            _ => EngineError::OrderFailure(self.failed()),
        }
    }
}

#[derive(Clone)]
pub struct OrderExecutionCoordinator {
    sink: Arc<dyn OrderSink>,
    timeout: Duration,
}

impl OrderExecutionCoordinator {
    pub fn new(sink: Arc<dyn OrderSink>, timeout: Duration) -> Self { Self { sink, timeout } }

    pub async fn execute(&self, legs: Vec<Leg>) -> ExecutionReport {
        let sink = &self.sink;
        let limit = self.timeout;
        let results = join_all(legs.into_iter().map(|leg| async move {
            match timeout(limit, sink.submit(&leg)).await {
                Ok(Ok(px)) => OrderResult::filled(leg, px),
                Ok(Err(e)) => OrderResult::failed(leg, e),
                Err(_) => OrderResult::failed(leg, OrderErrorKind::Timeout),
            }
        }))
        .await;
        let report = ExecutionReport { results };
        debug!(status = report.status().label(), legs = report.results.len(), "execution report");
        report
    }
}
