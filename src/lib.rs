// ===============================
// src/lib.rs
// ===============================
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod execution;
pub mod feed;
pub mod gateway;      // order sinks: mock + trade API
pub mod indicators;
pub mod metrics;
pub mod pnl;
pub mod positions;
pub mod recorder;
pub mod risk;         // cooldown guard
pub mod series;
pub mod strategy;

#[cfg(test)]
mod testutil;
