//! bybit-intraday: Intraday perpetual-futures trading bot for Bybit
//!
//! This library provides the core components for:
//! - Risk admission and position sizing from strategy signals
//! - Daily-loss circuit breaker and post-loss cooldown
//! - Entry intent lifecycle: market-with-cap and limit-on-retest
//! - Exit ladder: partial take-profits, trailing stops, time stops
//! - Startup reconciliation against exchange positions
//! - Operator control plane with persisted runtime parameters
//! - Structured logging and metrics

pub mod cli;
pub mod config;
pub mod engine;
pub mod execution;
pub mod market;
pub mod risk;
pub mod runtime;
pub mod signal;
pub mod telemetry;
