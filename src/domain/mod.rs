//! Core domain types and simulation logic.

pub mod lot_ledger;
pub mod tax;
pub mod leg;
pub mod position;
pub mod price_table;
pub mod moving_average;
pub mod schedule;
pub mod rebalance;
pub mod valuation;
pub mod backtest;
pub mod fixed_weight;
pub mod signal_gated;
pub mod metrics;
pub mod config_validation;
pub mod error;
