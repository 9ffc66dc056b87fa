//! lotfolio: multi-leg portfolio backtester with FIFO cost basis and
//! deferred capital-gains tax.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
