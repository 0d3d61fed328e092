//! driftbook-rebalancer: command-line front end for the driftbook engine.
//!
//! Reads a portfolio snapshot from JSON, prices public securities from a
//! quote file, restates foreign amounts in the base currency, runs the
//! rebalancing engine, checks the resulting plan, and keeps a JSONL audit
//! trail of every run.

pub mod audit;
pub mod checks;
pub mod config;
pub mod error;
pub mod execution;
pub mod fx;
pub mod portfolio;
pub mod prices;
