//! Strategy Lab
//!
//! A backtesting and validation engine for technical-indicator trading
//! strategies: six built-in strategies, grid-search parameter optimization,
//! walk-forward analysis, Monte Carlo trade resampling, and risk metrics.

pub mod backtest;
pub mod config;
pub mod data;
pub mod engine;
pub mod indicators;
pub mod montecarlo;
pub mod optimize;
pub mod report;
pub mod risk;
pub mod strategy;
pub mod types;
pub mod walkforward;

pub use config::Config;
pub use types::*;
