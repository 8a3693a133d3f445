//! Configuration management
//!
//! JSON configuration files with sensible defaults; every section may be
//! omitted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::engine::EngineConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub optimize: OptimizeConfig,
    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        Ok(config)
    }

    /// Capital/commission model for the execution engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.trading.initial_capital,
            commission: self.backtest.commission,
        }
    }
}

/// Trading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub symbols: Vec<String>,
    /// Initial capital in the same currency as the price data
    pub initial_capital: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            symbols: crate::backtest::DEFAULT_ASSETS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            initial_capital: 100_000.0,
        }
    }
}

/// Backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub data_dir: String,
    pub results_dir: String,
    /// Commission as a fraction of notional, both legs
    pub commission: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            data_dir: "data".to_string(),
            results_dir: "results".to_string(),
            commission: 0.001,
        }
    }
}

/// Optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeConfig {
    /// In-sample share of the series, in (0, 1]
    pub split: f64,
    /// Number of top entries to display
    pub top: usize,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        OptimizeConfig { split: 0.7, top: 10 }
    }
}

/// Monte Carlo configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub simulations: usize,
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        MonteCarloConfig {
            simulations: crate::montecarlo::DEFAULT_SIMULATIONS,
            seed: crate::montecarlo::DEFAULT_SEED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.trading.initial_capital, 100_000.0);
        assert_eq!(config.backtest.commission, 0.001);
        assert_eq!(config.optimize.split, 0.7);
        assert_eq!(config.monte_carlo.seed, 42);
        assert_eq!(config.trading.symbols.len(), 5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "trading": { "symbols": ["BTC-USD"], "initial_capital": 50000.0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.trading.initial_capital, 50_000.0);
        assert_eq!(config.trading.symbols, vec!["BTC-USD".to_string()]);
        assert_eq!(config.backtest.data_dir, "data");
        assert_eq!(config.monte_carlo.simulations, 1000);
    }

    #[test]
    fn test_engine_config_mapping() {
        let config = Config::default();
        let engine = config.engine_config();
        assert_eq!(engine.initial_capital, 100_000.0);
        assert_eq!(engine.commission, 0.001);
    }
}
