//! CLI command implementations

use anyhow::Result;
use std::path::Path;
use tracing::info;

use strategy_lab::Config;

pub mod backtest;
pub mod download;
pub mod montecarlo;
pub mod optimize;
pub mod risk;
pub mod walkforward;

/// Load the config file, falling back to defaults when it does not exist
pub(crate) fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        let config = Config::from_file(path)?;
        info!("Loaded configuration from: {}", path);
        Ok(config)
    } else {
        info!("Config file {} not found, using defaults", path);
        Ok(Config::default())
    }
}
