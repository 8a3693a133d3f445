//! Download command implementation

use anyhow::Result;
use tracing::{error, info};

use strategy_lab::data::YahooDataFetcher;

pub fn run(symbols: String, range: String, output: String) -> Result<()> {
    info!("Starting download");

    let mut fetcher = YahooDataFetcher::new(&output)?;
    fetcher.range = range;

    let symbols: Vec<&str> = symbols.split(',').map(|s| s.trim()).collect();
    let mut failures = 0;

    for symbol in &symbols {
        match fetcher.download_symbol(symbol) {
            Ok(path) => info!("Downloaded {} to {}", symbol, path.display()),
            Err(err) => {
                error!("Failed to download {}: {:#}", symbol, err);
                failures += 1;
            }
        }
    }

    if failures == symbols.len() {
        anyhow::bail!("All {} downloads failed", failures);
    }

    info!(
        "Download completed: {} succeeded, {} failed",
        symbols.len() - failures,
        failures
    );
    Ok(())
}
