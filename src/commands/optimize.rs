//! Optimize command implementation

use anyhow::Result;
use tracing::info;

use strategy_lab::data::{CsvProvider, PriceProvider};
use strategy_lab::optimize::{check_overfitting, default_grid, optimize_strategy};
use strategy_lab::report;
use strategy_lab::strategy::StrategyId;

pub fn run(
    config_path: String,
    strategy: String,
    symbol: String,
    split_override: Option<f64>,
    top_override: Option<usize>,
) -> Result<()> {
    info!("Starting optimization");

    let config = super::load_config(&config_path)?;
    let id: StrategyId = strategy.parse()?;
    let split = split_override.unwrap_or(config.optimize.split);
    let top = top_override.unwrap_or(config.optimize.top);

    let provider = CsvProvider::new(&config.backtest.data_dir);
    let bars = provider.fetch(&symbol)?;

    let grid = default_grid(id);
    let result = optimize_strategy(id, &bars, &grid, split, &config.engine_config())?;

    println!("\n{}", "=".repeat(100));
    println!(
        "OPTIMIZATION RESULTS: {} on {} (split {:.0}%/{:.0}%)",
        id,
        symbol,
        split * 100.0,
        (1.0 - split) * 100.0
    );
    println!("{}", "=".repeat(100));
    println!(
        "Evaluated {} combinations ({} failed)",
        result.entries.len() + result.failed_combinations,
        result.failed_combinations
    );
    println!(
        "{:<40} {:>10} {:>8} {:>8} {:>10} {:>10}",
        "Params", "Return%", "Sharpe", "MaxDD%", "IS-Ret%", "IS-Sharpe"
    );

    for entry in result.entries.iter().take(top) {
        let params: Vec<String> = entry
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        println!(
            "{:<40} {:>10.2} {:>8.2} {:>8.2} {:>10} {:>10}",
            params.join(" "),
            entry.return_pct,
            entry.sharpe_ratio,
            entry.max_drawdown_pct,
            entry
                .is_return_pct
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "-".to_string()),
            entry
                .is_sharpe_ratio
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    println!("{}", "=".repeat(100));

    if let Some(best) = result.best() {
        if let Some(warning) = check_overfitting(best) {
            println!(
                "WARNING: likely overfit. In-sample Sharpe {:.2} vs out-of-sample {:.2} (ratio {:.1})",
                warning.is_sharpe, warning.oos_sharpe, warning.ratio
            );
        }
    }

    let path = report::results_path(&config.backtest.results_dir, "optimize", "json");
    report::save_json(&result, &path)?;

    info!("Optimization completed successfully");
    Ok(())
}
