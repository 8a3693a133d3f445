//! Walk-forward command implementation

use anyhow::Result;
use tracing::info;

use strategy_lab::data::{CsvProvider, PriceProvider};
use strategy_lab::optimize::default_grid;
use strategy_lab::report;
use strategy_lab::strategy::StrategyId;
use strategy_lab::walkforward::{run_walk_forward, WalkForwardMode};

#[allow(clippy::too_many_arguments)]
pub fn run(
    config_path: String,
    strategy: String,
    symbol: String,
    mode: String,
    n_splits: usize,
    train_pct: f64,
    train_bars: usize,
    step: usize,
) -> Result<()> {
    info!("Starting walk-forward analysis");

    let config = super::load_config(&config_path)?;
    let id: StrategyId = strategy.parse()?;
    let mode = WalkForwardMode::from_cli(&mode, n_splits, train_pct, train_bars, step)?;

    let provider = CsvProvider::new(&config.backtest.data_dir);
    let bars = provider.fetch(&symbol)?;

    let grid = default_grid(id);
    let result = run_walk_forward(id, &bars, &grid, mode, &config.engine_config())?;

    println!("\n{}", "=".repeat(100));
    println!(
        "WALK-FORWARD RESULTS: {} on {} ({} mode)",
        id, symbol, result.mode
    );
    println!("{}", "=".repeat(100));
    println!(
        "{:<5} {:<16} {:<16} {:>10} {:>8} {:>7}  Params",
        "Fold", "Train", "Test", "TestRet%", "Sharpe", "Trades"
    );
    for fold in &result.folds {
        let params: Vec<String> = fold
            .best_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        println!(
            "{:<5} {:<16} {:<16} {:>10.2} {:>8.2} {:>7}  {}",
            fold.index,
            format!("[{}, {})", fold.train_start, fold.train_end),
            format!("[{}, {})", fold.test_start, fold.test_end),
            fold.test_return_pct,
            fold.test_sharpe,
            fold.test_num_trades,
            params.join(" ")
        );
    }
    println!("{}", "=".repeat(100));
    println!("Folds completed:      {} ({} skipped)", result.folds.len(), result.skipped_folds);
    println!("Avg test return:      {:.2}%", result.avg_test_return_pct);
    println!("Avg test Sharpe:      {:.2}", result.avg_test_sharpe);
    println!("Parameter stability:  {:.0}%", result.stability_score_pct);
    for change in &result.unstable_changes {
        println!(
            "  fold {}: {} moved {} -> {}",
            change.fold, change.param, change.previous, change.current
        );
    }

    let path = report::results_path(&config.backtest.results_dir, "walkforward", "json");
    report::save_json(&result, &path)?;

    info!("Walk-forward analysis completed successfully");
    Ok(())
}
