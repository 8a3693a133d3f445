//! Backtest command implementation

use anyhow::{Context, Result};
use tracing::info;

use strategy_lab::backtest::{run_all_backtests, run_backtest, run_multi_asset};
use strategy_lab::data::{validate_bars, CsvProvider, PriceProvider};
use strategy_lab::strategy::StrategyId;
use strategy_lab::types::ResultRecord;
use strategy_lab::report;

pub fn run(
    config_path: String,
    strategy: Option<String>,
    symbol: String,
    symbols: Option<String>,
    capital_override: Option<f64>,
) -> Result<()> {
    info!("Starting backtest");

    let mut config = super::load_config(&config_path)?;
    if let Some(capital) = capital_override {
        info!("Overriding initial capital to: {:.2}", capital);
        config.trading.initial_capital = capital;
    }

    let engine_config = config.engine_config();
    let provider = CsvProvider::new(&config.backtest.data_dir);

    let records: Vec<ResultRecord> = if let Some(symbols) = symbols {
        let id: StrategyId = strategy
            .context("--symbols requires --strategy")?
            .parse()?;
        let symbols: Vec<String> = symbols.split(',').map(|s| s.trim().to_string()).collect();
        info!("Multi-asset run: {} over {} symbols", id, symbols.len());
        run_multi_asset(id, &provider, &symbols, &engine_config)
    } else {
        let bars = provider.fetch(&symbol)?;
        let validation = validate_bars(&bars);
        if !validation.is_valid() {
            anyhow::bail!("Invalid data for {}: {}", symbol, validation.errors.join("; "));
        }
        for warning in &validation.warnings {
            tracing::warn!("{}", warning);
        }

        match strategy {
            Some(name) => {
                let id: StrategyId = name.parse()?;
                vec![run_backtest(id, &bars, &symbol, &engine_config)?]
            }
            None => run_all_backtests(&bars, &symbol, &engine_config)?,
        }
    };

    println!("\n{}", "=".repeat(100));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(100));
    println!(
        "{:<28} {:<8} {:>10} {:>10} {:>9} {:>7} {:>8} {:>8}",
        "Strategy", "Symbol", "Return%", "BuyHold%", "WinRate%", "Trades", "MaxDD%", "Sharpe"
    );
    for r in &records {
        match &r.error {
            Some(err) => println!("{:<28} {:<8} FAILED: {}", r.strategy, r.symbol, err),
            None => println!(
                "{:<28} {:<8} {:>10.2} {:>10.2} {:>9.2} {:>7} {:>8.2} {:>8.2}",
                r.strategy,
                r.symbol,
                r.return_pct,
                r.buy_hold_return_pct,
                r.win_rate_pct,
                r.num_trades,
                r.max_drawdown_pct,
                r.sharpe_ratio
            ),
        }
    }
    println!("{}", "=".repeat(100));

    let json_path = report::results_path(&config.backtest.results_dir, "backtest", "json");
    report::save_json(&records, &json_path)?;
    let csv_path = report::results_path(&config.backtest.results_dir, "backtest", "csv");
    report::save_records_csv(&records, &csv_path)?;

    info!("Backtest completed successfully");
    Ok(())
}
