//! Risk command implementation

use anyhow::Result;
use tracing::info;

use strategy_lab::backtest::evaluate;
use strategy_lab::data::{CsvProvider, PriceProvider};
use strategy_lab::report;
use strategy_lab::risk::compute_risk_metrics;
use strategy_lab::strategy::{StrategyId, StrategySpec};

pub fn run(config_path: String, strategy: String, symbol: String) -> Result<()> {
    info!("Starting risk analysis");

    let config = super::load_config(&config_path)?;
    let id: StrategyId = strategy.parse()?;

    let provider = CsvProvider::new(&config.backtest.data_dir);
    let bars = provider.fetch(&symbol)?;

    let spec = StrategySpec::default_for(id);
    let (_, outcome, _) = evaluate(&spec, &bars, &config.engine_config())?;

    let equity: Vec<f64> = outcome.equity_curve.iter().map(|(_, v)| *v).collect();
    let result = compute_risk_metrics(&equity);

    println!("\n{}", "=".repeat(60));
    println!("RISK METRICS: {} on {}", id, symbol);
    println!("{}", "=".repeat(60));
    println!("Total return:           {:.2}%", result.total_return_pct);
    println!("Annual return:          {:.2}%", result.annual_return_pct);
    println!("Max drawdown:           {:.2}%", result.max_drawdown_pct);
    println!("Sortino ratio:          {:.3}", result.sortino_ratio);
    println!("Calmar ratio:           {:.3}", result.calmar_ratio);
    println!("Downside deviation:     {:.3}", result.downside_deviation);
    println!("Profit factor:          {:.3}", result.profit_factor);
    println!("Recovery factor:        {:.3}", result.recovery_factor);
    println!("Max consecutive wins:   {}", result.max_consecutive_wins);
    println!("Max consecutive losses: {}", result.max_consecutive_losses);
    println!("{}", "=".repeat(60));

    let path = report::results_path(&config.backtest.results_dir, "risk", "json");
    report::save_json(&result, &path)?;

    info!("Risk analysis completed successfully");
    Ok(())
}
