//! Monte Carlo command implementation

use anyhow::Result;
use tracing::info;

use strategy_lab::backtest::evaluate;
use strategy_lab::data::{CsvProvider, PriceProvider};
use strategy_lab::montecarlo::simulate;
use strategy_lab::report;
use strategy_lab::strategy::{StrategyId, StrategySpec};

pub fn run(
    config_path: String,
    strategy: String,
    symbol: String,
    simulations_override: Option<usize>,
    seed_override: Option<u64>,
) -> Result<()> {
    info!("Starting Monte Carlo simulation");

    let config = super::load_config(&config_path)?;
    let id: StrategyId = strategy.parse()?;
    let simulations = simulations_override.unwrap_or(config.monte_carlo.simulations);
    let seed = seed_override.unwrap_or(config.monte_carlo.seed);

    let provider = CsvProvider::new(&config.backtest.data_dir);
    let bars = provider.fetch(&symbol)?;

    let spec = StrategySpec::default_for(id);
    let (_, outcome, _) = evaluate(&spec, &bars, &config.engine_config())?;
    info!("Backtest produced {} trades", outcome.trades.len());

    let result = simulate(&outcome.trades, simulations, seed);

    println!("\n{}", "=".repeat(60));
    println!("MONTE CARLO RESULTS: {} on {}", id, symbol);
    println!("{}", "=".repeat(60));
    println!("Simulations:        {}", result.num_simulations);
    println!("Trades resampled:   {}", result.num_trades);
    println!("Seed:               {}", result.seed);
    println!("Mean return:        {:.2}%", result.mean_return_pct);
    println!("Std deviation:      {:.2}%", result.std_return_pct);
    println!("5th percentile:     {:.2}%", result.p5);
    println!("25th percentile:    {:.2}%", result.p25);
    println!("Median:             {:.2}%", result.p50);
    println!("75th percentile:    {:.2}%", result.p75);
    println!("95th percentile:    {:.2}%", result.p95);
    println!("P(profit):          {:.1}%", result.prob_profit_pct);
    println!("{}", "=".repeat(60));

    let path = report::results_path(&config.backtest.results_dir, "montecarlo", "json");
    report::save_json(&result, &path)?;

    info!("Monte Carlo simulation completed successfully");
    Ok(())
}
