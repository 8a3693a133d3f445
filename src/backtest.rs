//! Backtest orchestration
//!
//! Ties the strategy state machines to the execution engine: warm-up
//! normalization, metric extraction into the canonical [`ResultRecord`],
//! the all-strategies comparison run, and the multi-asset batch.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::data::PriceProvider;
use crate::engine::{self, EngineConfig, RunOutcome};
use crate::strategy::{StrategyId, StrategySpec};
use crate::types::{round2, LabError, LabResult, PriceBar, ResultRecord};

/// Symbols used by the multi-asset batch when none are supplied
pub const DEFAULT_ASSETS: [&str; 5] = ["BTC-USD", "ETH-USD", "SPY", "QQQ", "GLD"];

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Unrounded metrics of a single run, shared by the optimizer and the
/// walk-forward harness
#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub num_trades: usize,
    pub final_equity: f64,
}

/// Run a spec over `bars` from its own warm-up boundary and reduce the
/// outcome to metrics. Degenerate parameterizations (indicators that never
/// become defined) surface as errors for the caller to drop.
pub fn evaluate(
    spec: &StrategySpec,
    bars: &[PriceBar],
    config: &EngineConfig,
) -> LabResult<(RunMetrics, RunOutcome, usize)> {
    let warmup = spec.warmup_bars(bars).ok_or(LabError::InsufficientData {
        needed: bars.len() + 1,
        got: bars.len(),
    })?;

    let outcome = engine::run(spec, bars, config, warmup)?;
    let metrics = reduce(&outcome, config.initial_capital);
    Ok((metrics, outcome, warmup))
}

fn reduce(outcome: &RunOutcome, initial_capital: f64) -> RunMetrics {
    let return_pct = (outcome.final_equity / initial_capital - 1.0) * 100.0;

    let winning = outcome
        .trades
        .iter()
        .filter(|t| t.return_pct > 0.0)
        .count();
    let win_rate_pct = if outcome.trades.is_empty() {
        0.0
    } else {
        winning as f64 / outcome.trades.len() as f64 * 100.0
    };

    RunMetrics {
        return_pct,
        sharpe_ratio: sharpe_ratio(&outcome.equity_curve),
        max_drawdown_pct: max_drawdown_pct(&outcome.equity_curve),
        win_rate_pct,
        num_trades: outcome.trades.len(),
        final_equity: outcome.final_equity,
    }
}

/// Annualized Sharpe ratio from a daily equity curve (252 trading days)
pub fn sharpe_ratio(equity_curve: &[(DateTime<Utc>, f64)]) -> f64 {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0].1 != 0.0)
        .map(|w| (w[1].1 - w[0].1) / w[0].1)
        .collect();

    if returns.is_empty() {
        return 0.0;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev > 0.0 {
        mean / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Largest peak-to-trough decline of the equity curve, as a positive pct
pub fn max_drawdown_pct(equity_curve: &[(DateTime<Utc>, f64)]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0;

    for &(_, equity) in equity_curve {
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            let dd = (peak - equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd * 100.0
}

fn build_record(
    spec: &StrategySpec,
    bars: &[PriceBar],
    symbol: &str,
    config: &EngineConfig,
    start_bar: usize,
) -> LabResult<ResultRecord> {
    let outcome = engine::run(spec, bars, config, start_bar)?;
    let metrics = reduce(&outcome, config.initial_capital);

    let effective_close = bars[start_bar].close;
    let buy_hold_return_pct = (bars[bars.len() - 1].close / effective_close - 1.0) * 100.0;

    let period = format!(
        "{} \u{2192} {}",
        bars[0].datetime.format("%Y-%m-%d"),
        bars[bars.len() - 1].datetime.format("%Y-%m-%d")
    );

    Ok(ResultRecord {
        strategy: spec.id().to_string(),
        symbol: symbol.to_string(),
        period,
        return_pct: round2(metrics.return_pct),
        buy_hold_return_pct: round2(buy_hold_return_pct),
        win_rate_pct: round2(metrics.win_rate_pct),
        num_trades: metrics.num_trades,
        max_drawdown_pct: round2(metrics.max_drawdown_pct),
        sharpe_ratio: round2(metrics.sharpe_ratio),
        final_equity: round2(metrics.final_equity),
        warmup_bars: start_bar,
        effective_start: bars[start_bar].datetime.format("%Y-%m-%d").to_string(),
        error: None,
    })
}

/// Backtest one strategy (default parameters) over a price series.
///
/// The buy & hold benchmark and the effective start are rebased to the
/// strategy's own warm-up boundary.
pub fn run_backtest(
    id: StrategyId,
    bars: &[PriceBar],
    symbol: &str,
    config: &EngineConfig,
) -> LabResult<ResultRecord> {
    let spec = StrategySpec::default_for(id);
    let warmup = spec.warmup_bars(bars).ok_or(LabError::InsufficientData {
        needed: bars.len() + 1,
        got: bars.len(),
    })?;
    build_record(&spec, bars, symbol, config, warmup)
}

/// Backtest all six strategies over one series.
///
/// The common effective window starts at the maximum warm-up across all
/// strategies, so every record reports the identical buy & hold return.
pub fn run_all_backtests(
    bars: &[PriceBar],
    symbol: &str,
    config: &EngineConfig,
) -> LabResult<Vec<ResultRecord>> {
    let mut common_warmup = 0;
    for id in StrategyId::ALL {
        let spec = StrategySpec::default_for(id);
        let warmup = spec.warmup_bars(bars).ok_or(LabError::InsufficientData {
            needed: bars.len() + 1,
            got: bars.len(),
        })?;
        common_warmup = common_warmup.max(warmup);
    }

    info!(
        common_warmup,
        total_bars = bars.len(),
        "running all strategies over the common effective window"
    );

    let mut records = Vec::with_capacity(StrategyId::ALL.len());
    for id in StrategyId::ALL {
        let spec = StrategySpec::default_for(id);
        records.push(build_record(&spec, bars, symbol, config, common_warmup)?);
    }
    Ok(records)
}

/// Backtest one strategy across a basket of symbols.
///
/// Provider or run failure for one symbol yields an error record with
/// zeroed metrics; the batch continues.
pub fn run_multi_asset(
    id: StrategyId,
    provider: &dyn PriceProvider,
    symbols: &[String],
    config: &EngineConfig,
) -> Vec<ResultRecord> {
    let mut records = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        let result = provider
            .fetch(symbol)
            .and_then(|bars| run_backtest(id, &bars, symbol, config));

        match result {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "symbol failed, continuing batch");
                records.push(ResultRecord::failed(id.as_str(), symbol, err.to_string()));
            }
        }
    }

    records
}
