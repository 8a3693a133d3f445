//! Risk metrics
//!
//! Derived from the daily equity curve: downside-adjusted ratios, drawdown
//! recovery, and win/loss streaks. A curve with fewer than two usable
//! returns yields an all-zero report.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::types::{round2, round3};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub total_return_pct: f64,
    /// Geometric annualized return
    pub annual_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    /// Annualized sample standard deviation of negative daily returns
    pub downside_deviation: f64,
    pub profit_factor: f64,
    pub recovery_factor: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl RiskReport {
    fn zero() -> Self {
        RiskReport {
            total_return_pct: 0.0,
            annual_return_pct: 0.0,
            max_drawdown_pct: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            downside_deviation: 0.0,
            profit_factor: 0.0,
            recovery_factor: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
        }
    }
}

fn daily_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

fn max_drawdown_fraction(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

fn streaks(returns: &[f64]) -> (usize, usize) {
    let mut max_wins = 0;
    let mut max_losses = 0;
    let mut wins = 0;
    let mut losses = 0;

    for &r in returns {
        if r > 0.0 {
            wins += 1;
            losses = 0;
        } else if r < 0.0 {
            losses += 1;
            wins = 0;
        } else {
            wins = 0;
            losses = 0;
        }
        max_wins = max_wins.max(wins);
        max_losses = max_losses.max(losses);
    }

    (max_wins, max_losses)
}

/// Compute the full risk profile of an equity curve
pub fn compute_risk_metrics(equity: &[f64]) -> RiskReport {
    let returns = daily_returns(equity);
    if returns.len() < 2 {
        return RiskReport::zero();
    }

    let total_return = equity[equity.len() - 1] / equity[0] - 1.0;
    let years = returns.len() as f64 / TRADING_DAYS_PER_YEAR;
    let annual_return = if 1.0 + total_return > 0.0 {
        (1.0 + total_return).powf(1.0 / years) - 1.0
    } else {
        -1.0
    };

    let max_dd = max_drawdown_fraction(equity);

    let mean_return = returns.iter().mean();
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    let downside_dev = if downside.len() >= 2 {
        downside.iter().std_dev() * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let sortino = if downside_dev > 0.0 {
        mean_return * TRADING_DAYS_PER_YEAR / downside_dev
    } else {
        0.0
    };

    let calmar = if max_dd > 0.0 { annual_return / max_dd } else { 0.0 };

    let gross_wins: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
    let gross_losses: f64 = -returns.iter().filter(|&&r| r < 0.0).sum::<f64>();
    // No losing periods means the factor is unbounded regardless of wins
    let profit_factor = if gross_losses > 0.0 {
        gross_wins / gross_losses
    } else {
        f64::INFINITY
    };

    let recovery_factor = if max_dd > 0.0 {
        total_return / max_dd
    } else {
        0.0
    };

    let (max_consecutive_wins, max_consecutive_losses) = streaks(&returns);

    RiskReport {
        total_return_pct: round2(total_return * 100.0),
        annual_return_pct: round2(annual_return * 100.0),
        max_drawdown_pct: round2(max_dd * 100.0),
        sortino_ratio: round3(sortino),
        calmar_ratio: round3(calmar),
        downside_deviation: round3(downside_dev),
        profit_factor: if profit_factor.is_finite() {
            round3(profit_factor)
        } else {
            profit_factor
        },
        recovery_factor: round3(recovery_factor),
        max_consecutive_wins,
        max_consecutive_losses,
    }
}
