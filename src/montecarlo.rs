//! Monte Carlo trade resampling
//!
//! Bootstraps the distribution of compounded returns by resampling the
//! closed-trade ledger with replacement. Deterministic for a given seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::info;

use crate::types::{round2, Trade};

pub const DEFAULT_SIMULATIONS: usize = 1000;
pub const DEFAULT_SEED: u64 = 42;

/// Summary of the simulated compounded-return distribution, in percent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloReport {
    pub num_simulations: usize,
    pub num_trades: usize,
    pub seed: u64,
    pub mean_return_pct: f64,
    pub std_return_pct: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    /// Share of simulations ending above zero, 0 to 100
    pub prob_profit_pct: f64,
}

impl MonteCarloReport {
    fn empty(num_simulations: usize, seed: u64) -> Self {
        MonteCarloReport {
            num_simulations,
            num_trades: 0,
            seed,
            mean_return_pct: 0.0,
            std_return_pct: 0.0,
            p5: 0.0,
            p25: 0.0,
            p50: 0.0,
            p75: 0.0,
            p95: 0.0,
            prob_profit_pct: 0.0,
        }
    }
}

/// Linearly interpolated percentile of a sorted sample
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Resample `trades` with replacement `num_simulations` times.
///
/// Each simulation draws as many trades as the original ledger holds and
/// compounds their returns. With an empty ledger every statistic is zero.
pub fn simulate(trades: &[Trade], num_simulations: usize, seed: u64) -> MonteCarloReport {
    if trades.is_empty() || num_simulations == 0 {
        return MonteCarloReport::empty(num_simulations, seed);
    }

    info!(
        num_trades = trades.len(),
        num_simulations, seed, "running Monte Carlo resampling"
    );

    let returns: Vec<f64> = trades.iter().map(|t| t.return_fraction()).collect();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut outcomes: Vec<f64> = Vec::with_capacity(num_simulations);
    for _ in 0..num_simulations {
        let mut compounded = 1.0;
        for _ in 0..returns.len() {
            let pick = rng.gen_range(0..returns.len());
            compounded *= 1.0 + returns[pick];
        }
        outcomes.push((compounded - 1.0) * 100.0);
    }

    let mean = outcomes.iter().mean();
    let std = outcomes.iter().population_std_dev();
    let profitable = outcomes.iter().filter(|&&r| r > 0.0).count();
    let prob_profit_pct = profitable as f64 / outcomes.len() as f64 * 100.0;

    let mut sorted = outcomes;
    sorted.sort_by(|a, b| a.total_cmp(b));

    MonteCarloReport {
        num_simulations,
        num_trades: trades.len(),
        seed,
        mean_return_pct: round2(mean),
        std_return_pct: round2(std),
        p5: round2(percentile(&sorted, 5.0)),
        p25: round2(percentile(&sorted, 25.0)),
        p50: round2(percentile(&sorted, 50.0)),
        p75: round2(percentile(&sorted, 75.0)),
        p95: round2(percentile(&sorted, 95.0)),
        prob_profit_pct: (prob_profit_pct * 10.0).round() / 10.0,
    }
}
