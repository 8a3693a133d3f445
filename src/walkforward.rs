//! Walk-forward analysis
//!
//! Repeated optimize-then-verify over successive train/test windows. Each
//! fold grid-searches the training window (full-series split) and replays
//! the winning parameters on the unseen test window. Parameter stability
//! across folds is scored alongside the aggregate test metrics.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backtest::evaluate;
use crate::engine::EngineConfig;
use crate::optimize::{optimize_strategy, ParamGrid};
use crate::strategy::{StrategyId, StrategySpec};
use crate::types::{round2, LabError, LabResult, PriceBar};

/// Folds with fewer training bars than this are skipped
pub const MIN_TRAIN_BARS: usize = 30;
/// Folds with fewer test bars than this are skipped
pub const MIN_TEST_BARS: usize = 10;

/// Relative parameter change between adjacent folds above this fraction
/// counts as unstable
const STABILITY_TOLERANCE: f64 = 0.5;

/// Window scheme for the walk
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WalkForwardMode {
    /// Split the series into `n_splits` equal segments; each segment is its
    /// own fold, `train_pct` of it used for training
    Sequential { n_splits: usize, train_pct: f64 },
    /// Fixed-size training window sliding forward by `step` bars
    Rolling { train_bars: usize, step: usize },
    /// Training window anchored at bar 0 and growing by `step` bars
    Expanding { step: usize },
}

impl WalkForwardMode {
    /// Build a mode from CLI-style arguments
    pub fn from_cli(
        mode: &str,
        n_splits: usize,
        train_pct: f64,
        train_bars: usize,
        step: usize,
    ) -> LabResult<Self> {
        match mode {
            "sequential" => Ok(WalkForwardMode::Sequential { n_splits, train_pct }),
            "rolling" => Ok(WalkForwardMode::Rolling { train_bars, step }),
            "expanding" => Ok(WalkForwardMode::Expanding { step }),
            other => Err(LabError::UnknownMode(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WalkForwardMode::Sequential { .. } => "sequential",
            WalkForwardMode::Rolling { .. } => "rolling",
            WalkForwardMode::Expanding { .. } => "expanding",
        }
    }

    /// Enumerate (train, test) index ranges over a series of `n` bars.
    /// Windows too small to satisfy the fold minimums are still emitted
    /// here; the runner skips and counts them.
    pub fn windows(&self, n: usize) -> Vec<(Range<usize>, Range<usize>)> {
        let mut out = Vec::new();
        match *self {
            WalkForwardMode::Sequential { n_splits, train_pct } => {
                if n_splits == 0 || !(train_pct > 0.0 && train_pct < 1.0) {
                    return out;
                }
                let chunk = n / n_splits;
                if chunk == 0 {
                    return out;
                }
                for i in 0..n_splits {
                    let start = i * chunk;
                    // Last segment absorbs the remainder
                    let end = if i == n_splits - 1 { n } else { start + chunk };
                    let train_end = start + ((end - start) as f64 * train_pct) as usize;
                    out.push((start..train_end, train_end..end));
                }
            }
            WalkForwardMode::Rolling { train_bars, step } => {
                if train_bars == 0 || step == 0 {
                    return out;
                }
                let mut start = 0;
                while start + train_bars + step <= n {
                    out.push((start..start + train_bars, start + train_bars..start + train_bars + step));
                    start += step;
                }
            }
            WalkForwardMode::Expanding { step } => {
                if step == 0 {
                    return out;
                }
                let mut train_end = step;
                while train_end + step <= n {
                    out.push((0..train_end, train_end..train_end + step));
                    train_end += step;
                }
            }
        }
        out
    }
}

/// One completed optimize-then-verify fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
    pub best_params: BTreeMap<String, f64>,
    pub train_sharpe: f64,
    pub test_return_pct: f64,
    pub test_sharpe: f64,
    pub test_max_drawdown_pct: f64,
    pub test_num_trades: usize,
}

/// A parameter that moved by more than the stability tolerance between
/// adjacent folds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamChange {
    pub fold: usize,
    pub param: String,
    pub previous: f64,
    pub current: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub strategy: String,
    pub mode: String,
    pub folds: Vec<Fold>,
    pub skipped_folds: usize,
    pub avg_test_return_pct: f64,
    pub avg_test_sharpe: f64,
    /// Share of adjacent-fold per-parameter comparisons that held steady,
    /// 0 to 100
    pub stability_score_pct: f64,
    pub unstable_changes: Vec<ParamChange>,
    /// True when no parameter moved outside the tolerance anywhere in the walk
    pub stable: bool,
}

/// Score how consistently the winning parameters repeat across folds.
///
/// Each parameter's selected value is compared between every pair of
/// adjacent folds; a comparison is unstable when the value moves by more
/// than 50% relative to its previous value, or flips between zero and
/// non-zero. The score is the share of stable per-parameter comparisons.
/// A single fold scores 100.
pub fn parameter_stability(folds: &[Fold]) -> (f64, Vec<ParamChange>) {
    if folds.len() < 2 {
        return (100.0, Vec::new());
    }

    let mut changes = Vec::new();
    let mut stable_comparisons = 0usize;
    let mut total_comparisons = 0usize;

    for pair in folds.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);

        for (name, &value) in &curr.best_params {
            total_comparisons += 1;
            let previous = prev.best_params.get(name).copied().unwrap_or(0.0);
            let unstable = if previous == 0.0 {
                value != 0.0
            } else {
                ((value - previous) / previous).abs() > STABILITY_TOLERANCE
            };

            if unstable {
                changes.push(ParamChange {
                    fold: curr.index,
                    param: name.clone(),
                    previous,
                    current: value,
                });
            } else {
                stable_comparisons += 1;
            }
        }
    }

    if total_comparisons == 0 {
        return (100.0, changes);
    }

    let score = stable_comparisons as f64 / total_comparisons as f64 * 100.0;
    (round2(score), changes)
}

/// Walk `grid` forward over `bars` for one strategy.
///
/// Folds whose training window has fewer than [`MIN_TRAIN_BARS`] bars or
/// whose test window has fewer than [`MIN_TEST_BARS`] bars are skipped and
/// counted, as are folds where every grid combination fails.
pub fn run_walk_forward(
    id: StrategyId,
    bars: &[PriceBar],
    grid: &ParamGrid,
    mode: WalkForwardMode,
    config: &EngineConfig,
) -> LabResult<WalkForwardReport> {
    let windows = mode.windows(bars.len());
    info!(
        strategy = %id,
        mode = mode.name(),
        windows = windows.len(),
        total_bars = bars.len(),
        "starting walk-forward"
    );

    let mut folds = Vec::new();
    let mut skipped_folds = 0;

    for (index, (train_range, test_range)) in windows.into_iter().enumerate() {
        if train_range.len() < MIN_TRAIN_BARS || test_range.len() < MIN_TEST_BARS {
            warn!(
                fold = index,
                train_bars = train_range.len(),
                test_bars = test_range.len(),
                "fold too small, skipping"
            );
            skipped_folds += 1;
            continue;
        }

        let train = &bars[train_range.clone()];
        let test = &bars[test_range.clone()];

        let report = match optimize_strategy(id, train, grid, 1.0, config) {
            Ok(report) => report,
            Err(err) => {
                warn!(fold = index, error = %err, "fold optimization failed, skipping");
                skipped_folds += 1;
                continue;
            }
        };

        let best = match report.best() {
            Some(entry) => entry.clone(),
            None => {
                warn!(fold = index, "every combination failed in this fold, skipping");
                skipped_folds += 1;
                continue;
            }
        };

        let spec = StrategySpec::with_params(id, &best.params)?;
        let (test_metrics, _, _) = match evaluate(&spec, test, config) {
            Ok(result) => result,
            Err(err) => {
                warn!(fold = index, error = %err, "test window replay failed, skipping");
                skipped_folds += 1;
                continue;
            }
        };

        folds.push(Fold {
            index,
            train_start: train_range.start,
            train_end: train_range.end,
            test_start: test_range.start,
            test_end: test_range.end,
            best_params: best.params,
            train_sharpe: best.sharpe_ratio,
            test_return_pct: test_metrics.return_pct,
            test_sharpe: test_metrics.sharpe_ratio,
            test_max_drawdown_pct: test_metrics.max_drawdown_pct,
            test_num_trades: test_metrics.num_trades,
        });
    }

    if folds.is_empty() {
        return Err(LabError::InsufficientData {
            needed: MIN_TRAIN_BARS + MIN_TEST_BARS,
            got: bars.len(),
        });
    }

    let avg_test_return_pct =
        folds.iter().map(|f| f.test_return_pct).sum::<f64>() / folds.len() as f64;
    let avg_test_sharpe = folds.iter().map(|f| f.test_sharpe).sum::<f64>() / folds.len() as f64;
    let (stability_score_pct, unstable_changes) = parameter_stability(&folds);

    Ok(WalkForwardReport {
        strategy: id.to_string(),
        mode: mode.name().to_string(),
        folds,
        skipped_folds,
        avg_test_return_pct: round2(avg_test_return_pct),
        avg_test_sharpe: round2(avg_test_sharpe),
        stability_score_pct,
        stable: unstable_changes.is_empty(),
        unstable_changes,
    })
}
