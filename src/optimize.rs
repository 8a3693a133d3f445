//! Parameter grid search
//!
//! Exhaustive grid optimization with an in-sample/out-of-sample split.
//! Combinations are evaluated in parallel; a combination whose run fails
//! (degenerate parameters, not enough data after warm-up) is dropped and
//! counted rather than aborting the sweep.

use std::collections::BTreeMap;

use indicatif::{ParallelProgressIterator, ProgressStyle};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backtest::evaluate;
use crate::engine::EngineConfig;
use crate::strategy::{StrategyId, StrategySpec};
use crate::types::{LabError, LabResult, PriceBar};

/// Named parameter axes; the search space is their Cartesian product
#[derive(Debug, Clone)]
pub struct ParamGrid {
    pub axes: Vec<(String, Vec<f64>)>,
}

impl ParamGrid {
    pub fn new(axes: Vec<(String, Vec<f64>)>) -> Self {
        ParamGrid { axes }
    }

    /// Enumerate every combination in deterministic (row-major) order
    pub fn combinations(&self) -> Vec<BTreeMap<String, f64>> {
        if self.axes.is_empty() || self.axes.iter().any(|(_, values)| values.is_empty()) {
            return Vec::new();
        }

        self.axes
            .iter()
            .map(|(_, values)| values.iter().copied())
            .multi_cartesian_product()
            .map(|values| {
                self.axes
                    .iter()
                    .map(|(name, _)| name.clone())
                    .zip(values)
                    .collect()
            })
            .collect()
    }
}

/// Stock grid for each strategy, spanning at least two parameters
pub fn default_grid(id: StrategyId) -> ParamGrid {
    let axes = match id {
        StrategyId::BollingerBands => vec![
            ("length".to_string(), vec![10.0, 15.0, 20.0, 25.0, 30.0]),
            ("mult".to_string(), vec![1.5, 2.0, 2.5]),
        ],
        StrategyId::SuperTrend => vec![
            ("period".to_string(), vec![7.0, 10.0, 14.0]),
            ("factor".to_string(), vec![2.0, 3.0, 4.0]),
        ],
        StrategyId::BullMarketSupportBand => vec![
            ("sma_length".to_string(), vec![15.0, 20.0, 25.0]),
            ("ema_length".to_string(), vec![18.0, 21.0, 24.0]),
        ],
        StrategyId::Rsi => vec![
            ("length".to_string(), vec![7.0, 14.0, 21.0]),
            ("oversold".to_string(), vec![20.0, 25.0, 30.0]),
            ("overbought".to_string(), vec![70.0, 75.0, 80.0]),
        ],
        StrategyId::Macd => vec![
            ("fast".to_string(), vec![8.0, 12.0]),
            ("slow".to_string(), vec![21.0, 26.0]),
            ("signal".to_string(), vec![7.0, 9.0]),
        ],
        StrategyId::Confluence => vec![
            ("bb_length".to_string(), vec![15.0, 20.0]),
            ("rsi_length".to_string(), vec![7.0, 14.0]),
        ],
    };
    ParamGrid::new(axes)
}

/// One evaluated parameter combination.
///
/// The plain metric fields hold the out-of-sample run. When the sweep was
/// run with `split == 1.0` there is no held-out segment; the plain fields
/// then hold the full-series run and every `is_*` field is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationEntry {
    pub params: BTreeMap<String, f64>,
    pub return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub num_trades: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_return_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_sharpe_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_max_drawdown_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_win_rate_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_num_trades: Option<usize>,
}

/// Outcome of a full sweep, entries sorted by out-of-sample Sharpe descending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub strategy: String,
    pub split: f64,
    pub train_bars: usize,
    pub test_bars: usize,
    pub entries: Vec<OptimizationEntry>,
    /// Combinations dropped because their run failed
    pub failed_combinations: usize,
}

impl OptimizationReport {
    pub fn best(&self) -> Option<&OptimizationEntry> {
        self.entries.first()
    }
}

/// In-sample Sharpe more than twice the out-of-sample Sharpe
#[derive(Debug, Clone, Serialize)]
pub struct OverfitWarning {
    pub is_sharpe: f64,
    pub oos_sharpe: f64,
    /// `+inf` when the out-of-sample Sharpe is non-positive
    pub ratio: f64,
}

/// Flag an entry whose in-sample performance did not carry over.
///
/// Returns `None` for legacy entries (no held-out segment), for entries
/// whose out-of-sample Sharpe holds up, and for entries that never looked
/// good in-sample to begin with.
pub fn check_overfitting(entry: &OptimizationEntry) -> Option<OverfitWarning> {
    let is_sharpe = entry.is_sharpe_ratio?;
    let oos_sharpe = entry.sharpe_ratio;

    if is_sharpe > 0.0 && is_sharpe > 2.0 * oos_sharpe {
        let ratio = if oos_sharpe <= 0.0 {
            f64::INFINITY
        } else {
            is_sharpe / oos_sharpe
        };
        Some(OverfitWarning {
            is_sharpe,
            oos_sharpe,
            ratio,
        })
    } else {
        None
    }
}

/// Sweep `grid` over `bars` for one strategy.
///
/// The first `ceil(split * n)` bars are the in-sample segment, the rest the
/// out-of-sample segment. `split == 1.0` trains on everything and reports
/// the full-series metrics directly.
pub fn optimize_strategy(
    id: StrategyId,
    bars: &[PriceBar],
    grid: &ParamGrid,
    split: f64,
    config: &EngineConfig,
) -> LabResult<OptimizationReport> {
    if !(split > 0.0 && split <= 1.0) {
        return Err(LabError::InvalidSplit(split));
    }

    let combos = grid.combinations();
    if combos.is_empty() {
        return Err(LabError::EmptyGrid);
    }

    // Parameter names are shared by all combinations, so validating the
    // first one catches unknown names before the sweep starts.
    StrategySpec::with_params(id, &combos[0])?;

    let n = bars.len();
    let train_len = ((split * n as f64).ceil() as usize).min(n);
    let legacy = train_len == n;
    let (train, test) = bars.split_at(train_len);

    info!(
        strategy = %id,
        combinations = combos.len(),
        train_bars = train.len(),
        test_bars = test.len(),
        "starting grid sweep"
    );

    let style = ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} combinations ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let evaluated: Vec<Option<OptimizationEntry>> = combos
        .par_iter()
        .progress_with_style(style)
        .map(|combo| {
            let spec = StrategySpec::with_params(id, combo).ok()?;
            let (train_metrics, _, _) = evaluate(&spec, train, config).ok()?;

            if legacy {
                return Some(OptimizationEntry {
                    params: combo.clone(),
                    return_pct: train_metrics.return_pct,
                    sharpe_ratio: train_metrics.sharpe_ratio,
                    max_drawdown_pct: train_metrics.max_drawdown_pct,
                    win_rate_pct: train_metrics.win_rate_pct,
                    num_trades: train_metrics.num_trades,
                    is_return_pct: None,
                    is_sharpe_ratio: None,
                    is_max_drawdown_pct: None,
                    is_win_rate_pct: None,
                    is_num_trades: None,
                });
            }

            let (test_metrics, _, _) = evaluate(&spec, test, config).ok()?;
            Some(OptimizationEntry {
                params: combo.clone(),
                return_pct: test_metrics.return_pct,
                sharpe_ratio: test_metrics.sharpe_ratio,
                max_drawdown_pct: test_metrics.max_drawdown_pct,
                win_rate_pct: test_metrics.win_rate_pct,
                num_trades: test_metrics.num_trades,
                is_return_pct: Some(train_metrics.return_pct),
                is_sharpe_ratio: Some(train_metrics.sharpe_ratio),
                is_max_drawdown_pct: Some(train_metrics.max_drawdown_pct),
                is_win_rate_pct: Some(train_metrics.win_rate_pct),
                is_num_trades: Some(train_metrics.num_trades),
            })
        })
        .collect();

    let failed_combinations = evaluated.iter().filter(|e| e.is_none()).count();
    if failed_combinations > 0 {
        warn!(
            failed_combinations,
            total = combos.len(),
            "some combinations failed and were dropped"
        );
    }

    let mut entries: Vec<OptimizationEntry> = evaluated.into_iter().flatten().collect();
    entries.sort_by_key(|entry| std::cmp::Reverse(OrderedFloat(entry.sharpe_ratio)));

    Ok(OptimizationReport {
        strategy: id.to_string(),
        split,
        train_bars: train.len(),
        test_bars: test.len(),
        entries,
        failed_combinations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceBar;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bars(n: usize) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.3).sin() * 10.0 + i as f64 * 0.05;
                PriceBar {
                    datetime: start + Duration::days(i as i64),
                    open: c,
                    high: c + 2.0,
                    low: c - 2.0,
                    close: c,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_grid_enumeration_order() {
        let grid = ParamGrid::new(vec![
            ("a".to_string(), vec![1.0, 2.0]),
            ("b".to_string(), vec![10.0, 20.0]),
        ]);
        let combos = grid.combinations();
        assert_eq!(combos.len(), 4);
        assert_eq!(combos[0]["a"], 1.0);
        assert_eq!(combos[0]["b"], 10.0);
        assert_eq!(combos[3]["a"], 2.0);
        assert_eq!(combos[3]["b"], 20.0);
    }

    #[test]
    fn test_empty_axis_yields_no_combinations() {
        let grid = ParamGrid::new(vec![("a".to_string(), vec![])]);
        assert!(grid.combinations().is_empty());
    }

    #[test]
    fn test_invalid_split_rejected() {
        let bars = make_bars(300);
        let grid = default_grid(StrategyId::BollingerBands);
        for split in [0.0, -0.5, 1.5] {
            let err = optimize_strategy(
                StrategyId::BollingerBands,
                &bars,
                &grid,
                split,
                &EngineConfig::default(),
            )
            .unwrap_err();
            assert!(matches!(err, LabError::InvalidSplit(_)));
        }
    }

    #[test]
    fn test_empty_grid_rejected() {
        let bars = make_bars(300);
        let grid = ParamGrid::new(vec![]);
        let err = optimize_strategy(
            StrategyId::BollingerBands,
            &bars,
            &grid,
            0.7,
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LabError::EmptyGrid));
    }

    #[test]
    fn test_unknown_param_rejected_upfront() {
        let bars = make_bars(300);
        let grid = ParamGrid::new(vec![("bogus".to_string(), vec![1.0])]);
        let err = optimize_strategy(
            StrategyId::BollingerBands,
            &bars,
            &grid,
            0.7,
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LabError::UnknownParam { .. }));
    }

    #[test]
    fn test_sweep_sorted_by_oos_sharpe() {
        let bars = make_bars(400);
        let grid = ParamGrid::new(vec![
            ("length".to_string(), vec![10.0, 20.0]),
            ("mult".to_string(), vec![1.5, 2.0]),
        ]);
        let report = optimize_strategy(
            StrategyId::BollingerBands,
            &bars,
            &grid,
            0.7,
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(report.entries.len() + report.failed_combinations, 4);
        for pair in report.entries.windows(2) {
            assert!(pair[0].sharpe_ratio >= pair[1].sharpe_ratio);
        }
        for entry in &report.entries {
            assert!(entry.is_sharpe_ratio.is_some());
        }
    }

    #[test]
    fn test_legacy_split_has_no_insample_fields() {
        let bars = make_bars(300);
        let grid = ParamGrid::new(vec![
            ("length".to_string(), vec![10.0, 20.0]),
            ("mult".to_string(), vec![2.0]),
        ]);
        let report = optimize_strategy(
            StrategyId::BollingerBands,
            &bars,
            &grid,
            1.0,
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(report.test_bars, 0);
        assert!(!report.entries.is_empty());
        for entry in &report.entries {
            assert!(entry.is_sharpe_ratio.is_none());
            assert!(entry.is_return_pct.is_none());
        }
    }

    #[test]
    fn test_check_overfitting_flags_ratio() {
        let entry = OptimizationEntry {
            params: BTreeMap::new(),
            return_pct: 5.0,
            sharpe_ratio: 1.0,
            max_drawdown_pct: 10.0,
            win_rate_pct: 50.0,
            num_trades: 10,
            is_return_pct: Some(20.0),
            is_sharpe_ratio: Some(3.0),
            is_max_drawdown_pct: Some(5.0),
            is_win_rate_pct: Some(70.0),
            is_num_trades: Some(12),
        };
        let warning = check_overfitting(&entry).unwrap();
        assert!((warning.ratio - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_check_overfitting_ok_when_oos_holds_up() {
        let entry = OptimizationEntry {
            params: BTreeMap::new(),
            return_pct: 5.0,
            sharpe_ratio: 1.0,
            max_drawdown_pct: 10.0,
            win_rate_pct: 50.0,
            num_trades: 10,
            is_return_pct: Some(8.0),
            is_sharpe_ratio: Some(1.5),
            is_max_drawdown_pct: Some(8.0),
            is_win_rate_pct: Some(55.0),
            is_num_trades: Some(11),
        };
        assert!(check_overfitting(&entry).is_none());
    }

    #[test]
    fn test_check_overfitting_infinite_ratio() {
        let entry = OptimizationEntry {
            params: BTreeMap::new(),
            return_pct: -2.0,
            sharpe_ratio: -0.5,
            max_drawdown_pct: 15.0,
            win_rate_pct: 30.0,
            num_trades: 8,
            is_return_pct: Some(15.0),
            is_sharpe_ratio: Some(2.0),
            is_max_drawdown_pct: Some(5.0),
            is_win_rate_pct: Some(65.0),
            is_num_trades: Some(10),
        };
        let warning = check_overfitting(&entry).unwrap();
        assert!(warning.ratio.is_infinite());
    }

    #[test]
    fn test_check_overfitting_skips_negative_in_sample() {
        // -1.0 > 2 * -1.0 numerically, but a strategy that lost in-sample
        // was never overfit, just bad
        let entry = OptimizationEntry {
            params: BTreeMap::new(),
            return_pct: -5.0,
            sharpe_ratio: -1.0,
            max_drawdown_pct: 20.0,
            win_rate_pct: 25.0,
            num_trades: 6,
            is_return_pct: Some(-4.0),
            is_sharpe_ratio: Some(-1.0),
            is_max_drawdown_pct: Some(18.0),
            is_win_rate_pct: Some(28.0),
            is_num_trades: Some(7),
        };
        assert!(check_overfitting(&entry).is_none());
    }
}
