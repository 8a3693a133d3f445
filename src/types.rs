//! Core data types used across the backtesting engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Library error taxonomy.
///
/// Input errors (unknown strategy, bad split, empty grid, unknown mode) are
/// caller bugs and surface immediately. Per-combination and per-fold failures
/// are caught by the orchestration layers and dropped from aggregates.
#[derive(Debug, Error)]
pub enum LabError {
    #[error("unknown strategy: {0} (available: bollinger-bands, supertrend, bull-market-support-band, rsi, macd, confluence)")]
    UnknownStrategy(String),

    #[error("unknown parameter '{param}' for strategy {strategy}")]
    UnknownParam { strategy: String, param: String },

    #[error("split must be in (0, 1], got {0}")]
    InvalidSplit(f64),

    #[error("parameter grid is empty")]
    EmptyGrid,

    #[error("unknown walk-forward mode: {0} (expected sequential, rolling, or expanding)")]
    UnknownMode(String),

    #[error("insufficient data: {needed} bars required, {got} available")]
    InsufficientData { needed: usize, got: usize },

    #[error("data error: {0}")]
    Data(String),
}

pub type LabResult<T> = Result<T, LabError>;

/// Validation errors for OHLCV bars
#[derive(Debug, Error)]
pub enum BarValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// Daily OHLCV bar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Create a new bar with validation
    pub fn new(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, BarValidationError> {
        let bar = Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    /// Validate the bar data
    pub fn validate(&self) -> Result<(), BarValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(BarValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(BarValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(BarValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(BarValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(BarValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }
}

/// Per-bar strategy decision, before position-state filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Enter,
    Exit,
}

/// Position state owned by the execution engine.
///
/// Transitions: Flat -> Long on Enter while Flat, Long -> Flat on Exit while
/// Long. Actions in the wrong state are ignored (no pyramiding, no shorting).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

/// Closed trade record, immutable once the Long -> Flat transition completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    /// Net return over the trade, commission on both legs included
    pub return_pct: f64,
}

impl Trade {
    /// Trade return as a fraction (0.05 == +5%)
    pub fn return_fraction(&self) -> f64 {
        self.return_pct / 100.0
    }
}

/// Canonical backtest output record.
///
/// Invariant: for a fixed symbol/date-range, `run_all_backtests` reports the
/// same `buy_hold_return_pct` for every strategy because the benchmark is
/// rebased to the common effective window after warm-up normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub strategy: String,
    pub symbol: String,
    pub period: String,
    pub return_pct: f64,
    pub buy_hold_return_pct: f64,
    pub win_rate_pct: f64,
    pub num_trades: usize,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub final_equity: f64,
    pub warmup_bars: usize,
    pub effective_start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultRecord {
    /// Zero-valued record carrying a per-symbol error message
    pub fn failed(strategy: &str, symbol: &str, message: String) -> Self {
        ResultRecord {
            strategy: strategy.to_string(),
            symbol: symbol.to_string(),
            period: String::new(),
            return_pct: 0.0,
            buy_hold_return_pct: 0.0,
            win_rate_pct: 0.0,
            num_trades: 0,
            max_drawdown_pct: 0.0,
            sharpe_ratio: 0.0,
            final_equity: 0.0,
            warmup_bars: 0,
            effective_start: String::new(),
            error: Some(message),
        }
    }
}

/// Round to two decimal places, the precision used by reported metrics
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to three decimal places (risk-metric precision)
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Result<PriceBar, BarValidationError> {
        PriceBar::new(Utc::now(), open, high, low, close, 1000.0)
    }

    #[test]
    fn test_valid_bar() {
        assert!(bar(100.0, 105.0, 95.0, 102.0).is_ok());
    }

    #[test]
    fn test_high_below_low_rejected() {
        let err = bar(100.0, 90.0, 95.0, 92.0).unwrap_err();
        assert!(matches!(err, BarValidationError::HighLessThanLow { .. }));
    }

    #[test]
    fn test_close_outside_range_rejected() {
        let err = bar(100.0, 105.0, 95.0, 110.0).unwrap_err();
        assert!(matches!(err, BarValidationError::CloseOutOfRange { .. }));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(9.876), 9.88);
    }
}
