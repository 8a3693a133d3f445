//! Execution engine
//!
//! Replays a strategy bar-by-bar over an OHLCV series under a fixed
//! capital/commission model, producing the trade ledger and equity curve.
//! The engine owns the position state machine: Enter is honored only while
//! flat, Exit only while long, everything else is ignored.

use chrono::{DateTime, Utc};

use crate::strategy::StrategySpec;
use crate::types::{Action, LabError, LabResult, PositionState, PriceBar, Trade};

/// Capital and commission model for a run
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Commission as a fraction of notional, charged on both legs
    pub commission: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_capital: 100_000.0,
            commission: 0.001,
        }
    }
}

/// Output of a single strategy replay, owned exclusively by the run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
    pub final_equity: f64,
}

struct OpenPosition {
    entry_index: usize,
    entry_cost: f64,
    quantity: f64,
}

/// Replay `spec` over `bars`, trading from `start_bar` onward.
///
/// Orders fill at the signal bar's close. Entries invest the full cash
/// balance; an open position at the end of data is liquidated at the last
/// close. `start_bar` is the effective start after warm-up normalization;
/// the equity curve begins there.
pub fn run(
    spec: &StrategySpec,
    bars: &[PriceBar],
    config: &EngineConfig,
    start_bar: usize,
) -> LabResult<RunOutcome> {
    if bars.len() < 2 || start_bar + 1 >= bars.len() {
        return Err(LabError::InsufficientData {
            needed: start_bar + 2,
            got: bars.len(),
        });
    }

    let actions = spec.actions(bars);

    let mut cash = config.initial_capital;
    let mut state = PositionState::Flat;
    let mut open: Option<OpenPosition> = None;
    let mut trades: Vec<Trade> = Vec::new();
    let mut equity_curve: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(bars.len() - start_bar);

    for i in start_bar..bars.len() {
        let price = bars[i].close;

        match (state, actions[i]) {
            (PositionState::Flat, Action::Enter) => {
                let quantity = cash / (price * (1.0 + config.commission));
                open = Some(OpenPosition {
                    entry_index: i,
                    entry_cost: cash,
                    quantity,
                });
                cash = 0.0;
                state = PositionState::Long;
            }
            (PositionState::Long, Action::Exit) => {
                let position = open.take().expect("long state implies open position");
                cash = close_position(&position, bars, i, config, &mut trades);
                state = PositionState::Flat;
            }
            // Enter while long and Exit while flat are ignored
            _ => {}
        }

        let equity = match &open {
            Some(position) => position.quantity * price,
            None => cash,
        };
        equity_curve.push((bars[i].datetime, equity));
    }

    // Liquidate at the last close so the ledger only holds closed trades
    if let Some(position) = open.take() {
        let last = bars.len() - 1;
        cash = close_position(&position, bars, last, config, &mut trades);
        if let Some(point) = equity_curve.last_mut() {
            point.1 = cash;
        }
    }

    Ok(RunOutcome {
        trades,
        final_equity: cash,
        equity_curve,
    })
}

fn close_position(
    position: &OpenPosition,
    bars: &[PriceBar],
    exit_index: usize,
    config: &EngineConfig,
    trades: &mut Vec<Trade>,
) -> f64 {
    let exit_price = bars[exit_index].close;
    let proceeds = position.quantity * exit_price * (1.0 - config.commission);
    let return_pct = (proceeds / position.entry_cost - 1.0) * 100.0;

    trades.push(Trade {
        entry_index: position.entry_index,
        exit_index,
        entry_time: bars[position.entry_index].datetime,
        exit_time: bars[exit_index].datetime,
        entry_price: bars[position.entry_index].close,
        exit_price,
        size: position.quantity,
        return_pct,
    });

    proceeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyId;
    use crate::types::Action;
    use chrono::{Duration, TimeZone};

    fn make_bars(close: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        close
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                datetime: start + Duration::days(i as i64),
                open: c,
                high: c + 2.0,
                low: c - 2.0,
                close: c,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data_rejected() {
        let bars = make_bars(&[100.0]);
        let spec = StrategySpec::default_for(StrategyId::BollingerBands);
        let err = run(&spec, &bars, &EngineConfig::default(), 0).unwrap_err();
        assert!(matches!(err, LabError::InsufficientData { .. }));
    }

    #[test]
    fn test_no_signal_holds_cash() {
        // Constant closes collapse the bands onto the price, and the strict
        // inequalities never fire
        let bars = make_bars(&vec![100.0; 40]);
        let spec = StrategySpec::default_for(StrategyId::BollingerBands);
        let outcome = run(&spec, &bars, &EngineConfig::default(), 0).unwrap();

        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.final_equity, 100_000.0);
        assert_eq!(outcome.equity_curve.len(), 40);
    }

    #[test]
    fn test_position_state_invariant() {
        // Replay the bollinger breakout strategy over a volatile series and
        // check that every recorded trade alternates entry/exit correctly.
        let mut close = vec![100.0; 30];
        close.extend(vec![130.0; 10]);
        close.extend(vec![70.0; 10]);
        close.extend(vec![140.0; 10]);
        close.extend(vec![60.0; 10]);
        let bars = make_bars(&close);
        let spec = StrategySpec::default_for(StrategyId::BollingerBands);

        let outcome = run(&spec, &bars, &EngineConfig::default(), 0).unwrap();
        assert!(!outcome.trades.is_empty());

        let mut prev_exit = 0;
        for trade in &outcome.trades {
            assert!(trade.entry_index >= prev_exit);
            assert!(trade.exit_index > trade.entry_index);
            prev_exit = trade.exit_index;
        }
    }

    #[test]
    fn test_open_position_liquidated_at_end() {
        // Breakout with no later breakdown: position stays open until the end
        let mut close = vec![100.0; 30];
        close.extend((0..20).map(|i| 120.0 + i as f64));
        let bars = make_bars(&close);
        let spec = StrategySpec::default_for(StrategyId::BollingerBands);

        let outcome = run(&spec, &bars, &EngineConfig::default(), 0).unwrap();
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].exit_index, bars.len() - 1);
        // Final equity reflects the liquidation proceeds
        assert!((outcome.final_equity - outcome.equity_curve.last().unwrap().1).abs() < 1e-9);
        assert!(outcome.final_equity > 100_000.0);
    }

    #[test]
    fn test_commission_reduces_round_trip() {
        let mut close = vec![100.0; 30];
        close.extend(vec![120.0; 5]);
        close.extend(vec![60.0; 5]);
        let bars = make_bars(&close);
        let spec = StrategySpec::default_for(StrategyId::BollingerBands);

        let free = run(
            &spec,
            &bars,
            &EngineConfig {
                commission: 0.0,
                ..Default::default()
            },
            0,
        )
        .unwrap();
        let taxed = run(&spec, &bars, &EngineConfig::default(), 0).unwrap();

        assert!(taxed.final_equity < free.final_equity);
    }

    #[test]
    fn test_actions_in_wrong_state_ignored() {
        let bars = make_bars(&vec![100.0; 10]);
        // Hand-rolled action check through the public surface: the RSI
        // strategy can emit Exit while flat on overbought bars; the engine
        // must not create trades from them.
        let spec = StrategySpec::default_for(StrategyId::Rsi);
        let actions = spec.actions(&bars);
        assert!(actions.iter().all(|a| *a == Action::None));
    }
}
