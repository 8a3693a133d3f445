//! Strategy definitions
//!
//! The six supported strategies as a closed enum. Each variant carries its
//! own parameter struct and turns indicator series into a per-bar
//! [`Action`]. Position state is owned by the execution engine, so the
//! evaluation here is a pure function of the price series.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::indicators::{
    bollinger, macd_line, macd_signal, rsi, sma, supertrend_direction, weekly_ema, weekly_sma,
};
use crate::types::{Action, LabError, LabResult, PriceBar};

/// Fixed registry of strategy identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyId {
    BollingerBands,
    SuperTrend,
    BullMarketSupportBand,
    Rsi,
    Macd,
    Confluence,
}

impl StrategyId {
    pub const ALL: [StrategyId; 6] = [
        StrategyId::BollingerBands,
        StrategyId::SuperTrend,
        StrategyId::BullMarketSupportBand,
        StrategyId::Rsi,
        StrategyId::Macd,
        StrategyId::Confluence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::BollingerBands => "bollinger-bands",
            StrategyId::SuperTrend => "supertrend",
            StrategyId::BullMarketSupportBand => "bull-market-support-band",
            StrategyId::Rsi => "rsi",
            StrategyId::Macd => "macd",
            StrategyId::Confluence => "confluence",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bollinger-bands" => Ok(StrategyId::BollingerBands),
            "supertrend" => Ok(StrategyId::SuperTrend),
            "bull-market-support-band" => Ok(StrategyId::BullMarketSupportBand),
            "rsi" => Ok(StrategyId::Rsi),
            "macd" => Ok(StrategyId::Macd),
            "confluence" => Ok(StrategyId::Confluence),
            other => Err(LabError::UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BollingerParams {
    pub length: usize,
    pub mult: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        BollingerParams {
            length: 20,
            mult: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuperTrendParams {
    pub period: usize,
    pub factor: f64,
}

impl Default for SuperTrendParams {
    fn default() -> Self {
        SuperTrendParams {
            period: 10,
            factor: 3.0,
        }
    }
}

/// Weekly 20 SMA / 21 EMA pair, approximated on daily bars (5 days per week)
#[derive(Debug, Clone)]
pub struct BmsbParams {
    pub sma_length: usize,
    pub ema_length: usize,
}

impl Default for BmsbParams {
    fn default() -> Self {
        BmsbParams {
            sma_length: 20,
            ema_length: 21,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RsiParams {
    pub length: usize,
    pub oversold: f64,
    pub overbought: f64,
    /// Long-only trend filter: entries require close above this SMA
    pub sma_filter: usize,
}

impl Default for RsiParams {
    fn default() -> Self {
        RsiParams {
            length: 14,
            oversold: 30.0,
            overbought: 70.0,
            sma_filter: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        MacdParams {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfluenceParams {
    pub bb_length: usize,
    pub bb_mult: f64,
    pub rsi_length: usize,
}

impl Default for ConfluenceParams {
    fn default() -> Self {
        ConfluenceParams {
            bb_length: 20,
            bb_mult: 2.0,
            rsi_length: 14,
        }
    }
}

/// RSI ceiling for confluence entries and floor for confluence exits
const CONFLUENCE_RSI_ENTRY_MAX: f64 = 70.0;
const CONFLUENCE_RSI_EXIT_MIN: f64 = 80.0;

/// A fully parameterized strategy instance
#[derive(Debug, Clone)]
pub enum StrategySpec {
    BollingerBands(BollingerParams),
    SuperTrend(SuperTrendParams),
    BullMarketSupportBand(BmsbParams),
    Rsi(RsiParams),
    Macd(MacdParams),
    Confluence(ConfluenceParams),
}

impl StrategySpec {
    /// Default parameterization for a strategy id
    pub fn default_for(id: StrategyId) -> Self {
        match id {
            StrategyId::BollingerBands => StrategySpec::BollingerBands(BollingerParams::default()),
            StrategyId::SuperTrend => StrategySpec::SuperTrend(SuperTrendParams::default()),
            StrategyId::BullMarketSupportBand => {
                StrategySpec::BullMarketSupportBand(BmsbParams::default())
            }
            StrategyId::Rsi => StrategySpec::Rsi(RsiParams::default()),
            StrategyId::Macd => StrategySpec::Macd(MacdParams::default()),
            StrategyId::Confluence => StrategySpec::Confluence(ConfluenceParams::default()),
        }
    }

    /// Build a spec from defaults with named overrides.
    /// Integer-valued parameters are rounded from the supplied f64; an
    /// unrecognized name is an input error.
    pub fn with_params(id: StrategyId, params: &BTreeMap<String, f64>) -> LabResult<Self> {
        let mut spec = Self::default_for(id);
        for (name, &value) in params {
            spec.set_param(name, value)?;
        }
        Ok(spec)
    }

    fn set_param(&mut self, name: &str, value: f64) -> LabResult<()> {
        let as_len = |v: f64| v.round().max(0.0) as usize;
        let found = match self {
            StrategySpec::BollingerBands(p) => match name {
                "length" => {
                    p.length = as_len(value);
                    true
                }
                "mult" => {
                    p.mult = value;
                    true
                }
                _ => false,
            },
            StrategySpec::SuperTrend(p) => match name {
                "period" => {
                    p.period = as_len(value);
                    true
                }
                "factor" => {
                    p.factor = value;
                    true
                }
                _ => false,
            },
            StrategySpec::BullMarketSupportBand(p) => match name {
                "sma_length" => {
                    p.sma_length = as_len(value);
                    true
                }
                "ema_length" => {
                    p.ema_length = as_len(value);
                    true
                }
                _ => false,
            },
            StrategySpec::Rsi(p) => match name {
                "length" => {
                    p.length = as_len(value);
                    true
                }
                "oversold" => {
                    p.oversold = value;
                    true
                }
                "overbought" => {
                    p.overbought = value;
                    true
                }
                "sma_filter" => {
                    p.sma_filter = as_len(value);
                    true
                }
                _ => false,
            },
            StrategySpec::Macd(p) => match name {
                "fast" => {
                    p.fast = as_len(value);
                    true
                }
                "slow" => {
                    p.slow = as_len(value);
                    true
                }
                "signal" => {
                    p.signal = as_len(value);
                    true
                }
                _ => false,
            },
            StrategySpec::Confluence(p) => match name {
                "bb_length" => {
                    p.bb_length = as_len(value);
                    true
                }
                "bb_mult" => {
                    p.bb_mult = value;
                    true
                }
                "rsi_length" => {
                    p.rsi_length = as_len(value);
                    true
                }
                _ => false,
            },
        };

        if found {
            Ok(())
        } else {
            Err(LabError::UnknownParam {
                strategy: self.id().to_string(),
                param: name.to_string(),
            })
        }
    }

    pub fn id(&self) -> StrategyId {
        match self {
            StrategySpec::BollingerBands(_) => StrategyId::BollingerBands,
            StrategySpec::SuperTrend(_) => StrategyId::SuperTrend,
            StrategySpec::BullMarketSupportBand(_) => StrategyId::BullMarketSupportBand,
            StrategySpec::Rsi(_) => StrategyId::Rsi,
            StrategySpec::Macd(_) => StrategyId::Macd,
            StrategySpec::Confluence(_) => StrategyId::Confluence,
        }
    }

    /// Current parameter values by name (for result records and reports)
    pub fn params(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        match self {
            StrategySpec::BollingerBands(p) => {
                map.insert("length".to_string(), p.length as f64);
                map.insert("mult".to_string(), p.mult);
            }
            StrategySpec::SuperTrend(p) => {
                map.insert("period".to_string(), p.period as f64);
                map.insert("factor".to_string(), p.factor);
            }
            StrategySpec::BullMarketSupportBand(p) => {
                map.insert("sma_length".to_string(), p.sma_length as f64);
                map.insert("ema_length".to_string(), p.ema_length as f64);
            }
            StrategySpec::Rsi(p) => {
                map.insert("length".to_string(), p.length as f64);
                map.insert("oversold".to_string(), p.oversold);
                map.insert("overbought".to_string(), p.overbought);
                map.insert("sma_filter".to_string(), p.sma_filter as f64);
            }
            StrategySpec::Macd(p) => {
                map.insert("fast".to_string(), p.fast as f64);
                map.insert("slow".to_string(), p.slow as f64);
                map.insert("signal".to_string(), p.signal as f64);
            }
            StrategySpec::Confluence(p) => {
                map.insert("bb_length".to_string(), p.bb_length as f64);
                map.insert("bb_mult".to_string(), p.bb_mult);
                map.insert("rsi_length".to_string(), p.rsi_length as f64);
            }
        }
        map
    }

    /// Index of the first bar at which every indicator this strategy depends
    /// on has a defined value; `None` if the series never warms up.
    pub fn warmup_bars(&self, bars: &[PriceBar]) -> Option<usize> {
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();

        match self {
            StrategySpec::BollingerBands(p) => {
                let (upper, _, _) = bollinger(&close, p.length, p.mult);
                first_defined(&upper)
            }
            StrategySpec::SuperTrend(p) => {
                let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
                let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
                let direction = supertrend_direction(&high, &low, &close, p.period, p.factor);
                first_defined(&direction)
            }
            StrategySpec::BullMarketSupportBand(p) => {
                let s = weekly_sma(&close, p.sma_length);
                let e = weekly_ema(&close, p.ema_length);
                max_warmup([first_defined(&s), first_defined(&e)])
            }
            StrategySpec::Rsi(p) => {
                let r = rsi(&close, p.length);
                let filter = sma(&close, p.sma_filter);
                max_warmup([first_defined(&r), first_defined(&filter)])
            }
            StrategySpec::Macd(p) => {
                let signal = macd_signal(&close, p.fast, p.slow, p.signal);
                first_defined(&signal)
            }
            StrategySpec::Confluence(p) => {
                let (upper, _, _) = bollinger(&close, p.bb_length, p.bb_mult);
                let r = rsi(&close, p.rsi_length);
                let macd = MacdParams::default();
                let signal = macd_signal(&close, macd.fast, macd.slow, macd.signal);
                max_warmup([
                    first_defined(&upper),
                    first_defined(&r),
                    first_defined(&signal),
                ])
            }
        }
    }

    /// Evaluate the desired action at every bar.
    ///
    /// Crossover events fire only on the bar where the ordering strictly
    /// changes relative to the previous bar; they do not re-fire while the
    /// crossed state persists.
    pub fn actions(&self, bars: &[PriceBar]) -> Vec<Action> {
        let n = bars.len();
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mut actions = vec![Action::None; n];

        match self {
            StrategySpec::BollingerBands(p) => {
                let (upper, _, lower) = bollinger(&close, p.length, p.mult);
                for i in 0..n {
                    if let (Some(u), Some(l)) = (upper[i], lower[i]) {
                        if close[i] > u {
                            actions[i] = Action::Enter;
                        } else if close[i] < l {
                            actions[i] = Action::Exit;
                        }
                    }
                }
            }
            StrategySpec::SuperTrend(p) => {
                let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
                let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
                let direction = supertrend_direction(&high, &low, &close, p.period, p.factor);
                for i in 1..n {
                    match (direction[i - 1], direction[i]) {
                        (Some(-1), Some(1)) => actions[i] = Action::Enter,
                        (Some(1), Some(-1)) => actions[i] = Action::Exit,
                        _ => {}
                    }
                }
            }
            StrategySpec::BullMarketSupportBand(p) => {
                let s = weekly_sma(&close, p.sma_length);
                let e = weekly_ema(&close, p.ema_length);
                for i in 1..n {
                    if crossed_above(&e, &s, i) {
                        actions[i] = Action::Enter;
                    } else if crossed_above(&s, &e, i) {
                        actions[i] = Action::Exit;
                    }
                }
            }
            StrategySpec::Rsi(p) => {
                let r = rsi(&close, p.length);
                let filter = sma(&close, p.sma_filter);
                for i in 0..n {
                    let Some(rv) = r[i] else { continue };
                    if rv > p.overbought {
                        actions[i] = Action::Exit;
                    } else if rv < p.oversold {
                        if let Some(f) = filter[i] {
                            if close[i] > f {
                                actions[i] = Action::Enter;
                            }
                        }
                    }
                }
            }
            StrategySpec::Macd(p) => {
                let line = macd_line(&close, p.fast, p.slow);
                let signal = macd_signal(&close, p.fast, p.slow, p.signal);
                for i in 1..n {
                    if crossed_above(&line, &signal, i) {
                        actions[i] = Action::Enter;
                    } else if crossed_above(&signal, &line, i) {
                        actions[i] = Action::Exit;
                    }
                }
            }
            StrategySpec::Confluence(p) => {
                let (upper, _, lower) = bollinger(&close, p.bb_length, p.bb_mult);
                let r = rsi(&close, p.rsi_length);
                let macd = MacdParams::default();
                let line = macd_line(&close, macd.fast, macd.slow);
                let signal = macd_signal(&close, macd.fast, macd.slow, macd.signal);

                for i in 0..n {
                    let exit_band = matches!(lower[i], Some(l) if close[i] < l);
                    let exit_rsi = matches!(r[i], Some(rv) if rv > CONFLUENCE_RSI_EXIT_MIN);
                    if exit_band || exit_rsi {
                        actions[i] = Action::Exit;
                        continue;
                    }

                    if let (Some(u), Some(rv), Some(ml), Some(ms)) =
                        (upper[i], r[i], line[i], signal[i])
                    {
                        if close[i] > u && rv < CONFLUENCE_RSI_ENTRY_MAX && ml > ms {
                            actions[i] = Action::Enter;
                        }
                    }
                }
            }
        }

        actions
    }
}

/// Strict crossover: `a` was below `b` on the previous bar and is above it now
fn crossed_above(a: &[Option<f64>], b: &[Option<f64>], i: usize) -> bool {
    if i == 0 {
        return false;
    }
    match (a[i - 1], b[i - 1], a[i], b[i]) {
        (Some(ap), Some(bp), Some(ac), Some(bc)) => ap < bp && ac > bc,
        _ => false,
    }
}

fn first_defined<T>(series: &[Option<T>]) -> Option<usize> {
    series.iter().position(|v| v.is_some())
}

fn max_warmup<const N: usize>(warmups: [Option<usize>; N]) -> Option<usize> {
    let mut max = 0;
    for w in warmups {
        max = max.max(w?);
    }
    Some(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bars(close: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        close
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                datetime: start + Duration::days(i as i64),
                open: c - 0.5,
                high: c + 2.0,
                low: c - 2.0,
                close: c,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_registry_roundtrip() {
        for id in StrategyId::ALL {
            assert_eq!(id.as_str().parse::<StrategyId>().unwrap(), id);
        }
        assert!("momentum".parse::<StrategyId>().is_err());
    }

    #[test]
    fn test_with_params_override() {
        let mut params = BTreeMap::new();
        params.insert("length".to_string(), 10.0);
        params.insert("mult".to_string(), 1.5);
        let spec = StrategySpec::with_params(StrategyId::BollingerBands, &params).unwrap();
        match spec {
            StrategySpec::BollingerBands(p) => {
                assert_eq!(p.length, 10);
                assert_eq!(p.mult, 1.5);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_with_params_unknown_name() {
        let mut params = BTreeMap::new();
        params.insert("window".to_string(), 10.0);
        let err = StrategySpec::with_params(StrategyId::BollingerBands, &params).unwrap_err();
        assert!(matches!(err, LabError::UnknownParam { .. }));
    }

    #[test]
    fn test_bollinger_enter_on_breakout() {
        // Flat at 100, spike to 120: close jumps above the upper band
        let mut close = vec![100.0; 30];
        close.extend(vec![120.0; 5]);
        let bars = make_bars(&close);
        let spec = StrategySpec::default_for(StrategyId::BollingerBands);

        let actions = spec.actions(&bars);
        assert_eq!(actions[30], Action::Enter);
    }

    #[test]
    fn test_bollinger_exit_on_breakdown() {
        let mut close = vec![100.0; 30];
        close.extend(vec![60.0; 5]);
        let bars = make_bars(&close);
        let spec = StrategySpec::default_for(StrategyId::BollingerBands);

        let actions = spec.actions(&bars);
        assert_eq!(actions[30], Action::Exit);
    }

    #[test]
    fn test_crossover_fires_once() {
        // a crosses above b exactly once and stays above
        let a: Vec<Option<f64>> = vec![Some(1.0), Some(3.0), Some(4.0), Some(5.0)];
        let b: Vec<Option<f64>> = vec![Some(2.0), Some(2.0), Some(2.0), Some(2.0)];
        assert!(crossed_above(&a, &b, 1));
        assert!(!crossed_above(&a, &b, 2));
        assert!(!crossed_above(&a, &b, 3));
    }

    #[test]
    fn test_warmup_bollinger() {
        let close: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&close);
        let spec = StrategySpec::default_for(StrategyId::BollingerBands);
        assert_eq!(spec.warmup_bars(&bars), Some(19));
    }

    #[test]
    fn test_warmup_rsi_dominated_by_filter() {
        let close: Vec<f64> = (0..250).map(|i| 100.0 + i as f64 * 0.1).collect();
        let bars = make_bars(&close);
        let spec = StrategySpec::default_for(StrategyId::Rsi);
        // 200-bar SMA filter dominates the 14-bar RSI
        assert_eq!(spec.warmup_bars(&bars), Some(199));
    }

    #[test]
    fn test_warmup_insufficient_history() {
        let close: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&close);
        let spec = StrategySpec::default_for(StrategyId::Rsi);
        assert_eq!(spec.warmup_bars(&bars), None);
    }

    #[test]
    fn test_supertrend_actions_flip() {
        let mut close: Vec<f64> = (0..100).map(|i| 100.0 + i as f64 * 2.0).collect();
        close.extend((0..100).map(|i| 298.0 - i as f64 * 2.5));
        close.extend((0..100).map(|i| 48.0 + i as f64 * 2.5));
        let bars = make_bars(&close);
        let spec = StrategySpec::default_for(StrategyId::SuperTrend);

        let actions = spec.actions(&bars);
        assert!(actions.contains(&Action::Enter));
        assert!(actions.contains(&Action::Exit));
    }
}
