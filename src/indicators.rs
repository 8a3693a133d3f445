//! Technical indicators
//!
//! Pure functions over a price series. Every function returns a series
//! index-aligned with its input; leading entries are `None` until enough
//! history has accumulated (the warm-up window).

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if period == 0 || i + 1 < period {
            result.push(None);
        } else {
            let sum: f64 = values[i + 1 - period..=i].iter().sum();
            result.push(Some(sum / period as f64));
        }
    }

    result
}

/// Calculate Exponential Moving Average, seeded with the SMA of the first
/// `period` values
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    if values.is_empty() || period == 0 {
        return vec![None; values.len()];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema_value: Option<f64> = None;

    for (i, &value) in values.iter().enumerate() {
        if i + 1 < period {
            result.push(None);
        } else if i + 1 == period {
            let sum: f64 = values[0..period].iter().sum();
            ema_value = Some(sum / period as f64);
            result.push(ema_value);
        } else if let Some(prev_ema) = ema_value {
            let new_ema = (value - prev_ema) * multiplier + prev_ema;
            ema_value = Some(new_ema);
            result.push(Some(new_ema));
        } else {
            result.push(None);
        }
    }

    result
}

/// Calculate True Range
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(high.len());

    for i in 0..high.len() {
        let tr_value = if i == 0 {
            high[i] - low[i]
        } else {
            let hl = high[i] - low[i];
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(tr_value);
    }

    tr
}

/// Calculate Average True Range as the rolling mean of True Range.
/// The SuperTrend recurrence depends on this exact smoothing.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    let tr = true_range(high, low, close);
    sma(&tr, period)
}

/// Calculate Bollinger Bands: (upper, basis, lower).
/// Uses the population standard deviation, so a constant series produces
/// upper == basis == lower.
pub fn bollinger(
    values: &[f64],
    length: usize,
    mult: f64,
) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let basis = sma(values, length);
    let mut upper = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if let Some(mid) = basis[i] {
            let window = &values[i + 1 - length..=i];
            let variance: f64 = window
                .iter()
                .map(|&x| {
                    let diff = x - mid;
                    diff * diff
                })
                .sum::<f64>()
                / length as f64;
            let dev = mult * variance.sqrt();

            upper.push(Some(mid + dev));
            lower.push(Some(mid - dev));
        } else {
            upper.push(None);
            lower.push(None);
        }
    }

    (upper, basis, lower)
}

/// SuperTrend direction: +1 bullish, -1 bearish, `None` while ATR warms up.
///
/// Per-bar recurrence over the final bands derived from `hl2 ± factor * atr`:
/// the support band only rises and the resistance band only falls, unless the
/// prior close breached the prior final band, in which case the band resets
/// to its raw value. Direction flips bearish -> bullish when close exceeds
/// the prior final support band, and bullish -> bearish when close drops
/// below the prior final resistance band, each conditioned on the prior
/// direction. A close sitting strictly between the prior bands therefore
/// alternates the direction bar by bar. The first valid bar takes both
/// bands directly from the raw values and starts bullish.
pub fn supertrend_direction(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
    factor: f64,
) -> Vec<Option<i8>> {
    let n = close.len();
    let atr_values = atr(high, low, close, period);
    let mut direction: Vec<Option<i8>> = vec![None; n];

    let mut final_lower: Option<f64> = None;
    let mut final_upper: Option<f64> = None;
    let mut prev_dir: i8 = 1;

    for i in 0..n {
        let atr_val = match atr_values[i] {
            Some(v) => v,
            None => continue,
        };

        let hl2 = (high[i] + low[i]) / 2.0;
        let raw_upper = hl2 + factor * atr_val;
        let raw_lower = hl2 - factor * atr_val;

        match (final_lower, final_upper) {
            (Some(prev_lower), Some(prev_upper)) => {
                // Band values are sticky unless the prior close breached them
                let new_lower = if raw_lower > prev_lower || close[i - 1] < prev_lower {
                    raw_lower
                } else {
                    prev_lower
                };
                let new_upper = if raw_upper < prev_upper || close[i - 1] > prev_upper {
                    raw_upper
                } else {
                    prev_upper
                };

                // Direction flips compare against the prior bar's final bands
                let dir = if prev_dir == -1 && close[i] > prev_lower {
                    1
                } else if prev_dir == 1 && close[i] < prev_upper {
                    -1
                } else {
                    prev_dir
                };

                direction[i] = Some(dir);
                final_lower = Some(new_lower);
                final_upper = Some(new_upper);
                prev_dir = dir;
            }
            _ => {
                // First valid bar: initialize bands from raw values, bullish
                final_lower = Some(raw_lower);
                final_upper = Some(raw_upper);
                prev_dir = 1;
                direction[i] = Some(1);
            }
        }
    }

    direction
}

/// Weekly SMA approximated on daily data: 5 trading days per week
pub fn weekly_sma(values: &[f64], length: usize) -> Vec<Option<f64>> {
    sma(values, length * 5)
}

/// Weekly EMA approximated on daily data
pub fn weekly_ema(values: &[f64], length: usize) -> Vec<Option<f64>> {
    ema(values, length * 5)
}

/// Calculate RSI with Wilder smoothing (smoothing factor `1/length`).
///
/// The average gain/loss is seeded with the simple mean of the first `length`
/// changes, so the series is defined from index `length` onward.
pub fn rsi(values: &[f64], length: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];

    if length == 0 || n <= length {
        return result;
    }

    let mut gains = Vec::with_capacity(n);
    let mut losses = Vec::with_capacity(n);
    gains.push(0.0);
    losses.push(0.0);
    for i in 1..n {
        let change = values[i] - values[i - 1];
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let mut avg_gain: f64 = gains[1..=length].iter().sum::<f64>() / length as f64;
    let mut avg_loss: f64 = losses[1..=length].iter().sum::<f64>() / length as f64;
    result[length] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in length + 1..n {
        avg_gain = (avg_gain * (length as f64 - 1.0) + gains[i]) / length as f64;
        avg_loss = (avg_loss * (length as f64 - 1.0) + losses[i]) / length as f64;
        result[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

/// MACD line: EMA(fast) - EMA(slow)
pub fn macd_line(values: &[f64], fast: usize, slow: usize) -> Vec<Option<f64>> {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);

    fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect()
}

/// MACD signal: EMA of the defined region of the MACD line
pub fn macd_signal(values: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<Option<f64>> {
    let line = macd_line(values, fast, slow);
    let offset = match line.iter().position(|v| v.is_some()) {
        Some(idx) => idx,
        None => return vec![None; values.len()],
    };

    let defined: Vec<f64> = line[offset..].iter().filter_map(|v| *v).collect();
    let smoothed = ema(&defined, signal);

    let mut result = vec![None; values.len()];
    for (j, value) in smoothed.into_iter().enumerate() {
        result[offset + j] = value;
    }
    result
}
