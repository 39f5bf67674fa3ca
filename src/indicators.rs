//! Upstream indicator series
//!
//! Plain functions from price series to aligned `Vec<Option<f64>>` outputs,
//! `None` until the indicator has seen enough bars. Averages and RSI come from
//! the `ta` crate; ATR uses Wilder's smoothing directly.
//!
//! The engine never calls these itself. A harness computes the series once,
//! zips them into `IndicatorSnapshot`s and hands one to each `step`.

use rust_decimal::prelude::ToPrimitive;
use ta::indicators::{RelativeStrengthIndex, SimpleMovingAverage};
use ta::Next;

use crate::config::IndicatorConfig;
use crate::{Bar, IndicatorSnapshot};

// =============================================================================
// Moving Averages
// =============================================================================

/// Simple moving average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let sma_val = indicator.next(value);
            (i + 1 >= period).then_some(sma_val)
        })
        .collect()
}

// =============================================================================
// Volatility
// =============================================================================

/// True range; the first bar has no previous close and uses high - low
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..high.len())
        .map(|i| {
            let hl = high[i] - low[i];
            if i == 0 {
                return hl;
            }
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

/// Average true range with Wilder's smoothing:
/// `ATR = (prev_ATR * (period - 1) + TR) / period`, seeded with the mean of
/// the first `period` true ranges.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    if high.is_empty() || period == 0 || high.len() != low.len() || high.len() != close.len() {
        return vec![];
    }

    let tr = true_range(high, low, close);
    let mut result = Vec::with_capacity(tr.len());
    let mut atr_value: Option<f64> = None;

    for i in 0..tr.len() {
        if i + 1 < period {
            result.push(None);
            continue;
        }
        let next = match atr_value {
            None => tr[..period].iter().sum::<f64>() / period as f64,
            Some(prev) => (prev * (period - 1) as f64 + tr[i]) / period as f64,
        };
        atr_value = Some(next);
        result.push(atr_value);
    }

    result
}

// =============================================================================
// Momentum
// =============================================================================

/// Relative strength index in [0, 100]
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match RelativeStrengthIndex::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let rsi_val = indicator.next(value);
            (i + 1 >= period).then_some(rsi_val)
        })
        .collect()
}

// =============================================================================
// Snapshots
// =============================================================================

/// One snapshot per bar, aligned by index
pub fn snapshots(bars: &[Bar], config: &IndicatorConfig) -> Vec<IndicatorSnapshot> {
    let to_f64 = |v: rust_decimal::Decimal| v.to_f64().unwrap_or(f64::NAN);
    let high: Vec<f64> = bars.iter().map(|b| to_f64(b.high)).collect();
    let low: Vec<f64> = bars.iter().map(|b| to_f64(b.low)).collect();
    let close: Vec<f64> = bars.iter().map(|b| to_f64(b.close)).collect();

    let atr_series = atr(&high, &low, &close, config.atr_period);
    let fast = sma(&close, config.sma_fast_period);
    let slow = sma(&close, config.sma_slow_period);
    let osc = rsi(&close, config.oscillator_period);

    let at = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();

    (0..bars.len())
        .map(|i| IndicatorSnapshot {
            atr: at(&atr_series, i),
            sma_fast: at(&fast, i),
            sma_slow: at(&slow, i),
            oscillator: at(&osc, i),
        })
        .collect()
}
