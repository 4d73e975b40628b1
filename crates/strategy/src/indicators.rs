//! Indicator pipeline: raw candle series → enriched series.
//!
//! Pure transform. Every derived series follows the pandas column semantics
//! the strategy was tuned against: EMAs are `ewm(span, adjust=False)`
//! (seeded at the first observation), rolling windows are trailing and
//! undefined until full, and Bollinger deviation is the sample standard
//! deviation. Rows missing any derived value are dropped, so the output
//! starts where the longest chain (StochRSI %D) becomes defined.

use common::{Candle, Error, Result};

use crate::params::Params;

pub const BB_WINDOW: usize = 20;
pub const RSI_WINDOW: usize = 14;
pub const STOCH_WINDOW: usize = 14;
pub const STOCH_SMOOTH: usize = 3;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const VOL_SMA_WINDOW: usize = 20;

/// Division guard for flat windows.
const EPS: f64 = 1e-10;

/// A candle plus every derived indicator value, all defined.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedCandle {
    pub candle: Candle,
    pub ema_short: f64,
    pub ema_mid: f64,
    pub ema_long: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub rsi: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    /// Cumulative signed volume (+v on a close rise, −v otherwise).
    pub vol_trend: f64,
    /// Mean volume of the 20 candles strictly preceding this one.
    pub vol_sma: f64,
}

/// Compute the full indicator set over a candle series.
///
/// Returns the enriched series with warm-up rows removed; ordering is
/// preserved and the input is never aliased. Fails with
/// [`Error::EmptyInput`] on an empty series.
pub fn compute_indicators(candles: &[Candle], params: &Params) -> Result<Vec<EnrichedCandle>> {
    if candles.is_empty() {
        return Err(Error::EmptyInput);
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let ema_short = ema(&closes, params.ema_short);
    let ema_mid = ema(&closes, params.ema_mid);
    let ema_long = ema(&closes, params.ema_long);

    let bb_ma = rolling(&closes, BB_WINDOW, mean);
    let bb_sd = rolling(&closes, BB_WINDOW, sample_std);

    let rsi = rsi_series(&closes, RSI_WINDOW);
    let stoch_min = rolling_opt(&rsi, STOCH_WINDOW, |w| {
        w.iter().fold(f64::INFINITY, |a, &b| a.min(b))
    });
    let stoch_max = rolling_opt(&rsi, STOCH_WINDOW, |w| {
        w.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))
    });
    let stoch_raw: Vec<Option<f64>> = (0..closes.len())
        .map(|i| match (rsi[i], stoch_min[i], stoch_max[i]) {
            (Some(r), Some(lo), Some(hi)) => Some((r - lo) / (hi - lo + EPS)),
            _ => None,
        })
        .collect();
    let stoch_k: Vec<Option<f64>> = rolling_opt(&stoch_raw, STOCH_SMOOTH, mean)
        .into_iter()
        .map(|v| v.map(|x| x * 100.0))
        .collect();
    let stoch_d = rolling_opt(&stoch_k, STOCH_SMOOTH, mean);

    let macd_fast = ema(&closes, MACD_FAST);
    let macd_slow = ema(&closes, MACD_SLOW);
    let macd: Vec<f64> = macd_fast
        .iter()
        .zip(&macd_slow)
        .map(|(f, s)| f - s)
        .collect();
    let macd_signal = ema(&macd, MACD_SIGNAL);

    let vol_trend = volume_trend(candles);
    let vol_sma = preceding_mean(&volumes, VOL_SMA_WINDOW);

    let rows = (0..candles.len())
        .filter_map(|i| {
            Some(EnrichedCandle {
                candle: candles[i].clone(),
                ema_short: ema_short[i],
                ema_mid: ema_mid[i],
                ema_long: ema_long[i],
                bb_upper: bb_ma[i]? + params.bb_std * bb_sd[i]?,
                bb_lower: bb_ma[i]? - params.bb_std * bb_sd[i]?,
                rsi: rsi[i]?,
                stoch_k: stoch_k[i]?,
                stoch_d: stoch_d[i]?,
                macd: macd[i],
                macd_signal: macd_signal[i],
                macd_hist: macd[i] - macd_signal[i],
                vol_trend: vol_trend[i],
                vol_sma: vol_sma[i]?,
            })
        })
        .collect();

    Ok(rows)
}

/// Exponential moving average, seeded at the first value, α = 2/(period+1).
fn ema(xs: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(xs.len());
    let mut value = 0.0;
    for (i, &x) in xs.iter().enumerate() {
        value = if i == 0 {
            x
        } else {
            alpha * x + (1.0 - alpha) * value
        };
        out.push(value);
    }
    out
}

/// Trailing rolling window over a dense series; `None` until the window fills.
fn rolling(xs: &[f64], window: usize, f: fn(&[f64]) -> f64) -> Vec<Option<f64>> {
    (0..xs.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                Some(f(&xs[i + 1 - window..=i]))
            }
        })
        .collect()
}

/// Trailing rolling window over a sparse series; `None` unless the whole
/// window is defined.
fn rolling_opt<F>(xs: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = Vec::with_capacity(xs.len());
    let mut buf = Vec::with_capacity(window);
    for i in 0..xs.len() {
        if i + 1 < window {
            out.push(None);
            continue;
        }
        buf.clear();
        for v in &xs[i + 1 - window..=i] {
            match v {
                Some(x) => buf.push(*x),
                None => break,
            }
        }
        out.push(if buf.len() == window {
            Some(f(&buf))
        } else {
            None
        });
    }
    out
}

fn mean(w: &[f64]) -> f64 {
    w.iter().sum::<f64>() / w.len() as f64
}

/// Sample standard deviation (ddof = 1).
fn sample_std(w: &[f64]) -> f64 {
    if w.len() < 2 {
        return 0.0;
    }
    let m = mean(w);
    let var = w.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (w.len() - 1) as f64;
    var.sqrt()
}

/// RSI over close deltas: rolling mean of gains over rolling mean of losses,
/// epsilon-guarded, scaled 0–100. The first delta counts as zero, so the
/// series becomes defined at index `window − 1`.
fn rsi_series(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let d = closes[i] - closes[i - 1];
        if d > 0.0 {
            gains[i] = d;
        } else {
            losses[i] = -d;
        }
    }
    (0..n)
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let up = mean(&gains[i + 1 - window..=i]);
            let down = mean(&losses[i + 1 - window..=i]);
            let rs = up / (down + EPS);
            Some(100.0 - 100.0 / (1.0 + rs))
        })
        .collect()
}

/// Cumulative signed volume: +volume when the close rose since the prior
/// candle, −volume otherwise (the first candle counts negative).
fn volume_trend(candles: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    let mut acc = 0.0;
    for (i, c) in candles.iter().enumerate() {
        let rose = i > 0 && c.close > candles[i - 1].close;
        acc += if rose { c.volume } else { -c.volume };
        out.push(acc);
    }
    out
}

/// Mean of the `window` values strictly preceding each index.
fn preceding_mean(xs: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..xs.len())
        .map(|i| {
            if i < window {
                None
            } else {
                Some(mean(&xs[i - window..i]))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                time: start + Duration::minutes(30 * i as i64),
                open: c,
                high: c * 1.01,
                low: c * 0.99,
                close: c,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn ema_matches_pandas_ewm_adjust_false() {
        // pd.Series([10,11,12,13]).ewm(span=3, adjust=False).mean()
        let v = ema(&[10.0, 11.0, 12.0, 13.0], 3);
        assert!((v[0] - 10.0).abs() < 1e-10);
        assert!((v[1] - 10.5).abs() < 1e-10);
        assert!((v[2] - 11.25).abs() < 1e-10);
        assert!((v[3] - 12.125).abs() < 1e-10);
    }

    #[test]
    fn ema_converges_on_constant_series() {
        let v = ema(&vec![42.0; 100], 15);
        assert!((v.last().unwrap() - 42.0).abs() < 1e-10);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = compute_indicators(&[], &Params::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
    }

    #[test]
    fn warmup_rows_are_dropped() {
        // StochRSI %D is the longest chain: RSI defined at 13, min/max at 26,
        // %K at 28, %D at 30 — so 30 rows are dropped.
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i % 7) as f64).collect();
        let candles = series(&closes);
        let rows = compute_indicators(&candles, &Params::default()).unwrap();
        assert_eq!(rows.len(), candles.len() - 30);
        assert_eq!(rows[0].candle.time, candles[30].time);
    }

    #[test]
    fn bollinger_bands_bracket_the_mean() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let candles = series(&closes);
        let rows = compute_indicators(&candles, &Params::default()).unwrap();
        for r in &rows {
            assert!(r.bb_upper >= r.bb_lower, "upper {} < lower {}", r.bb_upper, r.bb_lower);
        }
    }

    #[test]
    fn rsi_stays_in_bounds() {
        let closes: Vec<f64> = (0..100)
            .map(|i| 100.0 + (i as f64 * 1.3).sin() * 20.0)
            .collect();
        let candles = series(&closes);
        let rows = compute_indicators(&candles, &Params::default()).unwrap();
        for r in &rows {
            assert!((0.0..=100.0).contains(&r.rsi), "RSI out of range: {}", r.rsi);
        }
    }

    #[test]
    fn rsi_saturates_at_100_on_monotonic_rise() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let rsi = rsi_series(&closes, RSI_WINDOW);
        // Once the window holds only gains the epsilon guard leaves RSI ≈ 100.
        let last = rsi.last().unwrap().unwrap();
        assert!(last > 99.9, "expected ~100, got {last}");
    }

    #[test]
    fn volume_trend_accumulates_signed_volume() {
        let candles = series(&[10.0, 11.0, 10.5, 12.0]);
        let vt = volume_trend(&candles);
        // first candle counts negative, then +, −, +
        assert_eq!(vt, vec![-1000.0, 0.0, -1000.0, 0.0]);
    }

    #[test]
    fn vol_sma_uses_strictly_preceding_candles() {
        let xs: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let sma = preceding_mean(&xs, 20);
        assert!(sma[19].is_none());
        // index 20: mean of 0..=19 = 9.5, current value excluded
        assert!((sma[20].unwrap() - 9.5).abs() < 1e-10);
    }

    #[test]
    fn pipeline_is_idempotent() {
        let closes: Vec<f64> = (0..90).map(|i| 100.0 + (i as f64 * 0.9).cos() * 3.0).collect();
        let candles = series(&closes);
        let a = compute_indicators(&candles, &Params::default()).unwrap();
        let b = compute_indicators(&candles, &Params::default()).unwrap();
        assert_eq!(a, b);
    }
}
