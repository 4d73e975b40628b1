//! Signal rule: enriched series → discrete BUY/SELL signals.
//!
//! Every index from the warm-up point onward is evaluated independently —
//! no state is carried between candles. All gates for one side must pass;
//! BUY is checked first and the opposite trend gates make the sides
//! mutually exclusive, so a candle emits at most one signal.

use common::{Error, IndicatorSnapshot, Result, Side, Signal};
use tracing::debug;

use crate::indicators::EnrichedCandle;
use crate::params::Params;
use crate::patterns::detect_pattern;

/// Fixed target/stop levels relative to entry: 3% target, 10% stop.
pub const BUY_TP_MULT: f64 = 1.03;
pub const BUY_SL_MULT: f64 = 0.90;
pub const SELL_TP_MULT: f64 = 0.97;
pub const SELL_SL_MULT: f64 = 1.10;

/// Thresholds for the momentum and stochastic gates.
const RSI_MIDLINE: f64 = 50.0;
const STOCH_OVERBOUGHT: f64 = 80.0;
const STOCH_OVERSOLD: f64 = 20.0;

/// Generate all signals over an enriched series.
///
/// Fails with [`Error::EmptyInput`] on an empty series and
/// [`Error::InsufficientHistory`] when the series does not extend past the
/// warm-up window.
pub fn generate_signals(rows: &[EnrichedCandle], params: &Params) -> Result<Vec<Signal>> {
    if rows.is_empty() {
        return Err(Error::EmptyInput);
    }
    let warmup = params.warmup();
    if rows.len() <= warmup {
        return Err(Error::InsufficientHistory {
            have: rows.len(),
            need: warmup + 1,
        });
    }

    let mut signals = Vec::new();

    for i in warmup..rows.len() {
        let r = &rows[i];
        let c = &r.candle;

        let strong_volume = c.volume > r.vol_sma * params.vol_mult;

        // BUY: ascending EMA stack, close above the fast EMA but inside the
        // upper band, volume breakout, RSI momentum, and one of the
        // secondary filters.
        let buy = r.ema_short > r.ema_mid
            && r.ema_mid > r.ema_long
            && c.close > r.ema_short
            && c.close < r.bb_upper
            && strong_volume
            && r.rsi > RSI_MIDLINE;
        let buy_filter =
            (r.stoch_k > r.stoch_d && r.stoch_k < STOCH_OVERBOUGHT) || r.macd > r.macd_signal;

        // SELL: the mirror image.
        let sell = r.ema_short < r.ema_mid
            && r.ema_mid < r.ema_long
            && c.close < r.ema_short
            && c.close > r.bb_lower
            && strong_volume
            && r.rsi < RSI_MIDLINE;
        let sell_filter =
            (r.stoch_k < r.stoch_d && r.stoch_k > STOCH_OVERSOLD) || r.macd < r.macd_signal;

        let side = if buy && buy_filter {
            Some(Side::Buy)
        } else if sell && sell_filter {
            Some(Side::Sell)
        } else {
            None
        };
        let Some(side) = side else { continue };

        // Optional confirmation: any recognizable pattern at this candle.
        if params.use_candle_confirmation && detect_pattern(rows, i).pattern.is_none() {
            debug!(time = %c.time, %side, "signal dropped: no confirming pattern");
            continue;
        }

        let entry = c.close;
        let (take_profit, stop_loss) = match side {
            Side::Buy => (entry * BUY_TP_MULT, entry * BUY_SL_MULT),
            Side::Sell => (entry * SELL_TP_MULT, entry * SELL_SL_MULT),
        };
        let snapshot = IndicatorSnapshot {
            rsi: r.rsi,
            volume: c.volume,
            macd: r.macd,
            macd_signal: r.macd_signal,
            stoch_k: r.stoch_k,
            stoch_d: r.stoch_d,
        };
        signals.push(Signal::new(c.time, side, entry, take_profit, stop_loss, snapshot)?);
    }

    Ok(signals)
}
