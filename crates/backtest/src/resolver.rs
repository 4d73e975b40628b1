//! First-touch outcome resolution.
//!
//! Given a signal and the candles that followed it, decide which level was
//! reached first within the lookahead window. When both levels fall inside
//! the same candle there is no way to know the intra-candle path, so the
//! stop-loss takes priority — a conservative, deterministic rule.

use common::{Candle, Outcome, Side, Signal};

/// Resolve a signal against the candle slice strictly after it.
///
/// Only the first `lookahead` candles of `future` are considered. Returns
/// the outcome and the signed profit fraction (0.0 when unresolved).
pub fn resolve_outcome(signal: &Signal, future: &[Candle], lookahead: usize) -> (Outcome, f64) {
    let window = &future[..future.len().min(lookahead)];

    let mut tp_idx: Option<usize> = None;
    let mut sl_idx: Option<usize> = None;

    for (i, c) in window.iter().enumerate() {
        let (tp_hit, sl_hit) = match signal.side {
            Side::Buy => (c.high >= signal.take_profit, c.low <= signal.stop_loss),
            Side::Sell => (c.low <= signal.take_profit, c.high >= signal.stop_loss),
        };
        if tp_idx.is_none() && tp_hit {
            tp_idx = Some(i);
        }
        if sl_idx.is_none() && sl_hit {
            sl_idx = Some(i);
        }
        if tp_idx.is_some() && sl_idx.is_some() {
            break;
        }
    }

    let outcome = match (tp_idx, sl_idx) {
        // Stop-loss wins the same-candle tie.
        (Some(t), Some(s)) if t < s => Outcome::TakeProfit,
        (_, Some(_)) => Outcome::StopLoss,
        (Some(_), None) => Outcome::TakeProfit,
        (None, None) => Outcome::Unresolved,
    };

    let profit = match outcome {
        Outcome::Unresolved => 0.0,
        _ => {
            let exit = match outcome {
                Outcome::TakeProfit => signal.take_profit,
                _ => signal.stop_loss,
            };
            match signal.side {
                Side::Buy => (exit - signal.entry) / signal.entry,
                Side::Sell => (signal.entry - exit) / signal.entry,
            }
        }
    };

    (outcome, profit)
}
