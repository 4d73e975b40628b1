use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One closed OHLCV candle for a fixed time interval.
///
/// Series invariants (enforced by the source adapter): strictly increasing
/// `time`, no duplicates, `low <= open,close <= high`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Side of a trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Indicator values captured at the candle that produced a signal.
/// Carried on the signal for alert messages and trade logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub volume: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
}

/// A discrete trade signal with entry, target and stop levels.
///
/// Entry always equals the close of the candle that produced the signal.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub time: DateTime<Utc>,
    pub side: Side,
    pub entry: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub snapshot: IndicatorSnapshot,
}

impl Signal {
    /// Build a signal, enforcing the level ordering invariant:
    /// BUY requires `take_profit > entry > stop_loss`, SELL the reverse.
    pub fn new(
        time: DateTime<Utc>,
        side: Side,
        entry: f64,
        take_profit: f64,
        stop_loss: f64,
        snapshot: IndicatorSnapshot,
    ) -> Result<Self> {
        let ordered = match side {
            Side::Buy => take_profit > entry && entry > stop_loss,
            Side::Sell => take_profit < entry && entry < stop_loss,
        };
        if !ordered {
            return Err(Error::InvalidSignal(format!(
                "{side} levels out of order: entry={entry} tp={take_profit} sl={stop_loss}"
            )));
        }
        Ok(Self {
            time,
            side,
            entry,
            take_profit,
            stop_loss,
            snapshot,
        })
    }
}

/// Terminal outcome of a signal within the lookahead horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "TP")]
    TakeProfit,
    #[serde(rename = "SL")]
    StopLoss,
    /// Neither level was touched within the lookahead.
    #[serde(rename = "NONE")]
    Unresolved,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::TakeProfit => write!(f, "TP"),
            Outcome::StopLoss => write!(f, "SL"),
            Outcome::Unresolved => write!(f, "NONE"),
        }
    }
}

/// One resolved signal — the unit record of backtest aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub interval: String,
    pub time: DateTime<Utc>,
    pub side: Side,
    pub entry: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub outcome: Outcome,
    /// Signed profit fraction (not percent); 0.0 for unresolved.
    pub profit: f64,
}

/// Aggregated backtest statistics, written as the single-row results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_trades: usize,
    pub tp_count: usize,
    pub sl_count: usize,
    pub none_count: usize,
    pub win_rate: f64,
    pub avg_profit_pct: f64,
    pub total_profit_pct: f64,
}

/// Duration of one candle interval in seconds, e.g. "15m" → 900.
/// Supports the Binance interval grammar (m/h/d/w suffix).
pub fn interval_secs(interval: &str) -> Option<u64> {
    let (num, unit) = interval.split_at(interval.len().checked_sub(1)?);
    let n: u64 = num.parse().ok()?;
    match unit {
        "m" => Some(n * 60),
        "h" => Some(n * 3600),
        "d" => Some(n * 86_400),
        "w" => Some(n * 604_800),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snap() -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: 60.0,
            volume: 1000.0,
            macd: 0.5,
            macd_signal: 0.4,
            stoch_k: 40.0,
            stoch_d: 30.0,
        }
    }

    #[test]
    fn buy_signal_requires_tp_above_entry_above_sl() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(Signal::new(t, Side::Buy, 100.0, 103.0, 90.0, snap()).is_ok());
        assert!(Signal::new(t, Side::Buy, 100.0, 99.0, 90.0, snap()).is_err());
        assert!(Signal::new(t, Side::Buy, 100.0, 103.0, 101.0, snap()).is_err());
    }

    #[test]
    fn sell_signal_requires_tp_below_entry_below_sl() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(Signal::new(t, Side::Sell, 100.0, 97.0, 110.0, snap()).is_ok());
        assert!(Signal::new(t, Side::Sell, 100.0, 103.0, 110.0, snap()).is_err());
        assert!(Signal::new(t, Side::Sell, 100.0, 97.0, 99.0, snap()).is_err());
    }

    #[test]
    fn interval_secs_parses_binance_grammar() {
        assert_eq!(interval_secs("15m"), Some(900));
        assert_eq!(interval_secs("30m"), Some(1800));
        assert_eq!(interval_secs("1h"), Some(3600));
        assert_eq!(interval_secs("1d"), Some(86_400));
        assert_eq!(interval_secs("abc"), None);
        assert_eq!(interval_secs(""), None);
    }

    #[test]
    fn outcome_displays_wire_names() {
        assert_eq!(Outcome::TakeProfit.to_string(), "TP");
        assert_eq!(Outcome::StopLoss.to_string(), "SL");
        assert_eq!(Outcome::Unresolved.to_string(), "NONE");
    }
}
