//! Aggregation and tabular persistence of backtest results.

use std::path::Path;

use common::{Outcome, Result, Summary, Trade};
use tracing::info;

/// Aggregate a trade list into summary statistics.
///
/// `win_rate` is TP over all listed trades — when the engine keeps
/// unresolved signals (`count_unresolved`), NONE rows land in the
/// denominator; otherwise the denominator is resolved trades only.
pub fn summarize(trades: &[Trade]) -> Summary {
    let total = trades.len();
    let tp = trades
        .iter()
        .filter(|t| t.outcome == Outcome::TakeProfit)
        .count();
    let sl = trades
        .iter()
        .filter(|t| t.outcome == Outcome::StopLoss)
        .count();
    let none = trades
        .iter()
        .filter(|t| t.outcome == Outcome::Unresolved)
        .count();

    let profit_sum: f64 = trades.iter().map(|t| t.profit).sum();
    let (win_rate, avg_profit_pct) = if total > 0 {
        (
            tp as f64 / total as f64 * 100.0,
            profit_sum / total as f64 * 100.0,
        )
    } else {
        (0.0, 0.0)
    };

    Summary {
        total_trades: total,
        tp_count: tp,
        sl_count: sl,
        none_count: none,
        win_rate,
        avg_profit_pct,
        total_profit_pct: profit_sum * 100.0,
    }
}

/// Write the trade-level table, one row per trade.
pub fn write_trades(path: impl AsRef<Path>, trades: &[Trade]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = trades.len(), "trade table written");
    Ok(())
}

/// Write the single-row summary table.
pub fn write_summary(path: impl AsRef<Path>, summary: &Summary) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    writer.serialize(summary)?;
    writer.flush()?;
    info!(path = %path.display(), "summary table written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::Side;

    fn trade(outcome: Outcome, profit: f64) -> Trade {
        Trade {
            symbol: "BTCUSDT".to_string(),
            interval: "30m".to_string(),
            time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            side: Side::Buy,
            entry: 100.0,
            take_profit: 103.0,
            stop_loss: 90.0,
            outcome,
            profit,
        }
    }

    #[test]
    fn summarize_counts_and_rates() {
        let trades = vec![
            trade(Outcome::TakeProfit, 0.03),
            trade(Outcome::TakeProfit, 0.03),
            trade(Outcome::StopLoss, -0.10),
        ];
        let s = summarize(&trades);
        assert_eq!(s.total_trades, 3);
        assert_eq!(s.tp_count, 2);
        assert_eq!(s.sl_count, 1);
        assert_eq!(s.none_count, 0);
        assert!((s.win_rate - 200.0 / 3.0).abs() < 1e-9);
        assert!((s.avg_profit_pct - (-0.04 / 3.0 * 100.0)).abs() < 1e-9);
        assert!((s.total_profit_pct - (-4.0)).abs() < 1e-9);
    }

    #[test]
    fn unresolved_rows_dilute_the_win_rate_when_present() {
        // The two denominator interpretations: with NONE rows kept, the same
        // two resolved trades score lower.
        let resolved_only = vec![
            trade(Outcome::TakeProfit, 0.03),
            trade(Outcome::StopLoss, -0.10),
        ];
        assert!((summarize(&resolved_only).win_rate - 50.0).abs() < 1e-9);

        let mut with_none = resolved_only.clone();
        with_none.push(trade(Outcome::Unresolved, 0.0));
        with_none.push(trade(Outcome::Unresolved, 0.0));
        let s = summarize(&with_none);
        assert_eq!(s.none_count, 2);
        assert!((s.win_rate - 25.0).abs() < 1e-9);
    }

    #[test]
    fn empty_trade_list_yields_zeroed_summary() {
        let s = summarize(&[]);
        assert_eq!(s.total_trades, 0);
        assert_eq!(s.win_rate, 0.0);
        assert_eq!(s.avg_profit_pct, 0.0);
        assert_eq!(s.total_profit_pct, 0.0);
    }

    #[test]
    fn tables_round_trip_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let trades_path = dir.path().join("trades.csv");
        let summary_path = dir.path().join("summary.csv");

        let trades = vec![
            trade(Outcome::TakeProfit, 0.03),
            trade(Outcome::StopLoss, -0.10),
        ];
        write_trades(&trades_path, &trades).unwrap();
        write_summary(&summary_path, &summarize(&trades)).unwrap();

        let mut reader = csv::Reader::from_path(&trades_path).unwrap();
        let back: Vec<Trade> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(back, trades);

        let mut reader = csv::Reader::from_path(&summary_path).unwrap();
        let back: Vec<Summary> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].total_trades, 2);
    }
}
