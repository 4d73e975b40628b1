//! Batch backtest driver.
//!
//! Each (symbol, interval) pair is an independent unit: fetch history, run
//! the indicator pipeline and signal rule, resolve every signal against the
//! candles that followed it. Units run as tokio tasks bounded by a
//! semaphore; a failed unit is logged and skipped, never aborting the batch.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use common::{Candle, CandleSource, Outcome, Result, Signal, Summary, Trade};
use strategy::{compute_indicators, generate_signals, Params};

use crate::resolver::resolve_outcome;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Days of history per unit.
    pub days: u32,
    /// Outcome-resolution horizon in candles.
    pub lookahead: usize,
    /// Upper bound on concurrently running units.
    pub max_workers: usize,
    /// Keep unresolved signals as NONE trades (they then count against the
    /// win rate). Off by default: unresolved signals are excluded entirely.
    pub count_unresolved: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            days: 365,
            lookahead: 50,
            max_workers: 4,
            count_unresolved: false,
        }
    }
}

/// Run the full pipeline over one candle series and resolve every signal.
///
/// Shared by the backtest engine and the optimizer. Unresolved signals are
/// dropped unless `count_unresolved` is set.
pub fn evaluate_series(
    candles: &[Candle],
    params: &Params,
    lookahead: usize,
    count_unresolved: bool,
) -> Result<Vec<(Signal, Outcome, f64)>> {
    let rows = compute_indicators(candles, params)?;
    let signals = generate_signals(&rows, params)?;

    let mut out = Vec::with_capacity(signals.len());
    for signal in signals {
        let start = candles.partition_point(|c| c.time <= signal.time);
        let (outcome, profit) = resolve_outcome(&signal, &candles[start..], lookahead);
        if outcome == Outcome::Unresolved && !count_unresolved {
            continue;
        }
        out.push((signal, outcome, profit));
    }
    Ok(out)
}

async fn backtest_unit(
    source: &dyn CandleSource,
    symbol: &str,
    interval: &str,
    params: &Params,
    cfg: &BacktestConfig,
) -> Result<Vec<Trade>> {
    let candles = source.fetch(symbol, interval, cfg.days).await?;
    let resolved = evaluate_series(&candles, params, cfg.lookahead, cfg.count_unresolved)?;

    Ok(resolved
        .into_iter()
        .map(|(s, outcome, profit)| Trade {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            time: s.time,
            side: s.side,
            entry: s.entry,
            take_profit: s.take_profit,
            stop_loss: s.stop_loss,
            outcome,
            profit,
        })
        .collect())
}

/// Backtest every (symbol, interval) pair and aggregate the results.
///
/// Trade ordering across units is unspecified; within a unit it stays
/// chronological.
pub async fn run_backtest(
    source: Arc<dyn CandleSource>,
    symbols: &[String],
    intervals: &[String],
    params: &Params,
    cfg: &BacktestConfig,
) -> (Summary, Vec<Trade>) {
    let semaphore = Arc::new(Semaphore::new(cfg.max_workers.max(1)));
    let mut set = JoinSet::new();

    for symbol in symbols {
        for interval in intervals {
            let source = source.clone();
            let semaphore = semaphore.clone();
            let symbol = symbol.clone();
            let interval = interval.clone();
            let params = params.clone();
            let cfg = cfg.clone();
            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Vec::new();
                };
                match backtest_unit(source.as_ref(), &symbol, &interval, &params, &cfg).await {
                    Ok(trades) => {
                        info!(symbol = %symbol, interval = %interval, trades = trades.len(), "unit complete");
                        trades
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, interval = %interval, error = %e, "unit failed, skipping");
                        Vec::new()
                    }
                }
            });
        }
    }

    let mut all = Vec::new();
    while let Some(res) = set.join_next().await {
        match res {
            Ok(trades) => all.extend(trades),
            Err(e) => warn!(error = %e, "backtest task panicked"),
        }
    }

    let summary = crate::report::summarize(&all);
    (summary, all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use common::{Error, Side};
    use std::collections::HashMap;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                Candle {
                    time: start + Duration::minutes(30 * i as i64),
                    open,
                    high: open.max(close) + 0.2,
                    low: open.min(close) - 0.2,
                    close,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    /// Accelerating uptrend with a volume spike — yields exactly one BUY
    /// signal at `spike_at` that resolves TP a few candles later.
    fn uptrend_with_spike(n: usize, spike_at: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n)
            .map(|i| 100.0 + 0.5 * i as f64 + 0.002 * (i * i) as f64)
            .collect();
        let mut candles = candles_from_closes(&closes);
        candles[spike_at].volume = 2500.0;
        candles
    }

    struct MockSource {
        series: HashMap<String, Vec<Candle>>,
    }

    #[async_trait]
    impl CandleSource for MockSource {
        async fn fetch(&self, symbol: &str, _interval: &str, _days: u32) -> Result<Vec<Candle>> {
            self.series
                .get(symbol)
                .cloned()
                .ok_or_else(|| Error::DataUnavailable(format!("no data for {symbol}")))
        }

        async fn fetch_latest(
            &self,
            symbol: &str,
            interval: &str,
            _limit: u32,
        ) -> Result<Vec<Candle>> {
            self.fetch(symbol, interval, 0).await
        }
    }

    #[test]
    fn evaluate_series_resolves_the_spike_signal() {
        let candles = uptrend_with_spike(200, 190);
        let resolved =
            evaluate_series(&candles, &Params::default(), 50, false).unwrap();
        assert_eq!(resolved.len(), 1);
        let (signal, outcome, profit) = &resolved[0];
        assert_eq!(signal.side, Side::Buy);
        assert_eq!(*outcome, Outcome::TakeProfit);
        assert!((profit - 0.03).abs() < 1e-9);
    }

    #[test]
    fn unresolved_signals_are_excluded_by_default() {
        // Spike near the end: the remaining candles never reach +3% or −10%.
        let candles = uptrend_with_spike(200, 195);
        let excluded = evaluate_series(&candles, &Params::default(), 50, false).unwrap();
        assert!(excluded.is_empty());

        let included = evaluate_series(&candles, &Params::default(), 50, true).unwrap();
        assert_eq!(included.len(), 1);
        assert_eq!(included[0].1, Outcome::Unresolved);
        assert_eq!(included[0].2, 0.0);
    }

    #[tokio::test]
    async fn failed_unit_does_not_abort_the_batch() {
        let mut series = HashMap::new();
        series.insert("GOODUSDT".to_string(), uptrend_with_spike(200, 190));
        let source = Arc::new(MockSource { series });

        let symbols = vec!["GOODUSDT".to_string(), "DEADUSDT".to_string()];
        let intervals = vec!["30m".to_string()];
        let (summary, trades) = run_backtest(
            source,
            &symbols,
            &intervals,
            &Params::default(),
            &BacktestConfig::default(),
        )
        .await;

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].symbol, "GOODUSDT");
        assert_eq!(summary.total_trades, 1);
        assert_eq!(summary.tp_count, 1);
        assert!((summary.win_rate - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn short_history_unit_is_skipped() {
        let mut series = HashMap::new();
        series.insert("TINYUSDT".to_string(), uptrend_with_spike(60, 55));
        let source = Arc::new(MockSource { series });

        let symbols = vec!["TINYUSDT".to_string()];
        let intervals = vec!["30m".to_string()];
        let (summary, trades) = run_backtest(
            source,
            &symbols,
            &intervals,
            &Params::default(),
            &BacktestConfig::default(),
        )
        .await;

        assert!(trades.is_empty());
        assert_eq!(summary.total_trades, 0);
    }
}
