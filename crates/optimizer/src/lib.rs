//! Parameter-grid search over the strategy tunables.
//!
//! Enumerates the full cartesian product in a fixed axis order (ema_short,
//! ema_mid, ema_long, bb_std, vol_mult), scores every candidate against a
//! small set of prefetched reference series, and keeps the first candidate
//! that strictly beats the incumbent on (win_rate, then avg_profit). The
//! enumeration order is part of the contract: identical inputs always
//! select the identical candidate.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use backtest::evaluate_series;
use common::{Candle, CandleSource, Error, Outcome, Result};
use strategy::Params;

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Center of the search grid.
    pub base: Params,
    /// Reference symbols scored per candidate.
    pub symbols: Vec<String>,
    pub interval: String,
    pub days: u32,
    pub lookahead: usize,
    /// Half-width of the integer EMA axes.
    pub ema_span: usize,
    /// Half-width and step of the bb_std axis.
    pub bb_std_span: f64,
    pub bb_std_step: f64,
    /// Half-width and step of the vol_mult axis.
    pub vol_mult_span: f64,
    pub vol_mult_step: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            base: Params::default(),
            symbols: vec![
                "BTCUSDT".to_string(),
                "ETHUSDT".to_string(),
                "BNBUSDT".to_string(),
            ],
            interval: "30m".to_string(),
            days: 180,
            lookahead: 30,
            ema_span: 3,
            bb_std_span: 0.3,
            bb_std_step: 0.1,
            vol_mult_span: 0.4,
            vol_mult_step: 0.1,
        }
    }
}

/// The winning configuration and its mean scores across reference symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestParams {
    pub params: Params,
    pub win_rate: f64,
    pub avg_profit: f64,
}

/// Search the grid and return the best candidate.
///
/// Reference series are fetched once up front, so the grid loop itself is
/// pure and deterministic. Symbols that fail to fetch are skipped; failing
/// all of them is a `DataUnavailable` error.
pub async fn optimize(source: &dyn CandleSource, cfg: &OptimizerConfig) -> Result<BestParams> {
    let mut series: Vec<(String, Vec<Candle>)> = Vec::new();
    for symbol in &cfg.symbols {
        match source.fetch(symbol, &cfg.interval, cfg.days).await {
            Ok(candles) => series.push((symbol.clone(), candles)),
            Err(e) => warn!(symbol = %symbol, error = %e, "reference symbol unavailable, skipping"),
        }
    }
    if series.is_empty() {
        return Err(Error::DataUnavailable(
            "no reference series available for optimization".to_string(),
        ));
    }

    let ema_short_axis = int_axis(cfg.base.ema_short, cfg.ema_span);
    let ema_mid_axis = int_axis(cfg.base.ema_mid, cfg.ema_span);
    let ema_long_axis = int_axis(cfg.base.ema_long, cfg.ema_span);
    let bb_std_axis = float_axis(cfg.base.bb_std, cfg.bb_std_span, cfg.bb_std_step);
    let vol_mult_axis = float_axis(cfg.base.vol_mult, cfg.vol_mult_span, cfg.vol_mult_step);

    let total = ema_short_axis.len()
        * ema_mid_axis.len()
        * ema_long_axis.len()
        * bb_std_axis.len()
        * vol_mult_axis.len();
    info!(combinations = total, symbols = series.len(), "starting grid search");

    let mut best: Option<BestParams> = None;
    for &ema_short in &ema_short_axis {
        for &ema_mid in &ema_mid_axis {
            for &ema_long in &ema_long_axis {
                for &bb_std in &bb_std_axis {
                    for &vol_mult in &vol_mult_axis {
                        let candidate = Params {
                            ema_short,
                            ema_mid,
                            ema_long,
                            bb_std,
                            vol_mult,
                            ..cfg.base.clone()
                        };
                        let Some((win_rate, avg_profit)) =
                            score(&series, &candidate, cfg.lookahead)
                        else {
                            continue; // no resolved trades anywhere: skipped, not scored
                        };
                        if best
                            .as_ref()
                            .map_or(true, |b| improves(b, win_rate, avg_profit))
                        {
                            info!(
                                ema = ?(ema_short, ema_mid, ema_long),
                                bb_std,
                                vol_mult,
                                win_rate,
                                avg_profit,
                                "new best candidate"
                            );
                            best = Some(BestParams {
                                params: candidate,
                                win_rate,
                                avg_profit,
                            });
                        }
                    }
                }
            }
        }
    }

    best.ok_or_else(|| {
        Error::DataUnavailable("no grid candidate produced any resolved trades".to_string())
    })
}

/// Strictly greater win rate wins; on an exact tie, strictly greater average
/// profit wins. Anything else keeps the incumbent (first seen wins).
fn improves(best: &BestParams, win_rate: f64, avg_profit: f64) -> bool {
    win_rate > best.win_rate || (win_rate == best.win_rate && avg_profit > best.avg_profit)
}

/// Mean (win_rate %, avg_profit %) across the reference symbols, or `None`
/// when no symbol yields a resolved trade for this candidate.
fn score(
    series: &[(String, Vec<Candle>)],
    params: &Params,
    lookahead: usize,
) -> Option<(f64, f64)> {
    let mut rates = Vec::new();
    let mut profits = Vec::new();

    for (symbol, candles) in series {
        let resolved = match evaluate_series(candles, params, lookahead, false) {
            Ok(r) => r,
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "candidate evaluation failed");
                continue;
            }
        };
        if resolved.is_empty() {
            continue;
        }
        let total = resolved.len() as f64;
        let wins = resolved
            .iter()
            .filter(|(_, o, _)| *o == Outcome::TakeProfit)
            .count() as f64;
        let profit_sum: f64 = resolved.iter().map(|(_, _, p)| p).sum();
        rates.push(wins / total * 100.0);
        profits.push(profit_sum / total * 100.0);
    }

    if rates.is_empty() {
        None
    } else {
        Some((mean(&rates), mean(&profits)))
    }
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn int_axis(base: usize, span: usize) -> Vec<usize> {
    let lo = base.saturating_sub(span).max(1);
    (lo..=base + span).collect()
}

fn float_axis(base: f64, span: f64, step: f64) -> Vec<f64> {
    let steps = (span / step).round() as i64;
    (-steps..=steps)
        .map(|k| round2(base + k as f64 * step))
        .collect()
}

/// Two-decimal rounding keeps the float axes on exact grid points.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Persist the winning configuration as a structured record.
pub fn write_best(path: impl AsRef<Path>, best: &BestParams) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(best)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), "best parameters written");
    Ok(())
}
