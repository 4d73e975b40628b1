//! The live scanner loop: sweep every configured (symbol, interval) pair,
//! keep only signals fresh within one candle interval, prefer the larger
//! timeframe per symbol, deduplicate against the persisted sent-set, then
//! alert and log.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use alert::DiscordWebhook;
use common::{interval_secs, AlertSink, CandleSource, Config, Error, Result, Signal};
use data::BinanceFutures;
use strategy::{compute_indicators, generate_signals, Params};

const SENT_FILE: &str = "sent_signals.json";
const SIGNAL_LOG: &str = "signals.csv";
const SCAN_LIMIT: u32 = 500;
/// Pairs with less history than this are skipped outright.
const MIN_CANDLES: usize = 100;

/// Run the scanner until ctrl-c.
pub async fn run(cfg: &Config, params: Params) -> Result<()> {
    let symbols = cfg.load_symbols()?;
    let source = BinanceFutures::new(&cfg.cache_dir);
    let sink: Option<Arc<dyn AlertSink>> = cfg
        .webhook_url
        .clone()
        .map(|url| Arc::new(DiscordWebhook::new(url)) as Arc<dyn AlertSink>);
    if sink.is_none() {
        warn!("WEBHOOK_URL not set, alerts disabled");
    }

    loop {
        if let Err(e) = scan_once(cfg, &source, sink.as_ref(), &symbols, &params).await {
            warn!(error = %e, "sweep failed");
        }
        info!(secs = cfg.scan_interval_secs, "sweep complete, sleeping");
        tokio::select! {
            _ = sleep(Duration::from_secs(cfg.scan_interval_secs)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
        }
    }
}

async fn scan_once(
    cfg: &Config,
    source: &dyn CandleSource,
    sink: Option<&Arc<dyn AlertSink>>,
    symbols: &[String],
    params: &Params,
) -> Result<()> {
    let mut sent = load_sent(SENT_FILE);
    // Per symbol, the freshest signal on the largest interval that produced one.
    let mut fresh: HashMap<String, (String, Signal)> = HashMap::new();

    info!(symbols = symbols.len(), "starting sweep");
    for symbol in symbols {
        for interval in &cfg.scan_intervals {
            match scan_pair(source, symbol, interval, params).await {
                Ok(Some(signal)) => {
                    let replace = fresh.get(symbol).map_or(true, |(current, _)| {
                        interval_secs(interval) > interval_secs(current)
                    });
                    if replace {
                        fresh.insert(symbol.clone(), (interval.clone(), signal));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(symbol = %symbol, interval = %interval, error = %e, "pair scan failed, skipping")
                }
            }
        }
    }

    let mut picked: Vec<(String, String, Signal)> = fresh
        .into_iter()
        .map(|(symbol, (interval, signal))| (symbol, interval, signal))
        .collect();
    picked.sort_by(|a, b| a.0.cmp(&b.0));

    let mut new_rows = Vec::new();
    for (symbol, interval, signal) in picked {
        let id = format!(
            "{symbol}_{interval}_{}",
            signal.time.format("%Y-%m-%dT%H:%M:%S")
        );
        if !sent.insert(id) {
            debug!(symbol = %symbol, "already sent, skipping");
            continue;
        }
        info!(
            symbol = %symbol,
            interval = %interval,
            side = %signal.side,
            entry = signal.entry,
            tp = signal.take_profit,
            sl = signal.stop_loss,
            "fresh signal"
        );
        if let Some(sink) = sink {
            let sink = sink.clone();
            let (symbol, interval, signal) = (symbol.clone(), interval.clone(), signal.clone());
            tokio::spawn(async move {
                sink.notify(&symbol, &interval, &signal).await;
            });
        }
        new_rows.push((symbol, interval, signal));
    }

    if new_rows.is_empty() {
        info!("no new signals");
    } else {
        append_signal_log(SIGNAL_LOG, &new_rows)?;
        save_sent(SENT_FILE, &sent)?;
        info!(count = new_rows.len(), "signals logged");
    }
    Ok(())
}

/// Scan one pair; returns the latest signal if it is fresh.
async fn scan_pair(
    source: &dyn CandleSource,
    symbol: &str,
    interval: &str,
    params: &Params,
) -> Result<Option<Signal>> {
    let candles = source.fetch_latest(symbol, interval, SCAN_LIMIT).await?;
    if candles.len() < MIN_CANDLES {
        return Err(Error::InsufficientHistory {
            have: candles.len(),
            need: MIN_CANDLES,
        });
    }

    let rows = compute_indicators(&candles, params)?;
    let signals = generate_signals(&rows, params)?;
    let Some(latest) = signals.into_iter().next_back() else {
        return Ok(None);
    };

    let limit = interval_secs(interval)
        .ok_or_else(|| Error::Config(format!("unknown interval '{interval}'")))?;
    if is_fresh(latest.time, limit, Utc::now()) {
        Ok(Some(latest))
    } else {
        Ok(None)
    }
}

/// A signal is fresh while it is at most one candle interval old.
fn is_fresh(signal_time: DateTime<Utc>, interval_secs: u64, now: DateTime<Utc>) -> bool {
    let age = (now - signal_time).num_seconds();
    age >= 0 && age as u64 <= interval_secs
}

fn load_sent(path: &str) -> HashSet<String> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => HashSet::new(),
    }
}

fn save_sent(path: &str, sent: &HashSet<String>) -> Result<()> {
    let mut ids: Vec<&String> = sent.iter().collect();
    ids.sort();
    std::fs::write(path, serde_json::to_string(&ids)?)?;
    Ok(())
}

#[derive(Serialize)]
struct SignalRow<'a> {
    symbol: &'a str,
    interval: &'a str,
    time: DateTime<Utc>,
    side: common::Side,
    entry: f64,
    take_profit: f64,
    stop_loss: f64,
}

/// Append picked signals to the running CSV log, writing the header only
/// when the file is new.
fn append_signal_log(path: &str, rows: &[(String, String, Signal)]) -> Result<()> {
    let exists = Path::new(path).exists();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!exists)
        .from_writer(file);
    for (symbol, interval, signal) in rows {
        writer.serialize(SignalRow {
            symbol,
            interval,
            time: signal.time,
            side: signal.side,
            entry: signal.entry,
            take_profit: signal.take_profit,
            stop_loss: signal.stop_loss,
        })?;
    }
    writer.flush()?;
    Ok(())
}
