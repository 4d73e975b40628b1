//! On-disk candle cache: one CSV file per (symbol, interval, days) key.
//!
//! The cache is only ever written after a complete download, so a present
//! file is always a full series. Merging sorts by timestamp and drops
//! duplicates, which makes re-downloads idempotent.

use std::path::{Path, PathBuf};

use common::{Candle, Result};
use tracing::debug;

pub fn cache_path(dir: &Path, symbol: &str, interval: &str, days: u32) -> PathBuf {
    dir.join(format!("{}_{interval}_{days}.csv", symbol.to_uppercase()))
}

/// Read a cached series, if present and non-empty.
pub fn load(dir: &Path, symbol: &str, interval: &str, days: u32) -> Result<Option<Vec<Candle>>> {
    let path = cache_path(dir, symbol, interval, days);
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = csv::Reader::from_path(&path)?;
    let candles: Vec<Candle> = reader.deserialize().collect::<Result<_, csv::Error>>()?;
    if candles.is_empty() {
        return Ok(None);
    }
    debug!(path = %path.display(), rows = candles.len(), "cache hit");
    Ok(Some(candles))
}

/// Write a full series to the cache, replacing any previous file.
pub fn store(dir: &Path, symbol: &str, interval: &str, days: u32, candles: &[Candle]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = cache_path(dir, symbol, interval, days);
    let mut writer = csv::Writer::from_path(&path)?;
    for candle in candles {
        writer.serialize(candle)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = candles.len(), "cache written");
    Ok(())
}

/// Sort by timestamp and drop duplicate candles (paged downloads overlap at
/// page boundaries).
pub fn merge_dedup(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.time);
    candles.dedup_by_key(|c| c.time);
    candles
}
