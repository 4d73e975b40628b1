use async_trait::async_trait;

use crate::{Candle, Result, Signal};

/// Abstraction over the historical candle feed.
///
/// `BinanceFutures` in `crates/data` implements this against the exchange
/// REST API with an on-disk cache. The backtest engine and optimizer only
/// ever see this trait, so tests substitute synthetic sources.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch roughly `days` of history for one (symbol, interval) pair,
    /// oldest first. Fails with `Error::DataUnavailable` when the source
    /// returns no candles.
    async fn fetch(&self, symbol: &str, interval: &str, days: u32) -> Result<Vec<Candle>>;

    /// Fetch the most recent `limit` closed candles, oldest first.
    /// The running (unclosed) candle is never included.
    async fn fetch_latest(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>>;
}

/// Delivery channel for freshly generated signals.
///
/// Fire-and-forget: implementations log failures and never surface them —
/// the scanner does not depend on delivery succeeding.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, symbol: &str, interval: &str, signal: &Signal);
}
