//! Binance USDⓈ-M futures REST client: candle history and the tradable
//! symbol universe. Public endpoints only; nothing here is signed.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use common::{Candle, CandleSource, Error, Result};

use crate::cache;

const BASE_URL: &str = "https://fapi.binance.com";
/// Largest page the klines endpoint will return.
const PAGE_LIMIT: u32 = 1500;
/// Pacing between history pages to stay under the rate limit.
const PAGE_PAUSE_MS: u64 = 300;
const PAGE_RETRIES: u32 = 3;
const RETRY_PAUSE_SECS: u64 = 5;

/// Candle source backed by the Binance futures API with a CSV cache for
/// historical downloads.
pub struct BinanceFutures {
    http: Client,
    cache_dir: PathBuf,
}

impl BinanceFutures {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: Client::builder()
                .use_rustls_tls()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            cache_dir: cache_dir.into(),
        }
    }

    async fn get_klines(&self, url: &str) -> Result<Vec<Vec<Value>>> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        klines_payload(serde_json::from_str(&body)?)
    }

    async fn get_klines_with_retry(&self, url: &str) -> Result<Vec<Vec<Value>>> {
        let mut attempt = 1;
        loop {
            match self.get_klines(url).await {
                Ok(rows) => return Ok(rows),
                Err(e) if attempt < PAGE_RETRIES => {
                    warn!(attempt, error = %e, "klines page failed, retrying");
                    tokio::time::sleep(Duration::from_secs(RETRY_PAUSE_SECS)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// All active USDT-quoted futures pairs (perpetual or current-month),
    /// sorted. Feeds the `symbols` command.
    pub async fn exchange_symbols(&self) -> Result<Vec<String>> {
        let url = format!("{BASE_URL}/fapi/v1/exchangeInfo");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let info: ExchangeInfo = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;

        let mut symbols: Vec<String> = info
            .symbols
            .into_iter()
            .filter(|s| {
                s.status == "TRADING"
                    && matches!(s.contract_type.as_str(), "PERPETUAL" | "CURRENT_MONTH")
                    && s.symbol.ends_with("USDT")
            })
            .map(|s| s.symbol)
            .collect();
        symbols.sort();
        if symbols.is_empty() {
            return Err(Error::DataUnavailable(
                "exchange returned no tradable USDT futures pairs".to_string(),
            ));
        }
        Ok(symbols)
    }
}

#[async_trait]
impl CandleSource for BinanceFutures {
    async fn fetch(&self, symbol: &str, interval: &str, days: u32) -> Result<Vec<Candle>> {
        if let Some(cached) = cache::load(&self.cache_dir, symbol, interval, days)? {
            return Ok(cached);
        }

        let symbol = symbol.to_uppercase();
        let end = Utc::now().timestamp_millis();
        let mut start = end - days as i64 * 86_400_000;
        let mut all: Vec<Candle> = Vec::new();

        info!(symbol = %symbol, interval, days, "downloading history");
        loop {
            let url = format!(
                "{BASE_URL}/fapi/v1/klines?symbol={symbol}&interval={interval}\
                 &limit={PAGE_LIMIT}&startTime={start}&endTime={end}"
            );
            let rows = self.get_klines_with_retry(&url).await?;
            if rows.is_empty() {
                break;
            }
            let page_len = rows.len();
            let mut last_close = 0;
            for row in &rows {
                let (candle, close_time) = parse_kline(row)?;
                all.push(candle);
                last_close = close_time;
            }
            if last_close >= end || page_len < PAGE_LIMIT as usize {
                break;
            }
            start = last_close + 1;
            tokio::time::sleep(Duration::from_millis(PAGE_PAUSE_MS)).await;
        }

        if all.is_empty() {
            return Err(Error::DataUnavailable(format!(
                "no candles for {symbol} ({interval}, {days}d)"
            )));
        }

        let all = cache::merge_dedup(all);
        cache::store(&self.cache_dir, &symbol, interval, days, &all)?;
        Ok(all)
    }

    async fn fetch_latest(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let symbol = symbol.to_uppercase();
        let url = format!(
            "{BASE_URL}/fapi/v1/klines?symbol={symbol}&interval={interval}&limit={}",
            limit.min(PAGE_LIMIT)
        );
        let rows = self.get_klines(&url).await?;
        let candles = closed_candles(&rows, Utc::now().timestamp_millis())?;
        if candles.is_empty() {
            return Err(Error::DataUnavailable(format!(
                "no closed candles for {symbol} ({interval})"
            )));
        }
        debug!(symbol = %symbol, interval, candles = candles.len(), "latest candles fetched");
        Ok(candles)
    }
}

/// The klines endpoint returns an array of rows on success and an error
/// object (`{"code": .., "msg": ..}`) on failure.
fn klines_payload(value: Value) -> Result<Vec<Vec<Value>>> {
    match value {
        Value::Array(rows) => rows
            .into_iter()
            .map(|row| match row {
                Value::Array(fields) => Ok(fields),
                _ => Err(Error::Exchange("malformed kline row".to_string())),
            })
            .collect(),
        Value::Object(obj) => {
            let msg = obj
                .get("msg")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown exchange error");
            Err(Error::Exchange(msg.to_string()))
        }
        _ => Err(Error::Exchange("unexpected klines payload".to_string())),
    }
}

/// One kline row: `[openTime, open, high, low, close, volume, closeTime, …]`
/// with prices and volume as strings. Returns the candle and its close time.
fn parse_kline(row: &[Value]) -> Result<(Candle, i64)> {
    let field = |i: usize| -> Result<f64> {
        row.get(i)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Exchange(format!("malformed kline field {i}")))
    };
    let open_time = row
        .first()
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::Exchange("malformed kline open time".to_string()))?;
    let close_time = row
        .get(6)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::Exchange("malformed kline close time".to_string()))?;
    let time = Utc
        .timestamp_millis_opt(open_time)
        .single()
        .ok_or_else(|| Error::Exchange(format!("kline open time out of range: {open_time}")))?;

    Ok((
        Candle {
            time,
            open: field(1)?,
            high: field(2)?,
            low: field(3)?,
            close: field(4)?,
            volume: field(5)?,
        },
        close_time,
    ))
}

/// Parse rows, keeping only candles that have already closed — the running
/// candle must never feed the strategy.
fn closed_candles(rows: &[Vec<Value>], now_ms: i64) -> Result<Vec<Candle>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let (candle, close_time) = parse_kline(row)?;
        if close_time < now_ms {
            out.push(candle);
        }
    }
    Ok(out)
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    #[serde(default)]
    contract_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_row() -> Vec<Value> {
        serde_json::from_str(
            r#"[1700000000000, "37000.10", "37100.00", "36900.50", "37050.00", "1234.56",
                1700001799999, "45000000.0", 2500, "600.0", "22000000.0", "0"]"#,
        )
        .unwrap()
    }

    #[test]
    fn parse_kline_decodes_a_real_row() {
        let (candle, close_time) = parse_kline(&fixture_row()).unwrap();
        assert_eq!(candle.time.timestamp_millis(), 1_700_000_000_000);
        assert!((candle.open - 37000.10).abs() < 1e-9);
        assert!((candle.high - 37100.00).abs() < 1e-9);
        assert!((candle.low - 36900.50).abs() < 1e-9);
        assert!((candle.close - 37050.00).abs() < 1e-9);
        assert!((candle.volume - 1234.56).abs() < 1e-9);
        assert_eq!(close_time, 1_700_001_799_999);
    }

    #[test]
    fn parse_kline_rejects_malformed_rows() {
        let row: Vec<Value> = serde_json::from_str(r#"["not-a-time", "37000"]"#).unwrap();
        assert!(parse_kline(&row).is_err());
    }

    #[test]
    fn error_object_payload_becomes_exchange_error() {
        let payload: Value =
            serde_json::from_str(r#"{"code": -1121, "msg": "Invalid symbol."}"#).unwrap();
        let err = klines_payload(payload).unwrap_err();
        assert!(matches!(err, Error::Exchange(ref m) if m == "Invalid symbol."));
    }

    #[test]
    fn array_payload_yields_rows() {
        let payload: Value = serde_json::from_str(
            r#"[[1700000000000, "1", "2", "0.5", "1.5", "10", 1700001799999, "0", 1, "0", "0", "0"]]"#,
        )
        .unwrap();
        let rows = klines_payload(payload).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn running_candle_is_dropped() {
        let rows = vec![fixture_row(), {
            let mut open_row = fixture_row();
            open_row[0] = Value::from(1_700_001_800_000i64);
            open_row[6] = Value::from(1_700_003_599_999i64); // closes in the future
            open_row
        }];
        // "now" is after the first close but before the second.
        let candles = closed_candles(&rows, 1_700_002_000_000).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].time.timestamp_millis(), 1_700_000_000_000);
    }
}
