//! Discord webhook alert sink.
//!
//! Fire-and-forget by contract: delivery failures are logged and swallowed,
//! the scanner never waits on or reacts to the result beyond the bounded
//! retry here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use common::{AlertSink, Signal};

const RETRIES: u32 = 3;
const RETRY_PAUSE_SECS: u64 = 3;

pub struct DiscordWebhook {
    url: String,
    http: Client,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: Client::builder()
                .use_rustls_tls()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

fn build_message(symbol: &str, interval: &str, signal: &Signal) -> String {
    format!(
        "🔔 **{symbol} ({interval})**\n\
         ➡️ Signal: **{}**\n\
         💰 Entry: `{}`\n\
         🎯 TP: `{}`\n\
         🛑 SL: `{}`\n\
         🕒 Time: {}\n\
         -----------------------------",
        signal.side,
        signal.entry,
        signal.take_profit,
        signal.stop_loss,
        signal.time.format("%Y-%m-%d %H:%M:%S"),
    )
}

#[async_trait]
impl AlertSink for DiscordWebhook {
    async fn notify(&self, symbol: &str, interval: &str, signal: &Signal) {
        let payload = serde_json::json!({ "content": build_message(symbol, interval, signal) });

        for attempt in 1..=RETRIES {
            match self.http.post(&self.url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(symbol, interval, "alert delivered");
                    return;
                }
                Ok(resp) => {
                    warn!(symbol, attempt, status = %resp.status(), "webhook rejected alert");
                }
                Err(e) => {
                    warn!(symbol, attempt, error = %e, "webhook request failed");
                }
            }
            if attempt < RETRIES {
                tokio::time::sleep(Duration::from_secs(RETRY_PAUSE_SECS)).await;
            }
        }
        warn!(symbol, interval, "alert dropped after {RETRIES} attempts");
    }
}
