use crate::{Error, Result};

/// Process configuration loaded from environment variables at startup.
/// Everything has a sensible default; nothing is secret, so nothing panics.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord webhook for signal alerts. Alerts are skipped when unset.
    pub webhook_url: Option<String>,

    /// Strategy parameter file (TOML).
    pub params_path: String,
    /// Symbol universe file (JSON array), refreshed by the `symbols` command.
    pub symbols_path: String,

    /// Candle cache directory.
    pub cache_dir: String,
    /// Output directory for optimizer results.
    pub results_dir: String,

    /// Upper bound on concurrent backtest units.
    pub max_workers: usize,

    /// Seconds between scanner sweeps.
    pub scan_interval_secs: u64,
    /// Candle intervals the scanner watches, e.g. ["15m", "30m"].
    pub scan_intervals: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Config {
            webhook_url: optional_env("WEBHOOK_URL"),
            params_path: optional_env("PARAMS_PATH")
                .unwrap_or_else(|| "config/params.toml".to_string()),
            symbols_path: optional_env("SYMBOLS_PATH")
                .unwrap_or_else(|| "config/symbols.json".to_string()),
            cache_dir: optional_env("CACHE_DIR").unwrap_or_else(|| "data_cache".to_string()),
            results_dir: optional_env("RESULTS_DIR").unwrap_or_else(|| "results".to_string()),
            max_workers: optional_env("MAX_WORKERS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| cores.min(8)),
            scan_interval_secs: optional_env("SCAN_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            scan_intervals: optional_env("SCAN_INTERVALS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| vec!["30m".to_string()]),
        }
    }

    /// Read the symbol universe from `symbols_path` (JSON array of pairs).
    pub fn load_symbols(&self) -> Result<Vec<String>> {
        let raw = std::fs::read_to_string(&self.symbols_path).map_err(|e| {
            Error::Config(format!(
                "failed to read symbol list '{}': {e}",
                self.symbols_path
            ))
        })?;
        let symbols: Vec<String> = serde_json::from_str(&raw)?;
        if symbols.is_empty() {
            return Err(Error::Config(format!(
                "symbol list '{}' is empty",
                self.symbols_path
            )));
        }
        Ok(symbols)
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
