mod scan;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backtest::BacktestConfig;
use common::Config;
use data::BinanceFutures;
use optimizer::OptimizerConfig;
use strategy::Params;

#[derive(Parser)]
#[command(name = "sigscan", about = "Signal scanner, backtester and parameter optimizer for Binance futures")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan all configured pairs on a fixed cadence and alert fresh signals.
    Scan,
    /// Backtest the strategy over historical candles and write the trade
    /// and summary tables.
    Backtest {
        /// Days of history per (symbol, interval) unit.
        #[arg(long, default_value_t = 365)]
        days: u32,
        /// Candle intervals to test (repeatable).
        #[arg(long = "interval", default_values_t = vec!["30m".to_string()])]
        intervals: Vec<String>,
        /// Outcome-resolution horizon in candles.
        #[arg(long, default_value_t = 50)]
        lookahead: usize,
        /// Keep unresolved signals as NONE trades in the tables and rates.
        #[arg(long)]
        count_unresolved: bool,
    },
    /// Search the parameter grid and persist the best configuration.
    Optimize,
    /// Refresh the tradable futures symbol universe file.
    Symbols,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env();

    match cli.command {
        Command::Scan => scan::run(&cfg, load_params(&cfg)).await?,
        Command::Backtest {
            days,
            intervals,
            lookahead,
            count_unresolved,
        } => run_backtest(&cfg, days, intervals, lookahead, count_unresolved).await?,
        Command::Optimize => run_optimize(&cfg).await?,
        Command::Symbols => refresh_symbols(&cfg).await?,
    }
    Ok(())
}

/// Load tunables from the params file, falling back to defaults so a fresh
/// checkout works without any setup.
fn load_params(cfg: &Config) -> Params {
    match Params::load(&cfg.params_path) {
        Ok(params) => params,
        Err(e) => {
            warn!(error = %e, "using default parameters");
            Params::default()
        }
    }
}

async fn run_backtest(
    cfg: &Config,
    days: u32,
    intervals: Vec<String>,
    lookahead: usize,
    count_unresolved: bool,
) -> anyhow::Result<()> {
    let params = load_params(cfg);
    let symbols = cfg.load_symbols()?;
    let source = Arc::new(BinanceFutures::new(&cfg.cache_dir));

    let bt_cfg = BacktestConfig {
        days,
        lookahead,
        max_workers: cfg.max_workers,
        count_unresolved,
    };
    info!(
        symbols = symbols.len(),
        intervals = intervals.len(),
        days,
        "starting backtest"
    );
    let (summary, trades) =
        backtest::run_backtest(source, &symbols, &intervals, &params, &bt_cfg).await;

    backtest::write_trades("backtest_trades.csv", &trades)?;
    backtest::write_summary("backtest_results.csv", &summary)?;
    info!(
        total = summary.total_trades,
        tp = summary.tp_count,
        sl = summary.sl_count,
        win_rate_pct = summary.win_rate,
        avg_profit_pct = summary.avg_profit_pct,
        total_profit_pct = summary.total_profit_pct,
        "backtest complete"
    );
    Ok(())
}

async fn run_optimize(cfg: &Config) -> anyhow::Result<()> {
    let source = BinanceFutures::new(&cfg.cache_dir);
    let opt_cfg = OptimizerConfig {
        base: load_params(cfg),
        ..OptimizerConfig::default()
    };
    let best = optimizer::optimize(&source, &opt_cfg).await?;

    let out = std::path::Path::new(&cfg.results_dir).join("best_params.json");
    optimizer::write_best(&out, &best)?;

    // Feed the tuned values back into the params file so the scanner and
    // backtester pick them up on the next run.
    let rendered = toml::to_string_pretty(&best.params)
        .map_err(|e| anyhow::anyhow!("failed to encode params: {e}"))?;
    std::fs::write(&cfg.params_path, rendered)?;
    info!(
        win_rate_pct = best.win_rate,
        avg_profit_pct = best.avg_profit,
        params_path = %cfg.params_path,
        "optimization complete, params file updated"
    );
    Ok(())
}

async fn refresh_symbols(cfg: &Config) -> anyhow::Result<()> {
    let source = BinanceFutures::new(&cfg.cache_dir);
    let symbols = source.exchange_symbols().await?;
    let json = serde_json::to_string_pretty(&symbols)?;
    std::fs::write(&cfg.symbols_path, json)?;
    info!(
        count = symbols.len(),
        path = %cfg.symbols_path,
        "symbol universe refreshed"
    );
    Ok(())
}
