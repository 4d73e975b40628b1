pub mod binance;
pub mod cache;

pub use binance::BinanceFutures;
