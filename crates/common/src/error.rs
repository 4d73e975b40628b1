use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Empty input: no candles to process")]
    EmptyInput,

    #[error("Insufficient history: have {have} candles, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
