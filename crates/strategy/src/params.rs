use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Strategy tunables — one immutable configuration point.
///
/// Loaded from `config/params.toml` and passed explicitly into every
/// pipeline stage; the optimizer enumerates variations of this struct.
///
/// Example `config/params.toml`:
/// ```toml
/// ema_short = 15
/// ema_mid = 25
/// ema_long = 50
/// bb_std = 2.0
/// vol_mult = 1.3
/// use_candle_confirmation = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Fast EMA period.
    pub ema_short: usize,
    /// Mid EMA period.
    pub ema_mid: usize,
    /// Slow EMA period; also drives the signal warm-up window.
    pub ema_long: usize,
    /// Bollinger band width in standard deviations.
    pub bb_std: f64,
    /// Volume breakout multiplier over the 20-candle average.
    pub vol_mult: f64,
    /// Require a candlestick pattern at the signal candle.
    pub use_candle_confirmation: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            ema_short: 15,
            ema_mid: 25,
            ema_long: 50,
            bb_std: 2.0,
            vol_mult: 1.3,
            use_candle_confirmation: false,
        }
    }
}

impl Params {
    /// Load from a TOML file. Missing keys fall back to defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read params at '{path}': {e}")))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse params at '{path}': {e}")))
    }

    /// Index of the first candle eligible for signal evaluation.
    pub fn warmup(&self) -> usize {
        self.ema_long.max(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_production_values() {
        let p = Params::default();
        assert_eq!(p.ema_short, 15);
        assert_eq!(p.ema_mid, 25);
        assert_eq!(p.ema_long, 50);
        assert!((p.bb_std - 2.0).abs() < 1e-12);
        assert!((p.vol_mult - 1.3).abs() < 1e-12);
        assert!(!p.use_candle_confirmation);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let p: Params = toml::from_str("ema_short = 10\nbb_std = 1.8\n").unwrap();
        assert_eq!(p.ema_short, 10);
        assert!((p.bb_std - 1.8).abs() < 1e-12);
        assert_eq!(p.ema_long, 50);
        assert!((p.vol_mult - 1.3).abs() < 1e-12);
    }

    #[test]
    fn warmup_is_at_least_fifty() {
        assert_eq!(Params::default().warmup(), 50);
        let long = Params {
            ema_long: 80,
            ..Params::default()
        };
        assert_eq!(long.warmup(), 80);
    }
}
