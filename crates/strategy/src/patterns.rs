//! Candlestick pattern detection over the enriched series.
//!
//! Advisory context for the signal rule: a hit never forces a trade, and
//! with pattern confirmation enabled only presence is required, not
//! direction agreement.

use crate::indicators::EnrichedCandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    BullishPinBar,
    BearishPinBar,
    BullishEngulfing,
    BearishEngulfing,
    Doji,
    MorningStar,
    EveningStar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

/// Detector output; `pattern: None` means no recognizable formation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternHit {
    pub pattern: Option<Pattern>,
    pub direction: Direction,
}

impl PatternHit {
    fn none() -> Self {
        Self {
            pattern: None,
            direction: Direction::Neutral,
        }
    }

    fn hit(pattern: Pattern, direction: Direction) -> Self {
        Self {
            pattern: Some(pattern),
            direction,
        }
    }
}

/// Classify the candle at `index` against its 1–2 predecessors.
/// First match wins: pin bar, engulfing, doji, morning/evening star.
/// Needs at least 2 preceding candles; otherwise no pattern.
pub fn detect_pattern(rows: &[EnrichedCandle], index: usize) -> PatternHit {
    if index < 2 || index >= rows.len() {
        return PatternHit::none();
    }

    let c = &rows[index].candle;
    let prev = &rows[index - 1].candle;
    let prev2 = &rows[index - 2].candle;

    let body = (c.close - c.open).abs();
    let range = c.high - c.low;
    let upper_shadow = c.high - c.open.max(c.close);
    let lower_shadow = c.open.min(c.close) - c.low;

    // Pin bar: one shadow dominates a non-zero body.
    if body > 0.0 && (upper_shadow > 2.0 * body || lower_shadow > 2.0 * body) {
        if lower_shadow > 2.0 * body && c.close > c.open {
            return PatternHit::hit(Pattern::BullishPinBar, Direction::Bullish);
        }
        if upper_shadow > 2.0 * body && c.close < c.open {
            return PatternHit::hit(Pattern::BearishPinBar, Direction::Bearish);
        }
    }

    // Engulfing: current body fully contains and reverses the prior body.
    if c.close > c.open && prev.close < prev.open && c.close > prev.open && c.open < prev.close {
        return PatternHit::hit(Pattern::BullishEngulfing, Direction::Bullish);
    }
    if c.close < c.open && prev.close > prev.open && c.open > prev.close && c.close < prev.open {
        return PatternHit::hit(Pattern::BearishEngulfing, Direction::Bearish);
    }

    // Doji: tiny body relative to range.
    if range > 0.0 && body / range < 0.1 {
        return PatternHit::hit(Pattern::Doji, Direction::Neutral);
    }

    // Morning/Evening star: trend candle, small middle body, strong reversal
    // closing beyond the first candle's midpoint.
    let prev_body = (prev.close - prev.open).abs();
    let prev2_body = (prev2.close - prev2.open).abs();
    let prev2_mid = (prev2.open + prev2.close) / 2.0;
    if prev2.close < prev2.open
        && prev_body < prev2_body * 0.5
        && c.close > c.open
        && c.close > prev2_mid
    {
        return PatternHit::hit(Pattern::MorningStar, Direction::Bullish);
    }
    if prev2.close > prev2.open
        && prev_body < prev2_body * 0.5
        && c.close < c.open
        && c.close < prev2_mid
    {
        return PatternHit::hit(Pattern::EveningStar, Direction::Bearish);
    }

    PatternHit::none()
}
