pub mod indicators;
pub mod params;
pub mod patterns;
pub mod signals;

pub use indicators::{compute_indicators, EnrichedCandle};
pub use params::Params;
pub use patterns::{detect_pattern, Direction, Pattern, PatternHit};
pub use signals::generate_signals;
