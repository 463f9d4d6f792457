//! Stateful wake-word detection: a pluggable scorer plus a scoring window and
//! cooldown gate, one instance per session.

mod detector;
mod operator;

pub use detector::{ConstantScorer, DetectorError, Result, WakeWordScorer};
pub use operator::{WakeWordConfig, WakeWordHit, WakeWordOperator, SCORE_WINDOW};
