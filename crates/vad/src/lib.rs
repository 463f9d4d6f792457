//! Stateful voice-activity detection: a pluggable scorer plus smoothing,
//! adaptive threshold and hysteresis, one instance per session.

mod operator;
mod scorer;

pub use operator::{VadConfig, VadEdge, VadFrameResult, VadOperator, VadStats, FRAME_SAMPLES, SAMPLE_RATE_HZ};
pub use scorer::{EnergyScorer, Result, ScorerError, SpeechScorer};
