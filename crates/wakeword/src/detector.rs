//! Pluggable per-frame wake-word detector. Model internals are out of scope;
//! only the scoring interface the [`WakeWordOperator`](crate::operator::WakeWordOperator)
//! drives.

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("inference failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, DetectorError>;

pub trait WakeWordScorer: Send {
    /// Stable identifier for the wake-word model, reported in `wake_triggered`.
    fn model(&self) -> &'static str;

    /// Score one frame of mono 16 kHz `f32` samples, returning the
    /// instantaneous wake-word confidence in `[0, 1]`.
    fn score(&mut self, frame: &[f32]) -> Result<f32>;

    fn reset(&mut self);
}

/// Deterministic reference scorer: a fixed score on every call, for hosts and
/// tests that have not wired in a real model.
pub struct ConstantScorer {
    model: &'static str,
    value: f32,
}

impl ConstantScorer {
    pub fn new(model: &'static str, value: f32) -> Self {
        Self { model, value: value.clamp(0.0, 1.0) }
    }
}

impl WakeWordScorer for ConstantScorer {
    fn model(&self) -> &'static str {
        self.model
    }

    fn score(&mut self, _frame: &[f32]) -> Result<f32> {
        Ok(self.value)
    }

    fn reset(&mut self) {}
}
