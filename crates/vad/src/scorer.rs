//! The pluggable per-frame speech scorer. Model internals (neural VAD
//! weights, feature extraction) are not this crate's concern — only the
//! interface the [`VadOperator`](crate::operator::VadOperator) drives.

#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("inference failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, ScorerError>;

/// A stateful per-session speech/silence scorer. Implementations may carry a
/// hidden state vector across calls (e.g. a recurrent neural VAD); `reset`
/// clears it back to the scorer's initial state.
pub trait SpeechScorer: Send {
    fn name(&self) -> &'static str;

    /// Score one fixed-size frame of mono `f32` samples, returning a speech
    /// probability in `[0, 1]`.
    fn score(&mut self, frame: &[f32]) -> Result<f32>;

    fn reset(&mut self);
}

/// Deterministic, model-free reference scorer: frame RMS energy normalised
/// against a fixed ceiling. Exists for tests and for hosts that have not
/// wired in a real model; production deployments supply their own
/// `SpeechScorer`.
pub struct EnergyScorer {
    ceiling: f32,
}

impl EnergyScorer {
    pub fn new(ceiling: f32) -> Self {
        Self { ceiling: ceiling.max(f32::EPSILON) }
    }
}

impl Default for EnergyScorer {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl SpeechScorer for EnergyScorer {
    fn name(&self) -> &'static str {
        "energy-reference"
    }

    fn score(&mut self, frame: &[f32]) -> Result<f32> {
        if frame.is_empty() {
            return Ok(0.0);
        }
        let mean_sq = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        let rms = mean_sq.sqrt();
        Ok((rms / self.ceiling).clamp(0.0, 1.0))
    }

    fn reset(&mut self) {}
}
