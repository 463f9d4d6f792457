//! Stateful VAD operator: smoothing, adaptive threshold and hysteresis wrapped
//! around a pluggable [`SpeechScorer`].

use crate::scorer::{Result, SpeechScorer};
use std::collections::VecDeque;
use std::time::Duration;

pub const FRAME_SAMPLES: usize = 512;
pub const SAMPLE_RATE_HZ: u32 = 16_000;

#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// Frames averaged (weighted, most recent highest) for smoothing.
    pub smoothing_window: usize,
    /// Use `mean + k*sigma` of a trailing window instead of `fixed_threshold`.
    pub adaptive: bool,
    pub fixed_threshold: f32,
    pub adaptive_k: f32,
    pub adaptive_window: usize,
    pub adaptive_bounds: (f32, f32),
    pub min_silence_duration: Duration,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 5,
            adaptive: true,
            fixed_threshold: 0.5,
            adaptive_k: 2.0,
            adaptive_window: 50,
            adaptive_bounds: (0.3, 0.8),
            min_silence_duration: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VadStats {
    pub speech_frames: u64,
    pub silence_frames: u64,
    pub segments: u64,
    sum_confidence: f64,
    confidence_samples: u64,
}

impl VadStats {
    pub fn average_confidence(&self) -> f32 {
        if self.confidence_samples == 0 {
            0.0
        } else {
            (self.sum_confidence / self.confidence_samples as f64) as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEdge {
    SpeechStart,
    SpeechEnd,
}

#[derive(Debug, Clone, Copy)]
pub struct VadFrameResult {
    pub raw_probability: f32,
    pub smoothed_probability: f32,
    pub effective_threshold: f32,
    pub is_speech: bool,
    pub edge: Option<VadEdge>,
}

/// One session's VAD state: the scorer plus smoothing/threshold/hysteresis
/// bookkeeping. Never shared across sessions.
pub struct VadOperator {
    scorer: Box<dyn SpeechScorer>,
    config: VadConfig,
    raw_window: VecDeque<f32>,
    adaptive_window: VecDeque<f32>,
    in_speech: bool,
    sub_threshold_run: Duration,
    frame_duration: Duration,
    stats: VadStats,
}

impl VadOperator {
    pub fn new(scorer: Box<dyn SpeechScorer>, config: VadConfig) -> Self {
        let frame_duration = Duration::from_secs_f64(FRAME_SAMPLES as f64 / SAMPLE_RATE_HZ as f64);
        Self {
            scorer,
            config,
            raw_window: VecDeque::with_capacity(config.smoothing_window),
            adaptive_window: VecDeque::with_capacity(config.adaptive_window),
            in_speech: false,
            sub_threshold_run: Duration::ZERO,
            frame_duration,
            stats: VadStats::default(),
        }
    }

    pub fn stats(&self) -> VadStats {
        self.stats
    }

    pub fn is_speech(&self) -> bool {
        self.in_speech
    }

    fn smoothed(&self) -> f32 {
        if self.raw_window.is_empty() {
            return 0.0;
        }
        let n = self.raw_window.len();
        let mut weighted_sum = 0.0f32;
        let mut weight_total = 0.0f32;
        for (i, &score) in self.raw_window.iter().enumerate() {
            // Most recent (highest index) weighted most heavily.
            let weight = (i + 1) as f32;
            weighted_sum += score * weight;
            weight_total += weight;
        }
        let _ = n;
        weighted_sum / weight_total
    }

    fn effective_threshold(&self) -> f32 {
        if !self.config.adaptive || self.adaptive_window.len() < 2 {
            return self.config.fixed_threshold;
        }
        let n = self.adaptive_window.len() as f32;
        let mean = self.adaptive_window.iter().sum::<f32>() / n;
        let variance = self.adaptive_window.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        let sigma = variance.sqrt();
        let (lo, hi) = self.config.adaptive_bounds;
        (mean + self.config.adaptive_k * sigma).clamp(lo, hi)
    }

    /// Process one `FRAME_SAMPLES`-sample mono frame. Edges are reported via
    /// `VadFrameResult::edge`: entering speech is immediate on crossing the
    /// threshold; leaving speech requires `min_silence_duration` of
    /// continuous sub-threshold frames.
    pub fn process_frame(&mut self, frame: &[f32]) -> Result<VadFrameResult> {
        let raw = self.scorer.score(frame)?;

        if self.raw_window.len() == self.config.smoothing_window {
            self.raw_window.pop_front();
        }
        self.raw_window.push_back(raw);

        if self.adaptive_window.len() == self.config.adaptive_window {
            self.adaptive_window.pop_front();
        }
        self.adaptive_window.push_back(raw);

        let smoothed = self.smoothed();
        let threshold = self.effective_threshold();
        let above = smoothed >= threshold;

        let mut edge = None;
        if above {
            self.sub_threshold_run = Duration::ZERO;
            if !self.in_speech {
                self.in_speech = true;
                self.stats.segments += 1;
                edge = Some(VadEdge::SpeechStart);
            }
            self.stats.speech_frames += 1;
        } else {
            self.stats.silence_frames += 1;
            if self.in_speech {
                self.sub_threshold_run += self.frame_duration;
                if self.sub_threshold_run >= self.config.min_silence_duration {
                    self.in_speech = false;
                    self.sub_threshold_run = Duration::ZERO;
                    edge = Some(VadEdge::SpeechEnd);
                }
            }
        }

        self.stats.sum_confidence += smoothed as f64;
        self.stats.confidence_samples += 1;

        Ok(VadFrameResult {
            raw_probability: raw,
            smoothed_probability: smoothed,
            effective_threshold: threshold,
            is_speech: self.in_speech,
            edge,
        })
    }

    pub fn reset(&mut self) {
        self.scorer.reset();
        self.raw_window.clear();
        self.adaptive_window.clear();
        self.in_speech = false;
        self.sub_threshold_run = Duration::ZERO;
        self.stats = VadStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::EnergyScorer;

    fn loud_frame() -> Vec<f32> {
        vec![0.5; FRAME_SAMPLES]
    }

    fn silent_frame() -> Vec<f32> {
        vec![0.0; FRAME_SAMPLES]
    }

    #[test]
    fn speech_start_fires_immediately_on_threshold_cross() {
        let mut op = VadOperator::new(
            Box::new(EnergyScorer::new(0.5)),
            VadConfig {
                adaptive: false,
                fixed_threshold: 0.5,
                smoothing_window: 1,
                ..Default::default()
            },
        );
        let result = op.process_frame(&loud_frame()).unwrap();
        assert!(result.is_speech);
        assert_eq!(result.edge, Some(VadEdge::SpeechStart));
    }

    #[test]
    fn speech_end_requires_sustained_silence() {
        let mut op = VadOperator::new(
            Box::new(EnergyScorer::new(0.5)),
            VadConfig {
                adaptive: false,
                fixed_threshold: 0.5,
                smoothing_window: 1,
                min_silence_duration: Duration::from_millis(64), // 2 frames @ 32ms
                ..Default::default()
            },
        );
        op.process_frame(&loud_frame()).unwrap();
        let mid = op.process_frame(&silent_frame()).unwrap();
        assert!(mid.is_speech, "single silent frame must not end speech yet");
        assert_eq!(mid.edge, None);
        let end = op.process_frame(&silent_frame()).unwrap();
        assert!(!end.is_speech);
        assert_eq!(end.edge, Some(VadEdge::SpeechEnd));
    }

    #[test]
    fn adaptive_threshold_is_clamped_to_bounds() {
        let mut op = VadOperator::new(Box::new(EnergyScorer::new(1.0)), VadConfig::default());
        for _ in 0..60 {
            op.process_frame(&loud_frame()).unwrap();
        }
        let threshold = op.effective_threshold();
        assert!(threshold >= op.config.adaptive_bounds.0);
        assert!(threshold <= op.config.adaptive_bounds.1);
    }

    #[test]
    fn stats_accumulate_across_frames() {
        let mut op = VadOperator::new(
            Box::new(EnergyScorer::new(0.5)),
            VadConfig {
                adaptive: false,
                ..Default::default()
            },
        );
        op.process_frame(&loud_frame()).unwrap();
        op.process_frame(&silent_frame()).unwrap();
        let stats = op.stats();
        assert_eq!(stats.speech_frames + stats.silence_frames, 2);
    }

    #[test]
    fn reset_clears_hysteresis_state() {
        let mut op = VadOperator::new(
            Box::new(EnergyScorer::new(0.5)),
            VadConfig {
                adaptive: false,
                ..Default::default()
            },
        );
        op.process_frame(&loud_frame()).unwrap();
        assert!(op.is_speech());
        op.reset();
        assert!(!op.is_speech());
        assert_eq!(op.stats().speech_frames, 0);
    }
}
