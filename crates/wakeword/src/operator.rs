//! Stateful wake-word operator: a sliding window of recent scores plus a
//! per-session cooldown gate, wrapped around a pluggable [`WakeWordScorer`].

use crate::detector::{Result, WakeWordScorer};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Frames of score history retained per model, per spec's "~60 frames".
pub const SCORE_WINDOW: usize = 60;

#[derive(Debug, Clone, Copy)]
pub struct WakeWordConfig {
    pub threshold: f32,
    pub cooldown: Duration,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            cooldown: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WakeWordHit {
    pub model: &'static str,
    pub score: f32,
}

/// One session's wake-word state: never shared across sessions. `last_fire`
/// is `None` until the first detection or until an FSM `RESET`.
pub struct WakeWordOperator {
    scorer: Box<dyn WakeWordScorer>,
    config: WakeWordConfig,
    scores: VecDeque<f32>,
    last_fire: Option<Instant>,
}

impl WakeWordOperator {
    pub fn new(scorer: Box<dyn WakeWordScorer>, config: WakeWordConfig) -> Self {
        Self {
            scorer,
            config,
            scores: VecDeque::with_capacity(SCORE_WINDOW),
            last_fire: None,
        }
    }

    pub fn score_history(&self) -> &VecDeque<f32> {
        &self.scores
    }

    fn in_cooldown(&self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) => now.duration_since(last) < self.config.cooldown,
            None => false,
        }
    }

    /// Score one frame. Fires when the instantaneous score exceeds the
    /// threshold *and* the per-session cooldown has elapsed.
    pub fn process_frame(&mut self, frame: &[f32], now: Instant) -> Result<Option<WakeWordHit>> {
        let score = self.scorer.score(frame)?;

        if self.scores.len() == SCORE_WINDOW {
            self.scores.pop_front();
        }
        self.scores.push_back(score);

        if score > self.config.threshold && !self.in_cooldown(now) {
            self.last_fire = Some(now);
            return Ok(Some(WakeWordHit {
                model: self.scorer.model(),
                score,
            }));
        }
        Ok(None)
    }

    /// Reset cooldown and score history, per FSM `RESET` semantics.
    pub fn reset(&mut self) {
        self.scorer.reset();
        self.scores.clear();
        self.last_fire = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ConstantScorer;

    #[test]
    fn fires_above_threshold() {
        let mut op = WakeWordOperator::new(
            Box::new(ConstantScorer::new("test-model", 0.9)),
            WakeWordConfig::default(),
        );
        let hit = op.process_frame(&[0.0; 160], Instant::now()).unwrap();
        assert_eq!(hit, Some(WakeWordHit { model: "test-model", score: 0.9 }));
    }

    #[test]
    fn stays_silent_below_threshold() {
        let mut op = WakeWordOperator::new(
            Box::new(ConstantScorer::new("test-model", 0.1)),
            WakeWordConfig::default(),
        );
        let hit = op.process_frame(&[0.0; 160], Instant::now()).unwrap();
        assert_eq!(hit, None);
    }

    #[test]
    fn cooldown_suppresses_repeat_fires() {
        let mut op = WakeWordOperator::new(
            Box::new(ConstantScorer::new("test-model", 0.9)),
            WakeWordConfig {
                threshold: 0.5,
                cooldown: Duration::from_secs(2),
            },
        );
        let t0 = Instant::now();
        assert!(op.process_frame(&[0.0; 160], t0).unwrap().is_some());
        let t1 = t0 + Duration::from_millis(500);
        assert_eq!(op.process_frame(&[0.0; 160], t1).unwrap(), None, "still in cooldown");
        let t2 = t0 + Duration::from_secs(3);
        assert!(op.process_frame(&[0.0; 160], t2).unwrap().is_some(), "cooldown elapsed");
    }

    #[test]
    fn reset_clears_cooldown_and_history() {
        let mut op = WakeWordOperator::new(
            Box::new(ConstantScorer::new("test-model", 0.9)),
            WakeWordConfig::default(),
        );
        let t0 = Instant::now();
        op.process_frame(&[0.0; 160], t0).unwrap();
        op.reset();
        assert!(op.score_history().is_empty());
        // Immediately fires again post-reset, cooldown cleared.
        let hit = op.process_frame(&[0.0; 160], t0).unwrap();
        assert!(hit.is_some());
    }

    #[test]
    fn score_window_is_bounded() {
        let mut op = WakeWordOperator::new(
            Box::new(ConstantScorer::new("test-model", 0.1)),
            WakeWordConfig::default(),
        );
        let t0 = Instant::now();
        for _ in 0..(SCORE_WINDOW + 10) {
            op.process_frame(&[0.0; 160], t0).unwrap();
        }
        assert_eq!(op.score_history().len(), SCORE_WINDOW);
    }
}
