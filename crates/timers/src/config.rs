//! Default durations for the named timers, all configurable.

use asrhub_action::TimerName;
use std::time::Duration;

/// A timer's configured lifetime. `Uncapped` means the timer is never started
/// for that name unless the caller supplies an explicit duration (e.g. a
/// `recording` cap of 0 per spec means "no cap").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDuration {
    Bounded(Duration),
    Uncapped,
}

impl TimerDuration {
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            TimerDuration::Bounded(d) => Some(d),
            TimerDuration::Uncapped => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimerConfig {
    pub awake: Duration,
    pub llm_claim: Duration,
    pub tts_claim: Duration,
    pub recording_cap: TimerDuration,
    pub streaming_cap: TimerDuration,
    pub session_idle: Duration,
    pub vad_silence: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            awake: Duration::from_millis(8_000),
            llm_claim: Duration::from_millis(3_000),
            tts_claim: Duration::from_millis(3_000),
            recording_cap: TimerDuration::Uncapped,
            streaming_cap: TimerDuration::Uncapped,
            session_idle: Duration::from_millis(600_000),
            vad_silence: Duration::from_millis(2_000),
        }
    }
}

impl TimerConfig {
    pub fn duration_for(&self, name: TimerName) -> TimerDuration {
        match name {
            TimerName::Awake => TimerDuration::Bounded(self.awake),
            TimerName::LlmClaim => TimerDuration::Bounded(self.llm_claim),
            TimerName::TtsClaim => TimerDuration::Bounded(self.tts_claim),
            TimerName::Recording => self.recording_cap,
            TimerName::Streaming => self.streaming_cap,
            TimerName::SessionIdle => TimerDuration::Bounded(self.session_idle),
            TimerName::VadSilence => TimerDuration::Bounded(self.vad_silence),
        }
    }
}
