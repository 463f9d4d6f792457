//! `HubConfig`: the TOML-facing configuration surface. Each sub-section
//! mirrors one crate's config type but stays plain-old-data (durations as
//! milliseconds, not `Duration`) so it round-trips through `toml` without a
//! custom `Deserialize` impl; `HubConfig::validate` and the `to_*` builders
//! are where it turns into the types each crate actually wants.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    pub min_size: usize,
    pub max_size: usize,
    pub per_session_quota: u32,
    pub max_consecutive_failures: u32,
    pub lease_timeout_ms: u64,
    pub aging_factor: f64,
    pub aging_scan_limit: usize,
}

impl Default for PoolSection {
    fn default() -> Self {
        let d = asrhub_pool::PoolConfig::default();
        Self {
            min_size: d.min_size,
            max_size: d.max_size,
            per_session_quota: d.per_session_quota,
            max_consecutive_failures: d.max_consecutive_failures,
            lease_timeout_ms: d.lease_timeout.as_millis() as u64,
            aging_factor: d.aging_factor,
            aging_scan_limit: d.aging_scan_limit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimerSection {
    pub awake_ms: u64,
    pub llm_claim_ms: u64,
    pub tts_claim_ms: u64,
    /// `0` means uncapped, matching the teacher's "0 means unlimited" TOML convention.
    pub recording_cap_ms: u64,
    pub streaming_cap_ms: u64,
    pub session_idle_ms: u64,
    pub vad_silence_ms: u64,
}

impl Default for TimerSection {
    fn default() -> Self {
        let d = asrhub_timers::TimerConfig::default();
        Self {
            awake_ms: d.awake.as_millis() as u64,
            llm_claim_ms: d.llm_claim.as_millis() as u64,
            tts_claim_ms: d.tts_claim.as_millis() as u64,
            recording_cap_ms: d.recording_cap.as_duration().map(|v| v.as_millis() as u64).unwrap_or(0),
            streaming_cap_ms: d.streaming_cap.as_duration().map(|v| v.as_millis() as u64).unwrap_or(0),
            session_idle_ms: d.session_idle.as_millis() as u64,
            vad_silence_ms: d.vad_silence.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioQueueSection {
    pub capacity_bytes: usize,
    pub capacity_chunks: usize,
    pub high_water_mark: f32,
    pub retry_after_ms: u64,
}

impl Default for AudioQueueSection {
    fn default() -> Self {
        let d = asrhub_audio::AudioQueueConfig::default();
        Self {
            capacity_bytes: d.capacity_bytes,
            capacity_chunks: d.capacity_chunks,
            high_water_mark: d.high_water_mark,
            retry_after_ms: d.retry_after_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VadSection {
    pub smoothing_window: usize,
    pub adaptive: bool,
    pub fixed_threshold: f32,
    pub adaptive_k: f32,
    pub adaptive_window: usize,
    pub adaptive_bounds: (f32, f32),
    pub min_silence_duration_ms: u64,
}

impl Default for VadSection {
    fn default() -> Self {
        let d = asrhub_vad::VadConfig::default();
        Self {
            smoothing_window: d.smoothing_window,
            adaptive: d.adaptive,
            fixed_threshold: d.fixed_threshold,
            adaptive_k: d.adaptive_k,
            adaptive_window: d.adaptive_window,
            adaptive_bounds: d.adaptive_bounds,
            min_silence_duration_ms: d.min_silence_duration.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WakeWordSection {
    pub threshold: f32,
    pub cooldown_ms: u64,
}

impl Default for WakeWordSection {
    fn default() -> Self {
        let d = asrhub_wakeword::WakeWordConfig::default();
        Self { threshold: d.threshold, cooldown_ms: d.cooldown.as_millis() as u64 }
    }
}

/// Top-level TOML document: `[pool]`, `[timers]`, `[audio_queue]`, `[vad]`,
/// `[wakeword]` sections plus `max_sessions` and `transcription_lease_timeout_ms`
/// at the root. Every field falls back to the same default the underlying
/// crate would have used on its own, so a partial or empty file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub max_sessions: usize,
    pub transcription_lease_timeout_ms: u64,
    pub pool: PoolSection,
    pub timers: TimerSection,
    pub audio_queue: AudioQueueSection,
    pub vad: VadSection,
    pub wakeword: WakeWordSection,
}

impl Default for HubConfig {
    fn default() -> Self {
        let store_default = asrhub_store::StoreConfig::default();
        Self {
            max_sessions: store_default.max_sessions,
            transcription_lease_timeout_ms: store_default.transcription_lease_timeout.as_millis() as u64,
            pool: PoolSection::default(),
            timers: TimerSection::default(),
            audio_queue: AudioQueueSection::default(),
            vad: VadSection::default(),
            wakeword: WakeWordSection::default(),
        }
    }
}

impl HubConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: HubConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Self::from_toml_str(&content)
    }

    /// Catches the out-of-range combinations spec.md's error taxonomy names
    /// as `Configuration` errors rather than letting them surface later as a
    /// confusing pool-construction panic.
    pub fn validate(&self) -> Result<()> {
        if self.pool.min_size > self.pool.max_size {
            return Err(ConfigError::OutOfRange(format!(
                "pool.min_size ({}) must not exceed pool.max_size ({})",
                self.pool.min_size, self.pool.max_size
            )));
        }
        if self.pool.max_size == 0 {
            return Err(ConfigError::OutOfRange("pool.max_size must be at least 1".to_string()));
        }
        if self.audio_queue.high_water_mark <= 0.0 || self.audio_queue.high_water_mark > 1.0 {
            return Err(ConfigError::OutOfRange(format!(
                "audio_queue.high_water_mark ({}) must be in (0.0, 1.0]",
                self.audio_queue.high_water_mark
            )));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::OutOfRange("max_sessions must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn to_pool_config(&self) -> asrhub_pool::PoolConfig {
        asrhub_pool::PoolConfig {
            min_size: self.pool.min_size,
            max_size: self.pool.max_size,
            per_session_quota: self.pool.per_session_quota,
            max_consecutive_failures: self.pool.max_consecutive_failures,
            lease_timeout: Duration::from_millis(self.pool.lease_timeout_ms),
            aging_factor: self.pool.aging_factor,
            aging_scan_limit: self.pool.aging_scan_limit,
        }
    }

    pub fn to_timer_config(&self) -> asrhub_timers::TimerConfig {
        use asrhub_timers::TimerDuration;
        let capped = |ms: u64| {
            if ms == 0 {
                TimerDuration::Uncapped
            } else {
                TimerDuration::Bounded(Duration::from_millis(ms))
            }
        };
        asrhub_timers::TimerConfig {
            awake: Duration::from_millis(self.timers.awake_ms),
            llm_claim: Duration::from_millis(self.timers.llm_claim_ms),
            tts_claim: Duration::from_millis(self.timers.tts_claim_ms),
            recording_cap: capped(self.timers.recording_cap_ms),
            streaming_cap: capped(self.timers.streaming_cap_ms),
            session_idle: Duration::from_millis(self.timers.session_idle_ms),
            vad_silence: Duration::from_millis(self.timers.vad_silence_ms),
        }
    }

    pub fn to_audio_queue_config(&self) -> asrhub_audio::AudioQueueConfig {
        asrhub_audio::AudioQueueConfig {
            capacity_bytes: self.audio_queue.capacity_bytes,
            capacity_chunks: self.audio_queue.capacity_chunks,
            high_water_mark: self.audio_queue.high_water_mark,
            retry_after_ms: self.audio_queue.retry_after_ms,
        }
    }

    pub fn to_vad_config(&self) -> asrhub_vad::VadConfig {
        asrhub_vad::VadConfig {
            smoothing_window: self.vad.smoothing_window,
            adaptive: self.vad.adaptive,
            fixed_threshold: self.vad.fixed_threshold,
            adaptive_k: self.vad.adaptive_k,
            adaptive_window: self.vad.adaptive_window,
            adaptive_bounds: self.vad.adaptive_bounds,
            min_silence_duration: Duration::from_millis(self.vad.min_silence_duration_ms),
        }
    }

    pub fn to_wakeword_config(&self) -> asrhub_wakeword::WakeWordConfig {
        asrhub_wakeword::WakeWordConfig {
            threshold: self.wakeword.threshold,
            cooldown: Duration::from_millis(self.wakeword.cooldown_ms),
        }
    }

    pub fn to_pipeline_config(&self) -> asrhub_pipeline::PipelineConfig {
        asrhub_pipeline::PipelineConfig {
            operator_format: asrhub_audio::AudioFormat::CANONICAL,
            queue: self.to_audio_queue_config(),
            vad: self.to_vad_config(),
            wakeword: self.to_wakeword_config(),
        }
    }

    pub fn to_store_config(&self) -> asrhub_store::StoreConfig {
        asrhub_store::StoreConfig {
            max_sessions: self.max_sessions,
            transcription_lease_timeout: Duration::from_millis(self.transcription_lease_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(HubConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_document_falls_back_to_defaults() {
        let config = HubConfig::from_toml_str("").unwrap();
        assert_eq!(config.max_sessions, asrhub_store::StoreConfig::default().max_sessions);
    }

    #[test]
    fn partial_override_keeps_the_rest_default() {
        let config = HubConfig::from_toml_str("max_sessions = 8\n\n[pool]\nmax_size = 6\n").unwrap();
        assert_eq!(config.max_sessions, 8);
        assert_eq!(config.pool.max_size, 6);
        assert_eq!(config.pool.min_size, PoolSection::default().min_size);
    }

    #[test]
    fn min_size_over_max_size_is_rejected() {
        let err = HubConfig::from_toml_str("[pool]\nmin_size = 10\nmax_size = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange(_)));
    }

    #[test]
    fn zero_max_sessions_is_rejected() {
        let err = HubConfig::from_toml_str("max_sessions = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange(_)));
    }

    #[test]
    fn recording_cap_zero_means_uncapped() {
        let config = HubConfig::default();
        let timers = config.to_timer_config();
        assert_eq!(timers.recording_cap, asrhub_timers::TimerDuration::Uncapped);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = HubConfig::from_toml_str("not valid toml [[[").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
