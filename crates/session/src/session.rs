//! The `Session` entity and its serializable snapshot projection.

use asrhub_action::{ErrorInfo, FsmState, SessionId, Strategy, Transcript, WakeSource};
use asrhub_audio::AudioFormat;
use serde::Serialize;
use std::collections::HashMap;

/// Derived plan for reaching the canonical internal format from a session's
/// declared input format. Read-only once derived from `audio_format`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConversionPlan {
    pub needs_resample: bool,
    pub needs_downmix: bool,
    pub needs_requantize: bool,
}

impl ConversionPlan {
    pub fn derive(format: AudioFormat) -> Self {
        let canonical = AudioFormat::CANONICAL;
        Self {
            needs_resample: format.sample_rate != canonical.sample_rate,
            needs_downmix: format.channels != canonical.channels,
            needs_requantize: format.encoding != canonical.encoding,
        }
    }

    pub fn is_identity(&self) -> bool {
        !self.needs_resample && !self.needs_downmix && !self.needs_requantize
    }
}

/// Everything dispatched at `create_session` time.
#[derive(Debug, Clone)]
pub struct CreateSessionOptions {
    pub strategy: Strategy,
    pub priority: u32,
    pub metadata: HashMap<String, String>,
    pub wake_timeout_ms: Option<u64>,
}

impl Default for CreateSessionOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::NonStreaming,
            priority: 0,
            metadata: HashMap::new(),
            wake_timeout_ms: None,
        }
    }
}

/// The central entity: one per logical client conversation. `fsm_state` is
/// the only field the reducer's FSM branch may change; everything else
/// (counters, wake bookkeeping, transcription, error) is written by other
/// reducer branches, never directly by callers.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub strategy: Strategy,
    pub fsm_state: FsmState,
    pub previous_state: FsmState,

    pub audio_format: Option<AudioFormat>,
    pub conversion_strategy: Option<ConversionPlan>,

    pub audio_bytes_received: u64,
    pub audio_chunks_count: u64,
    pub last_audio_timestamp: i64,

    pub wake_trigger: Option<String>,
    pub wake_time: Option<i64>,
    pub wake_timeout_ms: Option<u64>,
    pub wake_source: Option<WakeSource>,

    pub transcription: Option<Transcript>,
    pub error: Option<ErrorInfo>,

    pub priority: u32,
    pub created_at: i64,
    pub updated_at: i64,
    pub metadata: HashMap<String, String>,
}

impl Session {
    pub fn new(id: SessionId, options: CreateSessionOptions, now_ms: i64) -> Self {
        let initial = FsmState::initial(options.strategy);
        Self {
            id,
            strategy: options.strategy,
            fsm_state: initial,
            previous_state: initial,
            audio_format: None,
            conversion_strategy: None,
            audio_bytes_received: 0,
            audio_chunks_count: 0,
            last_audio_timestamp: 0,
            wake_trigger: None,
            wake_time: None,
            wake_timeout_ms: options.wake_timeout_ms,
            wake_source: None,
            transcription: None,
            error: None,
            priority: options.priority,
            created_at: now_ms,
            updated_at: now_ms,
            metadata: options.metadata,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            strategy: self.strategy,
            fsm_state: self.fsm_state,
            previous_state: self.previous_state,
            audio_format: self.audio_format,
            conversion_strategy: self.conversion_strategy,
            audio_bytes_received: self.audio_bytes_received,
            audio_chunks_count: self.audio_chunks_count,
            last_audio_timestamp: self.last_audio_timestamp,
            wake_trigger: self.wake_trigger.clone(),
            wake_time: self.wake_time,
            wake_timeout_ms: self.wake_timeout_ms,
            wake_source: self.wake_source,
            transcription: self.transcription.clone(),
            error: self.error.clone(),
            priority: self.priority,
            created_at: self.created_at,
            updated_at: self.updated_at,
            metadata: self.metadata.clone(),
        }
    }
}

/// Exported unit for a host that needs persistence or an external view:
/// the `Session` fields, excluding raw audio and transient operator state
/// (VAD hidden state, wake-word score window), which never leave the
/// pipeline crates.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub strategy: Strategy,
    pub fsm_state: FsmState,
    pub previous_state: FsmState,
    pub audio_format: Option<AudioFormat>,
    pub conversion_strategy: Option<ConversionPlan>,
    pub audio_bytes_received: u64,
    pub audio_chunks_count: u64,
    pub last_audio_timestamp: i64,
    pub wake_trigger: Option<String>,
    pub wake_time: Option<i64>,
    pub wake_timeout_ms: Option<u64>,
    pub wake_source: Option<WakeSource>,
    pub transcription: Option<Transcript>,
    pub error: Option<ErrorInfo>,
    pub priority: u32,
    pub created_at: i64,
    pub updated_at: i64,
    pub metadata: HashMap<String, String>,
}
