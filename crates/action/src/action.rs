//! The `Action` enum: the single discriminated currency of the control plane.
//!
//! Every variant carries a `session_id` (read through [`Action::session_id`])
//! and, where applicable, a [`EventKind`] the FSM transition engine can match
//! on (read through [`Action::event_kind`]). Actions that do not correspond to
//! an FSM event (e.g. `AudioChunkReceived`) return `None` from `event_kind`.

use crate::types::{EndTrigger, ErrorInfo, EventKind, SessionId, Transcript, WakeSource};
use asrhub_audio::{AudioChunk, AudioFormat, BackpressureLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartListeningPayload {
    pub audio_format: AudioFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeTriggeredPayload {
    pub source: WakeSource,
    pub model: String,
    pub score: f32,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndRecordingPayload {
    pub trigger: EndTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionDonePayload {
    pub transcript: Transcript,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: ErrorInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackpressurePayload {
    pub level: BackpressureLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedPayload {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangedPayload {
    pub from: crate::types::FsmState,
    pub to: crate::types::FsmState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadataPayload {
    pub audio_format: AudioFormat,
}

/// A complete recording delivered in one shot rather than as a live chunk
/// stream. The upload effect feeds `bytes` into the same chunk path a live
/// `audio_chunk_received` would use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadFilePayload {
    pub audio_format: AudioFormat,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// The discriminated action currency of the control plane. `session_id` and,
/// where the action corresponds to a canonical FSM event, `event_kind` are
/// always reachable without matching on the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    CreateSession {
        session_id: SessionId,
        strategy: crate::types::Strategy,
        priority: u32,
        metadata: HashMap<String, String>,
    },
    DestroySession {
        session_id: SessionId,
    },
    AudioChunkReceived {
        session_id: SessionId,
        #[serde(skip)]
        chunk: Option<AudioChunk>,
    },
    StartListening {
        session_id: SessionId,
        payload: StartListeningPayload,
    },
    WakeTriggered {
        session_id: SessionId,
        payload: WakeTriggeredPayload,
    },
    SpeechDetected {
        session_id: SessionId,
    },
    SilenceDetected {
        session_id: SessionId,
    },
    StartRecording {
        session_id: SessionId,
    },
    EndRecording {
        session_id: SessionId,
        payload: EndRecordingPayload,
    },
    BeginTranscription {
        session_id: SessionId,
    },
    TranscriptionDone {
        session_id: SessionId,
        payload: TranscriptionDonePayload,
    },
    StartAsrStreaming {
        session_id: SessionId,
    },
    EndAsrStreaming {
        session_id: SessionId,
    },
    LlmReplyStarted {
        session_id: SessionId,
    },
    LlmReplyFinished {
        session_id: SessionId,
    },
    TtsPlaybackStarted {
        session_id: SessionId,
    },
    TtsPlaybackFinished {
        session_id: SessionId,
    },
    InterruptReply {
        session_id: SessionId,
    },
    Timeout {
        session_id: SessionId,
        timer: crate::types::TimerName,
    },
    Error {
        session_id: SessionId,
        payload: ErrorPayload,
    },
    Recover {
        session_id: SessionId,
    },
    Reset {
        session_id: SessionId,
    },
    /// Dispatched by the FSM transition effect when a transition actually changes state.
    StateChanged {
        session_id: SessionId,
        payload: StateChangedPayload,
    },
    Backpressure {
        session_id: SessionId,
        payload: BackpressurePayload,
    },
    /// Diagnostic dispatched instead of mutating state, e.g. `max_sessions` exceeded.
    Rejected {
        session_id: SessionId,
        payload: RejectedPayload,
    },
    /// Extends the session's idle timer without otherwise touching its state.
    Touch {
        session_id: SessionId,
    },
    /// Declares the audio format an upload will arrive in, ahead of or
    /// alongside the bytes themselves.
    AudioMetadata {
        session_id: SessionId,
        payload: AudioMetadataPayload,
    },
    /// A bulk file upload. The upload effect feeds its bytes into the
    /// pipeline as one chunk, then closes the recording out.
    UploadFile {
        session_id: SessionId,
        payload: UploadFilePayload,
    },
    /// Brackets a chunked upload; the chunks themselves arrive as ordinary
    /// `audio_chunk_received` actions, reusing the live chunk path.
    ChunkUploadStart {
        session_id: SessionId,
    },
    /// Closes out a chunked upload started by `chunk_upload_start`.
    ChunkUploadDone {
        session_id: SessionId,
    },
}

impl Action {
    pub fn session_id(&self) -> SessionId {
        match self {
            Action::CreateSession { session_id, .. }
            | Action::DestroySession { session_id }
            | Action::AudioChunkReceived { session_id, .. }
            | Action::StartListening { session_id, .. }
            | Action::WakeTriggered { session_id, .. }
            | Action::SpeechDetected { session_id }
            | Action::SilenceDetected { session_id }
            | Action::StartRecording { session_id }
            | Action::EndRecording { session_id, .. }
            | Action::BeginTranscription { session_id }
            | Action::TranscriptionDone { session_id, .. }
            | Action::StartAsrStreaming { session_id }
            | Action::EndAsrStreaming { session_id }
            | Action::LlmReplyStarted { session_id }
            | Action::LlmReplyFinished { session_id }
            | Action::TtsPlaybackStarted { session_id }
            | Action::TtsPlaybackFinished { session_id }
            | Action::InterruptReply { session_id }
            | Action::Timeout { session_id, .. }
            | Action::Error { session_id, .. }
            | Action::Recover { session_id }
            | Action::Reset { session_id }
            | Action::StateChanged { session_id, .. }
            | Action::Backpressure { session_id, .. }
            | Action::Rejected { session_id, .. }
            | Action::Touch { session_id }
            | Action::AudioMetadata { session_id, .. }
            | Action::UploadFile { session_id, .. }
            | Action::ChunkUploadStart { session_id }
            | Action::ChunkUploadDone { session_id } => *session_id,
        }
    }

    /// The canonical FSM event this action carries, if any. `CreateSession`,
    /// `DestroySession`, `AudioChunkReceived`, `StateChanged`, `Backpressure`,
    /// `Rejected` and the upload-ingress actions are control-plane bookkeeping,
    /// not FSM events; the upload effect re-expresses them as `StartRecording`/
    /// `EndRecording`, which do carry FSM events.
    pub fn event_kind(&self) -> Option<EventKind> {
        Some(match self {
            Action::StartListening { .. } => EventKind::StartListening,
            Action::WakeTriggered { .. } => EventKind::WakeTriggered,
            Action::SpeechDetected { .. } => EventKind::SpeechDetected,
            Action::SilenceDetected { .. } => EventKind::SilenceDetected,
            Action::StartRecording { .. } => EventKind::StartRecording,
            Action::EndRecording { .. } => EventKind::EndRecording,
            Action::BeginTranscription { .. } => EventKind::BeginTranscription,
            Action::TranscriptionDone { .. } => EventKind::TranscriptionDone,
            Action::StartAsrStreaming { .. } => EventKind::StartAsrStreaming,
            Action::EndAsrStreaming { .. } => EventKind::EndAsrStreaming,
            Action::LlmReplyStarted { .. } => EventKind::LlmReplyStarted,
            Action::LlmReplyFinished { .. } => EventKind::LlmReplyFinished,
            Action::TtsPlaybackStarted { .. } => EventKind::TtsPlaybackStarted,
            Action::TtsPlaybackFinished { .. } => EventKind::TtsPlaybackFinished,
            Action::InterruptReply { .. } => EventKind::InterruptReply,
            Action::Timeout { .. } => EventKind::Timeout,
            Action::Error { .. } => EventKind::Error,
            Action::Recover { .. } => EventKind::Recover,
            Action::Reset { .. } => EventKind::Reset,
            Action::CreateSession { .. }
            | Action::DestroySession { .. }
            | Action::AudioChunkReceived { .. }
            | Action::StateChanged { .. }
            | Action::Backpressure { .. }
            | Action::Rejected { .. }
            | Action::Touch { .. }
            | Action::AudioMetadata { .. }
            | Action::UploadFile { .. }
            | Action::ChunkUploadStart { .. }
            | Action::ChunkUploadDone { .. } => return None,
        })
    }
}
