//! Shared value types referenced by actions and session snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, time-ordered session identifier.
///
/// Backed by a UUIDv7 so natural sort order on the id tracks creation order,
/// useful for log correlation and for the priority-queue tie-breaking in the
/// provider pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for SessionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Which FSM table a session is governed by. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NonStreaming,
    Streaming,
    Batch,
}

/// A session's position in its strategy's state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsmState {
    Idle,
    Listening,
    Activated,
    Recording,
    Streaming,
    Transcribing,
    Busy,
    Error,
    Terminated,
}

impl FsmState {
    pub fn initial(strategy: Strategy) -> Self {
        match strategy {
            Strategy::NonStreaming | Strategy::Streaming | Strategy::Batch => FsmState::Idle,
        }
    }
}

/// Canonical FSM event kinds, independent of their action payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StartListening,
    WakeTriggered,
    SpeechDetected,
    SilenceDetected,
    StartRecording,
    EndRecording,
    BeginTranscription,
    TranscriptionDone,
    StartAsrStreaming,
    EndAsrStreaming,
    LlmReplyStarted,
    LlmReplyFinished,
    TtsPlaybackStarted,
    TtsPlaybackFinished,
    InterruptReply,
    Timeout,
    Error,
    Recover,
    Reset,
}

/// Where an activation originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeSource {
    WakeWord,
    Ui,
    Visual,
}

/// Why a recording/streaming segment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndTrigger {
    VadTimeout,
    Timeout,
    Client,
    Error,
    /// A bulk or chunked upload finished feeding its audio into the chunk path.
    Upload,
}

/// Names of the per-session timers the timer service manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerName {
    Awake,
    LlmClaim,
    TtsClaim,
    Recording,
    Streaming,
    SessionIdle,
    VadSilence,
}

/// Error taxonomy kinds surfaced to subscribers; never a stack trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    AudioFormat,
    Pipeline,
    Stream,
    Session,
    Provider,
    Resource,
    Timeout,
    State,
    Configuration,
}

/// Human-readable error surfaced on a session, never containing internal identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

/// One word/token in a transcript segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
}

/// Result returned by a provider's `transcribe`/`transcribe_stream` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub confidence: f32,
    pub language: String,
    pub segments: Vec<TranscriptSegment>,
    pub is_final: bool,
}
