//! The pure per-session reducer: `(session, action, now_ms) -> session'`.
//!
//! This is the only code allowed to mutate a `Session`'s fields. FSM state
//! itself is written only in response to `Action::StateChanged`, which the
//! store's FSM transition effect computes and dispatches after consulting
//! `asrhub-fsm::next_state` against the session snapshot — keeping "only the
//! reducer writes" true while the pure transition-table lookup lives in its
//! own crate.

use crate::session::{ConversionPlan, Session};
use asrhub_action::Action;

/// Apply `action` to `session`, assuming `action.session_id() == session.id`
/// (the store filters by id before calling this). Never panics.
pub fn reduce(mut session: Session, action: &Action, now_ms: i64) -> Session {
    match action {
        Action::AudioChunkReceived { chunk: Some(chunk), .. } => {
            session.audio_bytes_received += chunk.len_bytes() as u64;
            session.audio_chunks_count += 1;
            session.last_audio_timestamp = chunk.arrival_ts_ms;
        }
        Action::AudioChunkReceived { chunk: None, .. } => {}

        Action::StartListening { payload, .. } => {
            if session.audio_format.is_none() {
                session.audio_format = Some(payload.audio_format);
                session.conversion_strategy = Some(ConversionPlan::derive(payload.audio_format));
            }
        }

        Action::AudioMetadata { payload, .. } => {
            if session.audio_format.is_none() {
                session.audio_format = Some(payload.audio_format);
                session.conversion_strategy = Some(ConversionPlan::derive(payload.audio_format));
            }
        }

        Action::UploadFile { payload, .. } => {
            if session.audio_format.is_none() {
                session.audio_format = Some(payload.audio_format);
                session.conversion_strategy = Some(ConversionPlan::derive(payload.audio_format));
            }
        }

        Action::WakeTriggered { payload, .. } => {
            session.wake_trigger = Some(payload.model.clone());
            session.wake_time = Some(payload.timestamp_ms);
            session.wake_source = Some(payload.source);
        }

        Action::TranscriptionDone { payload, .. } => {
            session.transcription = Some(payload.transcript.clone());
        }

        Action::Error { payload, .. } => {
            session.error = Some(payload.error.clone());
        }

        Action::Recover { .. } => {
            session.error = None;
        }

        Action::Reset { .. } => {
            session.wake_trigger = None;
            session.wake_time = None;
            session.wake_source = None;
            session.error = None;
            session.audio_bytes_received = 0;
            session.audio_chunks_count = 0;
            session.last_audio_timestamp = 0;
        }

        Action::StateChanged { payload, .. } => {
            session.previous_state = payload.from;
            session.fsm_state = payload.to;
        }

        // Informational/bookkeeping actions the reducer does not project onto
        // session fields: the effect that emits them forwards them straight
        // to the event bus.
        Action::CreateSession { .. }
        | Action::DestroySession { .. }
        | Action::SpeechDetected { .. }
        | Action::SilenceDetected { .. }
        | Action::StartRecording { .. }
        | Action::EndRecording { .. }
        | Action::BeginTranscription { .. }
        | Action::StartAsrStreaming { .. }
        | Action::EndAsrStreaming { .. }
        | Action::LlmReplyStarted { .. }
        | Action::LlmReplyFinished { .. }
        | Action::TtsPlaybackStarted { .. }
        | Action::TtsPlaybackFinished { .. }
        | Action::InterruptReply { .. }
        | Action::Timeout { .. }
        | Action::Backpressure { .. }
        | Action::Rejected { .. }
        | Action::Touch { .. }
        | Action::ChunkUploadStart { .. }
        | Action::ChunkUploadDone { .. } => {}
    }

    session.updated_at = now_ms;
    session
}
