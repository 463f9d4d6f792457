//! Concrete per-strategy transition tables, built from the canonical flows.

use crate::table::{TableEntry, TransitionTable};
use asrhub_action::{EventKind, FsmState};

/// `NON_STREAMING`: listen -> wake -> record -> transcribe -> reply -> listen.
///
/// ```text
/// IDLE --start_listening--> LISTENING --wake_triggered--> ACTIVATED
/// ACTIVATED --speech_detected--> RECORDING
/// RECORDING --end_recording--> TRANSCRIBING
/// TRANSCRIBING --transcription_done--> BUSY (if will_reply) or ACTIVATED
/// BUSY --tts_playback_finished--> ACTIVATED (if keep_awake) or LISTENING
/// ```
pub fn non_streaming() -> TransitionTable {
    TransitionTable::builder()
        .on(
            FsmState::Idle,
            EventKind::StartListening,
            TableEntry::unconditional(FsmState::Listening),
        )
        .on(
            FsmState::Listening,
            EventKind::WakeTriggered,
            TableEntry::unconditional(FsmState::Activated),
        )
        .on(
            FsmState::Activated,
            EventKind::SpeechDetected,
            TableEntry::unconditional(FsmState::Recording),
        )
        .on(
            FsmState::Activated,
            EventKind::WakeTriggered,
            TableEntry::unconditional(FsmState::Activated),
        )
        .on(
            FsmState::Recording,
            EventKind::EndRecording,
            TableEntry::unconditional(FsmState::Transcribing),
        )
        .on(
            FsmState::Transcribing,
            EventKind::TranscriptionDone,
            TableEntry::guarded(FsmState::Busy, Box::new(|ctx| ctx.will_reply)),
        )
        .on(
            FsmState::Transcribing,
            EventKind::TranscriptionDone,
            TableEntry::unconditional(FsmState::Activated),
        )
        .on(
            FsmState::Busy,
            EventKind::LlmReplyStarted,
            TableEntry::unconditional(FsmState::Busy),
        )
        .on(
            FsmState::Busy,
            EventKind::TtsPlaybackStarted,
            TableEntry::unconditional(FsmState::Busy),
        )
        .on(
            FsmState::Busy,
            EventKind::TtsPlaybackFinished,
            TableEntry::guarded(FsmState::Activated, Box::new(|ctx| ctx.keep_awake)),
        )
        .on(
            FsmState::Busy,
            EventKind::TtsPlaybackFinished,
            TableEntry::unconditional(FsmState::Listening),
        )
        .on(
            FsmState::Busy,
            EventKind::InterruptReply,
            TableEntry::unconditional(FsmState::Activated),
        )
        .build()
}

/// `STREAMING`: same wake/activation semantics, but audio flows continuously
/// through the ASR engine instead of an accumulate-then-transcribe cycle.
pub fn streaming() -> TransitionTable {
    TransitionTable::builder()
        .on(
            FsmState::Idle,
            EventKind::StartListening,
            TableEntry::unconditional(FsmState::Listening),
        )
        .on(
            FsmState::Listening,
            EventKind::WakeTriggered,
            TableEntry::unconditional(FsmState::Activated),
        )
        .on(
            FsmState::Activated,
            EventKind::StartAsrStreaming,
            TableEntry::unconditional(FsmState::Streaming),
        )
        .on(
            FsmState::Streaming,
            EventKind::EndAsrStreaming,
            TableEntry::unconditional(FsmState::Transcribing),
        )
        .on(
            FsmState::Transcribing,
            EventKind::TranscriptionDone,
            TableEntry::guarded(FsmState::Busy, Box::new(|ctx| ctx.will_reply)),
        )
        .on(
            FsmState::Transcribing,
            EventKind::TranscriptionDone,
            TableEntry::unconditional(FsmState::Activated),
        )
        .on(
            FsmState::Busy,
            EventKind::TtsPlaybackFinished,
            TableEntry::guarded(FsmState::Activated, Box::new(|ctx| ctx.keep_awake)),
        )
        .on(
            FsmState::Busy,
            EventKind::TtsPlaybackFinished,
            TableEntry::unconditional(FsmState::Listening),
        )
        .on(
            FsmState::Busy,
            EventKind::InterruptReply,
            TableEntry::unconditional(FsmState::Activated),
        )
        .build()
}

/// `BATCH`: no wake gate; a batch upload goes straight to transcription once
/// fully received. `start_recording` here marks "accumulating the upload".
pub fn batch() -> TransitionTable {
    TransitionTable::builder()
        .on(
            FsmState::Idle,
            EventKind::StartRecording,
            TableEntry::unconditional(FsmState::Recording),
        )
        .on(
            FsmState::Recording,
            EventKind::EndRecording,
            TableEntry::unconditional(FsmState::Transcribing),
        )
        .on(
            FsmState::Transcribing,
            EventKind::TranscriptionDone,
            TableEntry::unconditional(FsmState::Idle),
        )
        .build()
}
