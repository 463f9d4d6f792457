//! The reducer/effects wiring. `SessionStore::run` is the dispatch loop:
//! every action is applied to the reducer first, then handed to each
//! effect in turn. Effects hold only a dispatch handle and this store's
//! read/update surface on the session map — never the store value itself.

use crate::config::StoreConfig;
use crate::shared_sessions::SharedSessions;
use asrhub_action::{
    Action, ActionBusHandle, EndRecordingPayload, EndTrigger, ErrorInfo, ErrorKind, ErrorPayload,
    EventBusRef, FsmState, RejectedPayload, SessionEvent, SessionId, TimerName,
};
use asrhub_audio::AudioChunk;
use asrhub_fsm::GuardContext;
use asrhub_pipeline::PipelineOrchestrator;
use asrhub_pool::ProviderPool;
use asrhub_session::{CreateSessionOptions, Session};
use asrhub_timers::TimerService;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::UnboundedReceiver;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Reads a `will_reply`/`keep_awake` guard flag out of a session's metadata
/// map rather than a dedicated typed field: these only matter to the FSM's
/// `transcription_done`/`tts_playback_finished` guards, and most sessions
/// never set them. `wake_timeout_ms` (see `create_session` below) follows the
/// same convention for the same reason: `Action::CreateSession` has no
/// dedicated field for it, so a caller that wants a non-default wake timeout
/// sets `metadata["wake_timeout_ms"]` to a parseable `u64`.
fn metadata_flag(session: &Session, key: &str, default: bool) -> bool {
    session
        .metadata
        .get(key)
        .map(|v| v == "true")
        .unwrap_or(default)
}

pub struct SessionStore {
    config: StoreConfig,
    sessions: Arc<SharedSessions>,
    active_session_id: std::sync::Mutex<Option<SessionId>>,
    bus: ActionBusHandle,
    events: EventBusRef,
    timers: Arc<TimerService>,
    pipeline: Arc<PipelineOrchestrator>,
    pool: Arc<ProviderPool>,
}

impl SessionStore {
    pub fn new(
        config: StoreConfig,
        sessions: Arc<SharedSessions>,
        bus: ActionBusHandle,
        events: EventBusRef,
        timers: Arc<TimerService>,
        pipeline: Arc<PipelineOrchestrator>,
        pool: Arc<ProviderPool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            sessions,
            active_session_id: std::sync::Mutex::new(None),
            bus,
            events,
            timers,
            pipeline,
            pool,
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn active_session_id(&self) -> Option<SessionId> {
        *self.active_session_id.lock().unwrap()
    }

    pub fn set_active(&self, session_id: SessionId) {
        *self.active_session_id.lock().unwrap() = Some(session_id);
    }

    pub fn get(&self, session_id: SessionId) -> Option<Session> {
        self.sessions.get(session_id)
    }

    pub fn list(&self) -> Vec<Session> {
        self.sessions.list()
    }

    /// Drains `rx` until the bus is dropped (process shutdown). Intended to
    /// be spawned once by the composition root.
    pub async fn run(self: Arc<Self>, mut rx: UnboundedReceiver<Action>) {
        while let Some(action) = rx.recv().await {
            self.handle(action).await;
        }
        tracing::debug!("session store dispatch loop exiting");
    }

    async fn handle(&self, action: Action) {
        match &action {
            Action::CreateSession { session_id, strategy, priority, metadata } => {
                self.create_session(*session_id, *strategy, *priority, metadata.clone());
                return;
            }
            Action::DestroySession { session_id } => {
                self.destroy_session(*session_id).await;
                return;
            }
            _ => {}
        }

        let session_id = action.session_id();
        if !self.sessions.contains(session_id) {
            tracing::debug!(%session_id, "action for unknown session, ignoring");
            return;
        }

        let now = now_ms();
        self.sessions.update(session_id, |s| asrhub_session::reduce(s, &action, now));

        self.fsm_effect(session_id, &action);
        self.timer_effect(session_id, &action);
        self.audio_effect(session_id, &action);
        self.upload_effect(session_id, &action);
        self.notify_event_bus(session_id, &action);
        if matches!(action, Action::BeginTranscription { .. }) {
            let priority = self.sessions.get(session_id).map(|s| s.priority).unwrap_or(0);
            self.spawn_transcription_effect(session_id, priority);
        }
    }

    fn create_session(
        &self,
        session_id: SessionId,
        strategy: asrhub_action::Strategy,
        priority: u32,
        metadata: std::collections::HashMap<String, String>,
    ) {
        if self.sessions.len() >= self.config.max_sessions {
            self.bus.dispatch(Action::Rejected {
                session_id,
                payload: RejectedPayload { reason: "max_sessions exceeded".to_string() },
            });
            return;
        }

        let wake_timeout_ms = metadata.get("wake_timeout_ms").and_then(|v| v.parse::<u64>().ok());
        let options = CreateSessionOptions { strategy, priority, metadata, wake_timeout_ms };
        let session = Session::new(session_id, options, now_ms());
        self.sessions.insert(session);
        self.pipeline.register_session(session_id);
        if self.active_session_id().is_none() {
            self.set_active(session_id);
        }
        self.timers.start_default(session_id, TimerName::SessionIdle, Action::Reset { session_id });
    }

    async fn destroy_session(&self, session_id: SessionId) {
        self.pipeline.remove_session(session_id);
        self.pool.release_all(session_id).await;
        self.timers.cancel_all(session_id);
        self.sessions.remove(session_id);
        let mut active = self.active_session_id.lock().unwrap();
        if *active == Some(session_id) {
            *active = None;
        }
    }

    /// On any event-bearing action, compute `next_state` against the
    /// session's current snapshot and dispatch `state_changed` if different.
    /// The reducer installs it on the next loop iteration; this effect never
    /// mutates `sessions` itself.
    fn fsm_effect(&self, session_id: SessionId, action: &Action) {
        let Some(event_kind) = action.event_kind() else { return };
        let Some(session) = self.sessions.get(session_id) else { return };

        let ctx = GuardContext {
            will_reply: metadata_flag(&session, "will_reply", true),
            keep_awake: metadata_flag(&session, "keep_awake", false),
            previous_state: Some(session.previous_state),
        };

        match asrhub_fsm::next_state(session.strategy, session.fsm_state, event_kind, &ctx) {
            Some(next) if next != session.fsm_state => {
                self.bus.dispatch(Action::StateChanged {
                    session_id,
                    payload: asrhub_action::StateChangedPayload { from: session.fsm_state, to: next },
                });
            }
            Some(_) => {}
            None => {
                tracing::debug!(%session_id, ?event_kind, state = ?session.fsm_state, "no FSM transition for this event");
            }
        }
    }

    /// Starts/cancels the named timers in response to state entry/exit and
    /// to the specific actions the default timer table keys off. A stray
    /// expiry that fires after the session has already moved on is harmless:
    /// the FSM effect it triggers (`reset`, `end_recording`, ...) looks up
    /// `(state, event)` in the transition table and finds nothing to do.
    fn timer_effect(&self, session_id: SessionId, action: &Action) {
        match action {
            Action::StateChanged { payload, .. } => {
                match payload.from {
                    FsmState::Activated => {
                        self.timers.cancel(session_id, TimerName::Awake);
                    }
                    FsmState::Recording => {
                        self.timers.cancel(session_id, TimerName::Recording);
                    }
                    FsmState::Streaming => {
                        self.timers.cancel(session_id, TimerName::Streaming);
                    }
                    _ => {}
                }
                match payload.to {
                    FsmState::Activated => {
                        self.timers.start_default(session_id, TimerName::Awake, Action::Reset { session_id });
                    }
                    FsmState::Transcribing => {
                        self.timers.start_default(session_id, TimerName::LlmClaim, Action::Reset { session_id });
                        self.bus.dispatch(Action::BeginTranscription { session_id });
                    }
                    FsmState::Recording => {
                        self.timers.start_default(
                            session_id,
                            TimerName::Recording,
                            Action::EndRecording {
                                session_id,
                                payload: EndRecordingPayload { trigger: EndTrigger::Timeout, duration_ms: None },
                            },
                        );
                    }
                    FsmState::Streaming => {
                        self.timers.start_default(session_id, TimerName::Streaming, Action::EndAsrStreaming { session_id });
                    }
                    _ => {}
                }
            }
            Action::LlmReplyFinished { .. } => {
                self.timers.start_default(session_id, TimerName::TtsClaim, Action::Reset { session_id });
            }
            Action::SilenceDetected { .. } => {
                self.timers.start_default(
                    session_id,
                    TimerName::VadSilence,
                    Action::EndRecording {
                        session_id,
                        payload: EndRecordingPayload { trigger: EndTrigger::VadTimeout, duration_ms: None },
                    },
                );
            }
            Action::SpeechDetected { .. } => {
                self.timers.cancel(session_id, TimerName::VadSilence);
            }
            _ => {}
        }

        // session_idle resets on every action for the session.
        self.timers.start_default(session_id, TimerName::SessionIdle, Action::Reset { session_id });
    }

    fn audio_effect(&self, session_id: SessionId, action: &Action) {
        if let Action::AudioChunkReceived { chunk: Some(chunk), .. } = action {
            self.pipeline.submit_chunk(session_id, chunk.clone());
        }
    }

    /// Bulk and chunked uploads feed their audio into the same chunk path a
    /// live `audio_chunk_received` uses, bracketed by the same
    /// `start_recording`/`end_recording` events a live recording dispatches.
    fn upload_effect(&self, session_id: SessionId, action: &Action) {
        match action {
            Action::UploadFile { payload, .. } => {
                self.bus.dispatch(Action::StartRecording { session_id });
                let chunk = AudioChunk::new(0, now_ms(), payload.audio_format, payload.bytes.clone());
                self.pipeline.submit_chunk(session_id, chunk);
                self.bus.dispatch(Action::EndRecording {
                    session_id,
                    payload: EndRecordingPayload { trigger: EndTrigger::Upload, duration_ms: None },
                });
            }
            Action::ChunkUploadStart { .. } => {
                self.bus.dispatch(Action::StartRecording { session_id });
            }
            Action::ChunkUploadDone { .. } => {
                self.bus.dispatch(Action::EndRecording {
                    session_id,
                    payload: EndRecordingPayload { trigger: EndTrigger::Upload, duration_ms: None },
                });
            }
            _ => {}
        }
    }

    fn notify_event_bus(&self, session_id: SessionId, action: &Action) {
        match action {
            Action::StateChanged { payload, .. } => {
                self.events.emit(session_id, SessionEvent::StateChange { from: payload.from, to: payload.to });
            }
            Action::TranscriptionDone { payload, .. } => {
                let event = if payload.transcript.is_final {
                    SessionEvent::TranscriptFinal { transcript: payload.transcript.clone() }
                } else {
                    SessionEvent::TranscriptPartial { transcript: payload.transcript.clone() }
                };
                self.events.emit(session_id, event);
            }
            Action::Error { payload, .. } => {
                self.events.emit(session_id, SessionEvent::Error { error: payload.error.clone() });
            }
            Action::Backpressure { payload, .. } => {
                self.events.emit(
                    session_id,
                    SessionEvent::Backpressure { level: payload.level, retry_after_ms: payload.retry_after_ms },
                );
            }
            _ => {}
        }
    }

    /// On `begin_transcription`: lease a provider, run it over the session's
    /// accumulated audio, dispatch `transcription_done` or `error`, and
    /// always release the lease (the `ProviderLease` guard releases itself
    /// on drop even if this task is cancelled).
    fn spawn_transcription_effect(&self, session_id: SessionId, priority: u32) {
        let pool = self.pool.clone();
        let pipeline = self.pipeline.clone();
        let bus = self.bus.clone();
        let timeout = self.config.transcription_lease_timeout;

        tokio::spawn(async move {
            let lease = match asrhub_pool::lease_context(pool, session_id, priority, timeout).await {
                Ok(lease) => lease,
                Err(e) => {
                    bus.dispatch(Action::Error {
                        session_id,
                        payload: ErrorPayload { error: ErrorInfo { kind: ErrorKind::Provider, message: e.to_string() } },
                    });
                    return;
                }
            };

            let audio: Vec<u8> = pipeline
                .queue_for(session_id)
                .map(|q| q.pop_all())
                .unwrap_or_default()
                .into_iter()
                .flat_map(|chunk| chunk.bytes.to_vec())
                .collect();

            let options = asrhub_pool::TranscribeOptions::default();
            match lease.provider().transcribe(&audio, &options).await {
                Ok(transcript) => {
                    lease.mark_success().await;
                    bus.dispatch(Action::TranscriptionDone {
                        session_id,
                        payload: asrhub_action::TranscriptionDonePayload { transcript },
                    });
                }
                Err(e) => {
                    lease.mark_failure(&e.to_string()).await;
                    bus.dispatch(Action::Error {
                        session_id,
                        payload: ErrorPayload { error: ErrorInfo { kind: ErrorKind::Provider, message: e.to_string() } },
                    });
                }
            }

            lease.release().await;
        });
    }
}
