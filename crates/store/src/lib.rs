//! Wires the pure per-session reducer (`asrhub-session`) to its effects: FSM
//! transitions, timers, audio routing, and transcription. See `SessionStore`.

mod config;
mod error;
mod shared_sessions;
mod store;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use shared_sessions::SharedSessions;
pub use store::SessionStore;

#[cfg(test)]
mod tests {
    use super::*;
    use asrhub_action::{Action, ActionBus, InMemoryEventBus, SessionId, Strategy};
    use asrhub_audio::{AudioFormat, FormatConverter, ResampleQuality};
    use asrhub_pipeline::PipelineOrchestrator;
    use asrhub_pool::{PoolConfig, ProviderPool};
    use asrhub_timers::{TimerConfig, TimerService};
    use asrhub_vad::EnergyScorer;
    use asrhub_wakeword::ConstantScorer;
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    struct DummyProvider;

    #[async_trait]
    impl asrhub_pool::Provider for DummyProvider {
        async fn initialize(&self) -> std::result::Result<(), asrhub_pool::ProviderError> {
            Ok(())
        }
        async fn warmup(&self) -> std::result::Result<(), asrhub_pool::ProviderError> {
            Ok(())
        }
        async fn cleanup(&self) -> std::result::Result<(), asrhub_pool::ProviderError> {
            Ok(())
        }
        async fn health_check(&self) -> bool {
            true
        }
        async fn transcribe(
            &self,
            _audio: &[u8],
            _options: &asrhub_pool::TranscribeOptions,
        ) -> std::result::Result<asrhub_action::Transcript, asrhub_pool::ProviderError> {
            Ok(asrhub_action::Transcript {
                text: "hello".to_string(),
                confidence: 0.9,
                language: "en".to_string(),
                segments: vec![],
                is_final: true,
            })
        }
        async fn transcribe_stream(
            &self,
            _audio: BoxStream<'static, Vec<u8>>,
            _options: &asrhub_pool::TranscribeOptions,
        ) -> std::result::Result<BoxStream<'static, asrhub_action::Transcript>, asrhub_pool::ProviderError> {
            Ok(Box::pin(stream::empty()))
        }
    }

    fn build_store() -> (
        Arc<SessionStore>,
        tokio::sync::mpsc::UnboundedReceiver<Action>,
        asrhub_action::ActionBusHandle,
        Arc<InMemoryEventBus>,
    ) {
        let (bus, rx) = ActionBus::new();
        let handle = bus.handle();
        let events = Arc::new(InMemoryEventBus::new());
        let sessions = Arc::new(SharedSessions::new());
        let timers = Arc::new(TimerService::new(TimerConfig::default(), handle.clone()));
        let pipeline = Arc::new(PipelineOrchestrator::new(
            asrhub_pipeline::PipelineConfig::default(),
            Arc::new(FormatConverter::new(ResampleQuality::Low)),
            sessions.clone(),
            handle.clone(),
            Box::new(|| Box::new(EnergyScorer::new(0.5)) as Box<dyn asrhub_vad::SpeechScorer>),
            Box::new(|| Box::new(ConstantScorer::new("test", 0.9)) as Box<dyn asrhub_wakeword::WakeWordScorer>),
        ));
        let pool = Arc::new(ProviderPool::new(
            PoolConfig::default(),
            Box::new(|| Ok(Box::new(DummyProvider) as Box<dyn asrhub_pool::Provider>)),
        ));
        let store = SessionStore::new(
            StoreConfig { max_sessions: 2, ..StoreConfig::default() },
            sessions,
            handle.clone(),
            events.clone() as asrhub_action::EventBusRef,
            timers,
            pipeline,
            pool,
        );
        (store, rx, handle, events)
    }

    fn create(handle: &asrhub_action::ActionBusHandle, session_id: SessionId) {
        handle.dispatch(Action::CreateSession {
            session_id,
            strategy: Strategy::NonStreaming,
            priority: 0,
            metadata: HashMap::new(),
        });
    }

    fn create_with_strategy(handle: &asrhub_action::ActionBusHandle, session_id: SessionId, strategy: Strategy) {
        handle.dispatch(Action::CreateSession { session_id, strategy, priority: 0, metadata: HashMap::new() });
    }

    #[tokio::test]
    async fn create_session_registers_and_activates() {
        let (store, rx, handle, _events) = build_store();
        let runner = tokio::spawn(store.clone().run(rx));
        let session_id = SessionId::new();
        create(&handle, session_id);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.session_count(), 1);
        assert_eq!(store.active_session_id(), Some(session_id));
        runner.abort();
    }

    #[tokio::test]
    async fn creating_past_max_sessions_is_rejected() {
        let (store, rx, handle, _events) = build_store();
        let runner = tokio::spawn(store.clone().run(rx));
        create(&handle, SessionId::new());
        create(&handle, SessionId::new());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.session_count(), 2);

        create(&handle, SessionId::new());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.session_count(), 2, "the third session must be rejected, not created");
        runner.abort();
    }

    #[tokio::test]
    async fn action_for_unknown_session_is_a_no_op() {
        let (store, rx, handle, _events) = build_store();
        let runner = tokio::spawn(store.clone().run(rx));
        handle.dispatch(Action::Reset { session_id: SessionId::new() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.session_count(), 0);
        runner.abort();
    }

    #[tokio::test]
    async fn destroy_session_removes_it_and_clears_active() {
        let (store, rx, handle, _events) = build_store();
        let runner = tokio::spawn(store.clone().run(rx));
        let session_id = SessionId::new();
        create(&handle, session_id);
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.dispatch(Action::DestroySession { session_id });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.session_count(), 0);
        assert_eq!(store.active_session_id(), None);
        runner.abort();
    }

    #[tokio::test]
    async fn start_listening_drives_fsm_to_listening_and_emits_event() {
        let (store, rx, handle, events) = build_store();
        let runner = tokio::spawn(store.clone().run(rx));
        let session_id = SessionId::new();
        create(&handle, session_id);
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.dispatch(Action::StartListening {
            session_id,
            payload: asrhub_action::StartListeningPayload { audio_format: AudioFormat::CANONICAL },
        });

        // The FSM effect dispatches `state_changed` back onto the bus; give
        // the real dispatch loop a couple of turns to apply it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let session = store.get(session_id).unwrap();
        assert_eq!(session.fsm_state, asrhub_action::FsmState::Listening);
        assert!(!events.is_empty());
        runner.abort();
    }

    #[tokio::test]
    async fn entering_transcribing_actually_runs_the_transcription_effect() {
        let (store, rx, handle, _events) = build_store();
        let runner = tokio::spawn(store.clone().run(rx));
        let session_id = SessionId::new();
        create(&handle, session_id);
        tokio::time::sleep(Duration::from_millis(20)).await;

        handle.dispatch(Action::StartListening {
            session_id,
            payload: asrhub_action::StartListeningPayload { audio_format: AudioFormat::CANONICAL },
        });
        handle.dispatch(Action::WakeTriggered {
            session_id,
            payload: asrhub_action::WakeTriggeredPayload {
                source: asrhub_action::WakeSource::WakeWord,
                model: "test".to_string(),
                score: 0.9,
                timestamp_ms: 0,
            },
        });
        handle.dispatch(Action::SpeechDetected { session_id });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.dispatch(Action::EndRecording {
            session_id,
            payload: asrhub_action::EndRecordingPayload {
                trigger: asrhub_action::EndTrigger::Client,
                duration_ms: None,
            },
        });

        // Entering TRANSCRIBING must dispatch begin_transcription, which leases
        // the pool, transcribes and lands back in BUSY (will_reply defaults true).
        tokio::time::sleep(Duration::from_millis(100)).await;
        let session = store.get(session_id).unwrap();
        assert_eq!(session.fsm_state, asrhub_action::FsmState::Busy);
        assert_eq!(session.transcription.as_ref().map(|t| t.text.as_str()), Some("hello"));
        runner.abort();
    }

    #[tokio::test]
    async fn upload_file_feeds_bytes_through_the_chunk_path_and_transcribes() {
        let (store, rx, handle, _events) = build_store();
        let runner = tokio::spawn(store.clone().run(rx));
        let session_id = SessionId::new();
        create_with_strategy(&handle, session_id, Strategy::Batch);
        tokio::time::sleep(Duration::from_millis(20)).await;

        handle.dispatch(Action::UploadFile {
            session_id,
            payload: asrhub_action::UploadFilePayload {
                audio_format: AudioFormat::CANONICAL,
                bytes: vec![0u8; 3_200],
            },
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let session = store.get(session_id).unwrap();
        assert_eq!(session.fsm_state, asrhub_action::FsmState::Idle);
        assert_eq!(session.transcription.as_ref().map(|t| t.text.as_str()), Some("hello"));
        runner.abort();
    }

    #[tokio::test]
    async fn chunked_upload_brackets_live_chunks_with_start_recording_and_end_recording() {
        let (store, rx, handle, _events) = build_store();
        let runner = tokio::spawn(store.clone().run(rx));
        let session_id = SessionId::new();
        create_with_strategy(&handle, session_id, Strategy::Batch);
        tokio::time::sleep(Duration::from_millis(20)).await;

        handle.dispatch(Action::ChunkUploadStart { session_id });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get(session_id).unwrap().fsm_state, asrhub_action::FsmState::Recording);

        handle.dispatch(Action::AudioChunkReceived {
            session_id,
            chunk: Some(asrhub_audio::AudioChunk::new(0, 0, AudioFormat::CANONICAL, vec![0u8; 3_200])),
        });
        handle.dispatch(Action::ChunkUploadDone { session_id });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let session = store.get(session_id).unwrap();
        assert_eq!(session.fsm_state, asrhub_action::FsmState::Idle);
        assert_eq!(session.transcription.as_ref().map(|t| t.text.as_str()), Some("hello"));
        runner.abort();
    }
}
