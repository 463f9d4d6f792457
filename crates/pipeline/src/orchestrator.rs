//! Registry of per-session pipelines. The store's audio effect routes
//! `audio_chunk_received` actions here.

use crate::config::PipelineConfig;
use crate::session_pipeline::{SessionPipeline, VadScorerFactory, WakeWordScorerFactory};
use crate::StateProvider;
use asrhub_action::{ActionBusHandle, SessionId};
use asrhub_audio::{AudioChunk, AudioQueue, FormatConverter};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    converter: Arc<FormatConverter>,
    state_provider: Arc<dyn StateProvider>,
    bus: ActionBusHandle,
    vad_scorer_factory: VadScorerFactory,
    wakeword_scorer_factory: WakeWordScorerFactory,
    sessions: RwLock<HashMap<SessionId, SessionPipeline>>,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        converter: Arc<FormatConverter>,
        state_provider: Arc<dyn StateProvider>,
        bus: ActionBusHandle,
        vad_scorer_factory: VadScorerFactory,
        wakeword_scorer_factory: WakeWordScorerFactory,
    ) -> Self {
        Self {
            config,
            converter,
            state_provider,
            bus,
            vad_scorer_factory,
            wakeword_scorer_factory,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_session(&self, session_id: SessionId) {
        let pipeline = SessionPipeline::spawn(
            session_id,
            self.config,
            self.converter.clone(),
            self.state_provider.clone(),
            self.bus.clone(),
            (self.vad_scorer_factory)(),
            (self.wakeword_scorer_factory)(),
        );
        self.sessions.write().unwrap().insert(session_id, pipeline);
    }

    pub fn remove_session(&self, session_id: SessionId) {
        self.sessions.write().unwrap().remove(&session_id);
    }

    /// Route one chunk into its session's pipeline. A no-op, logged, if the
    /// session was never registered (e.g. it raced destruction).
    pub fn submit_chunk(&self, session_id: SessionId, chunk: AudioChunk) {
        match self.sessions.read().unwrap().get(&session_id) {
            Some(pipeline) => pipeline.submit(chunk),
            None => tracing::debug!(%session_id, "chunk submitted for an unregistered session"),
        }
    }

    pub fn queue_for(&self, session_id: SessionId) -> Option<Arc<AudioQueue>> {
        self.sessions.read().unwrap().get(&session_id).map(|p| p.queue().clone())
    }

    pub fn is_registered(&self, session_id: SessionId) -> bool {
        self.sessions.read().unwrap().contains_key(&session_id)
    }
}
