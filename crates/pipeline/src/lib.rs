//! Per-chunk concurrent operator fan-out: format conversion, wake-word and
//! VAD branches gated by the session's current FSM state.

mod config;
mod framing;
mod orchestrator;
mod session_pipeline;

use asrhub_action::{FsmState, SessionId};

pub use config::PipelineConfig;
pub use orchestrator::PipelineOrchestrator;
pub use session_pipeline::{SessionPipeline, VadScorerFactory, WakeWordScorerFactory};

/// Bridges the pipeline to the session store without creating a dependency
/// on `asrhub-store`/`asrhub-session`: the composition root implements this
/// over its session map.
pub trait StateProvider: Send + Sync {
    fn current_state(&self, session_id: SessionId) -> Option<FsmState>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use asrhub_audio::{AudioChunk, AudioFormat, FormatConverter, ResampleQuality};
    use asrhub_vad::EnergyScorer;
    use asrhub_wakeword::ConstantScorer;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct FixedState(Mutex<HashMap<SessionId, FsmState>>);

    impl StateProvider for FixedState {
        fn current_state(&self, session_id: SessionId) -> Option<FsmState> {
            self.0.lock().unwrap().get(&session_id).copied()
        }
    }

    fn loud_chunk(seq: u64) -> AudioChunk {
        let samples = vec![20_000i16; asrhub_vad::FRAME_SAMPLES];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        AudioChunk::new(seq, seq as i64 * 32, AudioFormat::CANONICAL, bytes)
    }

    #[tokio::test]
    async fn busy_state_drops_chunks_without_dispatch() {
        let (bus, mut events) = test_bus();
        let session_id = SessionId::new();
        let mut states = HashMap::new();
        states.insert(session_id, FsmState::Busy);
        let state_provider = Arc::new(FixedState(Mutex::new(states)));

        let orchestrator = PipelineOrchestrator::new(
            PipelineConfig::default(),
            Arc::new(FormatConverter::new(ResampleQuality::Low)),
            state_provider,
            bus,
            Box::new(|| Box::new(EnergyScorer::new(0.5)) as Box<dyn asrhub_vad::SpeechScorer>),
            Box::new(|| Box::new(ConstantScorer::new("test", 0.9)) as Box<dyn asrhub_wakeword::WakeWordScorer>),
        );
        orchestrator.register_session(session_id);
        orchestrator.submit_chunk(session_id, loud_chunk(0));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(events.try_recv().is_err(), "BUSY sessions must not produce wake-word/VAD actions");
    }

    #[tokio::test]
    async fn listening_state_runs_wakeword_branch() {
        let (bus, mut events) = test_bus();
        let session_id = SessionId::new();
        let mut states = HashMap::new();
        states.insert(session_id, FsmState::Listening);
        let state_provider = Arc::new(FixedState(Mutex::new(states)));

        let orchestrator = PipelineOrchestrator::new(
            PipelineConfig::default(),
            Arc::new(FormatConverter::new(ResampleQuality::Low)),
            state_provider,
            bus,
            Box::new(|| Box::new(EnergyScorer::new(0.5)) as Box<dyn asrhub_vad::SpeechScorer>),
            Box::new(|| Box::new(ConstantScorer::new("test", 0.9)) as Box<dyn asrhub_wakeword::WakeWordScorer>),
        );
        orchestrator.register_session(session_id);
        orchestrator.submit_chunk(session_id, loud_chunk(0));

        let action = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("wake_triggered should be dispatched")
            .unwrap();
        assert!(matches!(action, asrhub_action::Action::WakeTriggered { .. }));
    }

    fn test_bus() -> (asrhub_action::ActionBusHandle, tokio::sync::mpsc::UnboundedReceiver<asrhub_action::Action>) {
        let (bus, rx) = asrhub_action::ActionBus::new();
        (bus.handle(), rx)
    }
}
