//! One session's slice of the pipeline: a dedicated worker task draining a
//! channel so that chunks for a given session are always processed, and
//! their resulting actions dispatched, in arrival order.

use crate::config::PipelineConfig;
use crate::framing::FrameAccumulator;
use crate::StateProvider;
use asrhub_action::{
    Action, ActionBusHandle, EndRecordingPayload, EndTrigger, FsmState, SessionId, WakeSource,
    WakeTriggeredPayload,
};
use asrhub_audio::{AudioChunk, AudioQueue, FormatConverter, PushOutcome};
use asrhub_vad::{VadEdge, VadOperator};
use asrhub_wakeword::WakeWordOperator;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Mints a fresh scorer per session; held by the orchestrator and called
/// once at session registration.
pub type VadScorerFactory = Box<dyn Fn() -> Box<dyn asrhub_vad::SpeechScorer> + Send + Sync>;
pub type WakeWordScorerFactory = Box<dyn Fn() -> Box<dyn asrhub_wakeword::WakeWordScorer> + Send + Sync>;

/// Handle to a running session's pipeline worker. Dropping it lets the
/// worker task drain its channel and exit.
pub struct SessionPipeline {
    chunk_tx: mpsc::UnboundedSender<AudioChunk>,
    queue: Arc<AudioQueue>,
}

impl SessionPipeline {
    pub fn spawn(
        session_id: SessionId,
        config: PipelineConfig,
        converter: Arc<FormatConverter>,
        state_provider: Arc<dyn StateProvider>,
        bus: ActionBusHandle,
        vad_scorer: Box<dyn asrhub_vad::SpeechScorer>,
        wakeword_scorer: Box<dyn asrhub_wakeword::WakeWordScorer>,
    ) -> Self {
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let queue = Arc::new(AudioQueue::new(config.queue));
        let worker = Worker {
            session_id,
            config,
            converter,
            state_provider,
            bus,
            queue: queue.clone(),
            vad: VadOperator::new(vad_scorer, config.vad),
            wakeword: WakeWordOperator::new(wakeword_scorer, config.wakeword),
            frames: FrameAccumulator::new(),
        };
        tokio::spawn(worker.run(chunk_rx));
        Self { chunk_tx, queue }
    }

    /// Enqueue a chunk for processing. Never blocks the caller; ordering is
    /// guaranteed by the single consuming worker task.
    pub fn submit(&self, chunk: AudioChunk) {
        if self.chunk_tx.send(chunk).is_err() {
            tracing::warn!("chunk submitted to a pipeline whose worker has exited");
        }
    }

    pub fn queue(&self) -> &Arc<AudioQueue> {
        &self.queue
    }
}

struct Worker {
    session_id: SessionId,
    config: PipelineConfig,
    converter: Arc<FormatConverter>,
    state_provider: Arc<dyn StateProvider>,
    bus: ActionBusHandle,
    queue: Arc<AudioQueue>,
    vad: VadOperator,
    wakeword: WakeWordOperator,
    frames: FrameAccumulator,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl Worker {
    async fn run(mut self, mut chunk_rx: mpsc::UnboundedReceiver<AudioChunk>) {
        while let Some(chunk) = chunk_rx.recv().await {
            self.process(chunk).await;
        }
        tracing::debug!(session_id = %self.session_id, "pipeline worker exiting");
    }

    async fn process(&mut self, chunk: AudioChunk) {
        match self.queue.push(chunk.clone()) {
            PushOutcome::Accepted => {}
            PushOutcome::Backpressure { level, retry_after_ms } => {
                self.bus.dispatch(Action::Backpressure {
                    session_id: self.session_id,
                    payload: asrhub_action::BackpressurePayload { level, retry_after_ms },
                });
            }
            PushOutcome::DroppedOverflow => {
                self.bus.dispatch(Action::Backpressure {
                    session_id: self.session_id,
                    payload: asrhub_action::BackpressurePayload {
                        level: asrhub_audio::BackpressureLevel::Critical,
                        retry_after_ms: None,
                    },
                });
            }
        }

        let Some(state) = self.state_provider.current_state(self.session_id) else {
            tracing::debug!(session_id = %self.session_id, "no known FSM state, dropping chunk");
            return;
        };

        if state == FsmState::Busy {
            tracing::trace!(session_id = %self.session_id, "dropping chunk while system is speaking");
            return;
        }

        let run_wakeword = matches!(state, FsmState::Idle | FsmState::Listening | FsmState::Activated);
        let run_vad = matches!(state, FsmState::Activated | FsmState::Recording | FsmState::Streaming);

        let canonical = match self.converter.convert(&chunk, self.config.operator_format) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "format conversion branch failed, skipping VAD/wake-word for this chunk");
                None
            }
        };

        let Some(canonical) = canonical else { return };
        let new_frames = self.frames.push(&canonical.bytes);

        for frame in new_frames {
            if run_wakeword {
                match self.wakeword.process_frame(&frame, std::time::Instant::now()) {
                    Ok(Some(hit)) => {
                        self.bus.dispatch(Action::WakeTriggered {
                            session_id: self.session_id,
                            payload: WakeTriggeredPayload {
                                source: WakeSource::WakeWord,
                                model: hit.model.to_string(),
                                score: hit.score,
                                timestamp_ms: now_ms(),
                            },
                        });
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(session_id = %self.session_id, error = %e, "wake-word branch failed"),
                }
            }

            if run_vad {
                match self.vad.process_frame(&frame) {
                    Ok(result) => self.dispatch_vad_edge(state, result.edge),
                    Err(e) => tracing::warn!(session_id = %self.session_id, error = %e, "VAD branch failed"),
                }
            }
        }
    }

    fn dispatch_vad_edge(&self, state: FsmState, edge: Option<VadEdge>) {
        match edge {
            Some(VadEdge::SpeechStart) => {
                self.bus.dispatch(Action::SpeechDetected { session_id: self.session_id });
            }
            Some(VadEdge::SpeechEnd) => {
                self.bus.dispatch(Action::SilenceDetected { session_id: self.session_id });
                match state {
                    FsmState::Recording => {
                        self.bus.dispatch(Action::EndRecording {
                            session_id: self.session_id,
                            payload: EndRecordingPayload {
                                trigger: EndTrigger::VadTimeout,
                                duration_ms: None,
                            },
                        });
                    }
                    FsmState::Streaming => {
                        self.bus.dispatch(Action::EndAsrStreaming { session_id: self.session_id });
                    }
                    _ => {}
                }
            }
            None => {}
        }
    }
}
