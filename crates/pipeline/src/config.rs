use asrhub_audio::{AudioFormat, AudioQueueConfig};
use asrhub_vad::VadConfig;
use asrhub_wakeword::WakeWordConfig;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Format every chunk is converted to before it reaches the VAD and
    /// wake-word branches. Accumulated audio for transcription keeps its
    /// original wire format; only these two branches need canonical frames.
    pub operator_format: AudioFormat,
    pub queue: AudioQueueConfig,
    pub vad: VadConfig,
    pub wakeword: WakeWordConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            operator_format: AudioFormat::CANONICAL,
            queue: AudioQueueConfig::default(),
            vad: VadConfig::default(),
            wakeword: WakeWordConfig::default(),
        }
    }
}
