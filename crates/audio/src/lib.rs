//! Per-session audio ingestion: the bounded queue, format conversion and the
//! value objects that flow between them.

mod converter;
mod format;
mod queue;

pub use converter::{ConversionError, FormatConverter, ResampleQuality};
pub use format::{AudioChunk, AudioFormat, SampleEncoding};
pub use queue::{AudioQueue, AudioQueueConfig, AudioQueueStats, BackpressureLevel, PushOutcome};

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

pub type Result<T> = std::result::Result<T, AudioError>;
