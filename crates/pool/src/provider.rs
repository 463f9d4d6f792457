//! The ASR engine interface the pool leases out. Concrete engine bindings
//! (the neural model, the wire protocol to a worker process) live outside
//! this crate; it only mandates the contract.

use asrhub_action::Transcript;
use async_trait::async_trait;
use futures::stream::BoxStream;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    #[error("engine call failed: {0}")]
    EngineCall(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Clone, Default)]
pub struct TranscribeOptions {
    pub language_hint: Option<String>,
    pub word_timestamps: bool,
}

/// An ASR engine instance. One pool entry wraps exactly one `Provider`.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    async fn initialize(&self) -> Result<()>;
    async fn warmup(&self) -> Result<()>;
    async fn cleanup(&self) -> Result<()>;
    async fn health_check(&self) -> bool;

    async fn transcribe(&self, audio: &[u8], options: &TranscribeOptions) -> Result<Transcript>;

    /// Streamed transcription: a stream of partial results terminated by one
    /// final result (`Transcript::is_final`).
    async fn transcribe_stream(
        &self,
        audio: BoxStream<'static, Vec<u8>>,
        options: &TranscribeOptions,
    ) -> Result<BoxStream<'static, Transcript>>;
}

/// Factory invoked lazily whenever the pool needs a new provider instance.
pub type ProviderFactory = Box<dyn Fn() -> Result<Box<dyn Provider>> + Send + Sync>;
