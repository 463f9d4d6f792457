//! A trivial `Provider` the composition root leases when no concrete ASR
//! engine is configured. Concrete engine bindings are out of scope for this
//! control plane (spec.md §1); this exists so `--self-test` and the startup
//! pool warm-up have something real to construct and lease.

use async_trait::async_trait;
use asrhub_action::Transcript;
use asrhub_pool::{Provider, ProviderError, TranscribeOptions};
use futures::stream::BoxStream;

#[derive(Debug)]
pub struct EchoProvider;

#[async_trait]
impl Provider for EchoProvider {
    async fn initialize(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn warmup(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn transcribe(&self, audio: &[u8], _options: &TranscribeOptions) -> Result<Transcript, ProviderError> {
        Ok(Transcript {
            text: String::new(),
            confidence: if audio.is_empty() { 0.0 } else { 1.0 },
            language: "und".to_string(),
            segments: vec![],
            is_final: true,
        })
    }

    async fn transcribe_stream(
        &self,
        _audio: BoxStream<'static, Vec<u8>>,
        _options: &TranscribeOptions,
    ) -> Result<BoxStream<'static, Transcript>, ProviderError> {
        Ok(Box::pin(futures::stream::empty()))
    }
}
