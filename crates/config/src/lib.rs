//! Typed hub configuration: a `HubConfig` loaded from TOML (or defaulted
//! entirely) and validated before the composition root builds a single
//! `PoolConfig`/`TimerConfig`/`PipelineConfig`/`StoreConfig` from it.

mod config;
mod error;

pub use config::{AudioQueueSection, HubConfig, PoolSection, TimerSection, VadSection, WakeWordSection};
pub use error::{ConfigError, Result};
