//! Composition root for the ASR hub control plane.
//!
//! Builds exactly one `ActionBus`, `SharedSessions`, `TimerService`,
//! `PipelineOrchestrator`, `ProviderPool` and `SessionStore` — no statics —
//! and exposes the `SessionManager` facade a protocol server would embed.
//! This binary never opens a network listener itself; `--self-test` instead
//! drives the composition root end-to-end in-process.

mod echo_provider;
mod shutdown;

use anyhow::Context;
use asrhub_action::{Action, ActionBus, ActionBusHandle, NullEventBus, StartListeningPayload};
use asrhub_audio::{AudioChunk, AudioFormat, FormatConverter, ResampleQuality};
use asrhub_config::HubConfig;
use asrhub_manager::{NewSession, SessionManager};
use asrhub_pipeline::PipelineOrchestrator;
use asrhub_pool::ProviderPool;
use asrhub_store::{SessionStore, SharedSessions};
use asrhub_timers::TimerService;
use asrhub_vad::EnergyScorer;
use asrhub_wakeword::ConstantScorer;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Configuration error, per spec.md §6/§7.
const EXIT_CONFIG_ERROR: u8 = 1;
/// Fatal pool failure: the provider pool could not warm up a single engine.
const EXIT_POOL_FAILURE: u8 = 2;
/// A second shutdown signal arrived while sessions were still draining.
pub(crate) const EXIT_FORCED_SHUTDOWN: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "asrhub-server", about = "ASR hub control-plane composition root")]
struct Cli {
    /// Path to a `HubConfig` TOML file. Missing file or flag falls back to defaults.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Create a session, push synthetic audio through it and exit, instead of
    /// blocking on a shutdown signal.
    #[arg(long)]
    self_test: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let (manager, store, handle, runner) = match build(&config).await {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!(error = %e, "fatal pool failure during startup warm-up");
            return ExitCode::from(EXIT_POOL_FAILURE);
        }
    };

    let code = if cli.self_test {
        self_test(&manager, &handle).await
    } else {
        shutdown::run_until_shutdown(&manager, store.clone()).await
    };

    runner.abort();
    ExitCode::from(code)
}

fn load_config(path: Option<&std::path::Path>) -> asrhub_config::Result<HubConfig> {
    match path {
        Some(path) => HubConfig::load(path),
        None => {
            let config = HubConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Wires the composition root and warms up the provider pool once: a single
/// failed lease here is the "fatal pool failure" exit path, rather than
/// surfacing lazily on the first real session's transcription attempt.
async fn build(
    config: &HubConfig,
) -> anyhow::Result<(SessionManager, Arc<SessionStore>, ActionBusHandle, tokio::task::JoinHandle<()>)> {
    let (bus, rx) = ActionBus::new();
    let handle = bus.handle();
    let events = Arc::new(NullEventBus);
    let sessions = Arc::new(SharedSessions::new());
    let timers = Arc::new(TimerService::new(config.to_timer_config(), handle.clone()));
    let pipeline = Arc::new(PipelineOrchestrator::new(
        config.to_pipeline_config(),
        Arc::new(FormatConverter::new(ResampleQuality::Medium)),
        sessions.clone(),
        handle.clone(),
        Box::new(|| Box::new(EnergyScorer::new(0.5)) as Box<dyn asrhub_vad::SpeechScorer>),
        Box::new(|| Box::new(ConstantScorer::new("hey-hub", 0.9)) as Box<dyn asrhub_wakeword::WakeWordScorer>),
    ));
    let pool = Arc::new(ProviderPool::new(
        config.to_pool_config(),
        Box::new(|| Ok(Box::new(echo_provider::EchoProvider) as Box<dyn asrhub_pool::Provider>)),
    ));

    let warmup = pool
        .lease(asrhub_action::SessionId::new(), 0, Duration::from_millis(500))
        .await
        .context("provider pool could not construct a single engine instance")?;
    pool.release(warmup.0).await;

    let store = SessionStore::new(
        config.to_store_config(),
        sessions,
        handle.clone(),
        events as asrhub_action::EventBusRef,
        timers,
        pipeline,
        pool,
    );
    let runner = tokio::spawn(store.clone().run(rx));
    let manager = SessionManager::new(store.clone(), handle.clone());
    Ok((manager, store, handle, runner))
}

/// Creates a session, declares a format, feeds one chunk of synthetic silence
/// and tears the session down. `start_listening`/`audio_chunk_received` are
/// dispatched straight onto the bus: they belong to the protocol-server
/// ingress contract (spec.md §6), not the `SessionManager` facade, so the
/// composition root reaches for its own bus handle the way an embedding
/// protocol server would.
async fn self_test(manager: &SessionManager, bus: &ActionBusHandle) -> u8 {
    let session_id = manager.create_session(NewSession::default());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let Some(snapshot) = manager.get_session(session_id) else {
        tracing::error!("self-test session did not materialize");
        return EXIT_POOL_FAILURE;
    };
    tracing::info!(?session_id, state = ?snapshot.fsm_state, "self-test session created");

    bus.dispatch(Action::StartListening {
        session_id,
        payload: StartListeningPayload { audio_format: AudioFormat::CANONICAL },
    });
    bus.dispatch(Action::AudioChunkReceived {
        session_id,
        chunk: Some(AudioChunk::new(0, 0, AudioFormat::CANONICAL, vec![0u8; 3_200])),
    });
    manager.touch(session_id);

    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Some(snapshot) = manager.get_session(session_id) {
        tracing::info!(?session_id, state = ?snapshot.fsm_state, "self-test session state after activity");
    }

    manager.destroy_session(session_id);
    tokio::time::sleep(Duration::from_millis(20)).await;
    tracing::info!("self-test complete");
    0
}
