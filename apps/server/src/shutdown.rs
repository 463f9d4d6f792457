//! Shutdown-signal handling: a first Ctrl-C starts a graceful drain (destroy
//! every active session, wait for the store to settle); a second Ctrl-C
//! during that drain forces an immediate exit instead.

use crate::EXIT_FORCED_SHUTDOWN;
use asrhub_manager::SessionManager;
use asrhub_store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub async fn run_until_shutdown(manager: &SessionManager, store: Arc<SessionStore>) -> u8 {
    wait_for_signal().await;
    tracing::info!("shutdown signal received, draining active sessions");

    for session in manager.list_sessions() {
        manager.destroy_session(session.id);
    }

    tokio::select! {
        _ = drain(&store) => {
            tracing::info!("drain complete, exiting");
            0
        }
        _ = wait_for_signal() => {
            tracing::warn!("second shutdown signal received, forcing exit");
            EXIT_FORCED_SHUTDOWN
        }
    }
}

async fn drain(store: &Arc<SessionStore>) {
    let start = tokio::time::Instant::now();
    while store.session_count() > 0 {
        if start.elapsed() >= DRAIN_TIMEOUT {
            tracing::warn!("drain timed out with sessions still live");
            return;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
