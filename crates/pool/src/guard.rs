//! RAII lease handle: release is guaranteed even when the holder bails out
//! on an error path without calling `release()` explicitly.

use crate::pool::{LeaseError, ProviderId, ProviderPool};
use crate::provider::Provider;
use asrhub_action::SessionId;
use std::sync::Arc;
use std::time::Duration;

/// A leased provider. Dropping it without calling [`ProviderLease::release`]
/// still returns the provider to the pool, via a detached background task,
/// so a panicking or early-returning caller can never leak a lease.
pub struct ProviderLease {
    pool: Arc<ProviderPool>,
    provider_id: Option<ProviderId>,
    provider: Arc<dyn Provider>,
}

impl ProviderLease {
    fn new(pool: Arc<ProviderPool>, provider_id: ProviderId, provider: Arc<dyn Provider>) -> Self {
        Self {
            pool,
            provider_id: Some(provider_id),
            provider,
        }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn id(&self) -> ProviderId {
        self.provider_id.expect("id accessed after release")
    }

    pub async fn mark_success(&self) {
        if let Some(id) = self.provider_id {
            self.pool.mark_success(id).await;
        }
    }

    pub async fn mark_failure(&self, reason: &str) {
        if let Some(id) = self.provider_id {
            self.pool.mark_failure(id, reason).await;
        }
    }

    /// Explicitly release the lease. Prefer this over letting the guard drop
    /// so the caller can await completion instead of racing a detached task.
    pub async fn release(mut self) {
        if let Some(id) = self.provider_id.take() {
            self.pool.release(id).await;
        }
    }
}

impl Drop for ProviderLease {
    fn drop(&mut self) {
        if let Some(id) = self.provider_id.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move {
                pool.release(id).await;
            });
        }
    }
}

/// Lease a provider for `session_id` at `priority` and wrap it in a guard
/// that releases on drop. This is the entry point effects should use; raw
/// `ProviderPool` access is for the pool's own tests.
pub async fn lease_context(
    pool: Arc<ProviderPool>,
    session_id: SessionId,
    priority: u32,
    timeout: Duration,
) -> Result<ProviderLease, LeaseError> {
    let (provider_id, provider) = pool.lease(session_id, priority, timeout).await?;
    Ok(ProviderLease::new(pool, provider_id, provider))
}
