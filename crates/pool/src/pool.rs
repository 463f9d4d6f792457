//! The provider pool: bounded set of ASR engines, leased under quota,
//! fairness (aging) and health discipline.

use crate::config::PoolConfig;
use crate::provider::{Provider, ProviderFactory};
use crate::stats::{PoolCurrent, PoolStats, PoolTotals, RollingAverage};
use asrhub_action::SessionId;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId(u64);

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum LeaseError {
    #[error("session already holds its full lease quota")]
    NoCapacityForSession,
    #[error("lease request timed out")]
    Timeout,
    #[error("no provider could be initialized")]
    InitializationFailed,
}

pub type LeaseResult = std::result::Result<(ProviderId, Arc<dyn Provider>), LeaseError>;

struct ProviderEntry {
    id: ProviderId,
    provider: Arc<dyn Provider>,
    consecutive_failures: u32,
    healthy: bool,
}

struct Waiter {
    id: u64,
    session_id: SessionId,
    base_priority: u32,
    enqueued_at: Instant,
    responder: oneshot::Sender<LeaseResult>,
}

struct Inner {
    idle: VecDeque<ProviderEntry>,
    /// provider_id -> (holder, provider handle, health bookkeeping snapshot)
    leased: HashMap<ProviderId, LeasedEntry>,
    waiters: Vec<Waiter>,
    total: usize,
    next_provider_id: u64,
    next_waiter_id: u64,
    session_counts: HashMap<SessionId, u32>,
    totals: PoolTotals,
    wait_times: RollingAverage,
}

struct LeasedEntry {
    session_id: SessionId,
    provider: Arc<dyn Provider>,
    consecutive_failures: u32,
    healthy: bool,
}

/// Owns a bounded set of ASR engine instances and hands them out under a
/// lease discipline. Cheap to clone (wraps an `Arc`-like single mutex); share
/// one instance across the process.
pub struct ProviderPool {
    config: PoolConfig,
    factory: ProviderFactory,
    inner: Mutex<Inner>,
}

impl ProviderPool {
    pub fn new(config: PoolConfig, factory: ProviderFactory) -> Self {
        Self {
            config,
            factory,
            inner: Mutex::new(Inner {
                idle: VecDeque::new(),
                leased: HashMap::new(),
                waiters: Vec::new(),
                total: 0,
                next_provider_id: 0,
                next_waiter_id: 0,
                session_counts: HashMap::new(),
                totals: PoolTotals::default(),
                wait_times: RollingAverage::new(128),
            }),
        }
    }

    async fn construct_provider(&self, inner: &mut Inner) -> Result<ProviderEntry, LeaseError> {
        let provider = (self.factory)().map_err(|e| {
            tracing::warn!(error = %e, "provider construction failed");
            LeaseError::InitializationFailed
        })?;
        let provider: Arc<dyn Provider> = Arc::from(provider);
        if let Err(e) = provider.initialize().await {
            tracing::warn!(error = %e, "provider initialization failed");
            inner.totals.errors += 1;
            return Err(LeaseError::InitializationFailed);
        }
        if let Err(e) = provider.warmup().await {
            tracing::warn!(error = %e, "provider warmup failed, using cold");
        }
        let id = ProviderId(inner.next_provider_id);
        inner.next_provider_id += 1;
        inner.total += 1;
        inner.totals.created += 1;
        Ok(ProviderEntry {
            id,
            provider,
            consecutive_failures: 0,
            healthy: true,
        })
    }

    /// Lease a provider for `session_id` at `priority`, blocking up to
    /// `timeout` if the pool is saturated. `timeout = 0` never blocks. A
    /// queued waiter's fairness score is `priority + aging_factor * age_ms`,
    /// so a higher `priority` is served ahead of older, lower-priority
    /// waiters until aging catches up.
    pub async fn lease(&self, session_id: SessionId, priority: u32, timeout: Duration) -> LeaseResult {
        let wait_start = Instant::now();
        let waiter_rx = {
            let mut inner = self.inner.lock().await;

            let held = *inner.session_counts.get(&session_id).unwrap_or(&0);
            if held >= self.config.per_session_quota {
                return Err(LeaseError::NoCapacityForSession);
            }

            if let Some(entry) = inner.idle.iter().position(|e| e.healthy) {
                let entry = inner.idle.remove(entry).unwrap();
                return Ok(self.assign(&mut inner, entry, session_id));
            }

            if inner.total < self.config.max_size {
                match self.construct_provider(&mut inner).await {
                    Ok(entry) => return Ok(self.assign(&mut inner, entry, session_id)),
                    Err(e) => return Err(e),
                }
            }

            let (tx, rx) = oneshot::channel();
            let id = inner.next_waiter_id;
            inner.next_waiter_id += 1;
            inner.waiters.push(Waiter {
                id,
                session_id,
                base_priority: priority,
                enqueued_at: wait_start,
                responder: tx,
            });
            rx
        };

        match tokio::time::timeout(timeout, waiter_rx).await {
            Ok(Ok(result)) => {
                let mut inner = self.inner.lock().await;
                inner.wait_times.record(wait_start.elapsed());
                result
            }
            Ok(Err(_)) | Err(_) => {
                let mut inner = self.inner.lock().await;
                inner.waiters.retain(|w| w.session_id != session_id || w.enqueued_at != wait_start);
                inner.totals.timeouts += 1;
                Err(LeaseError::Timeout)
            }
        }
    }

    fn assign(&self, inner: &mut Inner, entry: ProviderEntry, session_id: SessionId) -> (ProviderId, Arc<dyn Provider>) {
        inner.totals.leased += 1;
        *inner.session_counts.entry(session_id).or_insert(0) += 1;
        let provider = entry.provider.clone();
        inner.leased.insert(
            entry.id,
            LeasedEntry {
                session_id,
                provider: provider.clone(),
                consecutive_failures: entry.consecutive_failures,
                healthy: entry.healthy,
            },
        );
        (entry.id, provider)
    }

    /// Pick the waiter with the highest `base_priority + aging_factor * age_ms`,
    /// scanning at most `aging_scan_limit` candidates.
    fn pick_waiter(&self, inner: &mut Inner, now: Instant) -> Option<Waiter> {
        let scan = inner.waiters.len().min(self.config.aging_scan_limit);
        let mut best_idx = None;
        let mut best_score = f64::MIN;
        for (idx, w) in inner.waiters.iter().take(scan).enumerate() {
            let age_ms = now.duration_since(w.enqueued_at).as_millis() as f64;
            let score = w.base_priority as f64 + self.config.aging_factor * age_ms;
            if score > best_score {
                best_score = score;
                best_idx = Some(idx);
            }
        }
        best_idx.map(|idx| inner.waiters.remove(idx))
    }

    /// Release `provider_id` back to the pool, following the exact
    /// reassign-before-idle-before-disposal order.
    pub async fn release(&self, provider_id: ProviderId) {
        let mut inner = self.inner.lock().await;
        let Some(leased) = inner.leased.remove(&provider_id) else {
            tracing::warn!(?provider_id, "release called for an unknown/already-released provider");
            return;
        };
        inner.totals.released += 1;
        if let Some(count) = inner.session_counts.get_mut(&leased.session_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                inner.session_counts.remove(&leased.session_id);
            }
        }

        if !leased.healthy {
            inner.total = inner.total.saturating_sub(1);
            let provider = leased.provider;
            drop(inner);
            let _ = provider.cleanup().await;
            return;
        }

        let now = Instant::now();
        if let Some(waiter) = self.pick_waiter(&mut inner, now) {
            let entry = ProviderEntry {
                id: provider_id,
                provider: leased.provider,
                consecutive_failures: leased.consecutive_failures,
                healthy: true,
            };
            let assigned = self.assign(&mut inner, entry, waiter.session_id);
            let _ = waiter.responder.send(Ok(assigned));
            return;
        }

        if inner.total > self.config.min_size {
            inner.total = inner.total.saturating_sub(1);
            let provider = leased.provider;
            drop(inner);
            let _ = provider.cleanup().await;
            return;
        }

        inner.idle.push_back(ProviderEntry {
            id: provider_id,
            provider: leased.provider,
            consecutive_failures: leased.consecutive_failures,
            healthy: true,
        });
    }

    /// Release every lease held by `session_id`, e.g. on session destruction.
    pub async fn release_all(&self, session_id: SessionId) {
        let held: Vec<ProviderId> = {
            let inner = self.inner.lock().await;
            inner
                .leased
                .iter()
                .filter(|(_, e)| e.session_id == session_id)
                .map(|(id, _)| *id)
                .collect()
        };
        for id in held {
            self.release(id).await;
        }
        let mut inner = self.inner.lock().await;
        inner.waiters.retain(|w| {
            if w.session_id == session_id {
                // Waiter cancelled; its oneshot receiver observes a closed
                // channel and `lease` surfaces that as a timeout-equivalent.
                false
            } else {
                true
            }
        });
    }

    /// Reset the failure counter and mark the provider healthy.
    pub async fn mark_success(&self, provider_id: ProviderId) {
        let mut inner = self.inner.lock().await;
        if let Some(e) = inner.leased.get_mut(&provider_id) {
            e.consecutive_failures = 0;
            e.healthy = true;
        }
    }

    /// Record a failure; evicts the provider from future leasing once it
    /// crosses `max_consecutive_failures`. Disposal itself happens at release
    /// time, following the release algorithm's unhealthy-first branch.
    pub async fn mark_failure(&self, provider_id: ProviderId, reason: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(e) = inner.leased.get_mut(&provider_id) {
            e.consecutive_failures += 1;
            tracing::warn!(?provider_id, reason, failures = e.consecutive_failures, "provider failure recorded");
            if e.consecutive_failures >= self.config.max_consecutive_failures {
                e.healthy = false;
            }
        }
    }

    pub async fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().await;
        let healthy_idle = inner.idle.iter().filter(|e| e.healthy).count();
        let unhealthy_idle = inner.idle.len() - healthy_idle;
        let healthy_leased = inner.leased.values().filter(|e| e.healthy).count();
        let unhealthy_leased = inner.leased.len() - healthy_leased;
        PoolStats {
            totals: inner.totals,
            current: PoolCurrent {
                available: inner.idle.len(),
                leased: inner.leased.len(),
                waiting: inner.waiters.len(),
                healthy: healthy_idle + healthy_leased,
                unhealthy: unhealthy_idle + unhealthy_leased,
            },
            average_wait: inner.wait_times.average(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderError, Result as ProviderResult};
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct DummyProvider {
        fail_transcribe: bool,
    }

    #[async_trait]
    impl Provider for DummyProvider {
        async fn initialize(&self) -> ProviderResult<()> {
            Ok(())
        }
        async fn warmup(&self) -> ProviderResult<()> {
            Ok(())
        }
        async fn cleanup(&self) -> ProviderResult<()> {
            Ok(())
        }
        async fn health_check(&self) -> bool {
            true
        }
        async fn transcribe(&self, _audio: &[u8], _options: &crate::provider::TranscribeOptions) -> ProviderResult<asrhub_action::Transcript> {
            if self.fail_transcribe {
                return Err(ProviderError::EngineCall("boom".into()));
            }
            Ok(asrhub_action::Transcript {
                text: String::new(),
                confidence: 1.0,
                language: "en".to_string(),
                segments: vec![],
                is_final: true,
            })
        }
        async fn transcribe_stream(
            &self,
            _audio: BoxStream<'static, Vec<u8>>,
            _options: &crate::provider::TranscribeOptions,
        ) -> ProviderResult<BoxStream<'static, asrhub_action::Transcript>> {
            Ok(Box::pin(stream::empty()))
        }
    }

    fn counting_factory() -> (ProviderFactory, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let factory: ProviderFactory = Box::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(DummyProvider { fail_transcribe: false }) as Box<dyn Provider>)
        });
        (factory, count)
    }

    #[tokio::test]
    async fn lease_constructs_up_to_max_size() {
        let (factory, created) = counting_factory();
        let config = PoolConfig { max_size: 2, ..PoolConfig::default() };
        let pool = ProviderPool::new(config, factory);
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        let (_id1, _p1) = pool.lease(s1, 5, Duration::from_millis(10)).await.unwrap();
        let (_id2, _p2) = pool.lease(s2, 5, Duration::from_millis(10)).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn per_session_quota_rejects_second_lease() {
        let (factory, _created) = counting_factory();
        let config = PoolConfig { per_session_quota: 1, ..PoolConfig::default() };
        let pool = ProviderPool::new(config, factory);
        let s1 = SessionId::new();
        let _ = pool.lease(s1, 5, Duration::from_millis(10)).await.unwrap();
        let err = pool.lease(s1, 5, Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err, LeaseError::NoCapacityForSession);
    }

    #[tokio::test]
    async fn lease_times_out_when_saturated() {
        let (factory, _created) = counting_factory();
        let config = PoolConfig { max_size: 1, per_session_quota: 5, ..PoolConfig::default() };
        let pool = ProviderPool::new(config, factory);
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        let _held = pool.lease(s1, 5, Duration::from_millis(10)).await.unwrap();
        let err = pool.lease(s2, 5, Duration::from_millis(20)).await.unwrap_err();
        assert_eq!(err, LeaseError::Timeout);
    }

    #[tokio::test]
    async fn release_reassigns_to_waiting_session_before_idling() {
        let (factory, created) = counting_factory();
        let config = PoolConfig { max_size: 1, per_session_quota: 5, ..PoolConfig::default() };
        let pool = Arc::new(ProviderPool::new(config, factory));
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        let (id1, _p1) = pool.lease(s1, 5, Duration::from_millis(10)).await.unwrap();

        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move { pool2.lease(s2, 5, Duration::from_millis(500)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.release(id1).await;

        let (id2, _p2) = waiter.await.unwrap().unwrap();
        assert_eq!(id2, id1, "the same provider instance should be reassigned");
        assert_eq!(created.load(Ordering::SeqCst), 1, "no second provider should be constructed");
    }

    #[tokio::test]
    async fn higher_priority_waiter_is_served_before_an_older_lower_priority_one() {
        let (factory, _created) = counting_factory();
        let config = PoolConfig {
            max_size: 1,
            per_session_quota: 5,
            aging_factor: 0.0,
            ..PoolConfig::default()
        };
        let pool = Arc::new(ProviderPool::new(config, factory));
        let held = SessionId::new();
        let low = SessionId::new();
        let high = SessionId::new();
        let (held_id, _p) = pool.lease(held, 1, Duration::from_millis(10)).await.unwrap();

        let pool_low = pool.clone();
        let low_waiter = tokio::spawn(async move { pool_low.lease(low, 1, Duration::from_millis(500)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let pool_high = pool.clone();
        let high_waiter = tokio::spawn(async move { pool_high.lease(high, 10, Duration::from_millis(500)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        pool.release(held_id).await;
        let _ = high_waiter.await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!low_waiter.is_finished(), "the earlier, lower-priority waiter must still be queued");
        low_waiter.abort();
    }

    #[tokio::test]
    async fn unhealthy_provider_is_disposed_on_release() {
        let (factory, created) = counting_factory();
        let config = PoolConfig {
            max_size: 2,
            min_size: 0,
            max_consecutive_failures: 1,
            ..PoolConfig::default()
        };
        let pool = ProviderPool::new(config, factory);
        let s1 = SessionId::new();
        let (id1, _p1) = pool.lease(s1, 5, Duration::from_millis(10)).await.unwrap();
        pool.mark_failure(id1, "timeout calling engine").await;
        pool.release(id1).await;

        let stats = pool.stats().await;
        assert_eq!(stats.current.available, 0);

        let s2 = SessionId::new();
        let _ = pool.lease(s2, 5, Duration::from_millis(10)).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2, "a fresh provider replaces the disposed one");
    }

    #[tokio::test]
    async fn idle_providers_above_min_size_are_shed_on_release() {
        let (factory, created) = counting_factory();
        let config = PoolConfig { max_size: 2, min_size: 0, ..PoolConfig::default() };
        let pool = ProviderPool::new(config, factory);
        let s1 = SessionId::new();
        let (id1, _p1) = pool.lease(s1, 5, Duration::from_millis(10)).await.unwrap();
        pool.release(id1).await;

        let stats = pool.stats().await;
        assert_eq!(stats.current.available, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }
}
