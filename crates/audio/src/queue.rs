//! Per-session bounded audio queue with backpressure and overflow eviction.

use crate::format::AudioChunk;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Severity carried by a `Backpressure` notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackpressureLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Result of a `push` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Accepted,
    Backpressure {
        level: BackpressureLevel,
        retry_after_ms: Option<u64>,
    },
    /// The queue was at capacity; the oldest chunk was evicted to make room.
    DroppedOverflow,
}

#[derive(Debug, Clone, Copy)]
pub struct AudioQueueConfig {
    pub capacity_bytes: usize,
    pub capacity_chunks: usize,
    /// Fraction of `capacity_bytes` at which backpressure begins (e.g. 0.8).
    pub high_water_mark: f32,
    pub retry_after_ms: u64,
}

impl Default for AudioQueueConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 320_000,
            capacity_chunks: 256,
            high_water_mark: 0.8,
            retry_after_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AudioQueueStats {
    pub size: usize,
    pub bytes: usize,
    pub last_timestamp_ms: i64,
    pub dropped_overflow_count: u64,
    pub backpressure_events: u64,
}

struct Inner {
    chunks: VecDeque<AudioChunk>,
    bytes: usize,
    last_timestamp_ms: i64,
    dropped_overflow_count: u64,
    backpressure_events: u64,
}

/// FIFO queue of incoming `AudioChunk`s. Thread-safe for single producer /
/// single consumer; correctness does not require multi-producer semantics.
pub struct AudioQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    config: AudioQueueConfig,
}

impl AudioQueue {
    pub fn new(config: AudioQueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                chunks: VecDeque::new(),
                bytes: 0,
                last_timestamp_ms: 0,
                dropped_overflow_count: 0,
                backpressure_events: 0,
            }),
            notify: Notify::new(),
            config,
        }
    }

    /// Queue-level backpressure only ever reports `High`; `Critical` is reserved
    /// for the overflow case, which the queue reports as `DroppedOverflow` and
    /// leaves the caller to translate (see `asrhub-store`'s audio effect).
    fn severity_for(&self, ratio: f32) -> Option<BackpressureLevel> {
        if ratio >= self.config.high_water_mark {
            Some(BackpressureLevel::High)
        } else {
            None
        }
    }

    /// Push a chunk onto the queue. Non-blocking.
    pub fn push(&self, chunk: AudioChunk) -> PushOutcome {
        let mut inner = self.inner.lock().unwrap();
        let incoming_len = chunk.len_bytes();
        inner.last_timestamp_ms = chunk.arrival_ts_ms;

        let would_overflow = inner.bytes + incoming_len > self.config.capacity_bytes
            || inner.chunks.len() + 1 > self.config.capacity_chunks;

        if would_overflow {
            while (inner.bytes + incoming_len > self.config.capacity_bytes
                || inner.chunks.len() + 1 > self.config.capacity_chunks)
                && !inner.chunks.is_empty()
            {
                if let Some(evicted) = inner.chunks.pop_front() {
                    inner.bytes -= evicted.len_bytes();
                }
            }
            inner.dropped_overflow_count += 1;
            inner.chunks.push_back(chunk);
            inner.bytes += incoming_len;
            self.notify.notify_waiters();
            tracing::warn!(
                dropped = inner.dropped_overflow_count,
                "audio queue overflow, evicted oldest chunk"
            );
            return PushOutcome::DroppedOverflow;
        }

        inner.chunks.push_back(chunk);
        inner.bytes += incoming_len;
        let ratio = inner.bytes as f32 / self.config.capacity_bytes as f32;
        self.notify.notify_waiters();

        match self.severity_for(ratio) {
            Some(level) => {
                inner.backpressure_events += 1;
                if inner.backpressure_events % 10 == 1 {
                    tracing::debug!(?level, ratio, "audio queue crossed high-water mark");
                }
                PushOutcome::Backpressure {
                    level,
                    retry_after_ms: Some(self.config.retry_after_ms),
                }
            }
            None => PushOutcome::Accepted,
        }
    }

    /// Non-blocking pop of the oldest chunk.
    pub fn pop(&self) -> Option<AudioChunk> {
        let mut inner = self.inner.lock().unwrap();
        let chunk = inner.chunks.pop_front();
        if let Some(ref c) = chunk {
            inner.bytes -= c.len_bytes();
        }
        chunk
    }

    /// Drain every chunk currently queued.
    pub fn pop_all(&self) -> Vec<AudioChunk> {
        let mut inner = self.inner.lock().unwrap();
        inner.bytes = 0;
        inner.chunks.drain(..).collect()
    }

    /// Block (up to `deadline`) until `predicate` holds, then drain and return
    /// everything queued so far.
    pub async fn drain_until(
        &self,
        predicate: impl Fn(&AudioQueueStats) -> bool,
        deadline: Duration,
    ) -> Vec<AudioChunk> {
        let start = tokio::time::Instant::now();
        loop {
            if predicate(&self.stats()) {
                return self.pop_all();
            }
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return self.pop_all();
            }
            let remaining = deadline - elapsed;
            let notified = self.notify.notified();
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return self.pop_all();
            }
        }
    }

    pub fn stats(&self) -> AudioQueueStats {
        let inner = self.inner.lock().unwrap();
        AudioQueueStats {
            size: inner.chunks.len(),
            bytes: inner.bytes,
            last_timestamp_ms: inner.last_timestamp_ms,
            dropped_overflow_count: inner.dropped_overflow_count,
            backpressure_events: inner.backpressure_events,
        }
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().chunks.len()
    }

    pub fn bytes(&self) -> usize {
        self.inner.lock().unwrap().bytes
    }

    /// Drop every queued chunk (used by `clear_audio_buffer` and session termination).
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.chunks.clear();
        inner.bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::AudioFormat;

    fn chunk(seq: u64, len: usize) -> AudioChunk {
        AudioChunk::new(seq, seq as i64 * 10, AudioFormat::CANONICAL, vec![0u8; len])
    }

    #[test]
    fn accepts_under_high_water_mark() {
        let q = AudioQueue::new(AudioQueueConfig {
            capacity_bytes: 320_000,
            capacity_chunks: 256,
            high_water_mark: 0.8,
            retry_after_ms: 500,
        });
        assert_eq!(q.push(chunk(0, 1000)), PushOutcome::Accepted);
    }

    #[test]
    fn backpressure_at_high_water_mark() {
        let q = AudioQueue::new(AudioQueueConfig {
            capacity_bytes: 320_000,
            capacity_chunks: 256,
            high_water_mark: 0.8,
            retry_after_ms: 500,
        });
        // Fill to exactly the high-water mark.
        let outcome = q.push(chunk(0, 256_000));
        match outcome {
            PushOutcome::Backpressure { level, retry_after_ms } => {
                assert_eq!(level, BackpressureLevel::High);
                assert_eq!(retry_after_ms, Some(500));
            }
            other => panic!("expected backpressure, got {other:?}"),
        }
    }

    #[test]
    fn overflow_evicts_oldest() {
        let q = AudioQueue::new(AudioQueueConfig {
            capacity_bytes: 1000,
            capacity_chunks: 256,
            high_water_mark: 0.8,
            retry_after_ms: 500,
        });
        q.push(chunk(0, 900));
        let outcome = q.push(chunk(1, 900));
        assert_eq!(outcome, PushOutcome::DroppedOverflow);
        assert_eq!(q.size(), 1);
        let remaining = q.pop().unwrap();
        assert_eq!(remaining.seq, 1);
    }

    #[tokio::test]
    async fn drain_until_returns_on_deadline() {
        let q = AudioQueue::new(AudioQueueConfig::default());
        let drained = q
            .drain_until(|s| s.size >= 5, Duration::from_millis(50))
            .await;
        assert!(drained.is_empty());
    }

    #[tokio::test]
    async fn drain_until_wakes_on_push() {
        let q = std::sync::Arc::new(AudioQueue::new(AudioQueueConfig::default()));
        let q2 = q.clone();
        let handle = tokio::spawn(async move {
            q2.drain_until(|s| s.size >= 1, Duration::from_secs(2)).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        q.push(chunk(0, 100));
        let drained = handle.await.unwrap();
        assert_eq!(drained.len(), 1);
    }

    #[test]
    fn clear_drops_all_chunks() {
        let q = AudioQueue::new(AudioQueueConfig::default());
        q.push(chunk(0, 100));
        q.clear();
        assert_eq!(q.size(), 0);
        assert_eq!(q.bytes(), 0);
    }
}
