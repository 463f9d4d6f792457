use std::time::Duration;

/// Cumulative counters, reset only by process restart.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolTotals {
    pub created: u64,
    pub leased: u64,
    pub released: u64,
    pub timeouts: u64,
    pub errors: u64,
}

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolCurrent {
    pub available: usize,
    pub leased: usize,
    pub waiting: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub totals: PoolTotals,
    pub current: PoolCurrent,
    pub average_wait: Duration,
}

/// Rolling average over a bounded window, avoiding unbounded memory growth
/// for a pool that runs for the process lifetime.
#[derive(Debug, Default)]
pub(crate) struct RollingAverage {
    samples: std::collections::VecDeque<Duration>,
    capacity: usize,
}

impl RollingAverage {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            samples: std::collections::VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn record(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub(crate) fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }
}
