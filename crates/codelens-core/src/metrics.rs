//! Metrics for search and indexing.
//!
//! Counters are lock-free; latency percentiles come from a bounded sample
//! window.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Operation name used for search latency samples.
pub const SEARCH_OPERATION: &str = "search";

/// Operation name used for flush latency samples.
pub const FLUSH_OPERATION: &str = "flush";

/// Atomic counters for search and indexing activity.
pub struct Metrics {
    /// Total number of searches executed
    pub searches_total: AtomicU64,
    /// Sum of all search latencies in microseconds
    pub search_latency_us: AtomicU64,
    /// Documents written to the index
    pub documents_indexed: AtomicU64,
    /// Documents removed from the index
    pub documents_removed: AtomicU64,
    /// Per-item indexing failures
    pub index_failures: AtomicU64,
    /// Completed pipeline flushes
    pub flushes: AtomicU64,
    /// Latency samples for percentiles
    pub latency: LatencyTracker,
    start_time: Instant,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub searches_total: u64,
    pub avg_search_latency_us: u64,
    pub p50_search_latency_us: u64,
    pub p99_search_latency_us: u64,
    pub documents_indexed: u64,
    pub documents_removed: u64,
    pub index_failures: u64,
    pub flushes: u64,
    pub uptime_secs: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            searches_total: AtomicU64::new(0),
            search_latency_us: AtomicU64::new(0),
            documents_indexed: AtomicU64::new(0),
            documents_removed: AtomicU64::new(0),
            index_failures: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            latency: LatencyTracker::default(),
            start_time: Instant::now(),
        }
    }

    pub fn record_search(&self, latency: Duration) {
        self.searches_total.fetch_add(1, Ordering::Relaxed);
        self.search_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.latency.record(SEARCH_OPERATION, latency);
    }

    pub fn record_indexed(&self) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self, count: usize) {
        self.documents_removed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.index_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, duration: Duration) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.latency.record(FLUSH_OPERATION, duration);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn avg_search_latency(&self) -> Duration {
        let total = self.searches_total.load(Ordering::Relaxed);
        let latency_us = self.search_latency_us.load(Ordering::Relaxed);
        if total == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(latency_us / total)
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            searches_total: self.searches_total.load(Ordering::Relaxed),
            avg_search_latency_us: self.avg_search_latency().as_micros() as u64,
            p50_search_latency_us: self.latency.p50(SEARCH_OPERATION).as_micros() as u64,
            p99_search_latency_us: self.latency.p99(SEARCH_OPERATION).as_micros() as u64,
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            documents_removed: self.documents_removed.load(Ordering::Relaxed),
            index_failures: self.index_failures.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }
}

/// Tracks latency samples for percentile calculation.
pub struct LatencyTracker {
    samples: RwLock<VecDeque<(&'static str, Duration)>>,
    max_samples: usize,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: RwLock::new(VecDeque::with_capacity(max_samples)),
            max_samples,
        }
    }

    pub fn record(&self, operation: &'static str, duration: Duration) {
        let mut samples = self.samples.write();
        samples.push_back((operation, duration));

        while samples.len() > self.max_samples {
            samples.pop_front();
        }
    }

    pub fn p50(&self, operation: &str) -> Duration {
        self.percentile(operation, 0.50)
    }

    pub fn p99(&self, operation: &str) -> Duration {
        self.percentile(operation, 0.99)
    }

    pub fn percentile(&self, operation: &str, p: f64) -> Duration {
        let samples = self.samples.read();
        let mut durations: Vec<_> = samples
            .iter()
            .filter(|(op, _)| *op == operation)
            .map(|(_, d)| *d)
            .collect();

        if durations.is_empty() {
            return Duration::ZERO;
        }

        durations.sort();
        let idx = ((durations.len() as f64 * p) as usize).min(durations.len() - 1);
        durations[idx]
    }

    pub fn sample_count(&self, operation: &str) -> usize {
        self.samples
            .read()
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }
}
