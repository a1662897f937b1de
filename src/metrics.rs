//! Diagnostic counters for archive handle usage.
//!
//! Counters are lock-free atomics. They never influence lookup results; an
//! external collector reads them through [`LoaderMetrics::snapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct LoaderMetrics {
    resource_requests: AtomicU64,
    preload_hits: AtomicU64,
    lookup_failures: AtomicU64,
    handles_opened: AtomicU64,
    handles_closed: AtomicU64,
    handles_evicted: AtomicU64,
    open_nanos: AtomicU64,
}

/// Point-in-time copy of [`LoaderMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub resource_requests: u64,
    pub preload_hits: u64,
    pub lookup_failures: u64,
    pub handles_opened: u64,
    pub handles_closed: u64,
    pub handles_evicted: u64,
    pub open_nanos: u64,
}

impl MetricsSnapshot {
    pub fn open_handles(&self) -> u64 {
        self.handles_opened.saturating_sub(self.handles_closed)
    }
}

static GLOBAL: OnceLock<Arc<LoaderMetrics>> = OnceLock::new();

impl LoaderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance used by [`crate::LoaderContext::default`].
    pub fn global() -> Arc<LoaderMetrics> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(LoaderMetrics::new())))
    }

    pub fn record_request(&self) {
        self.resource_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preload_hit(&self) {
        self.preload_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_failure(&self) {
        self.lookup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_open(&self, elapsed: Duration) {
        self.handles_opened.fetch_add(1, Ordering::Relaxed);
        self.open_nanos
            .fetch_add(saturating_nanos(elapsed), Ordering::Relaxed);
    }

    pub fn record_close(&self) {
        self.handles_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.handles_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resource_requests: self.resource_requests.load(Ordering::Relaxed),
            preload_hits: self.preload_hits.load(Ordering::Relaxed),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
            handles_opened: self.handles_opened.load(Ordering::Relaxed),
            handles_closed: self.handles_closed.load(Ordering::Relaxed),
            handles_evicted: self.handles_evicted.load(Ordering::Relaxed),
            open_nanos: self.open_nanos.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.resource_requests,
            &self.preload_hits,
            &self.lookup_failures,
            &self.handles_opened,
            &self.handles_closed,
            &self.handles_evicted,
            &self.open_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

fn saturating_nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}
