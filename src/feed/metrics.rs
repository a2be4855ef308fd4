use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the live feed
#[derive(Clone, Default)]
pub struct FeedMetrics {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    events_dispatched: AtomicU64,
    handler_failures: AtomicU64,
    connection_attempts: AtomicU64,
    reconnects_scheduled: AtomicU64,
    synthetic_batches: AtomicU64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&self) {
        self.inner.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.inner.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one routed event and how many of its handlers failed
    pub fn record_dispatch(&self, failed_handlers: usize) {
        self.inner.events_dispatched.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handler_failures
            .fetch_add(failed_handlers as u64, Ordering::Relaxed);
    }

    pub fn record_attempt(&self) {
        self.inner.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_scheduled(&self) {
        self.inner.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_synthetic_batch(&self) {
        self.inner.synthetic_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> FeedMetricsSnapshot {
        let c = &self.inner;
        FeedMetricsSnapshot {
            frames_received: c.frames_received.load(Ordering::Relaxed),
            frames_dropped: c.frames_dropped.load(Ordering::Relaxed),
            events_dispatched: c.events_dispatched.load(Ordering::Relaxed),
            handler_failures: c.handler_failures.load(Ordering::Relaxed),
            connection_attempts: c.connection_attempts.load(Ordering::Relaxed),
            reconnects_scheduled: c.reconnects_scheduled.load(Ordering::Relaxed),
            synthetic_batches: c.synthetic_batches.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of feed counters at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedMetricsSnapshot {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub events_dispatched: u64,
    pub handler_failures: u64,
    pub connection_attempts: u64,
    pub reconnects_scheduled: u64,
    pub synthetic_batches: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = FeedMetrics::new();
        let clone = metrics.clone();

        metrics.record_frame();
        clone.record_frame();
        clone.record_dispatch(2);
        metrics.record_dropped();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_received, 2);
        assert_eq!(snapshot.events_dispatched, 1);
        assert_eq!(snapshot.handler_failures, 2);
        assert_eq!(snapshot.frames_dropped, 1);
        assert_eq!(snapshot.connection_attempts, 0);
    }
}
