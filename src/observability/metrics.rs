use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct Metrics {
    pub events_received: AtomicU64,
    pub events_stored: AtomicU64,
    pub duplicate_events: AtomicU64,
    pub unparsed_messages: AtomicU64,
    pub messages_sent: AtomicU64,
    pub delivery_failures: AtomicU64,
    pub auth_requests: AtomicU64,
    pub cleanup_runs: AtomicU64,
    pub events_deleted: AtomicU64,
    pub errors: AtomicU64,
    pub start_time: Instant,
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub events_stored: u64,
    pub duplicate_events: u64,
    pub unparsed_messages: u64,
    pub messages_sent: u64,
    pub delivery_failures: u64,
    pub auth_requests: u64,
    pub cleanup_runs: u64,
    pub events_deleted: u64,
    pub errors: u64,
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
            events_received: AtomicU64::new(0),
            events_stored: AtomicU64::new(0),
            duplicate_events: AtomicU64::new(0),
            unparsed_messages: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            auth_requests: AtomicU64::new(0),
            cleanup_runs: AtomicU64::new(0),
            events_deleted: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_events_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_events_stored(&self) {
        self.events_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_duplicates(&self) {
        self.duplicate_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unparsed(&self) {
        self.unparsed_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_messages_sent(&self, count: u64) {
        self.messages_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_messages_sent(&self) {
        self.add_messages_sent(1);
    }

    pub fn add_delivery_failures(&self, count: u64) {
        self.delivery_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_auth_requests(&self) {
        self.auth_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cleanup(&self, deleted: u64) {
        self.cleanup_runs.fetch_add(1, Ordering::Relaxed);
        self.events_deleted.fetch_add(deleted, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_stored: self.events_stored.load(Ordering::Relaxed),
            duplicate_events: self.duplicate_events.load(Ordering::Relaxed),
            unparsed_messages: self.unparsed_messages.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            auth_requests: self.auth_requests.load(Ordering::Relaxed),
            cleanup_runs: self.cleanup_runs.load(Ordering::Relaxed),
            events_deleted: self.events_deleted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_metrics() {
        let metrics = Metrics::new();
        metrics.increment_messages_sent();
        metrics.add_messages_sent(3);
        metrics.add_delivery_failures(2);
        metrics.increment_events_received();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_sent, 4);
        assert_eq!(snapshot.delivery_failures, 2);
        assert_eq!(snapshot.events_received, 1);
        assert_eq!(snapshot.events_stored, 0);
    }

    #[test]
    fn test_record_cleanup() {
        let metrics = Metrics::new();
        metrics.record_cleanup(5);
        metrics.record_cleanup(0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cleanup_runs, 2);
        assert_eq!(snapshot.events_deleted, 5);
    }

    #[test]
    fn test_ingestion_counters_are_independent() {
        let metrics = Metrics::new();
        metrics.increment_duplicates();
        metrics.increment_unparsed();
        metrics.increment_unparsed();
        metrics.increment_auth_requests();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.duplicate_events, 1);
        assert_eq!(snapshot.unparsed_messages, 2);
        assert_eq!(snapshot.auth_requests, 1);
        assert_eq!(snapshot.errors, 0);
    }
}
