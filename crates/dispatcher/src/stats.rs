//! Dispatch outcome counters, broken down by rejection reason so an
//! operator can tell a routing problem from a downstream outage at a
//! glance.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchFailureReason {
    RouteFailed,
    NoClient,
    TransportError,
    Timeout,
    CircuitOpen,
    MaxRetriesExceeded,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchStatsSnapshot {
    pub total_dispatched: u64,
    pub successful: u64,
    pub failed: u64,
    pub retried: u64,
    pub batches_sent: u64,
    pub route_failed: u64,
    pub no_client: u64,
    pub transport_error: u64,
    pub timed_out: u64,
    pub circuit_open: u64,
    pub max_retries_exceeded: u64,
}

#[derive(Default)]
pub struct DispatchStats {
    total_dispatched: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    batches_sent: AtomicU64,
    route_failed: AtomicU64,
    no_client: AtomicU64,
    transport_error: AtomicU64,
    timed_out: AtomicU64,
    circuit_open: AtomicU64,
    max_retries_exceeded: AtomicU64,
}

impl DispatchStats {
    pub fn record_dispatched(&self) {
        self.total_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successful.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_sent(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, reason: DispatchFailureReason) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        let counter = match reason {
            DispatchFailureReason::RouteFailed => &self.route_failed,
            DispatchFailureReason::NoClient => &self.no_client,
            DispatchFailureReason::TransportError => &self.transport_error,
            DispatchFailureReason::Timeout => &self.timed_out,
            DispatchFailureReason::CircuitOpen => &self.circuit_open,
            DispatchFailureReason::MaxRetriesExceeded => &self.max_retries_exceeded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            total_dispatched: self.total_dispatched.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            route_failed: self.route_failed.load(Ordering::Relaxed),
            no_client: self.no_client.load(Ordering::Relaxed),
            transport_error: self.transport_error.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            circuit_open: self.circuit_open.load(Ordering::Relaxed),
            max_retries_exceeded: self.max_retries_exceeded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_failure_reasons_independently() {
        let stats = DispatchStats::default();
        stats.record_failure(DispatchFailureReason::RouteFailed);
        stats.record_failure(DispatchFailureReason::RouteFailed);
        stats.record_failure(DispatchFailureReason::CircuitOpen);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failed, 3);
        assert_eq!(snapshot.route_failed, 2);
        assert_eq!(snapshot.circuit_open, 1);
        assert_eq!(snapshot.timed_out, 0);
    }

    #[test]
    fn success_and_dispatched_counters_are_independent() {
        let stats = DispatchStats::default();
        stats.record_dispatched();
        stats.record_dispatched();
        stats.record_success();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_dispatched, 2);
        assert_eq!(snapshot.successful, 1);
    }
}
