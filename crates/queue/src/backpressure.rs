//! Back-pressure controller: throttles intake before the queue fills.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::priority::Priority;

const HIGH_WATERMARK: f64 = 0.8;
const DROP_THRESHOLD: f64 = 0.95;
const LOW_WATERMARK: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Throttled,
    Dropped,
}

/// Tracks queue occupancy against `max_size` and decides, per enqueue
/// attempt, whether to admit a message of a given priority.
///
/// Throttling is hysteretic: once the high-watermark trips, admission
/// stays restricted until occupancy falls back under the low-watermark,
/// rather than flapping every time size crosses 0.8.
pub struct BackpressureController {
    max_size: usize,
    throttling: AtomicBool,
    dropped: AtomicU64,
    throttled: AtomicU64,
}

impl BackpressureController {
    pub fn new(max_size: usize) -> Self {
        Self { max_size, throttling: AtomicBool::new(false), dropped: AtomicU64::new(0), throttled: AtomicU64::new(0) }
    }

    pub fn admit(&self, priority: Priority, current_size: usize) -> Admission {
        let occupancy = current_size as f64 / self.max_size.max(1) as f64;

        if occupancy >= DROP_THRESHOLD {
            if priority == Priority::Critical && current_size < self.max_size {
                return Admission::Accept;
            }
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Admission::Dropped;
        }

        if occupancy >= HIGH_WATERMARK {
            self.throttling.store(true, Ordering::Relaxed);
        } else if occupancy <= LOW_WATERMARK {
            self.throttling.store(false, Ordering::Relaxed);
        }

        if self.throttling.load(Ordering::Relaxed) && priority > Priority::High {
            self.throttled.fetch_add(1, Ordering::Relaxed);
            return Admission::Throttled;
        }

        Admission::Accept
    }

    pub fn is_throttling(&self) -> bool {
        self.throttling.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn throttled_count(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_high_watermark_accepts_everything() {
        let ctl = BackpressureController::new(100);
        assert_eq!(ctl.admit(Priority::Low, 50), Admission::Accept);
    }

    #[test]
    fn above_high_watermark_throttles_normal_and_low() {
        let ctl = BackpressureController::new(100);
        assert_eq!(ctl.admit(Priority::Normal, 85), Admission::Throttled);
        assert_eq!(ctl.admit(Priority::High, 85), Admission::Accept);
    }

    #[test]
    fn above_drop_threshold_only_critical_survives() {
        let ctl = BackpressureController::new(100);
        assert_eq!(ctl.admit(Priority::High, 96), Admission::Dropped);
        assert_eq!(ctl.admit(Priority::Critical, 96), Admission::Accept);
    }

    #[test]
    fn throttling_persists_until_low_watermark() {
        let ctl = BackpressureController::new(100);
        ctl.admit(Priority::Normal, 85);
        assert!(ctl.is_throttling());

        // Drop back below the high-watermark but still above the low one —
        // should stay throttled (hysteresis).
        assert_eq!(ctl.admit(Priority::Normal, 70), Admission::Throttled);
        assert!(ctl.is_throttling());

        assert_eq!(ctl.admit(Priority::Normal, 55), Admission::Accept);
        assert!(!ctl.is_throttling());
    }

    #[test]
    fn critical_is_rejected_once_queue_is_at_max_size() {
        let ctl = BackpressureController::new(100);
        assert_eq!(ctl.admit(Priority::Critical, 100), Admission::Dropped);
    }

    #[test]
    fn counters_increment_on_rejection() {
        let ctl = BackpressureController::new(100);
        ctl.admit(Priority::Normal, 85);
        ctl.admit(Priority::Normal, 96);
        assert_eq!(ctl.throttled_count(), 1);
        assert_eq!(ctl.dropped_count(), 1);
    }
}
