//! Circuit breaker guarding a single RPC target: closed → open → half-open,
//! with a fixed-size sliding window of recent call outcomes.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering},
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
    pub window_size: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout: Duration::from_secs(30), success_threshold: 3, window_size: 100 }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_requests: u64,
    pub total_failures: u64,
    pub recent_failure_rate: f64,
}

/// A failure/recovery state machine gating calls to a flaky downstream.
///
/// State lives in atomics so `allow_request` never blocks a caller deciding
/// whether to even attempt the RPC; only the sliding window needs a lock.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    last_failure_at: parking_lot::Mutex<Option<Instant>>,
    recent_results: parking_lot::Mutex<VecDeque<bool>>,
    total_requests: AtomicU64,
    total_failures: AtomicU64,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_failure_at: parking_lot::Mutex::new(None),
            recent_results: parking_lot::Mutex::new(VecDeque::new()),
            total_requests: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
        }
    }

    /// Checks whether a call should be attempted, transitioning `Open` to
    /// `HalfOpen` once `recovery_timeout` has elapsed.
    pub fn allow_request(&self) -> bool {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match CircuitState::from_u8(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let last_failure_at = *self.last_failure_at.lock();
                let elapsed = last_failure_at.map(|at| at.elapsed());
                if elapsed.is_some_and(|elapsed| elapsed >= self.config.recovery_timeout) {
                    if self
                        .state
                        .compare_exchange(
                            CircuitState::Open as u8,
                            CircuitState::HalfOpen as u8,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        self.success_count.store(0, Ordering::Relaxed);
                    }
                    true
                } else {
                    false
                }
            },
        }
    }

    pub fn record_success(&self) {
        self.update_window(true);

        if CircuitState::from_u8(self.state.load(Ordering::Acquire)) == CircuitState::HalfOpen {
            let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
            if successes >= self.config.success_threshold {
                self.state.store(CircuitState::Closed as u8, Ordering::Release);
                self.failure_count.store(0, Ordering::Relaxed);
            }
        }
    }

    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        self.update_window(false);
        *self.last_failure_at.lock() = Some(Instant::now());

        match CircuitState::from_u8(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold {
                    self.state.store(CircuitState::Open as u8, Ordering::Release);
                }
            },
            CircuitState::HalfOpen => {
                self.state.store(CircuitState::Open as u8, Ordering::Release);
            },
            CircuitState::Open => {},
        }
    }

    fn update_window(&self, success: bool) {
        let mut window = self.recent_results.lock();
        window.push_back(success);
        if window.len() > self.config.window_size {
            window.pop_front();
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let window = self.recent_results.lock();
        let recent_failure_rate = if window.is_empty() {
            0.0
        } else {
            window.iter().filter(|ok| !**ok).count() as f64 / window.len() as f64
        };

        CircuitBreakerStats {
            state: self.state(),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            recent_failure_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_allows_requests_until_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig { failure_threshold: 3, ..CircuitBreakerConfig::default() });
        for _ in 0..2 {
            assert!(cb.allow_request());
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn open_rejects_until_recovery_timeout_elapses() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(20),
            ..CircuitBreakerConfig::default()
        });
        cb.allow_request();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());

        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(1),
            success_threshold: 2,
            ..CircuitBreakerConfig::default()
        });
        cb.allow_request();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.allow_request());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_the_circuit() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(1),
            ..CircuitBreakerConfig::default()
        });
        cb.allow_request();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        cb.allow_request();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn stats_report_recent_failure_rate() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        cb.allow_request();
        cb.record_success();
        cb.allow_request();
        cb.record_failure();
        let stats = cb.stats();
        assert!((stats.recent_failure_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.total_requests, 2);
    }
}
