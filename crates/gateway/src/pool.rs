//! Connection pool: tracks every live connection slot, enforces the
//! concurrency ceiling, and periodically reaps connections that have gone
//! idle past their budget.
//!
//! There is nothing to pre-allocate on a socket level — a WebSocket only
//! exists once a client upgrades — so "pre-allocating" here means reserving
//! `pre_allocate_size` capacity in the slot map up front rather than growing
//! it one insert at a time under load.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolHealth {
    Ready,
    Degraded,
    Overloaded,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub pre_allocate_size: usize,
    pub max_concurrent: usize,
    pub max_idle_time: Duration,
    pub cleanup_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pre_allocate_size: 1000,
            max_concurrent: 8000,
            max_idle_time: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl From<&gg_config::PoolConfig> for PoolConfig {
    fn from(config: &gg_config::PoolConfig) -> Self {
        Self {
            pre_allocate_size: config.pre_allocate_size,
            max_concurrent: config.max_concurrent,
            max_idle_time: Duration::from_secs(config.max_idle_time_secs),
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub active: usize,
    pub max_concurrent: usize,
    pub pre_allocate_size: usize,
    pub idle_evicted_total: u64,
}

struct Slot {
    last_active: Instant,
    cancel: CancellationToken,
}

/// Shell pool for connection slots: a bounded, reusable registry of
/// connection bookkeeping rather than a pool of sockets.
pub struct ConnectionPool {
    config: PoolConfig,
    slots: DashMap<u64, Slot>,
    active: AtomicUsize,
    idle_evicted: std::sync::atomic::AtomicU64,
}

impl ConnectionPool {
    #[must_use]
    pub fn new(config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            slots: DashMap::with_capacity(config.pre_allocate_size),
            config,
            active: AtomicUsize::new(0),
            idle_evicted: std::sync::atomic::AtomicU64::new(0),
        })
    }

    /// Reserves a slot for `session_id`. Returns the connection's
    /// cancellation token so the caller's message loop can be torn down by
    /// the idle-cleanup task.
    pub fn create_connection(&self, session_id: u64) -> Result<CancellationToken> {
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        if active > self.config.max_concurrent {
            self.active.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::PoolExhausted {
                active: active - 1,
                max_concurrent: self.config.max_concurrent,
            });
        }

        let cancel = CancellationToken::new();
        self.slots.insert(session_id, Slot { last_active: Instant::now(), cancel: cancel.clone() });
        Ok(cancel)
    }

    pub fn release_connection(&self, session_id: u64) {
        if self.slots.remove(&session_id).is_some() {
            self.active.fetch_sub(1, Ordering::AcqRel);
        }
    }

    pub fn touch(&self, session_id: u64) {
        if let Some(mut slot) = self.slots.get_mut(&session_id) {
            slot.last_active = Instant::now();
        }
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn health(&self) -> PoolHealth {
        let ratio = self.active_count() as f64 / self.config.max_concurrent.max(1) as f64;
        if ratio >= 0.9 {
            PoolHealth::Overloaded
        } else if ratio >= 0.7 {
            PoolHealth::Degraded
        } else {
            PoolHealth::Ready
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.active_count(),
            max_concurrent: self.config.max_concurrent,
            pre_allocate_size: self.config.pre_allocate_size,
            idle_evicted_total: self.idle_evicted.load(Ordering::Relaxed),
        }
    }

    /// Evicts connections idle longer than `max_idle_time`, cancelling their
    /// message loops. Returns the number evicted.
    fn evict_idle(&self) -> usize {
        let cutoff = Instant::now() - self.config.max_idle_time;
        let stale: Vec<u64> = self
            .slots
            .iter()
            .filter(|entry| entry.value().last_active < cutoff)
            .map(|entry| *entry.key())
            .collect();

        for session_id in &stale {
            if let Some((_, slot)) = self.slots.remove(session_id) {
                slot.cancel.cancel();
                self.active.fetch_sub(1, Ordering::AcqRel);
            }
        }
        if !stale.is_empty() {
            self.idle_evicted.fetch_add(stale.len() as u64, Ordering::Relaxed);
            debug!(count = stale.len(), "evicted idle connections");
        }
        stale.len()
    }

    /// Spawns the periodic idle-sweep and state-gauge loop.
    pub fn spawn_cleanup_loop(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle();
                if evicted > 0 {
                    gg_metrics::counter!(gg_metrics::pool::CLEANUP_RELEASED_TOTAL)
                        .increment(evicted as u64);
                }
                gg_metrics::gauge!(gg_metrics::pool::ACTIVE).set(self.active_count() as f64);
                let state_label = match self.health() {
                    PoolHealth::Ready => "ready",
                    PoolHealth::Degraded => "degraded",
                    PoolHealth::Overloaded => "overloaded",
                };
                gg_metrics::gauge!(gg_metrics::pool::STATE, "state" => state_label).set(1.0);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(max_concurrent: usize) -> Arc<ConnectionPool> {
        ConnectionPool::new(PoolConfig { max_concurrent, ..PoolConfig::default() })
    }

    #[test]
    fn create_connection_respects_max_concurrent() {
        let pool = pool(2);
        pool.create_connection(1).unwrap();
        pool.create_connection(2).unwrap();
        assert!(matches!(pool.create_connection(3), Err(Error::PoolExhausted { .. })));
    }

    #[test]
    fn release_frees_a_slot() {
        let pool = pool(1);
        pool.create_connection(1).unwrap();
        pool.release_connection(1);
        assert!(pool.create_connection(2).is_ok());
    }

    #[test]
    fn health_thresholds_match_documented_ratios() {
        let pool = pool(10);
        for id in 0..6 {
            pool.create_connection(id).unwrap();
        }
        assert_eq!(pool.health(), PoolHealth::Ready);
        pool.create_connection(6).unwrap();
        assert_eq!(pool.health(), PoolHealth::Degraded);
        for id in 7..9 {
            pool.create_connection(id).unwrap();
        }
        assert_eq!(pool.health(), PoolHealth::Overloaded);
    }

    #[test]
    fn evict_idle_cancels_and_frees_stale_slots() {
        let pool = ConnectionPool::new(PoolConfig {
            max_idle_time: Duration::from_millis(0),
            ..PoolConfig::default()
        });
        let cancel = pool.create_connection(1).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let evicted = pool.evict_idle();
        assert_eq!(evicted, 1);
        assert!(cancel.is_cancelled());
        assert_eq!(pool.active_count(), 0);
    }
}
