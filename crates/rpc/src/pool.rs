//! Per-target gRPC channel pool with round-robin selection and a background
//! health-check / reconnect loop.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Ready,
    TransientFailure,
    Shutdown,
}

struct ChannelInfo {
    channel: Channel,
    state: ChannelState,
    failure_count: u32,
    created_at: Instant,
    last_used: Instant,
}

#[derive(Debug, Clone)]
pub struct ChannelPoolConfig {
    pub min_connections: usize,
    pub max_connections: usize,
    pub health_check_interval: Duration,
    pub max_failures: u32,
    pub connection_timeout: Duration,
}

impl Default for ChannelPoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 10,
            max_connections: 20,
            health_check_interval: Duration::from_secs(10),
            max_failures: 3,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TargetPoolStats {
    pub address: String,
    pub total: usize,
    pub ready: usize,
    pub transient_failure: usize,
}

/// Pool of channels to a single `host:port` target.
struct TargetPool {
    address: String,
    config: ChannelPoolConfig,
    channels: parking_lot::Mutex<Vec<ChannelInfo>>,
    next: AtomicUsize,
}

impl TargetPool {
    async fn new(address: String, config: ChannelPoolConfig) -> Result<Self> {
        let pool = Self { address, config, channels: parking_lot::Mutex::new(Vec::new()), next: AtomicUsize::new(0) };
        pool.ensure_min_connections().await?;
        Ok(pool)
    }

    async fn connect_one(&self) -> Result<ChannelInfo> {
        let endpoint = Endpoint::from_shared(format!("http://{}", self.address))
            .map_err(Error::Transport)?
            .connect_timeout(self.config.connection_timeout)
            .keep_alive_while_idle(true);

        let channel = endpoint.connect().await.map_err(Error::Transport)?;
        let now = Instant::now();
        Ok(ChannelInfo { channel, state: ChannelState::Ready, failure_count: 0, created_at: now, last_used: now })
    }

    async fn ensure_min_connections(&self) -> Result<()> {
        let deficit = {
            let channels = self.channels.lock();
            self.config.min_connections.saturating_sub(channels.len())
        };
        for _ in 0..deficit {
            match self.connect_one().await {
                Ok(info) => self.channels.lock().push(info),
                Err(err) => {
                    warn!(target = %self.address, error = %err, "failed to pre-warm channel");
                },
            }
        }
        Ok(())
    }

    /// Round-robins across `Ready` channels, skipping ones in
    /// `TransientFailure`. Returns the channel and its index so the caller
    /// can report the call outcome back via `report_result`.
    fn acquire(&self) -> Result<(Channel, usize)> {
        let mut channels = self.channels.lock();
        if channels.is_empty() {
            return Err(Error::ConnectionUnavailable(self.address.clone()));
        }

        let len = channels.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % len;
        for offset in 0..len {
            let idx = (start + offset) % len;
            if channels[idx].state == ChannelState::Ready {
                channels[idx].last_used = Instant::now();
                return Ok((channels[idx].channel.clone(), idx));
            }
        }

        // Nothing marked Ready; fall back to the least-failed entry rather
        // than refusing the call outright.
        let idx = channels
            .iter()
            .enumerate()
            .min_by_key(|(_, info)| info.failure_count)
            .map(|(idx, _)| idx)
            .ok_or_else(|| Error::ConnectionUnavailable(self.address.clone()))?;
        channels[idx].last_used = Instant::now();
        Ok((channels[idx].channel.clone(), idx))
    }

    fn report_result(&self, idx: usize, success: bool) {
        let mut channels = self.channels.lock();
        let Some(info) = channels.get_mut(idx) else { return };
        if success {
            info.failure_count = 0;
            info.state = ChannelState::Ready;
        } else {
            info.failure_count += 1;
            if info.failure_count >= self.config.max_failures {
                info.state = ChannelState::TransientFailure;
            }
        }
    }

    async fn reconnect_failed(&self) {
        let failed_indices: Vec<usize> = self
            .channels
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, info)| info.state == ChannelState::TransientFailure)
            .map(|(idx, _)| idx)
            .collect();

        for idx in failed_indices {
            match self.connect_one().await {
                Ok(fresh) => {
                    let mut channels = self.channels.lock();
                    if let Some(slot) = channels.get_mut(idx) {
                        *slot = fresh;
                    }
                    debug!(target = %self.address, %idx, "reconnected failed channel");
                },
                Err(err) => warn!(target = %self.address, error = %err, "reconnect attempt failed"),
            }
        }
    }

    fn stats(&self) -> TargetPoolStats {
        let channels = self.channels.lock();
        TargetPoolStats {
            address: self.address.clone(),
            total: channels.len(),
            ready: channels.iter().filter(|c| c.state == ChannelState::Ready).count(),
            transient_failure: channels.iter().filter(|c| c.state == ChannelState::TransientFailure).count(),
        }
    }
}

/// Top-level registry of per-target channel pools, with a background task
/// that periodically reconnects channels stuck in `TransientFailure`.
pub struct ChannelPool {
    config: ChannelPoolConfig,
    targets: DashMap<String, std::sync::Arc<TargetPool>>,
}

impl ChannelPool {
    #[must_use]
    pub fn new(config: ChannelPoolConfig) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self { config, targets: DashMap::new() })
    }

    async fn target(&self, address: &str) -> Result<std::sync::Arc<TargetPool>> {
        if let Some(pool) = self.targets.get(address) {
            return Ok(pool.clone());
        }
        let pool = std::sync::Arc::new(TargetPool::new(address.to_string(), self.config.clone()).await?);
        self.targets.insert(address.to_string(), pool.clone());
        Ok(pool)
    }

    pub async fn acquire(&self, address: &str) -> Result<(Channel, usize)> {
        self.target(address).await?.acquire()
    }

    pub fn report_result(&self, address: &str, idx: usize, success: bool) {
        if let Some(pool) = self.targets.get(address) {
            pool.report_result(idx, success);
        }
    }

    pub fn stats(&self) -> Vec<TargetPoolStats> {
        self.targets.iter().map(|entry| entry.value().stats()).collect()
    }

    /// Spawns the background health-check / reconnect loop. Intended to be
    /// called once per process against the shared `Arc<ChannelPool>`.
    pub fn spawn_health_check_loop(self: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.health_check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for entry in self.targets.iter() {
                    entry.value().reconnect_failed().await;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_bounds() {
        let config = ChannelPoolConfig::default();
        assert_eq!(config.min_connections, 10);
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.max_failures, 3);
    }

    #[tokio::test]
    async fn acquire_on_unknown_target_errors_without_connecting() {
        let pool = ChannelPool::new(ChannelPoolConfig { min_connections: 0, ..ChannelPoolConfig::default() });
        let result = pool.acquire("127.0.0.1:1").await;
        assert!(result.is_err());
    }
}
