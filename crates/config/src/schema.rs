//! The gateway's configuration schema.
//!
//! Every sub-struct corresponds to a component in the composition root and
//! carries the defaults stated in the component design: constructing
//! `GatewayConfig::default()` reproduces the behavior described there.

use serde::{Deserialize, Serialize};

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,
    pub pool: PoolConfig,
    pub session: SessionConfig,
    pub queue: QueueConfig,
    pub batch: BatchConfig,
    pub rpc: RpcConfig,
    pub channel_pool: ChannelPoolConfig,
    pub circuit: CircuitConfig,
    pub heartbeat: HeartbeatConfig,
    pub route_cache: RouteCacheConfig,
    pub discovery: DiscoveryConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            pool: PoolConfig::default(),
            session: SessionConfig::default(),
            queue: QueueConfig::default(),
            batch: BatchConfig::default(),
            rpc: RpcConfig::default(),
            channel_pool: ChannelPoolConfig::default(),
            circuit: CircuitConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            route_cache: RouteCacheConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub pre_allocate_size: usize,
    pub max_concurrent: usize,
    pub max_idle_time_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pre_allocate_size: 1000,
            max_concurrent: 8000,
            max_idle_time_secs: 300,
            cleanup_interval_secs: 60,
        }
    }
}

/// Session store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub default_ttl_secs: u64,
    pub renewal_threshold_secs: u64,
    pub renewal_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub local_cache_size: usize,
    pub hot_threshold: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 1800,
            renewal_threshold_secs: 300,
            renewal_interval_secs: 30,
            cleanup_interval_secs: 60,
            local_cache_size: 5000,
            hot_threshold: 10,
        }
    }
}

/// Priority message queue configuration, including its back-pressure and dedup controllers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_size: usize,
    pub high_watermark: f64,
    pub low_watermark: f64,
    pub drop_threshold: f64,
    pub dedup_window_size: usize,
    pub dedup_ttl_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            high_watermark: 0.8,
            low_watermark: 0.6,
            drop_threshold: 0.95,
            dedup_window_size: 10_000,
            dedup_ttl_secs: 60,
        }
    }
}

/// Batch dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub size: usize,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 100,
            timeout_ms: 10,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// RPC client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub default_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 3,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// RPC transport pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelPoolConfig {
    pub min_connections: usize,
    pub max_connections: usize,
    pub health_check_interval_secs: u64,
    pub max_failures: u32,
    pub connection_timeout_secs: u64,
}

impl Default for ChannelPoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 10,
            max_connections: 20,
            health_check_interval_secs: 10,
            max_failures: 3,
            connection_timeout_secs: 5,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub success_threshold: u32,
    pub window_size: usize,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 30,
            success_threshold: 3,
            window_size: 100,
        }
    }
}

/// Connection heartbeat loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            timeout_secs: 60,
        }
    }
}

/// Route cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteCacheConfig {
    pub max_size: usize,
    pub ttl_secs: u64,
}

impl Default for RouteCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            ttl_secs: 300,
        }
    }
}

/// Service registry / discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub refresh_interval_secs: u64,
    pub health_check_interval_secs: u64,
    pub service_names: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            health_check_interval_secs: 10,
            service_names: vec!["logic".to_string()],
        }
    }
}
