//! Configuration loading, validation, and env substitution for the gateway.
//!
//! Config files: `gateway.toml`, `gateway.yaml`, or `gateway.json`.
//! Searched in `./` then `~/.config/gg-gateway/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_or_default_config_path, load_config, save_config},
    schema::{
        BatchConfig, ChannelPoolConfig, CircuitConfig, DiscoveryConfig, GatewayConfig,
        HeartbeatConfig, PoolConfig, QueueConfig, RouteCacheConfig, RpcConfig, SessionConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
