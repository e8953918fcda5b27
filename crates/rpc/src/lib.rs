//! Backend RPC transport: gRPC channel pooling, a per-target circuit
//! breaker, and a retrying client built on top of both.

pub mod circuit;
pub mod client;
pub mod error;
pub mod pool;
pub mod proto;

pub use {
    circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState},
    client::{RpcClient, RpcClientConfig},
    error::{Error, Result},
    pool::{ChannelPool, ChannelPoolConfig, ChannelState, TargetPoolStats},
};
