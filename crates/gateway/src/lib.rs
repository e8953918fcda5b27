//! The gateway binary's composition root: connection lifecycle, message
//! classification and routing, and the HTTP/WebSocket surface.

pub mod connection;
pub mod error;
pub mod handlers;
pub mod pool;
pub mod server;
pub mod state;
pub mod ws;

pub use {
    error::{Error, Result},
    pool::{ConnectionPool, PoolConfig, PoolHealth, PoolStats},
    state::GatewayState,
};
