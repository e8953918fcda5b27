//! Consistent-hash message routing: msg_id → service, player_id → instance.

pub mod cache;
pub mod error;
pub mod ring;
pub mod router;

pub use {
    cache::{RouteCache, RouteCacheStats},
    error::{Error, Result},
    ring::ConsistentHashRing,
    router::{MessageRouter, RouterStats},
};
