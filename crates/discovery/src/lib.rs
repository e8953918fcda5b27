//! Service discovery: periodic refresh of backend instance lists, health
//! probing, and feeding both into the message router's hash rings.

pub mod error;
pub mod registry;

pub use {
    error::{Error, Result},
    registry::{DiscoveryConfig, ServiceRegistry},
};
