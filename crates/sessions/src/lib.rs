//! Session lifecycle management: a local LRU cache backed by a shared KV
//! mirror, with background auto-renewal and expiry cleanup.

pub mod error;
pub mod session;
pub mod store;

pub use {
    error::{Error, Result},
    session::{Session, SessionAttributes, SessionState},
    store::{SessionStore, SessionStoreConfig, SessionStoreStats},
};
