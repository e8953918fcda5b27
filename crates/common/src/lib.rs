//! Shared error definitions and utilities used across all `gg-*` crates.

pub mod error;
pub mod id;

pub use error::{Error, FromMessage, Result};
pub use id::{IdGenerator, IdGeneratorError};
