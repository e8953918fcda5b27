//! Batched message dispatch: drains the priority queue, resolves targets
//! through the router, and forwards to backend service instances over
//! `gg-rpc`, batching per target and retrying failures through the queue.

pub mod batch;
pub mod dispatcher;
pub mod error;
pub mod stats;

pub use {
    batch::{BatchConfig, BatchProcessor, BatchSink},
    dispatcher::{DispatcherConfig, MessageDispatcher},
    error::{Error, Result},
    stats::{DispatchFailureReason, DispatchStats, DispatchStatsSnapshot},
};
