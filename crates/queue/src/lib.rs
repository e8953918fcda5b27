//! Priority message queue with back-pressure and deduplication.

pub mod backpressure;
pub mod dedup;
pub mod error;
pub mod message;
pub mod priority;
pub mod queue;

pub use {
    backpressure::{Admission, BackpressureController},
    dedup::DedupWindow,
    error::{Error, Result},
    message::QueuedMessage,
    priority::Priority,
    queue::{PriorityQueue, PriorityQueueConfig},
};
