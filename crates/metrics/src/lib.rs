//! Metrics collection and export for the gateway.
//!
//! This crate provides a unified metrics interface using the `metrics` crate
//! facade. When the `prometheus` feature is enabled, metrics are exported in
//! Prometheus format. When the `tracing` feature is enabled, span context is
//! propagated to metrics labels.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gg_metrics::{counter, gauge, histogram, queue};
//!
//! counter!(queue::ENQUEUED_TOTAL, "priority" => "high").increment(1);
//! gauge!(queue::SIZE).set(42.0);
//! ```

pub mod definitions;
pub mod error;
pub mod recorder;
pub mod snapshot;
pub mod tracing_integration;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
    snapshot::{MetricSnapshot, MetricType, MetricsSnapshot},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
