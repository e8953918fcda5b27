//! Metrics snapshot for internal API consumption.
//!
//! Gives the `/stats` and `/routing/stats` HTTP endpoints structured JSON,
//! separate from the Prometheus text format.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Type of metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

/// A single metric value with its labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub labels: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A complete snapshot of all metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Timestamp when the snapshot was taken (Unix millis)
    pub timestamp: u64,
    pub metrics: Vec<MetricSnapshot>,
    pub categories: MetricCategories,
}

/// Metrics organized by component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricCategories {
    pub websocket: CategoryMetrics,
    pub pool: CategoryMetrics,
    pub session: CategoryMetrics,
    pub queue: QueueCategoryMetrics,
    pub router: RouterCategoryMetrics,
    pub dispatcher: CategoryMetrics,
    pub rpc: CategoryMetrics,
    pub circuit: CircuitCategoryMetrics,
    pub system: SystemMetrics,
}

/// Generic category metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub total: u64,
    pub errors: u64,
    pub active: u64,
    pub avg_duration_seconds: Option<f64>,
}

/// Priority queue and back-pressure metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueCategoryMetrics {
    pub enqueued: u64,
    pub dequeued: u64,
    pub dropped: u64,
    pub throttled: u64,
    pub duplicate: u64,
    pub size: u64,
}

/// Router metrics, broken down by target service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterCategoryMetrics {
    pub resolutions: u64,
    pub unknown_message_id: u64,
    pub no_healthy_instance: u64,
    pub failovers: u64,
    pub by_service: HashMap<String, ServiceRouteMetrics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceRouteMetrics {
    pub resolutions: u64,
    pub errors: u64,
}

/// Circuit breaker metrics, broken down by target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitCategoryMetrics {
    pub opens: u64,
    pub closes: u64,
    pub half_opens: u64,
    pub rejected: u64,
}

/// System-level metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub uptime_seconds: f64,
    pub version: Option<String>,
}

impl MetricsSnapshot {
    /// Create a new empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            metrics: Vec::new(),
            categories: MetricCategories::default(),
        }
    }

    /// Parse Prometheus text format into a structured snapshot.
    ///
    /// Best-effort parser that extracts metric values from the exposition
    /// format; unrecognized lines are skipped rather than erroring.
    #[must_use]
    pub fn from_prometheus_text(text: &str) -> Self {
        let mut snapshot = Self::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(metric) = parse_prometheus_line(line) {
                update_categories(&mut snapshot.categories, &metric);
                snapshot.metrics.push(metric);
            }
        }

        snapshot
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_prometheus_line(line: &str) -> Option<MetricSnapshot> {
    let (name_and_labels, value_str) = line.rsplit_once(' ')?;
    let value: f64 = value_str.parse().ok()?;

    let (name, labels) = if let Some(brace_start) = name_and_labels.find('{') {
        let name = &name_and_labels[..brace_start];
        let labels_str = name_and_labels
            .get(brace_start + 1..name_and_labels.len() - 1)
            .unwrap_or("");
        (name, parse_labels(labels_str))
    } else {
        (name_and_labels, HashMap::new())
    };

    let metric_type = if name.ends_with("_total") || name.ends_with("_count") {
        MetricType::Counter
    } else if name.ends_with("_bucket") || name.ends_with("_sum") {
        return None;
    } else {
        MetricType::Gauge
    };

    Some(MetricSnapshot {
        name: name.to_string(),
        metric_type,
        labels,
        value: Some(value),
        description: None,
    })
}

fn parse_labels(labels_str: &str) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    if labels_str.is_empty() {
        return labels;
    }
    for part in labels_str.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            labels.insert(key.to_string(), value.trim_matches('"').to_string());
        }
    }
    labels
}

fn update_categories(categories: &mut MetricCategories, metric: &MetricSnapshot) {
    let name = &metric.name;
    let value = metric.value.unwrap_or(0.0) as u64;

    if name.starts_with("gateway_websocket_connections_total") {
        categories.websocket.total += value;
    } else if name.starts_with("gateway_websocket_connections_active") {
        categories.websocket.active = value;
    } else if name.starts_with("gateway_pool_active") {
        categories.pool.active = value;
    } else if name.starts_with("gateway_sessions_created_total") {
        categories.session.total += value;
    } else if name.starts_with("gateway_sessions_active_local") {
        categories.session.active = value;
    } else if name.starts_with("gateway_queue_enqueued_total") {
        categories.queue.enqueued += value;
    } else if name.starts_with("gateway_queue_dequeued_total") {
        categories.queue.dequeued += value;
    } else if name.starts_with("gateway_queue_dropped_total") {
        categories.queue.dropped += value;
    } else if name.starts_with("gateway_queue_throttled_total") {
        categories.queue.throttled += value;
    } else if name.starts_with("gateway_queue_duplicate_total") {
        categories.queue.duplicate += value;
    } else if name.starts_with("gateway_queue_size") {
        categories.queue.size = value;
    } else if name.starts_with("gateway_router_resolutions_total") {
        categories.router.resolutions += value;
        if let Some(service) = metric.labels.get("service") {
            categories
                .router
                .by_service
                .entry(service.clone())
                .or_default()
                .resolutions += value;
        }
    } else if name.starts_with("gateway_router_unknown_message_id_total") {
        categories.router.unknown_message_id += value;
    } else if name.starts_with("gateway_router_no_healthy_instance_total") {
        categories.router.no_healthy_instance += value;
        if let Some(service) = metric.labels.get("service") {
            categories
                .router
                .by_service
                .entry(service.clone())
                .or_default()
                .errors += value;
        }
    } else if name.starts_with("gateway_router_failovers_total") {
        categories.router.failovers += value;
    } else if name.starts_with("gateway_dispatcher_messages_succeeded_total") {
        categories.dispatcher.total += value;
    } else if name.starts_with("gateway_dispatcher_messages_failed_total") {
        categories.dispatcher.errors += value;
    } else if name.starts_with("gateway_rpc_calls_total") {
        categories.rpc.total += value;
    } else if name.starts_with("gateway_rpc_call_errors_total") {
        categories.rpc.errors += value;
    } else if name.starts_with("gateway_circuit_opens_total") {
        categories.circuit.opens += value;
    } else if name.starts_with("gateway_circuit_closes_total") {
        categories.circuit.closes += value;
    } else if name.starts_with("gateway_circuit_half_opens_total") {
        categories.circuit.half_opens += value;
    } else if name.starts_with("gateway_circuit_rejected_total") {
        categories.circuit.rejected += value;
    } else if name.starts_with("gateway_uptime_seconds") {
        categories.system.uptime_seconds = metric.value.unwrap_or(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_counter_line() {
        let metric = parse_prometheus_line("gateway_queue_enqueued_total 42").unwrap();
        assert_eq!(metric.name, "gateway_queue_enqueued_total");
        assert_eq!(metric.value, Some(42.0));
        assert!(metric.labels.is_empty());
    }

    #[test]
    fn parses_line_with_labels() {
        let metric =
            parse_prometheus_line(r#"gateway_router_resolutions_total{service="logic"} 100"#)
                .unwrap();
        assert_eq!(metric.value, Some(100.0));
        assert_eq!(metric.labels.get("service"), Some(&"logic".to_string()));
    }

    #[test]
    fn snapshot_aggregates_by_service() {
        let text = r#"
gateway_router_resolutions_total{service="logic"} 100
gateway_router_resolutions_total{service="chat"} 50
gateway_queue_dropped_total 3
"#;
        let snapshot = MetricsSnapshot::from_prometheus_text(text);
        assert_eq!(snapshot.categories.router.resolutions, 150);
        assert_eq!(
            snapshot.categories.router.by_service.get("logic").unwrap().resolutions,
            100
        );
        assert_eq!(snapshot.categories.queue.dropped, 3);
    }
}
