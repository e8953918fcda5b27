//! Configuration validation: semantic cross-field checks over `GatewayConfig`.

use crate::schema::GatewayConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "range", "ordering", "capacity"
    pub category: &'static str,
    /// Dotted path, e.g. "queue.high_watermark"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn error(&mut self, category: &'static str, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category,
            path: path.into(),
            message: message.into(),
        });
    }

    fn warning(&mut self, category: &'static str, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category,
            path: path.into(),
            message: message.into(),
        });
    }
}

fn fraction_in_unit_range(result: &mut ValidationResult, path: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        result.error("range", path, format!("{value} is not within [0.0, 1.0]"));
    }
}

/// Validate semantic invariants of a [`GatewayConfig`] beyond what serde
/// deserialization already enforces.
#[must_use]
pub fn validate(config: &GatewayConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    fraction_in_unit_range(&mut result, "queue.high_watermark", config.queue.high_watermark);
    fraction_in_unit_range(&mut result, "queue.low_watermark", config.queue.low_watermark);
    fraction_in_unit_range(&mut result, "queue.drop_threshold", config.queue.drop_threshold);

    if config.queue.low_watermark >= config.queue.high_watermark {
        result.error(
            "ordering",
            "queue.low_watermark",
            format!(
                "low_watermark ({}) must be less than high_watermark ({})",
                config.queue.low_watermark, config.queue.high_watermark
            ),
        );
    }
    if config.queue.high_watermark >= config.queue.drop_threshold {
        result.error(
            "ordering",
            "queue.high_watermark",
            format!(
                "high_watermark ({}) must be less than drop_threshold ({})",
                config.queue.high_watermark, config.queue.drop_threshold
            ),
        );
    }
    if config.queue.max_size == 0 {
        result.error("range", "queue.max_size", "max_size must be greater than zero");
    }

    if config.channel_pool.min_connections > config.channel_pool.max_connections {
        result.error(
            "ordering",
            "channel_pool.min_connections",
            format!(
                "min_connections ({}) exceeds max_connections ({})",
                config.channel_pool.min_connections, config.channel_pool.max_connections
            ),
        );
    }

    if config.pool.pre_allocate_size > config.pool.max_concurrent {
        result.warning(
            "capacity",
            "pool.pre_allocate_size",
            format!(
                "pre_allocate_size ({}) exceeds max_concurrent ({}); the surplus shells are never used",
                config.pool.pre_allocate_size, config.pool.max_concurrent
            ),
        );
    }

    if config.heartbeat.timeout_secs <= config.heartbeat.interval_secs {
        result.error(
            "ordering",
            "heartbeat.timeout_secs",
            format!(
                "timeout_secs ({}) must exceed interval_secs ({}), or every ping would already be late",
                config.heartbeat.timeout_secs, config.heartbeat.interval_secs
            ),
        );
    }

    if config.circuit.failure_threshold == 0 {
        result.error(
            "range",
            "circuit.failure_threshold",
            "failure_threshold must be greater than zero",
        );
    }
    if config.circuit.success_threshold == 0 {
        result.error(
            "range",
            "circuit.success_threshold",
            "success_threshold must be greater than zero",
        );
    }

    if config.batch.size == 0 {
        result.error("range", "batch.size", "batch.size must be greater than zero");
    }

    if config.discovery.service_names.is_empty() {
        result.warning(
            "capacity",
            "discovery.service_names",
            "no service names configured; the router has nothing to resolve against",
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let result = validate(&GatewayConfig::default());
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn watermarks_out_of_order_is_an_error() {
        let mut config = GatewayConfig::default();
        config.queue.low_watermark = 0.9;
        config.queue.high_watermark = 0.5;
        let result = validate(&config);
        assert!(result.has_errors());
        assert_eq!(result.count(Severity::Error), 1);
    }

    #[test]
    fn channel_pool_min_above_max_is_an_error() {
        let mut config = GatewayConfig::default();
        config.channel_pool.min_connections = 30;
        config.channel_pool.max_connections = 20;
        assert!(validate(&config).has_errors());
    }

    #[test]
    fn pre_allocate_above_max_concurrent_is_only_a_warning() {
        let mut config = GatewayConfig::default();
        config.pool.pre_allocate_size = 9000;
        config.pool.max_concurrent = 8000;
        let result = validate(&config);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }
}
