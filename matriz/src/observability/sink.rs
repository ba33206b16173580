//! Metrics sink trait and implementations.

use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Trait for fire-and-forget metrics sinks.
///
/// Implementations must not block. Failures are the sink's own concern.
pub trait MetricsSink: Send + Sync {
    /// Increments a counter by one.
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]);

    /// Records one histogram observation.
    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]);
}

/// A sink that discards everything.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetricsSink;

impl MetricsSink for NoOpMetricsSink {
    fn increment_counter(&self, _name: &str, _labels: &[(&str, &str)]) {}

    fn record_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}

/// A sink that logs every sample through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingMetricsSink {
    level: Level,
}

impl Default for LoggingMetricsSink {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl LoggingMetricsSink {
    /// Creates a logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    fn log(&self, kind: MetricKind, name: &str, value: f64, labels: &[(&str, &str)]) {
        if self.level == Level::INFO {
            info!(metric = %name, kind = ?kind, value, labels = ?labels, "Metric: {}", name);
        } else {
            debug!(metric = %name, kind = ?kind, value, labels = ?labels, "Metric: {}", name);
        }
    }
}

impl MetricsSink for LoggingMetricsSink {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.log(MetricKind::Counter, name, 1.0, labels);
    }

    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.log(MetricKind::Histogram, name, value, labels);
    }
}

/// Kind of a recorded metric sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Counter increment.
    Counter,
    /// Histogram observation.
    Histogram,
}

/// One sample captured by [`CollectingMetricsSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// Sample kind.
    pub kind: MetricKind,
    /// Metric name.
    pub name: String,
    /// Observed value (1.0 for counters).
    pub value: f64,
    /// Label pairs.
    pub labels: Vec<(String, String)>,
}

impl MetricRecord {
    /// Returns the value of a label.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingMetricsSink {
    records: RwLock<Vec<MetricRecord>>,
}

impl CollectingMetricsSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected samples.
    #[must_use]
    pub fn records(&self) -> Vec<MetricRecord> {
        self.records.read().clone()
    }

    /// Returns samples with the given name.
    #[must_use]
    pub fn records_named(&self, name: &str) -> Vec<MetricRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    /// Returns how many times a counter was incremented.
    #[must_use]
    pub fn counter(&self, name: &str) -> usize {
        self.records
            .read()
            .iter()
            .filter(|r| r.kind == MetricKind::Counter && r.name == name)
            .count()
    }

    /// Returns all observations of a histogram.
    #[must_use]
    pub fn histogram(&self, name: &str) -> Vec<f64> {
        self.records
            .read()
            .iter()
            .filter(|r| r.kind == MetricKind::Histogram && r.name == name)
            .map(|r| r.value)
            .collect()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Clears all collected samples.
    pub fn clear(&self) {
        self.records.write().clear();
    }

    fn push(&self, kind: MetricKind, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.records.write().push(MetricRecord {
            kind,
            name: name.to_string(),
            value,
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });
    }
}

impl MetricsSink for CollectingMetricsSink {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.push(MetricKind::Counter, name, 1.0, labels);
    }

    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.push(MetricKind::Histogram, name, value, labels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sink() {
        let sink = NoOpMetricsSink;
        sink.increment_counter("stage_timeouts", &[("stage", "A")]);
        sink.record_histogram("stage_latency", 1.5, &[]);
    }

    #[test]
    fn test_logging_sink() {
        let sink = LoggingMetricsSink::info();
        sink.increment_counter("stage_timeouts", &[("stage", "A")]);
        sink.record_histogram("stage_latency", 1.5, &[]);
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingMetricsSink::new();
        assert!(sink.is_empty());

        sink.increment_counter("stage_timeouts", &[("stage", "A")]);
        sink.increment_counter("stage_timeouts", &[("stage", "B")]);
        sink.record_histogram("stage_latency", 12.0, &[("stage", "A")]);

        assert_eq!(sink.counter("stage_timeouts"), 2);
        assert_eq!(sink.histogram("stage_latency"), vec![12.0]);

        let timeouts = sink.records_named("stage_timeouts");
        assert_eq!(timeouts[1].label("stage"), Some("B"));

        sink.clear();
        assert!(sink.is_empty());
    }
}
