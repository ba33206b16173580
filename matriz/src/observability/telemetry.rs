//! Panic-isolating wrapper around a metrics sink.

use super::{MetricsSink, NoOpMetricsSink};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Handle the orchestrator uses to emit metrics.
///
/// Every call is best effort: a panicking sink is logged and ignored.
#[derive(Clone)]
pub struct Telemetry {
    sink: Arc<dyn MetricsSink>,
}

impl Telemetry {
    /// Wraps a sink.
    #[must_use]
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    /// Creates a telemetry handle that discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Arc::new(NoOpMetricsSink))
    }

    /// Increments a counter.
    pub fn increment(&self, name: &str, labels: &[(&str, &str)]) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.sink.increment_counter(name, labels);
        }));
        if outcome.is_err() {
            warn!(metric = %name, "Metrics sink panicked; sample dropped");
        }
    }

    /// Records a histogram observation.
    pub fn observe(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.sink.record_histogram(name, value, labels);
        }));
        if outcome.is_err() {
            warn!(metric = %name, "Metrics sink panicked; sample dropped");
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::CollectingMetricsSink;
    use crate::testing::PanickingMetricsSink;

    #[test]
    fn test_forwards_to_sink() {
        let sink = Arc::new(CollectingMetricsSink::new());
        let telemetry = Telemetry::new(sink.clone());

        telemetry.increment("stage_timeouts", &[("stage", "A")]);
        telemetry.observe("stage_latency", 3.0, &[]);

        assert_eq!(sink.counter("stage_timeouts"), 1);
        assert_eq!(sink.histogram("stage_latency"), vec![3.0]);
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let telemetry = Telemetry::new(Arc::new(PanickingMetricsSink));
        telemetry.increment("stage_timeouts", &[]);
        telemetry.observe("stage_latency", 1.0, &[]);
    }
}
