//! Metrics and tracing for pipeline runs.
//!
//! Metrics go to a [`MetricsSink`] through [`Telemetry`], which guarantees a
//! misbehaving sink can never affect a pipeline. Spans and log lines use the
//! `tracing` ecosystem.

mod sink;
mod telemetry;

pub use sink::{CollectingMetricsSink, LoggingMetricsSink, MetricKind, MetricRecord, MetricsSink, NoOpMetricsSink};
pub use telemetry::Telemetry;

use tracing_subscriber::{fmt, EnvFilter};

/// Metric names emitted by the orchestrator.
pub mod names {
    /// Histogram of stage wall time in milliseconds.
    pub const STAGE_LATENCY: &str = "stage_latency";
    /// Counter of stage timeouts.
    pub const STAGE_TIMEOUTS: &str = "stage_timeouts";
    /// Counter of oscillation escalations.
    pub const OSCILLATION_DETECTIONS: &str = "oscillation_detections";
    /// Counter of arbitration outcomes.
    pub const ARBITRATION_DECISIONS: &str = "arbitration_decisions";
    /// Counter of constellation tags by star.
    pub const CONSTELLATION_STAR_ACTIVATIONS: &str = "constellation_star_activations";
    /// Histogram of parallel batch wall time in milliseconds.
    pub const PARALLEL_BATCH_DURATION: &str = "parallel_batch_duration";
}

/// Installs a global `tracing` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `info` when `RUST_LOG` is unset. Returns false if a global
/// subscriber was already installed.
pub fn init_tracing(json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        fmt().with_env_filter(filter).json().try_init().is_ok()
    } else {
        fmt().with_env_filter(filter).try_init().is_ok()
    }
}

// The global-subscriber test lives in `tests/observability_init.rs` so it runs
// in its own process and cannot clash with `#[traced_test]` in the lib tests.
