//! Single-stage execution: oscillation check, timeout, retry with backoff.

use super::constellation::{constellation_tag, Star, CONSTELLATION_KEY};
use super::result::{StageAction, StageResult, DEFAULT_ESCALATION_REASON};
use super::StageConfig;
use crate::context::ContextMap;
use crate::control::{OscillationDetector, OSCILLATION_DETECTED};
use crate::errors::NodeError;
use crate::nodes::Node;
use crate::observability::{names, Telemetry};
use crate::utils::{format_timestamp, now_utc};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

/// Executes stages against nodes.
///
/// Clones share the same oscillation window.
#[derive(Debug, Clone)]
pub struct StageRunner {
    detector: Arc<Mutex<OscillationDetector>>,
    telemetry: Telemetry,
}

impl StageRunner {
    /// Creates a runner with a fresh oscillation window.
    #[must_use]
    pub fn new(telemetry: Telemetry) -> Self {
        Self::with_detector(Arc::new(Mutex::new(OscillationDetector::new())), telemetry)
    }

    /// Creates a runner over an existing oscillation window.
    #[must_use]
    pub fn with_detector(detector: Arc<Mutex<OscillationDetector>>, telemetry: Telemetry) -> Self {
        Self { detector, telemetry }
    }

    /// Returns the oscillation window shared by this runner.
    #[must_use]
    pub fn detector(&self) -> &Arc<Mutex<OscillationDetector>> {
        &self.detector
    }

    /// Runs one stage.
    ///
    /// The oscillation window is stepped before the node is touched. The
    /// node is then attempted up to `max_retries` times (at least once)
    /// with `2^attempt * backoff_base_ms` sleeps between failures, all
    /// within one `timeout_ms` budget. Finishing exactly at the budget
    /// counts as success.
    ///
    /// # Errors
    ///
    /// Returns the node's last error when every attempt failed before the
    /// budget ran out.
    pub async fn run(
        &self,
        config: &StageConfig,
        node: &dyn Node,
        context: &ContextMap,
    ) -> Result<StageResult, NodeError> {
        let span = info_span!("stage", stage = %config.name(), timeout_ms = config.timeout_ms());
        self.run_inner(config, node, context).instrument(span).await
    }

    async fn run_inner(
        &self,
        config: &StageConfig,
        node: &dyn Node,
        context: &ContextMap,
    ) -> Result<StageResult, NodeError> {
        let name = config.name();

        // Step before any await so batch launch order fixes the window order.
        let oscillating = self.detector.lock().step(name);
        if oscillating {
            warn!(stage = %name, "Oscillation detected; escalating");
            self.telemetry
                .increment(names::OSCILLATION_DETECTIONS, &[("stage", name)]);
            return Ok(StageResult::escalated(name, OSCILLATION_DETECTED));
        }

        let start = Instant::now();
        let deadline = start + config.timeout();
        let mut attempts = 0u32;

        let outcome = tokio::select! {
            biased;
            res = attempt_with_retries(config, node, context, &mut attempts) => Some(res),
            () = tokio::time::sleep_until(deadline) => None,
        };

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let Some(outcome) = outcome else {
            warn!(stage = %name, attempts, timeout_ms = config.timeout_ms(), "Stage timed out");
            self.telemetry.increment(names::STAGE_TIMEOUTS, &[("stage", name)]);
            self.record_latency(name, "timeout", duration_ms);
            return Ok(StageResult::timed_out(name, config.timeout_ms()).with_timing(attempts, duration_ms));
        };

        match outcome {
            Ok(output) => Ok(self.finish(config, output, attempts, duration_ms)),
            Err(err) => {
                warn!(stage = %name, attempts, error = %err, "Stage failed after retries");
                self.record_latency(name, "error", duration_ms);
                Err(err)
            }
        }
    }

    fn finish(&self, config: &StageConfig, output: ContextMap, attempts: u32, duration_ms: f64) -> StageResult {
        let name = config.name();

        match StageAction::from_output(&output) {
            Some(StageAction::Escalate) => {
                let reason = output
                    .get("reason")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or(DEFAULT_ESCALATION_REASON)
                    .to_string();
                debug!(stage = %name, reason = %reason, "Node requested escalation");
                self.record_latency(name, "escalated", duration_ms);
                StageResult::escalated(name, reason)
                    .with_payload(output)
                    .with_timing(attempts, duration_ms)
            }
            Some(StageAction::Timeout) => {
                debug!(stage = %name, "Node reported its own timeout");
                self.telemetry.increment(names::STAGE_TIMEOUTS, &[("stage", name)]);
                self.record_latency(name, "timeout", duration_ms);
                StageResult::timed_out(name, config.timeout_ms())
                    .with_payload(output)
                    .with_timing(attempts, duration_ms)
            }
            None => {
                let star = Star::for_stage(name);
                let completed_at = now_utc();

                let mut payload = output;
                payload.insert(
                    CONSTELLATION_KEY.to_string(),
                    constellation_tag(name, &format_timestamp(&completed_at)),
                );

                self.telemetry.increment(
                    names::CONSTELLATION_STAR_ACTIVATIONS,
                    &[("star", star.as_str()), ("stage", name)],
                );
                self.record_latency(name, "ok", duration_ms);
                debug!(stage = %name, attempts, duration_ms, "Stage completed");

                let mut result = StageResult::ok(name, payload).with_timing(attempts, duration_ms);
                result.completed_at = completed_at;
                result
            }
        }
    }

    fn record_latency(&self, stage: &str, status: &str, duration_ms: f64) {
        self.telemetry.observe(
            names::STAGE_LATENCY,
            duration_ms,
            &[("stage", stage), ("status", status)],
        );
    }
}

async fn attempt_with_retries(
    config: &StageConfig,
    node: &dyn Node,
    context: &ContextMap,
    attempts: &mut u32,
) -> Result<ContextMap, NodeError> {
    let budget = config.attempt_budget();
    let mut attempt = 0u32;

    loop {
        *attempts += 1;
        match invoke(node, context).await {
            Ok(output) => return Ok(output),
            Err(err) if attempt + 1 < budget => {
                let delay = config.backoff_delay(attempt);
                debug!(
                    stage = %config.name(),
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Retrying after error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn invoke(node: &dyn Node, context: &ContextMap) -> Result<ContextMap, NodeError> {
    match AssertUnwindSafe(node.process(context)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(NodeError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::from_value;
    use crate::observability::CollectingMetricsSink;
    use crate::stages::StageStatus;
    use crate::testing::{EscalatingNode, FailingNode, FlakyNode, PanickingNode, SlowNode, StaticNode};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn runner_with_sink() -> (StageRunner, Arc<CollectingMetricsSink>) {
        let sink = Arc::new(CollectingMetricsSink::new());
        (StageRunner::new(Telemetry::new(sink.clone())), sink)
    }

    fn stage(name: &str, timeout_ms: u64, max_retries: u32, backoff_base_ms: u64) -> StageConfig {
        StageConfig::new(name, timeout_ms, max_retries, backoff_base_ms).unwrap()
    }

    #[tokio::test]
    async fn test_success_injects_constellation() {
        let (runner, sink) = runner_with_sink();
        let node = StaticNode::new(from_value(json!({"intent": "greet"})));

        let result = runner
            .run(&StageConfig::with_defaults("INTENT").unwrap(), &node, &ContextMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, StageStatus::Ok);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.payload["intent"], "greet");
        assert_eq!(result.payload[CONSTELLATION_KEY]["star"], "Awareness");
        assert_eq!(result.payload[CONSTELLATION_KEY]["stage"], "INTENT");
        assert!(result.payload[CONSTELLATION_KEY]["timestamp"].is_string());

        let activations = sink.records_named(names::CONSTELLATION_STAR_ACTIVATIONS);
        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].label("star"), Some("Awareness"));
        assert_eq!(sink.histogram(names::STAGE_LATENCY).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success_waits_for_backoff() {
        let (runner, _) = runner_with_sink();
        // fails twice, third attempt succeeds
        let node = FlakyNode::new(2, from_value(json!({"ok": true})));
        let config = stage("THOUGHT", 10_000, 3, 80);

        let start = Instant::now();
        let result = runner.run(&config, &node, &ContextMap::new()).await.unwrap();

        assert_eq!(result.status, StageStatus::Ok);
        assert_eq!(result.attempts, 3);
        assert_eq!(node.calls(), 3);
        // 80 * 2^0 + 80 * 2^1
        assert!(start.elapsed() >= Duration::from_millis(240));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_propagates_without_trailing_sleep() {
        let (runner, _) = runner_with_sink();
        let node = FailingNode::new("model offline");
        let config = stage("THOUGHT", 10_000, 2, 80);

        let start = Instant::now();
        let err = runner.run(&config, &node, &ContextMap::new()).await.unwrap_err();

        assert_eq!(err.to_string(), "model offline");
        assert_eq!(node.calls(), 2);
        // Only one backoff sleep between the two attempts.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_millis(160));
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let (runner, _) = runner_with_sink();
        let node = FailingNode::new("boom");
        let config = stage("A", 200, 0, 80);

        assert!(runner.run(&config, &node, &ContextMap::new()).await.is_err());
        assert_eq!(node.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_just_over_budget() {
        let (runner, sink) = runner_with_sink();
        let node = SlowNode::new(Duration::from_millis(201));

        let result = runner
            .run(&stage("VISION", 200, 2, 80), &node, &ContextMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, StageStatus::TimedOut);
        assert_eq!(result.action, Some(StageAction::Timeout));
        assert_eq!(result.timeout_ms, Some(200));
        assert_eq!(sink.counter(names::STAGE_TIMEOUTS), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_just_under_budget() {
        let (runner, sink) = runner_with_sink();
        let node = SlowNode::new(Duration::from_millis(199));

        let result = runner
            .run(&stage("VISION", 200, 2, 80), &node, &ContextMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, StageStatus::Ok);
        assert_eq!(sink.counter(names::STAGE_TIMEOUTS), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_exactly_at_budget_is_success() {
        let (runner, _) = runner_with_sink();
        let node = SlowNode::new(Duration::from_millis(200));

        let result = runner
            .run(&stage("VISION", 200, 2, 80), &node, &ContextMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, StageStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_covers_retries_combined() {
        let (runner, _) = runner_with_sink();
        // 2 failures of 60ms each plus 80ms + 160ms backoff exceed 300ms.
        let node = FlakyNode::new(2, ContextMap::new()).with_delay(Duration::from_millis(60));

        let result = runner
            .run(&stage("THOUGHT", 300, 3, 80), &node, &ContextMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, StageStatus::TimedOut);
        assert_eq!(node.calls(), 2);
    }

    #[tokio::test]
    async fn test_oscillation_escalates_without_invoking_node() {
        let (runner, sink) = runner_with_sink();
        let a = StaticNode::empty();
        let b = StaticNode::empty();
        let ctx = ContextMap::new();

        for (name, node) in [("A", &a), ("B", &b), ("A", &a)] {
            let result = runner.run(&StageConfig::with_defaults(name).unwrap(), node, &ctx).await.unwrap();
            assert_eq!(result.status, StageStatus::Ok);
        }

        let result = runner
            .run(&StageConfig::with_defaults("B").unwrap(), &b, &ctx)
            .await
            .unwrap();

        assert_eq!(result.status, StageStatus::Escalated);
        assert_eq!(result.reason.as_deref(), Some(OSCILLATION_DETECTED));
        assert_eq!(b.calls(), 1);
        assert_eq!(sink.counter(names::OSCILLATION_DETECTIONS), 1);
    }

    #[tokio::test]
    async fn test_node_escalation_carries_reason() {
        let (runner, _) = runner_with_sink();
        let node = EscalatingNode::new("guardian_veto");

        let result = runner
            .run(&StageConfig::with_defaults("DECISION").unwrap(), &node, &ContextMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, StageStatus::Escalated);
        assert_eq!(result.reason.as_deref(), Some("guardian_veto"));
        assert!(!result.payload.contains_key(CONSTELLATION_KEY));
    }

    #[tokio::test]
    async fn test_node_escalation_default_reason() {
        let (runner, _) = runner_with_sink();
        let node = StaticNode::new(from_value(json!({"action": "escalate"})));

        let result = runner
            .run(&StageConfig::with_defaults("DECISION").unwrap(), &node, &ContextMap::new())
            .await
            .unwrap();

        assert_eq!(result.reason.as_deref(), Some(DEFAULT_ESCALATION_REASON));
    }

    #[tokio::test]
    async fn test_panicking_node_becomes_error() {
        let (runner, _) = runner_with_sink();
        let node = PanickingNode::new("kaboom");

        let err = runner
            .run(&stage("A", 200, 1, 10), &node, &ContextMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, NodeError::Panicked(ref msg) if msg == "kaboom"));
    }

    #[tokio::test]
    async fn test_clones_share_window() {
        let (runner, _) = runner_with_sink();
        let clone = runner.clone();
        let node = StaticNode::empty();
        let ctx = ContextMap::new();

        runner.run(&StageConfig::with_defaults("A").unwrap(), &node, &ctx).await.unwrap();
        clone.run(&StageConfig::with_defaults("B").unwrap(), &node, &ctx).await.unwrap();

        assert_eq!(runner.detector().lock().window(), vec!["A", "B"]);
    }
}
