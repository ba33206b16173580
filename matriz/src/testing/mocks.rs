//! Mock nodes and sinks for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::time::Duration;

use crate::context::ContextMap;
use crate::errors::NodeError;
use crate::nodes::{HealthCheck, Node, NodeHealth};
use crate::observability::MetricsSink;

/// A node that always returns the same output and counts calls.
#[derive(Debug)]
pub struct StaticNode {
    output: ContextMap,
    health: Option<NodeHealth>,
    call_count: Mutex<usize>,
}

impl StaticNode {
    /// Creates a node returning `output`.
    #[must_use]
    pub fn new(output: ContextMap) -> Self {
        Self {
            output,
            health: None,
            call_count: Mutex::new(0),
        }
    }

    /// Creates a node returning an empty map.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(ContextMap::new())
    }

    /// Gives the node a health check reporting `health`.
    #[must_use]
    pub fn with_health(mut self, health: NodeHealth) -> Self {
        self.health = Some(health);
        self
    }

    /// Returns the number of times the node was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Node for StaticNode {
    async fn process(&self, _context: &ContextMap) -> Result<ContextMap, NodeError> {
        *self.call_count.lock() += 1;
        Ok(self.output.clone())
    }

    fn health_check(&self) -> Option<&dyn HealthCheck> {
        self.health.as_ref().map(|_| self as &dyn HealthCheck)
    }
}

#[async_trait]
impl HealthCheck for StaticNode {
    async fn check_health(&self) -> NodeHealth {
        self.health.clone().unwrap_or(NodeHealth::Healthy)
    }
}

/// A node that fails on every call.
#[derive(Debug)]
pub struct FailingNode {
    message: String,
    call_count: Mutex<usize>,
}

impl FailingNode {
    /// Creates a failing node.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            call_count: Mutex::new(0),
        }
    }

    /// Returns the number of times the node was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Node for FailingNode {
    async fn process(&self, _context: &ContextMap) -> Result<ContextMap, NodeError> {
        *self.call_count.lock() += 1;
        Err(NodeError::failed(self.message.clone()))
    }
}

/// A node that fails a fixed number of times, then succeeds.
#[derive(Debug)]
pub struct FlakyNode {
    failures: usize,
    output: ContextMap,
    delay: Option<Duration>,
    call_count: Mutex<usize>,
}

impl FlakyNode {
    /// Creates a node that fails `failures` times before returning `output`.
    #[must_use]
    pub fn new(failures: usize, output: ContextMap) -> Self {
        Self {
            failures,
            output,
            delay: None,
            call_count: Mutex::new(0),
        }
    }

    /// Makes every call take `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of times the node was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Node for FlakyNode {
    async fn process(&self, _context: &ContextMap) -> Result<ContextMap, NodeError> {
        let call = {
            let mut count = self.call_count.lock();
            *count += 1;
            *count
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if call <= self.failures {
            Err(NodeError::failed(format!("transient failure {call}")))
        } else {
            Ok(self.output.clone())
        }
    }
}

/// A node that sleeps before answering.
#[derive(Debug)]
pub struct SlowNode {
    delay: Duration,
    output: ContextMap,
}

impl SlowNode {
    /// Creates a node that takes `delay` and returns an empty map.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            output: ContextMap::new(),
        }
    }

    /// Creates a slow node with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Sets the output.
    #[must_use]
    pub fn with_output(mut self, output: ContextMap) -> Self {
        self.output = output;
        self
    }
}

#[async_trait]
impl Node for SlowNode {
    async fn process(&self, _context: &ContextMap) -> Result<ContextMap, NodeError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.output.clone())
    }
}

/// A node that asks the pipeline to halt.
#[derive(Debug)]
pub struct EscalatingNode {
    reason: String,
}

impl EscalatingNode {
    /// Creates a node escalating with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Node for EscalatingNode {
    async fn process(&self, _context: &ContextMap) -> Result<ContextMap, NodeError> {
        let mut output = ContextMap::new();
        output.insert("action".to_string(), json!("escalate"));
        output.insert("reason".to_string(), json!(self.reason));
        Ok(output)
    }
}

/// A node that panics on every call.
#[derive(Debug)]
pub struct PanickingNode {
    message: String,
}

impl PanickingNode {
    /// Creates a panicking node.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Node for PanickingNode {
    async fn process(&self, _context: &ContextMap) -> Result<ContextMap, NodeError> {
        panic!("{}", self.message);
    }
}

/// A node that records every context it receives.
#[derive(Debug)]
pub struct RecordingNode {
    output: ContextMap,
    contexts: Mutex<Vec<ContextMap>>,
}

impl RecordingNode {
    /// Creates a recording node returning `output`.
    #[must_use]
    pub fn new(output: ContextMap) -> Self {
        Self {
            output,
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Returns the contexts seen, in call order.
    #[must_use]
    pub fn contexts(&self) -> Vec<ContextMap> {
        self.contexts.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Clears recorded contexts.
    pub fn clear(&self) {
        self.contexts.lock().clear();
    }
}

#[async_trait]
impl Node for RecordingNode {
    async fn process(&self, context: &ContextMap) -> Result<ContextMap, NodeError> {
        self.contexts.lock().push(context.clone());
        Ok(self.output.clone())
    }
}

/// A metrics sink that panics on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingMetricsSink;

impl MetricsSink for PanickingMetricsSink {
    fn increment_counter(&self, name: &str, _labels: &[(&str, &str)]) {
        panic!("metrics backend unavailable: {name}");
    }

    fn record_histogram(&self, name: &str, _value: f64, _labels: &[(&str, &str)]) {
        panic!("metrics backend unavailable: {name}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::from_value;

    #[tokio::test]
    async fn test_static_node() {
        let node = StaticNode::new(from_value(json!({"k": 1})));
        let out = node.process(&ContextMap::new()).await.unwrap();

        assert_eq!(out["k"], 1);
        assert_eq!(node.calls(), 1);
        assert!(node.health_check().is_none());
    }

    #[tokio::test]
    async fn test_static_node_health() {
        let node = StaticNode::empty().with_health(NodeHealth::Degraded("warming".into()));
        let health = node.health_check().unwrap().check_health().await;
        assert_eq!(health, NodeHealth::Degraded("warming".into()));
    }

    #[test]
    fn test_failing_node() {
        let node = FailingNode::new("down");
        let err = tokio_test::block_on(node.process(&ContextMap::new())).unwrap_err();

        assert_eq!(err.to_string(), "down");
        assert_eq!(node.calls(), 1);
    }

    #[tokio::test]
    async fn test_flaky_node() {
        let node = FlakyNode::new(1, from_value(json!({"ok": true})));
        assert!(node.process(&ContextMap::new()).await.is_err());
        assert!(node.process(&ContextMap::new()).await.is_ok());
        assert_eq!(node.calls(), 2);
    }

    #[tokio::test]
    async fn test_escalating_node() {
        let out = EscalatingNode::new("unsafe").process(&ContextMap::new()).await.unwrap();
        assert_eq!(out["action"], "escalate");
        assert_eq!(out["reason"], "unsafe");
    }

    #[tokio::test]
    async fn test_recording_node() {
        let node = RecordingNode::new(ContextMap::new());
        node.process(&from_value(json!({"query": "hi"}))).await.unwrap();

        assert_eq!(node.calls(), 1);
        assert_eq!(node.contexts()[0]["query"], "hi");

        node.clear();
        assert_eq!(node.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_node() {
        let node = SlowNode::with_delay_ms(50);
        let start = tokio::time::Instant::now();
        node.process(&ContextMap::new()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
