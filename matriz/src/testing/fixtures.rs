//! Test fixtures for pipeline testing.

use std::sync::Arc;

use serde_json::json;

use crate::config::OrchestratorConfig;
use crate::context::{ContextMap, QUERY_KEY};
use crate::errors::OrchestratorError;
use crate::nodes::{Node, NodeRegistry};
use crate::observability::CollectingMetricsSink;
use crate::pipeline::PipelineOrchestrator;
use crate::stages::StageConfigInput;

/// Builds a context holding only a query.
#[must_use]
pub fn query_context(query: &str) -> ContextMap {
    let mut context = ContextMap::new();
    context.insert(QUERY_KEY.to_string(), json!(query));
    context
}

/// A test pipeline builder.
///
/// Registers nodes, collects stage inputs and wires a
/// [`CollectingMetricsSink`] into the built orchestrator.
#[derive(Debug)]
pub struct TestPipeline {
    registry: Arc<NodeRegistry>,
    stages: Vec<StageConfigInput>,
    config: OrchestratorConfig,
    sink: Arc<CollectingMetricsSink>,
}

impl Default for TestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPipeline {
    /// Creates an empty test pipeline with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(NodeRegistry::new()),
            stages: Vec::new(),
            config: OrchestratorConfig::default(),
            sink: Arc::new(CollectingMetricsSink::new()),
        }
    }

    /// Sets the orchestrator configuration.
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a stage with default policy backed by `node`.
    #[must_use]
    pub fn with_stage<N: Node + 'static>(self, name: &str, node: Arc<N>) -> Self {
        self.with_stage_input(StageConfigInput::named(name), node)
    }

    /// Adds a stage with a custom policy backed by `node`.
    ///
    /// Registering the same name twice keeps the latest node.
    #[must_use]
    pub fn with_stage_input<N: Node + 'static>(mut self, input: StageConfigInput, node: Arc<N>) -> Self {
        self.registry.register(input.name.clone(), node);
        self.stages.push(input);
        self
    }

    /// Adds a stage by name only.
    ///
    /// The stage runs whatever node is registered under the name, if any,
    /// so this both repeats earlier stages and adds unregistered ones.
    #[must_use]
    pub fn with_stage_name(mut self, name: &str) -> Self {
        self.stages.push(StageConfigInput::named(name));
        self
    }

    /// Returns the node registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Returns the metrics sink.
    #[must_use]
    pub fn sink(&self) -> &Arc<CollectingMetricsSink> {
        &self.sink
    }

    /// Returns the stage names in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Builds the orchestrator.
    pub fn build(&self) -> Result<PipelineOrchestrator, OrchestratorError> {
        let orchestrator = PipelineOrchestrator::new(self.config.clone(), self.registry.clone())
            .with_sink(self.sink.clone());
        orchestrator.configure_stages(self.stages.clone())?;
        Ok(orchestrator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticNode;

    #[test]
    fn test_query_context() {
        let ctx = query_context("hello");
        assert_eq!(ctx[QUERY_KEY], "hello");
    }

    #[test]
    fn test_builder_registers_nodes() {
        let pipeline = TestPipeline::new()
            .with_stage("INTENT", Arc::new(StaticNode::empty()))
            .with_stage_name("MISSING")
            .with_stage_name("INTENT");

        assert_eq!(pipeline.stage_names(), vec!["INTENT", "MISSING", "INTENT"]);
        assert!(pipeline.registry().contains("INTENT"));
        assert!(!pipeline.registry().contains("MISSING"));

        let orchestrator = pipeline.build().unwrap();
        assert_eq!(orchestrator.stage_count(), 3);
    }

    #[test]
    fn test_build_rejects_invalid_stage() {
        let pipeline = TestPipeline::new().with_stage_input(
            StageConfigInput::named("A").with_timeout_ms(0),
            Arc::new(StaticNode::empty()),
        );
        assert!(pipeline.build().is_err());
    }
}
