//! Node capabilities executed by pipeline stages.
//!
//! A [`Node`] is the unit of work behind a stage. Health checking is a
//! separate, optional capability exposed through [`Node::health_check`].

mod registry;

pub use registry::{NodeRegistry, NodeResolver};

#[cfg(test)]
pub use registry::MockNodeResolver;

use crate::context::ContextMap;
use crate::errors::NodeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for stage nodes.
///
/// `process` may be called any number of times, once per stage attempt.
#[async_trait]
pub trait Node: Send + Sync + Debug {
    /// Processes the current pipeline context.
    ///
    /// # Returns
    ///
    /// The fields to merge into the context, or an error. A returned
    /// `action: "escalate"` field halts the pipeline.
    async fn process(&self, context: &ContextMap) -> Result<ContextMap, NodeError>;

    /// Returns the node's health check capability, if it has one.
    fn health_check(&self) -> Option<&dyn HealthCheck> {
        None
    }
}

/// Reported health of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum NodeHealth {
    /// Fully operational.
    Healthy,
    /// Operational with reduced capability.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

impl NodeHealth {
    /// Returns true unless the node is unhealthy.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Unhealthy(_))
    }
}

/// Optional health check capability.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Probes the node.
    async fn check_health(&self) -> NodeHealth;
}

/// Health of the node behind one configured stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHealthEntry {
    /// The stage name.
    pub stage: String,
    /// Whether a node is registered for the stage.
    pub registered: bool,
    /// The probed health; `None` if unregistered or without a health check.
    pub health: Option<NodeHealth>,
}

/// A simple function-based node.
pub struct FnNode<F>
where
    F: Fn(&ContextMap) -> Result<ContextMap, NodeError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnNode<F>
where
    F: Fn(&ContextMap) -> Result<ContextMap, NodeError> + Send + Sync,
{
    /// Creates a new function-based node.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Returns the node name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<F> Debug for FnNode<F>
where
    F: Fn(&ContextMap) -> Result<ContextMap, NodeError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnNode").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Node for FnNode<F>
where
    F: Fn(&ContextMap) -> Result<ContextMap, NodeError> + Send + Sync,
{
    async fn process(&self, context: &ContextMap) -> Result<ContextMap, NodeError> {
        (self.func)(context)
    }
}
