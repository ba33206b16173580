//! Error types for the orchestrator.
//!
//! Pipeline outcomes are never errors: a failed run is a
//! [`PipelineResult`](crate::pipeline::PipelineResult) with `success == false`.
//! The types here cover configuration, node execution and node resolution.

use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for orchestrator configuration and setup.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A stage configuration was rejected.
    #[error("Invalid stage '{stage}': {message}")]
    InvalidStage {
        /// The stage name (may be empty when the name itself is invalid).
        stage: String,
        /// What was wrong with it.
        message: String,
    },

    /// An orchestrator option could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Creates an invalid stage error.
    #[must_use]
    pub fn invalid_stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Errors raised by a node while processing a stage.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The node panicked while processing.
    #[error("node panicked: {0}")]
    Panicked(String),

    /// Any other error surfaced by the node implementation.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NodeError {
    /// Creates a failure with a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let kind = match self {
            Self::Failed(_) => "NodeFailed",
            Self::Panicked(_) => "NodePanicked",
            Self::Other(_) => "NodeError",
        };

        let mut map = HashMap::new();
        map.insert("type".to_string(), json!(kind));
        map.insert("message".to_string(), json!(self.to_string()));
        map
    }
}

/// Failure to resolve a node for a stage.
///
/// The orchestrator treats this as a soft skip, never as a pipeline failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No node is registered under the key.
    #[error("Node not found: {key}")]
    NotFound {
        /// The lookup key.
        key: String,
    },
}

impl ResolveError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }
}
