//! JSON pipeline definitions.

use super::OrchestratorConfig;
use crate::errors::OrchestratorError;
use crate::stages::{StageConfig, StageConfigInput};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A complete pipeline description: orchestrator options plus stage list.
///
/// ```json
/// {
///   "config": {"parallel_enabled": true, "max_parallel_stages": 2},
///   "stages": [{"name": "INTENT"}, {"name": "THOUGHT", "timeout_ms": 500}]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Orchestrator options.
    #[serde(default)]
    pub config: OrchestratorConfig,
    /// Stage inputs in execution order.
    #[serde(default)]
    pub stages: Vec<StageConfigInput>,
}

impl PipelineDefinition {
    /// Parses a definition from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, OrchestratorError> {
        let definition: Self = serde_json::from_str(json)?;
        definition.config.validate()?;
        Ok(definition)
    }

    /// Reads and parses a definition from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Validates and converts the stage inputs.
    pub fn stage_configs(&self) -> Result<Vec<StageConfig>, OrchestratorError> {
        self.stages.iter().cloned().map(StageConfig::try_from).collect()
    }
}
