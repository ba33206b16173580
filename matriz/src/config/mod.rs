//! Orchestrator configuration.
//!
//! Options can be built in code, deserialized, or read from the
//! environment (`ASYNC_ENABLED`, `PARALLEL_ENABLED`, `MAX_PARALLEL_STAGES`,
//! `OSCILLATION_SCOPE`).

mod definition;

pub use definition::PipelineDefinition;

use crate::errors::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable for the master kill switch.
pub const ENV_ASYNC_ENABLED: &str = "ASYNC_ENABLED";
/// Environment variable enabling parallel batches.
pub const ENV_PARALLEL_ENABLED: &str = "PARALLEL_ENABLED";
/// Environment variable for the batch size.
pub const ENV_MAX_PARALLEL_STAGES: &str = "MAX_PARALLEL_STAGES";
/// Environment variable for the oscillation window scope.
pub const ENV_OSCILLATION_SCOPE: &str = "OSCILLATION_SCOPE";

/// Lifetime of the oscillation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OscillationScope {
    /// One window per orchestrator, shared by every call.
    #[default]
    Shared,
    /// A fresh window for every `process_query*` call.
    PerCall,
}

impl fmt::Display for OscillationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "shared"),
            Self::PerCall => write!(f, "per_call"),
        }
    }
}

impl FromStr for OscillationScope {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shared" => Ok(Self::Shared),
            "per_call" | "per-call" => Ok(Self::PerCall),
            other => Err(OrchestratorError::config(format!(
                "unknown oscillation scope '{other}'"
            ))),
        }
    }
}

/// Configuration for a [`PipelineOrchestrator`](crate::pipeline::PipelineOrchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Master kill switch. When false every call fails immediately.
    #[serde(default = "default_async_enabled")]
    pub async_enabled: bool,
    /// Whether parallel batch execution is allowed.
    #[serde(default)]
    pub parallel_enabled: bool,
    /// Maximum number of stages per parallel batch.
    #[serde(default = "default_max_parallel_stages")]
    pub max_parallel_stages: usize,
    /// Lifetime of the oscillation window.
    #[serde(default)]
    pub oscillation_scope: OscillationScope,
}

fn default_async_enabled() -> bool {
    true
}

fn default_max_parallel_stages() -> usize {
    3
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            async_enabled: default_async_enabled(),
            parallel_enabled: false,
            max_parallel_stages: default_max_parallel_stages(),
            oscillation_scope: OscillationScope::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the master kill switch.
    #[must_use]
    pub fn with_async_enabled(mut self, enabled: bool) -> Self {
        self.async_enabled = enabled;
        self
    }

    /// Enables or disables parallel batches.
    #[must_use]
    pub fn with_parallel_enabled(mut self, enabled: bool) -> Self {
        self.parallel_enabled = enabled;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_max_parallel_stages(mut self, max: usize) -> Self {
        self.max_parallel_stages = max;
        self
    }

    /// Sets the oscillation window scope.
    #[must_use]
    pub fn with_oscillation_scope(mut self, scope: OscillationScope) -> Self {
        self.oscillation_scope = scope;
        self
    }

    /// Reads the configuration from process environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, OrchestratorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OrchestratorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_ASYNC_ENABLED) {
            config.async_enabled = parse_bool(ENV_ASYNC_ENABLED, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PARALLEL_ENABLED) {
            config.parallel_enabled = parse_bool(ENV_PARALLEL_ENABLED, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_PARALLEL_STAGES) {
            config.max_parallel_stages = raw.trim().parse().map_err(|_| {
                OrchestratorError::config(format!(
                    "{ENV_MAX_PARALLEL_STAGES} must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(raw) = lookup(ENV_OSCILLATION_SCOPE) {
            config.oscillation_scope = raw.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.max_parallel_stages == 0 {
            return Err(OrchestratorError::config(
                "max_parallel_stages must be at least 1",
            ));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, OrchestratorError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OrchestratorError::config(format!(
            "{key} must be a boolean, got '{raw}'"
        ))),
    }
}
