//! Stage configuration records.

use crate::errors::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default stage timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 200;
/// Default number of attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default backoff base in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 80;

/// Caller-facing stage description. Missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfigInput {
    /// The stage name, also the node lookup key.
    pub name: String,
    /// Combined execution budget in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Maximum number of attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Base delay for exponential backoff in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_base_ms: Option<u64>,
}

impl StageConfigInput {
    /// Creates an input with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout_ms: None,
            max_retries: None,
            backoff_base_ms: None,
        }
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the backoff base.
    #[must_use]
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = Some(backoff_base_ms);
        self
    }
}

/// Immutable configuration for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageConfig {
    name: String,
    timeout_ms: u64,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl StageConfig {
    /// Creates a validated stage configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank, or `timeout_ms` or
    /// `backoff_base_ms` is zero.
    pub fn new(
        name: impl Into<String>,
        timeout_ms: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, OrchestratorError> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(OrchestratorError::invalid_stage(name, "name must not be empty"));
        }
        if timeout_ms == 0 {
            return Err(OrchestratorError::invalid_stage(name, "timeout_ms must be > 0"));
        }
        if backoff_base_ms == 0 {
            return Err(OrchestratorError::invalid_stage(name, "backoff_base_ms must be > 0"));
        }

        Ok(Self {
            name,
            timeout_ms,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Creates a configuration with default timeout and retry policy.
    pub fn with_defaults(name: impl Into<String>) -> Result<Self, OrchestratorError> {
        Self::new(name, DEFAULT_TIMEOUT_MS, DEFAULT_MAX_RETRIES, DEFAULT_BACKOFF_BASE_MS)
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the timeout in milliseconds.
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Returns the configured retry count.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the backoff base in milliseconds.
    #[must_use]
    pub fn backoff_base_ms(&self) -> u64 {
        self.backoff_base_ms
    }

    /// Returns the combined execution budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Number of times the node is invoked at most. Never less than one.
    #[must_use]
    pub fn attempt_budget(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Delay before retrying after the given failed attempt (0-indexed).
    ///
    /// delay = backoff_base * 2^attempt
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

impl TryFrom<StageConfigInput> for StageConfig {
    type Error = OrchestratorError;

    fn try_from(input: StageConfigInput) -> Result<Self, Self::Error> {
        Self::new(
            input.name,
            input.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            input.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            input.backoff_base_ms.unwrap_or(DEFAULT_BACKOFF_BASE_MS),
        )
    }
}
