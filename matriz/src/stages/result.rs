//! Per-stage execution results.

use crate::context::ContextMap;
use crate::utils::{format_timestamp, now_utc, Timestamp};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::json;
use std::fmt;

/// Payload key of the parallel-mode metadata.
pub const PARALLEL_KEY: &str = "_parallel";

/// Reason recorded when a node signals escalation without giving one.
pub const DEFAULT_ESCALATION_REASON: &str = "stage_escalation";

/// How a stage attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The node produced an output.
    Ok,
    /// No node was registered for the stage.
    Skipped,
    /// The stage asked the pipeline to halt.
    Escalated,
    /// The stage exceeded its budget.
    TimedOut,
    /// The node failed on its last attempt.
    Error,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Skipped => write!(f, "skipped"),
            Self::Escalated => write!(f, "escalated"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Control signal carried by a stage result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    /// Halt the pipeline.
    Escalate,
    /// The stage ran out of time.
    Timeout,
}

impl StageAction {
    /// Returns the wire name of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Escalate => "escalate",
            Self::Timeout => "timeout",
        }
    }

    /// Parses the `action` field of a node output.
    #[must_use]
    pub fn from_output(output: &ContextMap) -> Option<Self> {
        match output.get("action").and_then(serde_json::Value::as_str) {
            Some("escalate") => Some(Self::Escalate),
            Some("timeout") => Some(Self::Timeout),
            _ => None,
        }
    }
}

/// The outcome of one stage execution.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// The stage name.
    pub stage: String,
    /// How the stage ended.
    pub status: StageStatus,
    /// Control signal, if any.
    pub action: Option<StageAction>,
    /// Escalation or skip reason.
    pub reason: Option<String>,
    /// The budget that was exceeded, for timeouts.
    pub timeout_ms: Option<u64>,
    /// The error message, for failures.
    pub error: Option<String>,
    /// Node output plus injected metadata.
    pub payload: ContextMap,
    /// Number of node invocations.
    pub attempts: u32,
    /// Wall time spent in the stage, in milliseconds.
    pub duration_ms: f64,
    /// When the result was produced.
    pub completed_at: Timestamp,
}

impl StageResult {
    fn base(stage: impl Into<String>, status: StageStatus) -> Self {
        Self {
            stage: stage.into(),
            status,
            action: None,
            reason: None,
            timeout_ms: None,
            error: None,
            payload: ContextMap::new(),
            attempts: 0,
            duration_ms: 0.0,
            completed_at: now_utc(),
        }
    }

    /// Creates a successful result.
    #[must_use]
    pub fn ok(stage: impl Into<String>, payload: ContextMap) -> Self {
        Self {
            payload,
            ..Self::base(stage, StageStatus::Ok)
        }
    }

    /// Creates a skipped result.
    #[must_use]
    pub fn skipped(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::base(stage, StageStatus::Skipped)
        }
    }

    /// Creates an escalation result.
    #[must_use]
    pub fn escalated(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: Some(StageAction::Escalate),
            reason: Some(reason.into()),
            ..Self::base(stage, StageStatus::Escalated)
        }
    }

    /// Creates a timeout result.
    #[must_use]
    pub fn timed_out(stage: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            action: Some(StageAction::Timeout),
            timeout_ms: Some(timeout_ms),
            ..Self::base(stage, StageStatus::TimedOut)
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(stage: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(stage, StageStatus::Error)
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: ContextMap) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the attempt count and duration.
    #[must_use]
    pub fn with_timing(mut self, attempts: u32, duration_ms: f64) -> Self {
        self.attempts = attempts;
        self.duration_ms = duration_ms;
        self
    }

    /// Returns true if the output can be used as a pipeline answer.
    #[must_use]
    pub fn is_viable(&self) -> bool {
        self.status == StageStatus::Ok
    }

    /// Returns true if the result stops the pipeline.
    #[must_use]
    pub fn is_halting(&self) -> bool {
        matches!(
            self.status,
            StageStatus::Escalated | StageStatus::TimedOut | StageStatus::Error
        )
    }

    /// Stamps parallel-mode metadata into the payload.
    pub fn tag_parallel(&mut self, batch_index: usize) {
        self.payload.insert(
            PARALLEL_KEY.to_string(),
            json!({
                "batch_index": batch_index,
                "execution_mode": "parallel",
            }),
        );
    }

    /// Returns the parallel batch index, if tagged.
    #[must_use]
    pub fn batch_index(&self) -> Option<u64> {
        self.payload
            .get(PARALLEL_KEY)
            .and_then(|p| p.get("batch_index"))
            .and_then(serde_json::Value::as_u64)
    }

    /// Converts to the flat map representation.
    ///
    /// Payload fields sit at the top level next to `stage`, `status`,
    /// `action`, `reason`, `timeout_ms` and `error`.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        let mut map: serde_json::Map<String, serde_json::Value> = self
            .payload
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        map.insert("stage".to_string(), json!(self.stage));
        map.insert("status".to_string(), json!(self.status.to_string()));
        if let Some(action) = self.action {
            map.insert("action".to_string(), json!(action.as_str()));
        }
        if let Some(ref reason) = self.reason {
            map.insert("reason".to_string(), json!(reason));
        }
        if let Some(timeout_ms) = self.timeout_ms {
            map.insert("timeout_ms".to_string(), json!(timeout_ms));
        }
        if let Some(ref error) = self.error {
            map.insert("error".to_string(), json!(error));
        }
        map.insert("attempts".to_string(), json!(self.attempts));
        map.insert("duration_ms".to_string(), json!(self.duration_ms));
        map.insert(
            "completed_at".to_string(),
            json!(format_timestamp(&self.completed_at)),
        );

        serde_json::Value::Object(map)
    }
}

impl Serialize for StageResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
