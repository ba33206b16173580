//! Pipeline outcomes.

use crate::arbitration::Rationale;
use crate::control::OSCILLATION_DETECTED;
use crate::context::ContextMap;
use crate::stages::StageResult;
use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Why a pipeline run did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EscalationReason {
    /// A stage would have repeated an A-B-A-B pattern.
    OscillationDetected,
    /// The orchestrator is disabled.
    AsyncDisabled,
    /// The parallel entrypoint was called while async is disabled.
    ParallelDisabled,
    /// No stage produced a usable output.
    NoViableResults,
    /// A node failed on every attempt.
    StageError,
    /// A stage exceeded its budget.
    StageTimeout,
    /// Arbitration received no proposals.
    NoProposals,
    /// Every proposal was disqualified.
    NoViableProposals,
    /// A reason supplied by the stage itself.
    Stage(String),
}

impl EscalationReason {
    /// Returns the wire name of the reason.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::OscillationDetected => OSCILLATION_DETECTED,
            Self::AsyncDisabled => "async_disabled",
            Self::ParallelDisabled => "parallel_disabled",
            Self::NoViableResults => "no_viable_results",
            Self::StageError => "stage_error",
            Self::StageTimeout => "stage_timeout",
            Self::NoProposals => "no_proposals",
            Self::NoViableProposals => "no_viable_proposals",
            Self::Stage(reason) => reason,
        }
    }

    /// Maps a stage escalation reason onto a known variant when possible.
    #[must_use]
    pub fn from_stage_reason(reason: &str) -> Self {
        match reason {
            OSCILLATION_DETECTED => Self::OscillationDetected,
            other => Self::Stage(other.to_string()),
        }
    }
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EscalationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// States of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// The orchestrator is switched off.
    Disabled,
    /// Stages are executing.
    Running,
    /// A stage or the result assembly halted the run.
    Escalated,
    /// Competing outputs are being arbitrated.
    Arbitrating,
    /// The run produced an output.
    Complete,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Running => write!(f, "running"),
            Self::Escalated => write!(f, "escalated"),
            Self::Arbitrating => write!(f, "arbitrating"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// How stages were driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One stage at a time.
    Sequential,
    /// Fixed-size batches run concurrently.
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

/// The result of one pipeline call.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Unique id of the call.
    pub run_id: Uuid,
    /// Whether the run produced an output.
    pub success: bool,
    /// The final output.
    pub output: ContextMap,
    /// Per-stage results in execution order.
    pub stage_results: Vec<StageResult>,
    /// Arbitration trail, when arbitration ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<Rationale>,
    /// Failure cause, when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<EscalationReason>,
    /// How stages were driven.
    pub mode: ExecutionMode,
    /// Wall time of the call in milliseconds.
    pub duration_ms: f64,
}

impl PipelineResult {
    pub(crate) fn new(run_id: Uuid, mode: ExecutionMode) -> Self {
        Self {
            run_id,
            success: false,
            output: ContextMap::new(),
            stage_results: Vec::new(),
            rationale: None,
            escalation_reason: None,
            mode,
            duration_ms: 0.0,
        }
    }

    /// Returns the terminal state of the run.
    #[must_use]
    pub fn final_state(&self) -> PipelineState {
        match (&self.escalation_reason, self.success) {
            (Some(EscalationReason::AsyncDisabled | EscalationReason::ParallelDisabled), _) => {
                PipelineState::Disabled
            }
            (_, true) => PipelineState::Complete,
            _ => PipelineState::Escalated,
        }
    }

    /// Returns the wire name of the escalation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.escalation_reason.as_ref().map(EscalationReason::as_str)
    }
}
