//! Competing candidate answers.

use crate::context::ContextMap;
use crate::stages::StageResult;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};

/// Payload fields that turn a stage output into a competing proposal.
pub const PROPOSAL_FIELDS: [&str; 3] = ["confidence", "ethics_risk", "role_weight"];

/// Confidence of a viable output that does not report one.
///
/// Unrated outputs can still win, but never outrank a rated one.
pub const DEFAULT_CONFIDENCE: f64 = 0.0;

/// Returns true if `payload` carries any of [`PROPOSAL_FIELDS`].
#[must_use]
pub fn carries_proposal_fields(payload: &ContextMap) -> bool {
    PROPOSAL_FIELDS.iter().any(|key| payload.contains_key(*key))
}

/// One candidate final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Identifier of the form `"<index>:<stage>"`.
    pub id: String,
    /// Index of the originating entry in `stage_results`.
    pub source_index: usize,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// When the proposal was produced.
    pub ts: Timestamp,
    /// Ethics risk in [0, 1]; lower is safer.
    pub ethics_risk: f64,
    /// Weight of the proposing role in [0, 1].
    pub role_weight: f64,
    /// Free-text justification from the stage.
    pub rationale: String,
}

impl Proposal {
    /// Creates a proposal. Numeric fields are clamped to [0, 1]; a NaN
    /// ethics risk counts as the riskiest value.
    #[must_use]
    pub fn new(id: impl Into<String>, source_index: usize, confidence: f64, ts: Timestamp) -> Self {
        Self {
            id: id.into(),
            source_index,
            confidence: clamp_unit(confidence),
            ts,
            ethics_risk: 0.0,
            role_weight: 1.0,
            rationale: String::new(),
        }
    }

    /// Sets the ethics risk.
    #[must_use]
    pub fn with_ethics_risk(mut self, risk: f64) -> Self {
        self.ethics_risk = if risk.is_nan() { 1.0 } else { clamp_unit(risk) };
        self
    }

    /// Sets the role weight.
    #[must_use]
    pub fn with_role_weight(mut self, weight: f64) -> Self {
        self.role_weight = clamp_unit(weight);
        self
    }

    /// Sets the rationale.
    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// Builds a proposal from a viable stage output.
    ///
    /// Returns `None` for non-viable results. A missing or non-numeric
    /// `confidence` becomes [`DEFAULT_CONFIDENCE`]; `ethics_risk` defaults
    /// to 0, `role_weight` to 1.
    #[must_use]
    pub fn from_stage_result(index: usize, result: &StageResult) -> Option<Self> {
        if !result.is_viable() {
            return None;
        }

        let payload = &result.payload;
        let number = |key: &str, default: f64| {
            payload
                .get(key)
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(default)
        };
        let rationale = payload
            .get("rationale")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        Some(
            Self::new(
                format!("{index}:{}", result.stage),
                index,
                number("confidence", DEFAULT_CONFIDENCE),
                result.completed_at,
            )
                .with_ethics_risk(number("ethics_risk", 0.0))
                .with_role_weight(number("role_weight", 1.0))
                .with_rationale(rationale),
        )
    }

    /// Ranking score: `confidence * role_weight`.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.confidence * self.role_weight
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::from_value;
    use crate::utils::now_utc;
    use serde_json::json;

    #[test]
    fn test_from_stage_result_reads_fields() {
        let result = StageResult::ok(
            "THOUGHT",
            from_value(json!({
                "confidence": 0.7,
                "ethics_risk": 0.2,
                "role_weight": 0.5,
                "rationale": "grounded in memory",
            })),
        );

        let proposal = Proposal::from_stage_result(3, &result).unwrap();
        assert_eq!(proposal.id, "3:THOUGHT");
        assert_eq!(proposal.source_index, 3);
        assert_eq!(proposal.confidence, 0.7);
        assert_eq!(proposal.ethics_risk, 0.2);
        assert_eq!(proposal.role_weight, 0.5);
        assert_eq!(proposal.rationale, "grounded in memory");
        assert_eq!(proposal.ts, result.completed_at);
        assert!((proposal.score() - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_from_stage_result_defaults() {
        let result = StageResult::ok("INTENT", from_value(json!({"confidence": 0.4})));
        let proposal = Proposal::from_stage_result(0, &result).unwrap();

        assert_eq!(proposal.ethics_risk, 0.0);
        assert_eq!(proposal.role_weight, 1.0);
        assert!(proposal.rationale.is_empty());
    }

    #[test]
    fn test_unrated_output_gets_default_confidence() {
        let no_conf = StageResult::ok("THOUGHT", from_value(json!({"answer": "safe"})));
        let proposal = Proposal::from_stage_result(1, &no_conf).unwrap();
        assert_eq!(proposal.id, "1:THOUGHT");
        assert_eq!(proposal.confidence, DEFAULT_CONFIDENCE);

        let text_conf = StageResult::ok("INTENT", from_value(json!({"confidence": "high"})));
        assert_eq!(
            Proposal::from_stage_result(0, &text_conf).unwrap().confidence,
            DEFAULT_CONFIDENCE
        );
    }

    #[test]
    fn test_from_stage_result_requires_viability() {
        let skipped = StageResult::skipped("INTENT", "node_not_registered");
        assert!(Proposal::from_stage_result(0, &skipped).is_none());

        let errored = StageResult::error("INTENT", "boom");
        assert!(Proposal::from_stage_result(0, &errored).is_none());
    }

    #[test]
    fn test_values_clamped() {
        let proposal = Proposal::new("0:A", 0, 1.7, now_utc())
            .with_ethics_risk(-0.3)
            .with_role_weight(f64::NAN);

        assert_eq!(proposal.confidence, 1.0);
        assert_eq!(proposal.ethics_risk, 0.0);
        assert_eq!(proposal.role_weight, 0.0);
    }

    #[test]
    fn test_nan_ethics_risk_is_riskiest() {
        let proposal = Proposal::new("0:A", 0, 0.5, now_utc()).with_ethics_risk(f64::NAN);
        assert_eq!(proposal.ethics_risk, 1.0);
    }

    #[test]
    fn test_carries_proposal_fields() {
        assert!(carries_proposal_fields(&from_value(json!({"ethics_risk": 0.9}))));
        assert!(carries_proposal_fields(&from_value(json!({"role_weight": 0.5}))));
        assert!(carries_proposal_fields(&from_value(json!({"confidence": 0.1}))));
        assert!(!carries_proposal_fields(&from_value(json!({"thought": "x"}))));
    }
}
