//! Test assertions for pipeline results.

use crate::pipeline::PipelineResult;
use crate::stages::StageStatus;

/// Asserts that the run succeeded.
pub fn assert_pipeline_succeeded(result: &PipelineResult) {
    assert!(
        result.success,
        "Expected success, got escalation: {:?}",
        result.escalation_reason
    );
}

/// Asserts that the run escalated with `reason`.
pub fn assert_escalated_with(result: &PipelineResult, reason: &str) {
    assert!(!result.success, "Expected escalation '{reason}', got success");
    assert_eq!(
        result.reason(),
        Some(reason),
        "Expected escalation reason '{}', got {:?}",
        reason,
        result.reason()
    );
}

/// Asserts the status of every stage result, in order.
pub fn assert_stage_statuses(result: &PipelineResult, expected: &[StageStatus]) {
    let actual: Vec<StageStatus> = result.stage_results.iter().map(|r| r.status).collect();
    assert_eq!(
        actual, expected,
        "Expected stage statuses {expected:?}, got {actual:?}"
    );
}

/// Asserts the stage names of every stage result, in order.
pub fn assert_stage_order(result: &PipelineResult, expected: &[&str]) {
    let actual: Vec<&str> = result.stage_results.iter().map(|r| r.stage.as_str()).collect();
    assert_eq!(actual, expected, "Unexpected stage order");
}

/// Asserts that the output contains `key`.
pub fn assert_output_contains(result: &PipelineResult, key: &str) {
    assert!(
        result.output.contains_key(key),
        "Expected output to contain key '{}'. Keys: {:?}",
        key,
        result.output.keys().collect::<Vec<_>>()
    );
}
