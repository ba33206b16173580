//! Testing utilities for MATRIZ pipelines.
//!
//! This module provides:
//! - Mock nodes covering success, failure, flakiness, latency and escalation
//! - A panicking metrics sink
//! - Pipeline fixtures and result assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_escalated_with, assert_output_contains, assert_pipeline_succeeded,
    assert_stage_order, assert_stage_statuses,
};
pub use fixtures::{query_context, TestPipeline};
pub use mocks::{
    EscalatingNode, FailingNode, FlakyNode, PanickingMetricsSink, PanickingNode, RecordingNode,
    SlowNode, StaticNode,
};
