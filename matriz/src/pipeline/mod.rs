//! Pipeline execution.
//!
//! This module provides:
//! - Batch planning for parallel execution
//! - The sequential/parallel/adaptive orchestrator
//! - Pipeline results and escalation reasons

mod adaptive;
mod batch;
mod orchestrator;
mod result;


pub use adaptive::{adaptive_mode, LONG_QUERY_CHARS, MANY_STAGES};
pub use batch::BatchPlanner;
pub use orchestrator::{PipelineOrchestrator, NODE_NOT_REGISTERED};
pub use result::{EscalationReason, ExecutionMode, PipelineResult, PipelineState};
