//! # MATRIZ
//!
//! A staged asynchronous pipeline orchestrator.
//!
//! MATRIZ drives a list of named stages against pluggable nodes with:
//!
//! - **Bounded execution**: per-stage timeouts and exponential-backoff retries
//! - **Loop breaking**: A-B-A-B oscillation detection across stage executions
//! - **Parallel batches**: fixed-size batches launched and joined together
//! - **Adaptive mode**: a deterministic sequential/parallel heuristic
//! - **Arbitration**: ethics-gated selection among competing stage outputs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use matriz::prelude::*;
//!
//! let registry = Arc::new(NodeRegistry::new());
//! registry.register("INTENT", Arc::new(IntentNode::new()));
//!
//! let orchestrator = PipelineOrchestrator::new(OrchestratorConfig::default(), registry);
//! orchestrator.configure_stages(vec![StageConfigInput::named("INTENT")])?;
//!
//! let result = orchestrator.process_query(context).await;
//! assert!(result.success);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod arbitration;
pub mod config;
pub mod context;
pub mod control;
pub mod errors;
pub mod nodes;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::arbitration::{ArbitrationOutcome, Proposal, ProposalArbiter, Rationale};
    pub use crate::config::{OrchestratorConfig, OscillationScope, PipelineDefinition};
    pub use crate::context::ContextMap;
    pub use crate::control::OscillationDetector;
    pub use crate::errors::{NodeError, OrchestratorError, ResolveError};
    pub use crate::nodes::{FnNode, HealthCheck, Node, NodeHealth, NodeRegistry, NodeResolver};
    pub use crate::observability::{
        CollectingMetricsSink, LoggingMetricsSink, MetricsSink, NoOpMetricsSink, Telemetry,
    };
    pub use crate::pipeline::{
        BatchPlanner, EscalationReason, ExecutionMode, PipelineOrchestrator, PipelineResult,
        PipelineState,
    };
    pub use crate::stages::{StageAction, StageConfig, StageConfigInput, StageResult, StageRunner, StageStatus};
}
