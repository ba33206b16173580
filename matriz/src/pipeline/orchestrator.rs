//! The pipeline orchestrator: sequential, parallel and adaptive drivers.

use super::{adaptive_mode, BatchPlanner, EscalationReason, ExecutionMode, PipelineResult, PipelineState};
use crate::arbitration::{carries_proposal_fields, ArbitrationDecision, Proposal, ProposalArbiter};
use crate::config::{OrchestratorConfig, OscillationScope, PipelineDefinition};
use crate::context::{merge_into, query_len, ContextMap};
use crate::errors::OrchestratorError;
use crate::nodes::{Node, NodeHealthEntry, NodeResolver};
use crate::observability::{names, MetricsSink, Telemetry};
use crate::stages::{
    StageConfig, StageConfigInput, StageResult, StageRunner, StageStatus, DEFAULT_ESCALATION_REASON,
};
use crate::utils::generate_run_id;
use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Skip reason recorded for stages without a registered node.
pub const NODE_NOT_REGISTERED: &str = "node_not_registered";

/// Drives configured stages against resolved nodes.
///
/// The stage list can be reconfigured at any time; each call works on a
/// snapshot taken when it starts. Calls never fail: every outcome is a
/// [`PipelineResult`].
pub struct PipelineOrchestrator {
    config: OrchestratorConfig,
    resolver: Arc<dyn NodeResolver>,
    telemetry: Telemetry,
    arbiter: ProposalArbiter,
    stages: RwLock<Arc<Vec<StageConfig>>>,
    runner: StageRunner,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("config", &self.config)
            .field("stages", &self.stages.read().len())
            .field("arbiter", &self.arbiter)
            .finish_non_exhaustive()
    }
}

impl PipelineOrchestrator {
    /// Creates an orchestrator with no stages and a no-op metrics sink.
    #[must_use]
    pub fn new(config: OrchestratorConfig, resolver: Arc<dyn NodeResolver>) -> Self {
        let telemetry = Telemetry::noop();
        Self {
            config,
            resolver,
            runner: StageRunner::new(telemetry.clone()),
            telemetry,
            arbiter: ProposalArbiter::new(),
            stages: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Creates an orchestrator from a pipeline definition.
    pub fn from_definition(
        definition: &PipelineDefinition,
        resolver: Arc<dyn NodeResolver>,
    ) -> Result<Self, OrchestratorError> {
        definition.config.validate()?;
        let stages = definition.stage_configs()?;

        let orchestrator = Self::new(definition.config.clone(), resolver);
        *orchestrator.stages.write() = Arc::new(stages);
        Ok(orchestrator)
    }

    /// Sets the telemetry handle. The oscillation window is kept.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.runner = StageRunner::with_detector(self.runner.detector().clone(), telemetry.clone());
        self.telemetry = telemetry;
        self
    }

    /// Sets the metrics sink.
    #[must_use]
    pub fn with_sink(self, sink: Arc<dyn MetricsSink>) -> Self {
        self.with_telemetry(Telemetry::new(sink))
    }

    /// Sets the arbiter used for competing outputs.
    #[must_use]
    pub fn with_arbiter(mut self, arbiter: ProposalArbiter) -> Self {
        self.arbiter = arbiter;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Replaces the stage list.
    ///
    /// Missing fields take the defaults. Nothing changes if any input is
    /// invalid.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidStage`] for a blank name or a
    /// zero `timeout_ms` or `backoff_base_ms`.
    pub fn configure_stages<I>(&self, inputs: I) -> Result<(), OrchestratorError>
    where
        I: IntoIterator<Item = StageConfigInput>,
    {
        let stages = inputs
            .into_iter()
            .map(StageConfig::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = stages.len(), "Configured stages");
        *self.stages.write() = Arc::new(stages);
        Ok(())
    }

    /// Returns a snapshot of the stage list.
    #[must_use]
    pub fn stages(&self) -> Arc<Vec<StageConfig>> {
        Arc::clone(&self.stages.read())
    }

    /// Returns the number of configured stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.read().len()
    }

    /// Returns the shared oscillation window, oldest first.
    #[must_use]
    pub fn oscillation_window(&self) -> Vec<String> {
        self.runner.detector().lock().window()
    }

    /// Clears the shared oscillation window.
    pub fn reset_oscillation(&self) {
        self.runner.detector().lock().reset();
        debug!("Oscillation window reset");
    }

    /// Chooses the mode [`process_adaptive`](Self::process_adaptive) would use.
    #[must_use]
    pub fn choose_mode(&self, query_len: usize, stage_count: usize) -> ExecutionMode {
        adaptive_mode(self.config.parallel_enabled, query_len, stage_count)
    }

    /// Probes the node behind every configured stage.
    pub async fn health_report(&self) -> Vec<NodeHealthEntry> {
        let stages = self.stages();
        let mut entries = Vec::with_capacity(stages.len());

        for config in stages.iter() {
            let entry = match self.resolver.resolve(config.name()) {
                Ok(node) => {
                    let health = match node.health_check() {
                        Some(check) => Some(check.check_health().await),
                        None => None,
                    };
                    NodeHealthEntry {
                        stage: config.name().to_string(),
                        registered: true,
                        health,
                    }
                }
                Err(_) => NodeHealthEntry {
                    stage: config.name().to_string(),
                    registered: false,
                    health: None,
                },
            };
            entries.push(entry);
        }

        entries
    }

    /// Runs the stages one after another.
    pub async fn process_query(&self, context: ContextMap) -> PipelineResult {
        let run_id = generate_run_id();
        let start = Instant::now();

        let mut result = if self.config.async_enabled {
            let span = info_span!("pipeline", run_id = %run_id, mode = "sequential");
            self.run_sequential(run_id, context).instrument(span).await
        } else {
            disabled(run_id, ExecutionMode::Sequential, EscalationReason::AsyncDisabled)
        };

        finish(&mut result, start);
        result
    }

    /// Runs the stages in fixed-size concurrent batches.
    ///
    /// Falls back to sequential execution when parallelism is disabled.
    pub async fn process_query_parallel(&self, context: ContextMap) -> PipelineResult {
        if !self.config.async_enabled {
            let start = Instant::now();
            let mut result = disabled(
                generate_run_id(),
                ExecutionMode::Parallel,
                EscalationReason::ParallelDisabled,
            );
            finish(&mut result, start);
            return result;
        }
        if !self.config.parallel_enabled {
            debug!("Parallel execution disabled; running sequentially");
            return self.process_query(context).await;
        }

        let run_id = generate_run_id();
        let start = Instant::now();
        let span = info_span!("pipeline", run_id = %run_id, mode = "parallel");
        let mut result = self.run_parallel(run_id, context).instrument(span).await;

        finish(&mut result, start);
        result
    }

    /// Picks sequential or parallel execution from the query and stage list.
    pub async fn process_adaptive(&self, context: ContextMap) -> PipelineResult {
        let mode = self.choose_mode(query_len(&context), self.stage_count());
        debug!(mode = %mode, "Adaptive mode selected");

        match mode {
            ExecutionMode::Parallel => self.process_query_parallel(context).await,
            ExecutionMode::Sequential => self.process_query(context).await,
        }
    }

    fn runner_for_call(&self) -> StageRunner {
        match self.config.oscillation_scope {
            OscillationScope::Shared => self.runner.clone(),
            OscillationScope::PerCall => StageRunner::new(self.telemetry.clone()),
        }
    }

    async fn run_sequential(&self, run_id: Uuid, mut context: ContextMap) -> PipelineResult {
        let stages = self.stages();
        let runner = self.runner_for_call();
        let mut result = PipelineResult::new(run_id, ExecutionMode::Sequential);
        transition(PipelineState::Running);

        for config in stages.iter() {
            let stage_result = self.execute_stage(&runner, config, &context).await;

            if let Some(reason) = halt_reason(&stage_result) {
                result.output = halt_output(&stage_result);
                result.stage_results.push(stage_result);
                return escalate(result, reason);
            }

            if stage_result.is_viable() {
                merge_into(&mut context, &stage_result.payload);
            }
            result.stage_results.push(stage_result);
        }

        self.assemble(result, context)
    }

    async fn run_parallel(&self, run_id: Uuid, mut context: ContextMap) -> PipelineResult {
        let stages = self.stages();
        let runner = self.runner_for_call();
        let batches = BatchPlanner::plan(&stages, self.config.max_parallel_stages);
        let mut result = PipelineResult::new(run_id, ExecutionMode::Parallel);
        transition(PipelineState::Running);

        for (batch_index, batch) in batches.iter().enumerate() {
            let span = info_span!("batch", batch_index, size = batch.len());
            let batch_start = Instant::now();

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|config| self.execute_stage(&runner, config, &context)),
            )
            .instrument(span)
            .await;

            let batch_ms = batch_start.elapsed().as_secs_f64() * 1000.0;
            let index_label = batch_index.to_string();
            self.telemetry.observe(
                names::PARALLEL_BATCH_DURATION,
                batch_ms,
                &[("batch_index", index_label.as_str())],
            );
            debug!(batch_index, size = batch.len(), duration_ms = batch_ms, "Batch finished");

            let mut halt = None;
            for mut stage_result in outcomes {
                if halt.is_none() {
                    if let Some(reason) = halt_reason(&stage_result) {
                        result.output = halt_output(&stage_result);
                        halt = Some(reason);
                    }
                }
                if stage_result.is_viable() {
                    merge_into(&mut context, &stage_result.payload);
                }
                stage_result.tag_parallel(batch_index);
                result.stage_results.push(stage_result);
            }

            if let Some(reason) = halt {
                return escalate(result, reason);
            }
        }

        self.assemble(result, context)
    }

    /// Resolves and runs one stage, folding every failure into the result.
    async fn execute_stage(
        &self,
        runner: &StageRunner,
        config: &StageConfig,
        context: &ContextMap,
    ) -> StageResult {
        let node: Arc<dyn Node> = match self.resolver.resolve(config.name()) {
            Ok(node) => node,
            Err(err) => {
                debug!(stage = %config.name(), error = %err, "Skipping unregistered stage");
                return StageResult::skipped(config.name(), NODE_NOT_REGISTERED);
            }
        };

        let start = Instant::now();
        match runner.run(config, node.as_ref(), context).await {
            Ok(stage_result) => stage_result,
            Err(err) => StageResult::error(config.name(), err.to_string()).with_timing(
                config.attempt_budget(),
                start.elapsed().as_secs_f64() * 1000.0,
            ),
        }
    }

    fn assemble(&self, mut result: PipelineResult, context: ContextMap) -> PipelineResult {
        let viable: Vec<usize> = result
            .stage_results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_viable())
            .map(|(index, _)| index)
            .collect();

        match viable.as_slice() {
            [] => escalate(result, EscalationReason::NoViableResults),
            [only] => {
                result.output = result.stage_results[*only].payload.clone();
                complete(result)
            }
            many => {
                let contested = many
                    .iter()
                    .any(|&index| carries_proposal_fields(&result.stage_results[index].payload));

                if contested {
                    let proposals: Vec<Proposal> = many
                        .iter()
                        .filter_map(|&index| Proposal::from_stage_result(index, &result.stage_results[index]))
                        .collect();
                    self.arbitrate(result, &proposals)
                } else {
                    // Refinement chain: every stage built on the previous one.
                    result.output = context;
                    complete(result)
                }
            }
        }
    }

    fn arbitrate(&self, mut result: PipelineResult, proposals: &[Proposal]) -> PipelineResult {
        transition(PipelineState::Arbitrating);

        let (winner, rationale) = self.arbiter.choose(proposals).into_parts();
        self.telemetry.increment(
            names::ARBITRATION_DECISIONS,
            &[("outcome", rationale.decision.as_str())],
        );
        info!(
            decision = %rationale.decision,
            winner = rationale.winner.as_deref().unwrap_or("none"),
            candidates = proposals.len(),
            "Arbitration finished"
        );

        let decision = rationale.decision;
        result.rationale = Some(rationale);

        match winner {
            Some(winner) => {
                if let Some(source) = result.stage_results.get(winner.source_index) {
                    result.output = source.payload.clone();
                }
                complete(result)
            }
            None => {
                let reason = match decision {
                    ArbitrationDecision::NoProposals => EscalationReason::NoProposals,
                    ArbitrationDecision::NoViableProposals | ArbitrationDecision::Selected => {
                        EscalationReason::NoViableProposals
                    }
                };
                escalate(result, reason)
            }
        }
    }
}

fn halt_reason(result: &StageResult) -> Option<EscalationReason> {
    match result.status {
        StageStatus::Escalated => Some(EscalationReason::from_stage_reason(
            result.reason.as_deref().unwrap_or(DEFAULT_ESCALATION_REASON),
        )),
        StageStatus::TimedOut => Some(EscalationReason::StageTimeout),
        StageStatus::Error => Some(EscalationReason::StageError),
        StageStatus::Ok | StageStatus::Skipped => None,
    }
}

fn halt_output(result: &StageResult) -> ContextMap {
    let mut output = ContextMap::new();
    if let Some(ref error) = result.error {
        output.insert("error".to_string(), json!(error));
        output.insert("stage".to_string(), json!(result.stage));
    }
    output
}

fn transition(state: PipelineState) {
    debug!(state = %state, "Pipeline state transition");
}

fn disabled(run_id: Uuid, mode: ExecutionMode, reason: EscalationReason) -> PipelineResult {
    transition(PipelineState::Disabled);
    info!(run_id = %run_id, reason = %reason, "Pipeline disabled");

    let mut result = PipelineResult::new(run_id, mode);
    result.escalation_reason = Some(reason);
    result
}

fn escalate(mut result: PipelineResult, reason: EscalationReason) -> PipelineResult {
    transition(PipelineState::Escalated);
    warn!(
        reason = %reason,
        stages = result.stage_results.len(),
        "Pipeline escalated"
    );

    result.success = false;
    result.escalation_reason = Some(reason);
    result
}

fn complete(mut result: PipelineResult) -> PipelineResult {
    transition(PipelineState::Complete);
    result.success = true;
    result.escalation_reason = None;
    result
}

fn finish(result: &mut PipelineResult, start: Instant) {
    result.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(
        run_id = %result.run_id,
        success = result.success,
        mode = %result.mode,
        stages = result.stage_results.len(),
        duration_ms = result.duration_ms,
        "Pipeline finished"
    );
}
