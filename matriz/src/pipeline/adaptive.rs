//! Sequential/parallel selection heuristic.

use super::ExecutionMode;

/// Queries longer than this many characters favour parallel execution.
pub const LONG_QUERY_CHARS: usize = 100;

/// Pipelines with more stages than this favour parallel execution.
pub const MANY_STAGES: usize = 3;

/// Chooses the execution mode for a call.
///
/// Parallel iff parallel execution is enabled, the query is long or the
/// pipeline has many stages, and there are at least two stages.
#[must_use]
pub fn adaptive_mode(parallel_enabled: bool, query_len: usize, stage_count: usize) -> ExecutionMode {
    let heavy = query_len > LONG_QUERY_CHARS || stage_count > MANY_STAGES;

    if parallel_enabled && heavy && stage_count >= 2 {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Sequential
    }
}
