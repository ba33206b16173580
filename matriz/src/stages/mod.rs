//! Stage configuration, results and execution.
//!
//! A stage is one named step of a pipeline. Its [`StageConfig`] carries the
//! timeout and retry policy, [`StageRunner`] enforces it against a node, and
//! every attempt yields a [`StageResult`].

mod config;
mod constellation;
mod result;
mod runner;

pub use config::{
    StageConfig, StageConfigInput, DEFAULT_BACKOFF_BASE_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT_MS,
};
pub use constellation::{constellation_tag, Star, CONSTELLATION_KEY};
pub use result::{StageAction, StageResult, StageStatus, DEFAULT_ESCALATION_REASON, PARALLEL_KEY};
pub use runner::StageRunner;
