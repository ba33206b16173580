//! Loop control for reprocessing pipelines.

mod oscillation;

pub use oscillation::{OscillationDetector, OSCILLATION_DETECTED, WINDOW_CAPACITY};
