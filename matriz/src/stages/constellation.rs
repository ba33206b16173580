//! Constellation tagging for stage outputs.
//!
//! Every successful stage output is stamped with the "star" its stage maps
//! to. The tag is observability metadata only.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Payload key of the injected constellation metadata.
pub const CONSTELLATION_KEY: &str = "_constellation";

/// The star a stage name maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Star {
    /// `INTENT`
    Awareness,
    /// `THOUGHT`
    Memory,
    /// `VISION`
    Perception,
    /// `DECISION`
    Guardian,
    /// Any other stage.
    Unknown,
}

impl Star {
    /// Looks up the star for a stage name. Matching is exact.
    #[must_use]
    pub fn for_stage(stage: &str) -> Self {
        match stage {
            "INTENT" => Self::Awareness,
            "THOUGHT" => Self::Memory,
            "VISION" => Self::Perception,
            "DECISION" => Self::Guardian,
            _ => Self::Unknown,
        }
    }

    /// Returns the star name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Awareness => "Awareness",
            Self::Memory => "Memory",
            Self::Perception => "Perception",
            Self::Guardian => "Guardian",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Star {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the `_constellation` value for a stage.
#[must_use]
pub fn constellation_tag(stage: &str, timestamp: &str) -> serde_json::Value {
    json!({
        "star": Star::for_stage(stage).as_str(),
        "stage": stage,
        "timestamp": timestamp,
    })
}
