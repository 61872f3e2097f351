use serde::{Deserialize, Serialize};

use crate::obligation::ObligationPriority;

/// Tuning knobs for a PDR run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdrOptions {
    /// Wall-clock budget for the whole run; 0 disables it.
    pub timeout_secs: u64,
    /// Budget for each individual solver check; 0 disables it.
    pub solver_timeout_secs: u64,
    /// Number of frames to open before giving up; 0 means unbounded.
    pub max_frames: usize,
    /// Shrink blocked cubes to the literals of the unsat core.
    pub generalize: bool,
    pub obligation_priority: ObligationPriority,
}

impl Default for PdrOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            solver_timeout_secs: 0,
            max_frames: 0,
            generalize: true,
            obligation_priority: ObligationPriority::FrameLevel,
        }
    }
}

impl PdrOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
