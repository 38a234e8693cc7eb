//! Interaction modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Active interaction mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every click dispatches the accumulated point list
    #[default]
    Click,
    /// Two corner points dispatch once the box is armed
    Box,
    /// Whole-image automatic segmentation
    Everything,
    /// Local decoder over a precomputed embedding
    Embedding,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Click => "click",
            Mode::Box => "box",
            Mode::Everything => "everything",
            Mode::Embedding => "embedding",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "click" => Ok(Mode::Click),
            "box" => Ok(Mode::Box),
            "everything" => Ok(Mode::Everything),
            "embedding" => Ok(Mode::Embedding),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}
