//! Run phases and modes.

use crate::tree::NodeRole;
use serde::{Deserialize, Serialize};

/// One batch of the run. Phases always execute in declaration order; a phase starts only
/// after every task of the previous one has finished.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Indicators,
    Factors,
    Dimensions,
    Analysis,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Indicators,
        Phase::Factors,
        Phase::Dimensions,
        Phase::Analysis,
    ];

    /// Role of the nodes this phase runs.
    pub fn role(self) -> NodeRole {
        match self {
            Phase::Indicators => NodeRole::Indicator,
            Phase::Factors => NodeRole::Factor,
            Phase::Dimensions => NodeRole::Dimension,
            Phase::Analysis => NodeRole::Analysis,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Indicators => "indicators",
            Phase::Factors => "factors",
            Phase::Dimensions => "dimensions",
            Phase::Analysis => "analysis",
        }
    }

    /// `requested` in execution order without duplicates; empty means every phase.
    pub fn ordered(requested: &[Phase]) -> Vec<Phase> {
        if requested.is_empty() {
            return Self::ALL.to_vec();
        }
        let mut phases = requested.to_vec();
        phases.sort();
        phases.dedup();
        phases
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Clear every result first, then run everything that is not excluded
    #[default]
    All,
    /// Run only nodes without a result file
    Incomplete,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::All => "all",
            RunMode::Incomplete => "incomplete",
        }
    }
}
