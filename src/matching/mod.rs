//! Team matching
//!
//! Two-stage search over the candidate pool. The strict stage wants at
//! least one required skill, the requested location and free capacity;
//! the fallback stage keeps only the capacity filter and fills whatever the
//! strict stage left open. Every pick is written through an
//! [`AssignmentSink`], which applies the clamp-to-headroom policy.

pub mod engine;
pub mod sink;

use crate::cancel::Interrupted;
use crate::graph::{EdgeId, GraphError, NodeId};
use crate::requirement::RequirementError;
use crate::scoring::ScoreCard;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use engine::{candidate_pool, MatchingEngine};
pub use sink::{AssignmentSink, DryRunSink, Placement, StoreSink};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("Project '{0}' is historical and takes no new assignments")]
    ClosedProject(String),
}

pub type MatchResult<T> = Result<T, MatchError>;

/// Which stage produced a pick, or the last stage a search ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Strict,
    Fallback,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Strict => write!(f, "strict"),
            Stage::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Compute the team and projected loads without writing anything
    pub dry_run: bool,
}

impl MatchOptions {
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub node: NodeId,
    pub candidate_id: String,
    pub name: String,
    pub location: Option<String>,
    pub stage: Stage,
    pub score: ScoreCard,
    pub previous_load: f64,
    pub granted: f64,
    pub new_load: f64,
    /// `None` for dry runs
    pub edge: Option<EdgeId>,
}

impl TeamMember {
    pub fn was_clamped(&self, requested: f64) -> bool {
        self.granted + crate::graph::staffing::ALLOCATION_EPSILON < requested
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamAssignment {
    pub project_id: String,
    pub filled: Vec<TeamMember>,
    /// Seats left open after both stages; zero when fully staffed
    pub gaps: usize,
    pub stage: Stage,
    pub dry_run: bool,
}

impl TeamAssignment {
    pub fn is_complete(&self) -> bool {
        self.gaps == 0
    }

    pub fn members_from(&self, stage: Stage) -> impl Iterator<Item = &TeamMember> {
        self.filled.iter().filter(move |m| m.stage == stage)
    }
}
