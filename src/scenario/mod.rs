//! What-if simulation
//!
//! A simulation applies hypothetical changes to an [`Overlay`] borrowed from
//! a read guard and compares capacity before and after. The overlay is
//! dropped with the call; there is no commit path.

pub mod overlay;
pub mod simulator;

use crate::cancel::Interrupted;
use crate::graph::GraphError;
use crate::matching::MatchError;
use crate::requirement::RequirementError;
use thiserror::Error;

pub use overlay::Overlay;
pub use simulator::{AppliedChange, ImpactReport, LoadChange, ScenarioSimulator};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown candidate: {0}")]
    UnknownCandidate(String),

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;
