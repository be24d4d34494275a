//! Crate-level error taxonomy
//!
//! Module errors stay close to their modules; the service surface folds them
//! into [`StaffingError`]. An empty answer is never an error: it comes back
//! as [`QueryValue::NoData`](crate::query::QueryValue) or a zero count.

use crate::cancel::Interrupted;
use crate::config::ConfigError;
use crate::graph::{GraphError, RosterError};
use crate::llm::LlmError;
use crate::matching::MatchError;
use crate::query::QueryError;
use crate::requirement::RequirementError;
use crate::scenario::ScenarioError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StaffingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Store conflict: {0}")]
    StoreConflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

pub type StaffingResult<T> = Result<T, StaffingError>;

impl From<Interrupted> for StaffingError {
    fn from(e: Interrupted) -> Self {
        match e {
            Interrupted::Cancelled => StaffingError::Cancelled,
            Interrupted::DeadlineExceeded => StaffingError::DeadlineExceeded,
        }
    }
}

impl From<GraphError> for StaffingError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::AllocationExceeded { .. } | GraphError::DuplicateKey { .. } => {
                StaffingError::StoreConflict(e.to_string())
            }
            GraphError::Unavailable(reason) => StaffingError::StoreUnavailable(reason),
            other => StaffingError::Validation(other.to_string()),
        }
    }
}

impl From<RequirementError> for StaffingError {
    fn from(e: RequirementError) -> Self {
        StaffingError::Validation(e.to_string())
    }
}

impl From<LlmError> for StaffingError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout => StaffingError::UpstreamTimeout("language model request".to_string()),
            other => StaffingError::Upstream(other.to_string()),
        }
    }
}

impl From<MatchError> for StaffingError {
    fn from(e: MatchError) -> Self {
        match e {
            MatchError::Requirement(e) => e.into(),
            MatchError::Graph(e) => e.into(),
            MatchError::Interrupted(e) => e.into(),
            MatchError::ClosedProject(_) => StaffingError::Validation(e.to_string()),
        }
    }
}

impl From<QueryError> for StaffingError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Validation(reason) => StaffingError::Validation(reason),
            QueryError::Graph(e) => e.into(),
            QueryError::Interrupted(e) => e.into(),
        }
    }
}

impl From<ScenarioError> for StaffingError {
    fn from(e: ScenarioError) -> Self {
        match e {
            ScenarioError::Requirement(e) => e.into(),
            ScenarioError::Match(e) => e.into(),
            ScenarioError::Graph(e) => e.into(),
            ScenarioError::Interrupted(e) => e.into(),
            other => StaffingError::Validation(other.to_string()),
        }
    }
}

impl From<RosterError> for StaffingError {
    fn from(e: RosterError) -> Self {
        match e {
            RosterError::Graph(e) => e.into(),
            other => StaffingError::Validation(other.to_string()),
        }
    }
}

impl From<ConfigError> for StaffingError {
    fn from(e: ConfigError) -> Self {
        StaffingError::Validation(e.to_string())
    }
}
