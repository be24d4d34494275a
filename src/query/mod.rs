//! Business question answering
//!
//! Questions go through two steps:
//! - planning ([`QueryPlanner`]): heuristic rules first, then an optional
//!   model tier that may only pick one of the fixed intent tags
//! - execution ([`QueryExecutor`]): one deterministic template per intent,
//!   run against a [`GraphView`](crate::graph::GraphView)
//!
//! No query text is ever generated; plans are typed values.

pub mod executor;
pub mod heuristics;
pub mod plan;
pub mod planner;
pub mod templates;

use crate::cancel::Interrupted;
use crate::graph::GraphError;
use thiserror::Error;

pub use executor::{QueryExecutor, QueryResult, QueryValue, Record, RecordBatch};
pub use heuristics::{QuestionReader, Reading, Verdict, Vocabulary};
pub use plan::{
    AggregateFunction, Aggregation, CountTarget, GroupKey, Intent, Link, Measure, NumericField, PlanOutcome,
    PlanSource, QueryFilters, QueryPlan, ScenarioChange, ScenarioPlan, TemporalFocus, TimeWindow,
};
pub use planner::QueryPlanner;
pub use templates::QueryTemplate;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}
