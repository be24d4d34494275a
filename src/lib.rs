//! Staffgraph
//!
//! Staffing intelligence over a labeled property graph. Candidates, skills,
//! provenance and projects live in an in-memory graph; business questions
//! and team requests are answered against it rather than against free text.
//!
//! # Architecture
//!
//! - [`graph`]: property graph store, typed staffing rows and the shared
//!   handle that serializes assignment writes per candidate
//! - [`scoring`] and [`matching`]: ranked, availability-aware team matching
//!   with a strict and a fallback stage and clamp-to-headroom allocation
//! - [`query`]: question planning (heuristics first, then an optional model
//!   tier limited to fixed intent tags) and one deterministic template per
//!   intent
//! - [`scenario`]: what-if simulation on an overlay that never reaches the
//!   store
//! - [`service`]: the facade wiring all of the above
//!
//! ## Example Usage
//!
//! ```rust
//! use staffgraph::graph::{CandidateSpec, GraphStore, GraphView};
//!
//! let mut store = GraphStore::new();
//! let ada = store
//!     .upsert_candidate(&CandidateSpec {
//!         id: "c-1".to_string(),
//!         name: "Ada Lovelace".to_string(),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! store.add_candidate_skill(ada, "Python3", None).unwrap();
//!
//! let skills = store.candidate_skills(ada);
//! assert_eq!(skills[0].as_str(), "python");
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod matching;
pub mod query;
pub mod requirement;
pub mod scenario;
pub mod scoring;
pub mod service;
pub mod skills;

// Re-export main types for convenience
pub use cancel::{CancelToken, Interrupted};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{LlmConfig, LlmProvider, MatchingConfig, QueryConfig, ScoringConfig, StaffingConfig};
pub use error::{StaffingError, StaffingResult};
pub use graph::{GraphError, GraphResult, GraphStore, GraphView, NodeId, Roster, SharedGraph};
pub use matching::{MatchOptions, MatchingEngine, Stage, TeamAssignment, TeamMember};
pub use query::{Intent, PlanOutcome, QueryPlan, QueryResult, QueryValue};
pub use requirement::Requirement;
pub use scenario::{ImpactReport, ScenarioSimulator};
pub use service::{Answer, SimulationOutcome, StaffingService};
pub use skills::SkillId;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
