//! Staffing graph storage
//!
//! This module implements the property graph the rest of the crate reads
//! and writes:
//! - Nodes with labels and properties, unique business key per label
//! - Directed typed edges, parallel edges allowed (repeat assignments)
//! - Typed staffing rows and write operations on top of the raw graph
//! - A shared handle serializing assignment writes per candidate

pub mod edge;
pub mod node;
pub mod property;
pub mod roster;
pub mod shared;
pub mod staffing;
pub mod store;
pub mod types;
pub mod view;

// Re-export main types
pub use edge::Edge;
pub use node::Node;
pub use property::{PropertyMap, PropertyValue};
pub use roster::{Roster, RosterError, RosterSummary};
pub use shared::{Grant, SharedGraph};
pub use staffing::{
    Affiliation, AffiliationKind, AssignmentRow, AssignmentSpec, CandidateRow, CandidateSpec,
    ProjectRow, ProjectSpec, ProjectStatus, Seniority,
};
pub use store::{GraphError, GraphResult, GraphStore};
pub use types::{EdgeId, EdgeType, IdMint, Label, NodeId};
pub use view::GraphView;
