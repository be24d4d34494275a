//! Destinations for team picks

use super::MatchResult;
use crate::graph::staffing::ALLOCATION_EPSILON;
use crate::graph::{AssignmentSpec, EdgeId, NodeId, SharedGraph};
use crate::scoring::CandidateProfile;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a sink granted one candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub edge: Option<EdgeId>,
    pub previous_load: f64,
    pub granted: f64,
    pub new_load: f64,
}

#[async_trait]
pub trait AssignmentSink: Send {
    /// Grant up to `allocation` to the candidate, clamped to its headroom.
    /// `None` means the candidate turned out to be full and nothing was
    /// placed.
    async fn place(&mut self, profile: &CandidateProfile, allocation: f64) -> MatchResult<Option<Placement>>;
}

/// Writes `ASSIGNED_TO` edges into the shared store
pub struct StoreSink<'a> {
    graph: &'a SharedGraph,
    project: NodeId,
    template: AssignmentSpec,
    today: NaiveDate,
}

impl<'a> StoreSink<'a> {
    /// `template` supplies role and dates; its allocation is replaced per pick
    pub fn new(graph: &'a SharedGraph, project: NodeId, template: AssignmentSpec, today: NaiveDate) -> Self {
        Self {
            graph,
            project,
            template,
            today,
        }
    }
}

#[async_trait]
impl<'a> AssignmentSink for StoreSink<'a> {
    async fn place(&mut self, profile: &CandidateProfile, allocation: f64) -> MatchResult<Option<Placement>> {
        let spec = AssignmentSpec {
            allocation,
            ..self.template.clone()
        };
        let grant = self
            .graph
            .assign_clamped(profile.node(), self.project, spec, self.today)
            .await?;
        Ok(grant.map(|g| Placement {
            edge: Some(g.edge),
            previous_load: g.previous_load,
            granted: g.granted,
            new_load: g.new_load,
        }))
    }
}

/// Projects placements against the loads seen in the profiles
#[derive(Debug, Clone, Default)]
pub struct DryRunSink {
    loads: HashMap<NodeId, f64>,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Projected load of a candidate after the placements so far
    pub fn projected_load(&self, node: NodeId) -> Option<f64> {
        self.loads.get(&node).copied()
    }
}

#[async_trait]
impl AssignmentSink for DryRunSink {
    async fn place(&mut self, profile: &CandidateProfile, allocation: f64) -> MatchResult<Option<Placement>> {
        let load = self.loads.entry(profile.node()).or_insert(profile.current_load);
        let previous_load = *load;
        let headroom = 1.0 - previous_load;
        if headroom <= ALLOCATION_EPSILON {
            return Ok(None);
        }
        let granted = allocation.min(headroom);
        *load += granted;
        Ok(Some(Placement {
            edge: None,
            previous_load,
            granted,
            new_load: *load,
        }))
    }
}
