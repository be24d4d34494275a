//! Copy-on-read overlay over a graph view
//!
//! Reads fall through to the base view; overlay writes shadow them. The base
//! is only ever borrowed immutably, so nothing written here can reach the
//! store. Hypothetical edges and nodes take their ids from an `IdMint`.

use super::{ScenarioError, ScenarioResult};
use crate::graph::staffing::ALLOCATION_EPSILON;
use crate::graph::{
    Affiliation, AssignmentRow, CandidateRow, EdgeId, GraphView, Grant, IdMint, NodeId, ProjectRow, ProjectStatus,
};
use crate::skills::SkillId;
use chrono::{Duration, NaiveDate};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

pub struct Overlay<'a> {
    base: &'a dyn GraphView,
    today: NaiveDate,
    added: Vec<AssignmentRow>,
    removed: FxHashSet<EdgeId>,
    /// Base assignments rewritten by the overlay, keyed by edge
    rewritten: FxHashMap<EdgeId, AssignmentRow>,
    proposed: Vec<ProjectRow>,
    edge_ids: IdMint<EdgeId>,
    node_ids: IdMint<NodeId>,
}

impl<'a> Overlay<'a> {
    pub fn new(base: &'a dyn GraphView, today: NaiveDate) -> Self {
        Self {
            base,
            today,
            added: Vec::new(),
            removed: FxHashSet::default(),
            rewritten: FxHashMap::default(),
            proposed: Vec::new(),
            edge_ids: IdMint::new(),
            node_ids: IdMint::new(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// True when no change has been applied yet
    pub fn is_pristine(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.rewritten.is_empty() && self.proposed.is_empty()
    }

    fn mint_edge(&mut self) -> EdgeId {
        self.edge_ids.mint()
    }

    fn mint_node(&mut self) -> NodeId {
        self.node_ids.mint()
    }

    fn shadow(&self, row: AssignmentRow) -> Option<AssignmentRow> {
        if self.removed.contains(&row.edge) {
            return None;
        }
        Some(self.rewritten.get(&row.edge).cloned().unwrap_or(row))
    }

    /// Place a hypothetical assignment, clamped to the candidate's headroom.
    /// `None` when the candidate is already full.
    pub fn assign(
        &mut self,
        candidate: NodeId,
        project: NodeId,
        allocation: f64,
        end_date: Option<NaiveDate>,
    ) -> ScenarioResult<Option<Grant>> {
        check_allocation(allocation)?;
        if self.candidate(candidate).is_none() {
            return Err(ScenarioError::UnknownCandidate(candidate.to_string()));
        }
        if self.project(project).is_none() {
            return Err(ScenarioError::UnknownProject(project.to_string()));
        }

        let previous_load = self.active_load(candidate, self.today);
        let headroom = 1.0 - previous_load;
        if headroom <= ALLOCATION_EPSILON {
            debug!(%candidate, previous_load, "no headroom in overlay");
            return Ok(None);
        }
        let granted = allocation.min(headroom);
        if granted + ALLOCATION_EPSILON < allocation {
            warn!(%candidate, requested = allocation, granted, "simulated allocation clamped");
        }

        let edge = self.mint_edge();
        self.added.push(AssignmentRow {
            edge,
            candidate,
            project,
            allocation: granted,
            role: None,
            start_date: Some(self.today),
            end_date,
        });
        Ok(Some(Grant {
            edge,
            candidate,
            requested: allocation,
            granted,
            previous_load,
            new_load: previous_load + granted,
        }))
    }

    /// Drop the candidate's active assignments, on one project or on all.
    /// Returns how many were dropped.
    pub fn unassign(&mut self, candidate: NodeId, project: Option<NodeId>) -> usize {
        let doomed: Vec<EdgeId> = self
            .assignments_of(candidate)
            .into_iter()
            .filter(|a| a.is_active_on(self.today))
            .filter(|a| project.map_or(true, |p| a.project == p))
            .map(|a| a.edge)
            .collect();
        for edge in &doomed {
            if edge.is_hypothetical() {
                self.added.retain(|a| a.edge != *edge);
            } else {
                self.rewritten.remove(edge);
                self.removed.insert(*edge);
            }
        }
        doomed.len()
    }

    /// Resize the candidate's active assignment on `project`. The new size is
    /// clamped to the headroom left once the old allocation is given back.
    pub fn reallocate(&mut self, candidate: NodeId, project: NodeId, allocation: f64) -> ScenarioResult<Grant> {
        check_allocation(allocation)?;
        let current = self
            .assignments_of(candidate)
            .into_iter()
            .find(|a| a.project == project && a.is_active_on(self.today))
            .ok_or_else(|| {
                ScenarioError::Validation(format!("candidate {} has no active assignment on project {}", candidate, project))
            })?;

        let previous_load = self.active_load(candidate, self.today);
        let headroom = 1.0 - (previous_load - current.allocation);
        let granted = allocation.min(headroom).max(0.0);
        if granted + ALLOCATION_EPSILON < allocation {
            warn!(%candidate, requested = allocation, granted, "simulated reallocation clamped");
        }

        let edge = current.edge;
        let updated = AssignmentRow {
            allocation: granted,
            ..current.clone()
        };
        self.put(updated);
        Ok(Grant {
            edge,
            candidate,
            requested: allocation,
            granted,
            previous_load,
            new_load: previous_load - current.allocation + granted,
        })
    }

    /// End every active assignment on the project yesterday, freeing its
    /// members from today. Returns how many members were freed.
    pub fn release(&mut self, project: NodeId) -> usize {
        let yesterday = self.today - Duration::days(1);
        let active: Vec<AssignmentRow> = self
            .members_of(project)
            .into_iter()
            .filter(|a| a.is_active_on(self.today))
            .collect();
        for row in &active {
            self.put(AssignmentRow {
                end_date: Some(yesterday),
                ..row.clone()
            });
        }
        active.len()
    }

    /// Add a hypothetical proposed project
    pub fn propose_project(
        &mut self,
        key: &str,
        name: &str,
        required_skills: Vec<SkillId>,
        end_date: Option<NaiveDate>,
        budget: Option<f64>,
    ) -> ScenarioResult<ProjectRow> {
        if self.project_by_key(key).is_some() {
            return Err(ScenarioError::Validation(format!("project '{}' already exists", key)));
        }
        let row = ProjectRow {
            node: self.mint_node(),
            id: key.to_string(),
            name: name.to_string(),
            required_skills,
            start_date: Some(self.today),
            end_date,
            budget,
            status: ProjectStatus::Proposed,
        };
        self.proposed.push(row.clone());
        Ok(row)
    }

    fn put(&mut self, row: AssignmentRow) {
        if row.edge.is_hypothetical() {
            if let Some(slot) = self.added.iter_mut().find(|a| a.edge == row.edge) {
                *slot = row;
            }
        } else {
            self.rewritten.insert(row.edge, row);
        }
    }
}

fn check_allocation(allocation: f64) -> ScenarioResult<()> {
    if !(allocation > 0.0 && allocation <= 1.0 + ALLOCATION_EPSILON) {
        return Err(ScenarioError::Validation(format!(
            "allocation must be in (0, 1], got {}",
            allocation
        )));
    }
    Ok(())
}

impl<'a> GraphView for Overlay<'a> {
    fn candidates(&self) -> Vec<CandidateRow> {
        self.base.candidates()
    }

    fn candidate(&self, node: NodeId) -> Option<CandidateRow> {
        self.base.candidate(node)
    }

    fn candidate_by_key(&self, key: &str) -> Option<CandidateRow> {
        self.base.candidate_by_key(key)
    }

    fn candidate_skills(&self, node: NodeId) -> Vec<SkillId> {
        self.base.candidate_skills(node)
    }

    fn assignments_of(&self, candidate: NodeId) -> Vec<AssignmentRow> {
        let mut rows: Vec<AssignmentRow> = self
            .base
            .assignments_of(candidate)
            .into_iter()
            .filter_map(|row| self.shadow(row))
            .collect();
        rows.extend(self.added.iter().filter(|a| a.candidate == candidate).cloned());
        rows
    }

    fn members_of(&self, project: NodeId) -> Vec<AssignmentRow> {
        let mut rows: Vec<AssignmentRow> = if project.is_hypothetical() {
            Vec::new()
        } else {
            self.base
                .members_of(project)
                .into_iter()
                .filter_map(|row| self.shadow(row))
                .collect()
        };
        rows.extend(self.added.iter().filter(|a| a.project == project).cloned());
        rows
    }

    fn provenance_of(&self, candidate: NodeId) -> Vec<Affiliation> {
        self.base.provenance_of(candidate)
    }

    fn projects(&self) -> Vec<ProjectRow> {
        let mut rows = self.base.projects();
        rows.extend(self.proposed.iter().cloned());
        rows
    }

    fn project(&self, node: NodeId) -> Option<ProjectRow> {
        self.proposed
            .iter()
            .find(|p| p.node == node)
            .cloned()
            .or_else(|| self.base.project(node))
    }

    fn project_by_key(&self, key: &str) -> Option<ProjectRow> {
        self.proposed
            .iter()
            .find(|p| p.id == key)
            .cloned()
            .or_else(|| self.base.project_by_key(key))
    }

    fn skills(&self) -> Vec<(SkillId, String)> {
        self.base.skills()
    }
}
