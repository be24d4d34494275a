//! Scenario simulator

use super::overlay::Overlay;
use super::{ScenarioError, ScenarioResult};
use crate::cancel::CancelToken;
use crate::graph::staffing::ALLOCATION_EPSILON;
use crate::graph::{CandidateRow, GraphStore, GraphView, NodeId, ProjectRow};
use crate::matching::engine::project_window;
use crate::matching::{candidate_pool, DryRunSink, MatchingEngine, TeamAssignment};
use crate::query::plan::ScenarioChange;
use crate::query::templates::{resolve_candidate, resolve_project, round2, CapacitySnapshot};
use crate::requirement::Requirement;
use crate::scoring::{load_profiles, CandidateProfile};
use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// One change as applied, with what it did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedChange {
    pub change: ScenarioChange,
    pub effect: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadChange {
    pub candidate_id: String,
    pub name: String,
    pub before: f64,
    pub after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub simulation_id: Uuid,
    pub applied: Vec<AppliedChange>,
    pub before: CapacitySnapshot,
    pub after: CapacitySnapshot,
    /// Candidates whose active load moved, in candidate order
    pub load_changes: Vec<LoadChange>,
    /// Teams proposed by `StaffRequirement` changes, never written
    pub teams: Vec<TeamAssignment>,
}

impl ImpactReport {
    pub fn available_delta(&self) -> i64 {
        self.after.available as i64 - self.before.available as i64
    }

    pub fn free_capacity_delta(&self) -> f64 {
        round2(self.after.free_capacity - self.before.free_capacity)
    }

    pub fn summary(&self) -> String {
        format!(
            "available {} -> {}, fully booked {} -> {}, free capacity {:.2} -> {:.2} FTE, {} loads changed",
            self.before.available,
            self.after.available,
            self.before.fully_booked,
            self.after.fully_booked,
            self.before.free_capacity,
            self.after.free_capacity,
            self.load_changes.len()
        )
    }
}

pub struct ScenarioSimulator {
    engine: Arc<MatchingEngine>,
}

impl ScenarioSimulator {
    pub fn new(engine: Arc<MatchingEngine>) -> Self {
        Self { engine }
    }

    /// Apply `changes` in order on a fresh overlay and report the impact.
    /// The store is only read.
    pub async fn simulate(&self, changes: &[ScenarioChange], cancel: &CancelToken) -> ScenarioResult<ImpactReport> {
        if changes.is_empty() {
            return Err(ScenarioError::Validation("no changes to simulate".to_string()));
        }
        cancel.check()?;
        let simulation_id = Uuid::new_v4();
        let today = self.engine.today();

        let snapshot = self.snapshot().await?;
        let base: &dyn GraphView = &snapshot;
        let before_profiles = load_profiles(base, today);
        let mut overlay = Overlay::new(base, today);

        let mut applied = Vec::with_capacity(changes.len());
        let mut teams = Vec::new();
        for (index, change) in changes.iter().enumerate() {
            cancel.check()?;
            let effect = match change {
                ScenarioChange::StaffRequirement { requirement } => {
                    let team = self
                        .staff(&mut overlay, requirement, &format!("simulated-{}", index + 1), cancel)
                        .await?;
                    let effect = format!(
                        "proposed {} of {} seats for {} ({} stage)",
                        team.filled.len(),
                        requirement.team_size,
                        team.project_id,
                        team.stage
                    );
                    teams.push(team);
                    effect
                }
                other => apply(&mut overlay, other)?,
            };
            debug!(%simulation_id, index, %effect, "change applied");
            applied.push(AppliedChange {
                change: change.clone(),
                effect,
            });
        }

        cancel.check()?;
        let after_profiles = load_profiles(&overlay, today);
        let report = ImpactReport {
            simulation_id,
            applied,
            before: CapacitySnapshot::of(&before_profiles),
            after: CapacitySnapshot::of(&after_profiles),
            load_changes: load_changes(&before_profiles, &after_profiles),
            teams,
        };
        info!(
            %simulation_id,
            changes = changes.len(),
            available_before = report.before.available,
            available_after = report.after.available,
            "simulation finished"
        );
        Ok(report)
    }

    /// Copy of the store taken under a short read lock, so writers are not
    /// held up while a simulation matches and traverses
    async fn snapshot(&self) -> ScenarioResult<GraphStore> {
        let store = self.engine.graph().read().await?;
        Ok(store.clone())
    }

    /// Match a requirement against the overlay through a dry-run sink, then
    /// place the picks on the overlay
    async fn staff(
        &self,
        overlay: &mut Overlay<'_>,
        requirement: &Requirement,
        key: &str,
        cancel: &CancelToken,
    ) -> ScenarioResult<TeamAssignment> {
        requirement.validate()?;
        let today = overlay.today();
        let (_, end) = project_window(requirement, today);
        let project = overlay.propose_project(
            key,
            requirement.project_title.as_deref().unwrap_or(key),
            requirement.required_skills.clone(),
            Some(end),
            requirement.budget,
        )?;

        let pool = candidate_pool(&*overlay, Some(project.node), today, cancel)?;
        let mut sink = DryRunSink::new();
        let (filled, stage) = self.engine.fill_team(&pool, requirement, &mut sink, cancel).await?;
        for member in &filled {
            overlay.assign(member.node, project.node, member.granted, Some(end))?;
        }

        Ok(TeamAssignment {
            project_id: project.id,
            gaps: requirement.team_size.saturating_sub(filled.len()),
            filled,
            stage,
            dry_run: true,
        })
    }
}

fn candidate(overlay: &Overlay<'_>, raw: &str) -> ScenarioResult<CandidateRow> {
    resolve_candidate(overlay, raw).ok_or_else(|| ScenarioError::UnknownCandidate(raw.to_string()))
}

fn project(overlay: &Overlay<'_>, raw: &str) -> ScenarioResult<ProjectRow> {
    resolve_project(overlay, raw).ok_or_else(|| ScenarioError::UnknownProject(raw.to_string()))
}

/// Projects past their end date take open-ended hypothetical assignments
fn open_end(project: &ProjectRow, today: NaiveDate) -> Option<NaiveDate> {
    project.end_date.filter(|end| *end >= today)
}

fn apply(overlay: &mut Overlay<'_>, change: &ScenarioChange) -> ScenarioResult<String> {
    let effect = match change {
        ScenarioChange::AddAssignment {
            candidate: who,
            project: what,
            allocation,
        } => {
            let c = candidate(overlay, who)?;
            let p = project(overlay, what)?;
            let end = open_end(&p, overlay.today());
            match overlay.assign(c.node, p.node, *allocation, end)? {
                Some(grant) if grant.was_clamped() => format!(
                    "{} joins {} at {:.2} (clamped from {:.2})",
                    c.name, p.name, grant.granted, grant.requested
                ),
                Some(grant) => format!("{} joins {} at {:.2}", c.name, p.name, grant.granted),
                None => format!("{} has no free capacity; {} unchanged", c.name, p.name),
            }
        }
        ScenarioChange::RemoveAssignment {
            candidate: who,
            project: what,
        } => {
            let c = candidate(overlay, who)?;
            let p = what.as_deref().map(|raw| project(overlay, raw)).transpose()?;
            let removed = overlay.unassign(c.node, p.as_ref().map(|p| p.node));
            match p {
                Some(p) => format!("{} leaves {} ({} assignments)", c.name, p.name, removed),
                None => format!("{} leaves all projects ({} assignments)", c.name, removed),
            }
        }
        ScenarioChange::ChangeAllocation {
            candidate: who,
            project: what,
            allocation,
        } => {
            let c = candidate(overlay, who)?;
            let p = project(overlay, what)?;
            let grant = overlay.reallocate(c.node, p.node, *allocation)?;
            format!("{} on {} now at {:.2}", c.name, p.name, grant.granted)
        }
        ScenarioChange::ReleaseProject { project: what } => {
            let p = project(overlay, what)?;
            let freed = overlay.release(p.node);
            format!("{} released, {} members freed", p.name, freed)
        }
        ScenarioChange::StaffRequirement { .. } => {
            return Err(ScenarioError::Validation(
                "staffing changes need the matching engine".to_string(),
            ))
        }
    };
    Ok(effect)
}

fn load_changes(before: &[CandidateProfile], after: &[CandidateProfile]) -> Vec<LoadChange> {
    let previous: FxHashMap<NodeId, f64> = before.iter().map(|p| (p.node(), p.current_load)).collect();
    after
        .iter()
        .filter_map(|profile| {
            let was = previous.get(&profile.node()).copied().unwrap_or(0.0);
            ((profile.current_load - was).abs() > ALLOCATION_EPSILON).then(|| LoadChange {
                candidate_id: profile.candidate.id.clone(),
                name: profile.candidate.name.clone(),
                before: round2(was),
                after: round2(profile.current_load),
            })
        })
        .collect()
}
