//! Matching engine
//!
//! Owns the two-stage search. Profiles are read once under the store read
//! lock; picks are then placed one by one through a sink, so the write side
//! re-checks headroom per candidate and a candidate filled concurrently is
//! skipped in favour of the next ranked one.

use super::sink::{AssignmentSink, DryRunSink, Placement, StoreSink};
use super::{MatchError, MatchOptions, MatchResult, Stage, TeamAssignment, TeamMember};
use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::config::{MatchingConfig, ScoringConfig};
use crate::graph::{
    AssignmentSpec, GraphError, GraphView, NodeId, ProjectRow, ProjectSpec, ProjectStatus, SharedGraph,
};
use crate::requirement::Requirement;
use crate::scoring::{location_matches, profile_of, CandidateProfile, CandidateScorer, ScoreCard};
use chrono::{Duration, NaiveDate};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Candidates with free capacity, minus those already actively on `project`
pub fn candidate_pool(
    view: &dyn GraphView,
    project: Option<NodeId>,
    today: NaiveDate,
    cancel: &CancelToken,
) -> MatchResult<Vec<CandidateProfile>> {
    let mut pool = Vec::new();
    for candidate in view.candidates() {
        cancel.check()?;
        if let Some(project) = project {
            let on_project = view
                .assignments_of(candidate.node)
                .iter()
                .any(|a| a.project == project && a.is_active_on(today));
            if on_project {
                continue;
            }
        }
        let profile = profile_of(view, candidate, today);
        if profile.is_available() {
            pool.push(profile);
        }
    }
    Ok(pool)
}

/// Start and end date of a project staffed from `requirement` on `today`
pub fn project_window(requirement: &Requirement, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = requirement
        .deadline
        .unwrap_or_else(|| today + Duration::days(30 * requirement.duration_months as i64));
    (today, end)
}

pub struct MatchingEngine {
    graph: SharedGraph,
    scorer: CandidateScorer,
    config: MatchingConfig,
    clock: Arc<dyn Clock>,
}

impl MatchingEngine {
    pub fn new(
        graph: SharedGraph,
        scoring: ScoringConfig,
        config: MatchingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            graph,
            scorer: CandidateScorer::new(scoring),
            config,
            clock,
        }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn scorer(&self) -> &CandidateScorer {
        &self.scorer
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Create or refresh the proposed project a requirement staffs.
    ///
    /// An active project under the same key is staffed as it stands: its
    /// status, dates, name and required skills are left alone. A historical
    /// one is refused.
    pub async fn ensure_project(&self, requirement: &Requirement, project_key: &str) -> MatchResult<ProjectRow> {
        let mut store = self.graph.write().await?;
        if let Some(existing) = store.project_by_key(project_key) {
            match existing.status {
                ProjectStatus::Active => {
                    info!(project = project_key, node = %existing.node, "staffing active project in place");
                    return Ok(existing);
                }
                ProjectStatus::Historical => return Err(MatchError::ClosedProject(project_key.to_string())),
                ProjectStatus::Proposed => {}
            }
        }

        let (start, end) = project_window(requirement, self.today());
        let spec = ProjectSpec {
            id: project_key.to_string(),
            name: requirement
                .project_title
                .clone()
                .unwrap_or_else(|| project_key.to_string()),
            required_skills: requirement
                .required_skills
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            start_date: Some(start),
            end_date: Some(end),
            budget: requirement.budget,
            status: ProjectStatus::Proposed,
        };
        let node = store.upsert_project(&spec)?;
        info!(project = project_key, %node, %end, "project ready for staffing");
        store
            .project(node)
            .ok_or_else(|| GraphError::NodeNotFound(node).into())
    }

    /// Drop proposed projects and their assignments; active and historical
    /// projects stay
    pub async fn reset_proposals(&self) -> MatchResult<usize> {
        let removed = self
            .graph
            .write()
            .await?
            .remove_projects_with_status(ProjectStatus::Proposed)?;
        info!(removed, "proposed projects cleared");
        Ok(removed)
    }

    /// Staff `project_key` from `requirement`
    pub async fn staff_project(
        &self,
        requirement: &Requirement,
        project_key: &str,
        options: MatchOptions,
        cancel: &CancelToken,
    ) -> MatchResult<TeamAssignment> {
        requirement.validate()?;
        cancel.check()?;
        let today = self.today();

        let (filled, stage) = if options.dry_run {
            let pool = {
                let store = self.graph.read().await?;
                let project = store.project_by_key(project_key).map(|p| p.node);
                candidate_pool(&*store, project, today, cancel)?
            };
            let mut sink = DryRunSink::new();
            self.fill_team(&pool, requirement, &mut sink, cancel).await?
        } else {
            let project = self.ensure_project(requirement, project_key).await?;
            let pool = {
                let store = self.graph.read().await?;
                candidate_pool(&*store, Some(project.node), today, cancel)?
            };
            let (start, window_end) = project_window(requirement, today);
            let end = project.end_date.filter(|end| *end >= today).unwrap_or(window_end);
            let template = AssignmentSpec::new(requirement.allocation_needed)
                .with_role(self.config.default_role.clone())
                .starting(start)
                .ending(Some(end));
            let mut sink = StoreSink::new(&self.graph, project.node, template, today);
            self.fill_team(&pool, requirement, &mut sink, cancel).await?
        };

        let gaps = requirement.team_size.saturating_sub(filled.len());
        info!(
            project = project_key,
            filled = filled.len(),
            gaps,
            %stage,
            dry_run = options.dry_run,
            "team matched"
        );
        Ok(TeamAssignment {
            project_id: project_key.to_string(),
            filled,
            gaps,
            stage,
            dry_run: options.dry_run,
        })
    }

    /// Run both stages over `pool`, placing picks through `sink`.
    ///
    /// The fallback stage runs only when the strict stage left seats open.
    pub async fn fill_team<S: AssignmentSink>(
        &self,
        pool: &[CandidateProfile],
        requirement: &Requirement,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> MatchResult<(Vec<TeamMember>, Stage)> {
        let mut team = Vec::with_capacity(requirement.team_size);

        let strict = pool.iter().filter(|p| {
            p.is_available()
                && requirement.required_skills.iter().any(|s| p.has_skill(s))
                && location_matches(p.candidate.location.as_deref(), requirement.location.as_deref())
        });
        let ranked = self.scorer.rank(strict, requirement);
        debug!(qualified = ranked.len(), "strict stage pool");
        self.take(ranked, Stage::Strict, requirement, sink, &mut team, cancel)
            .await?;

        if team.len() >= requirement.team_size {
            return Ok((team, Stage::Strict));
        }

        info!(
            found = team.len(),
            missing = requirement.team_size - team.len(),
            "strict stage short, running fallback"
        );
        let chosen: HashSet<NodeId> = team.iter().map(|m: &TeamMember| m.node).collect();
        let rest = pool
            .iter()
            .filter(|p| p.is_available() && !chosen.contains(&p.node()));
        let ranked = self.scorer.rank(rest, requirement);
        self.take(ranked, Stage::Fallback, requirement, sink, &mut team, cancel)
            .await?;

        Ok((team, Stage::Fallback))
    }

    async fn take<S: AssignmentSink>(
        &self,
        ranked: Vec<(&CandidateProfile, ScoreCard)>,
        stage: Stage,
        requirement: &Requirement,
        sink: &mut S,
        team: &mut Vec<TeamMember>,
        cancel: &CancelToken,
    ) -> MatchResult<()> {
        for (profile, score) in ranked {
            if team.len() >= requirement.team_size {
                break;
            }
            cancel.check()?;
            match sink.place(profile, requirement.allocation_needed).await? {
                Some(placement) => team.push(member(profile, score, stage, placement)),
                None => debug!(candidate = %profile.candidate.id, "no headroom left, trying next"),
            }
        }
        Ok(())
    }
}

fn member(profile: &CandidateProfile, score: ScoreCard, stage: Stage, placement: Placement) -> TeamMember {
    TeamMember {
        node: profile.node(),
        candidate_id: profile.candidate.id.clone(),
        name: profile.candidate.name.clone(),
        location: profile.candidate.location.clone(),
        stage,
        score,
        previous_load: placement.previous_load,
        granted: placement.granted,
        new_load: placement.new_load,
        edge: placement.edge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::graph::{CandidateSpec, GraphStore};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn engine(store: GraphStore) -> MatchingEngine {
        MatchingEngine::new(
            SharedGraph::new(store),
            ScoringConfig::default(),
            MatchingConfig::default(),
            Arc::new(FixedClock(today())),
        )
    }

    fn add(store: &mut GraphStore, id: &str, skills: &[&str], location: Option<&str>) -> NodeId {
        let node = store
            .upsert_candidate(&CandidateSpec {
                id: id.to_string(),
                name: id.to_string(),
                location: location.map(str::to_string),
                ..Default::default()
            })
            .unwrap();
        for skill in skills {
            store.add_candidate_skill(node, skill, None).unwrap();
        }
        node
    }

    #[tokio::test]
    async fn test_strict_stage_fills_without_fallback() {
        let mut store = GraphStore::new();
        for i in 0..4 {
            add(&mut store, &format!("py-{}", i), &["python"], None);
        }
        add(&mut store, "other", &["cobol"], None);
        let engine = engine(store);

        let team = engine
            .staff_project(&Requirement::new(&["Python"], 3), "p-1", MatchOptions::default(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(team.stage, Stage::Strict);
        assert_eq!(team.filled.len(), 3);
        assert!(team.filled.iter().all(|m| m.candidate_id.starts_with("py-")));
        assert_eq!(team.gaps, 0);
    }

    #[tokio::test]
    async fn test_location_filter_applies_to_strict_only() {
        let mut store = GraphStore::new();
        add(&mut store, "berlin", &["go"], Some("Berlin"));
        add(&mut store, "paris", &["go"], Some("Paris"));
        let engine = engine(store);

        let req = Requirement::new(&["go"], 2).with_location("Berlin, Germany");
        let team = engine
            .staff_project(&req, "p-1", MatchOptions::default(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(team.members_from(Stage::Strict).count(), 1);
        assert_eq!(team.members_from(Stage::Fallback).next().map(|m| m.candidate_id.as_str()), Some("paris"));
        assert_eq!(team.stage, Stage::Fallback);
    }

    #[tokio::test]
    async fn test_gaps_reported_when_pool_exhausted() {
        let mut store = GraphStore::new();
        add(&mut store, "only", &["rust"], None);
        let engine = engine(store);

        let team = engine
            .staff_project(&Requirement::new(&["rust"], 4), "p-1", MatchOptions::default(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(team.filled.len(), 1);
        assert_eq!(team.gaps, 3);
        assert!(!team.is_complete());
    }

    #[tokio::test]
    async fn test_partial_allocation_is_clamped() {
        let mut store = GraphStore::new();
        let c = add(&mut store, "busy", &["java"], None);
        let other = store
            .upsert_project(&ProjectSpec {
                id: "ongoing".to_string(),
                name: "Ongoing".to_string(),
                required_skills: vec![],
                start_date: None,
                end_date: None,
                budget: None,
                status: ProjectStatus::Active,
            })
            .unwrap();
        store.insert_assignment(c, other, AssignmentSpec::new(0.75), today()).unwrap();
        let engine = engine(store);

        let team = engine
            .staff_project(&Requirement::new(&["java"], 1), "p-1", MatchOptions::default(), &CancelToken::new())
            .await
            .unwrap();
        let member = &team.filled[0];
        assert!((member.granted - 0.25).abs() < 1e-9);
        assert!(member.was_clamped(1.0));
        assert!((member.new_load - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let mut store = GraphStore::new();
        add(&mut store, "a", &["python"], None);
        let engine = engine(store);

        let team = engine
            .staff_project(&Requirement::new(&["python"], 1), "p-1", MatchOptions::dry_run(), &CancelToken::new())
            .await
            .unwrap();
        assert!(team.dry_run);
        assert_eq!(team.filled.len(), 1);
        assert!(team.filled[0].edge.is_none());

        let store = engine.graph().read().await.unwrap();
        assert!(store.project_by_key("p-1").is_none());
        assert_eq!(crate::graph::view::assignment_edge_count(&store), 0);
    }

    #[tokio::test]
    async fn test_restaffing_skips_current_members() {
        let mut store = GraphStore::new();
        add(&mut store, "a", &["python"], None);
        add(&mut store, "b", &["python"], None);
        let engine = engine(store);
        let req = Requirement::new(&["python"], 1).with_allocation(0.5);

        let first = engine
            .staff_project(&req, "p-1", MatchOptions::default(), &CancelToken::new())
            .await
            .unwrap();
        let second = engine
            .staff_project(&req, "p-1", MatchOptions::default(), &CancelToken::new())
            .await
            .unwrap();
        assert_ne!(first.filled[0].node, second.filled[0].node);
    }

    #[tokio::test]
    async fn test_invalid_requirement_and_cancellation() {
        let engine = engine(GraphStore::new());
        let empty: &[&str] = &[];
        let err = engine
            .staff_project(&Requirement::new(empty, 0), "p", MatchOptions::default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, super::super::MatchError::Requirement(_)));

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = engine
            .staff_project(&Requirement::new(&["go"], 1), "p", MatchOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, super::super::MatchError::Interrupted(_)));
    }

    #[tokio::test]
    async fn test_reset_proposals() {
        let mut store = GraphStore::new();
        add(&mut store, "a", &["python"], None);
        let engine = engine(store);
        engine
            .staff_project(&Requirement::new(&["python"], 1), "rfp", MatchOptions::default(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(engine.reset_proposals().await.unwrap(), 1);
        let store = engine.graph().read().await.unwrap();
        assert!(store.project_by_key("rfp").is_none());
        assert_eq!(crate::graph::view::assignment_edge_count(&store), 0);
    }
}
