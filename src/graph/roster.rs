//! Roster ingestion
//!
//! Loads the structured output of the document extraction pipeline (one
//! JSON file holding candidates, projects and assignments) into a
//! [`GraphStore`]. Re-loading the same roster refreshes nodes in place.

use super::staffing::{
    AffiliationKind, AssignmentSpec, CandidateSpec, ProjectSpec, CANDIDATE, PROJECT,
};
use super::store::{GraphError, GraphStore};
use super::types::Label;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Failed to read roster: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed roster: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Graph error while loading roster: {0}")]
    Graph(#[from] GraphError),
}

pub type RosterResult<T> = Result<T, RosterError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub candidates: Vec<RosterCandidate>,
    #[serde(default)]
    pub projects: Vec<ProjectSpec>,
    #[serde(default)]
    pub assignments: Vec<RosterAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterCandidate {
    #[serde(flatten)]
    pub profile: CandidateSpec,
    #[serde(default)]
    pub skills: Vec<SkillEntry>,
    #[serde(default)]
    pub companies: Vec<Stint>,
    #[serde(default)]
    pub universities: Vec<Stint>,
    #[serde(default)]
    pub certifications: Vec<Stint>,
}

/// A skill either as a bare name or with a proficiency level (1-5)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkillEntry {
    Name(String),
    Rated { name: String, proficiency: Option<u8> },
}

impl SkillEntry {
    fn parts(&self) -> (&str, Option<u8>) {
        match self {
            SkillEntry::Name(name) => (name, None),
            SkillEntry::Rated { name, proficiency } => (name, *proficiency),
        }
    }
}

/// A dated link to a company, university or certification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stint {
    pub name: String,
    #[serde(default, alias = "date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterAssignment {
    pub candidate: String,
    pub project: String,
    #[serde(flatten)]
    pub spec: AssignmentSpec,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSummary {
    pub candidates: usize,
    pub projects: usize,
    pub assignments: usize,
}

impl Roster {
    pub fn from_json_str(json: &str) -> RosterResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> RosterResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Write the roster into `store`.
    ///
    /// Assignments are strict: one that would push a candidate above full
    /// allocation on `today` aborts the load with
    /// [`GraphError::AllocationExceeded`].
    pub fn load_into(&self, store: &mut GraphStore, today: NaiveDate) -> RosterResult<RosterSummary> {
        for entry in &self.candidates {
            let node = store.upsert_candidate(&entry.profile)?;
            for skill in &entry.skills {
                let (name, proficiency) = skill.parts();
                store.add_candidate_skill(node, name, proficiency)?;
            }
            let links = [
                (AffiliationKind::Company, &entry.companies),
                (AffiliationKind::University, &entry.universities),
                (AffiliationKind::Certification, &entry.certifications),
            ];
            for (kind, stints) in links {
                for stint in stints {
                    store.link_affiliation(node, kind, &stint.name, stint.start_date, stint.end_date)?;
                }
            }
        }

        for project in &self.projects {
            store.upsert_project(project)?;
        }

        for assignment in &self.assignments {
            let candidate = store
                .find_node(&Label::new(CANDIDATE), &assignment.candidate)
                .ok_or_else(|| GraphError::UnknownKey {
                    label: Label::new(CANDIDATE),
                    key: assignment.candidate.clone(),
                })?;
            let project = store
                .find_node(&Label::new(PROJECT), &assignment.project)
                .ok_or_else(|| GraphError::UnknownKey {
                    label: Label::new(PROJECT),
                    key: assignment.project.clone(),
                })?;
            store.insert_assignment(candidate, project, assignment.spec.clone(), today)?;
        }

        let summary = RosterSummary {
            candidates: self.candidates.len(),
            projects: self.projects.len(),
            assignments: self.assignments.len(),
        };
        info!(
            candidates = summary.candidates,
            projects = summary.projects,
            assignments = summary.assignments,
            "roster loaded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::view::GraphView;

    const ROSTER: &str = r#"{
        "candidates": [
            {
                "id": "c-1", "name": "Jacob Young", "location": "Berlin",
                "seniority": "senior", "hourly_rate": 110,
                "skills": ["Python", {"name": "k8s", "proficiency": 4}],
                "companies": [{"name": "Acme", "start_date": "2020-01-01", "end_date": "2023-06-30"}],
                "certifications": [{"name": "AWS SA", "date": "2022-03-01"}]
            },
            { "id": "c-2", "name": "Mina Ito", "skills": ["python"] }
        ],
        "projects": [
            { "id": "atlas", "name": "Atlas", "required_skills": ["Python"], "status": "active" }
        ],
        "assignments": [
            { "candidate": "c-1", "project": "atlas", "allocation": 0.5, "role": "Developer" }
        ]
    }"#;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[test]
    fn test_load_roster() {
        let roster = Roster::from_json_str(ROSTER).unwrap();
        let mut store = GraphStore::new();
        let summary = roster.load_into(&mut store, today()).unwrap();

        assert_eq!(summary, RosterSummary { candidates: 2, projects: 1, assignments: 1 });
        let jacob = store.candidate_by_key("c-1").unwrap();
        assert_eq!(jacob.hourly_rate, Some(110.0));
        assert_eq!(store.candidate_skills(jacob.node).len(), 2);
        assert_eq!(store.provenance_of(jacob.node).len(), 2);
        assert!((store.active_load(jacob.node, today()) - 0.5).abs() < 1e-9);
        // "Python" and "python" share one skill node
        assert_eq!(store.skills().len(), 2);
    }

    #[test]
    fn test_reload_is_idempotent_for_nodes() {
        let mut roster = Roster::from_json_str(ROSTER).unwrap();
        roster.assignments.clear();
        let mut store = GraphStore::new();
        roster.load_into(&mut store, today()).unwrap();
        let nodes = store.node_count();
        roster.load_into(&mut store, today()).unwrap();
        assert_eq!(store.candidates().len(), 2);
        assert_eq!(store.node_count(), nodes);
    }

    #[test]
    fn test_unknown_assignment_target() {
        let mut roster = Roster::from_json_str(ROSTER).unwrap();
        roster.assignments[0].project = "missing".to_string();
        let err = roster.load_into(&mut GraphStore::new(), today()).unwrap_err();
        assert!(matches!(err, RosterError::Graph(GraphError::UnknownKey { .. })));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(Roster::from_json_str("{"), Err(RosterError::Json(_))));
    }
}
