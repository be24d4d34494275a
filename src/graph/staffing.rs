//! Staffing schema on top of the property graph
//!
//! Labels, relationship types and typed rows for candidates, projects,
//! assignments and provenance (company / university / certification), plus
//! the write operations ingestion and matching use. Reads go through
//! [`crate::graph::view::GraphView`].

use super::property::{PropertyMap, PropertyValue};
use super::store::{GraphError, GraphResult, GraphStore, KEY_PROPERTY};
use super::types::{EdgeId, Label, NodeId};
use crate::skills::SkillId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const CANDIDATE: &str = "Candidate";
pub const SKILL: &str = "Skill";
pub const COMPANY: &str = "Company";
pub const UNIVERSITY: &str = "University";
pub const CERTIFICATION: &str = "Certification";
pub const PROJECT: &str = "Project";

pub const HAS_SKILL: &str = "HAS_SKILL";
pub const WORKED_AT: &str = "WORKED_AT";
pub const STUDIED_AT: &str = "STUDIED_AT";
pub const HAS_CERT: &str = "HAS_CERT";
pub const REQUIRES: &str = "REQUIRES";
pub const ASSIGNED_TO: &str = "ASSIGNED_TO";

/// Slack for float comparisons on allocation sums
pub const ALLOCATION_EPSILON: f64 = 1e-9;

/// Seniority tier of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Junior,
    Mid,
    Senior,
    Lead,
    Principal,
}

impl Seniority {
    pub const ALL: [Seniority; 5] = [
        Seniority::Junior,
        Seniority::Mid,
        Seniority::Senior,
        Seniority::Lead,
        Seniority::Principal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Junior => "junior",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
            Seniority::Lead => "lead",
            Seniority::Principal => "principal",
        }
    }
}

impl FromStr for Seniority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "junior" | "jr" | "entry" => Ok(Seniority::Junior),
            "mid" | "middle" | "regular" | "intermediate" => Ok(Seniority::Mid),
            "senior" | "sr" => Ok(Seniority::Senior),
            "lead" | "staff" => Ok(Seniority::Lead),
            "principal" | "architect" => Ok(Seniority::Principal),
            other => Err(format!("unknown seniority '{}'", other)),
        }
    }
}

impl fmt::Display for Seniority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a project node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Created from a requirement document, not yet confirmed
    Proposed,
    Active,
    Historical,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Proposed => "proposed",
            ProjectStatus::Active => "active",
            ProjectStatus::Historical => "historical",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "proposed" | "new rfp" | "rfp" => Ok(ProjectStatus::Proposed),
            "active" | "ongoing" => Ok(ProjectStatus::Active),
            "historical" | "closed" | "done" => Ok(ProjectStatus::Historical),
            other => Err(format!("unknown project status '{}'", other)),
        }
    }
}

/// Provenance node kinds a candidate links to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffiliationKind {
    Company,
    University,
    Certification,
    Project,
}

impl AffiliationKind {
    pub fn label(&self) -> &'static str {
        match self {
            AffiliationKind::Company => COMPANY,
            AffiliationKind::University => UNIVERSITY,
            AffiliationKind::Certification => CERTIFICATION,
            AffiliationKind::Project => PROJECT,
        }
    }

    pub fn edge_type(&self) -> &'static str {
        match self {
            AffiliationKind::Company => WORKED_AT,
            AffiliationKind::University => STUDIED_AT,
            AffiliationKind::Certification => HAS_CERT,
            AffiliationKind::Project => ASSIGNED_TO,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AffiliationKind::Company => "company",
            AffiliationKind::University => "university",
            AffiliationKind::Certification => "certification",
            AffiliationKind::Project => "project",
        }
    }
}

/// Candidate node as a typed row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub node: NodeId,
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    pub seniority: Option<Seniority>,
    pub hourly_rate: Option<f64>,
    pub years_experience: Option<f64>,
    pub summary: Option<String>,
}

/// Project node as a typed row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRow {
    pub node: NodeId,
    pub id: String,
    pub name: String,
    pub required_skills: Vec<SkillId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub status: ProjectStatus,
}

/// `ASSIGNED_TO` edge as a typed row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub edge: EdgeId,
    pub candidate: NodeId,
    pub project: NodeId,
    pub allocation: f64,
    pub role: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AssignmentRow {
    /// An assignment stops counting against availability once its end date
    /// is in the past; the edge itself is kept as history.
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        self.end_date.map_or(true, |end| end >= today)
    }

    /// Whether the assignment still occupies capacity after `date`
    pub fn occupies_after(&self, date: NaiveDate) -> bool {
        self.end_date.map_or(true, |end| end > date)
    }
}

/// Link from a candidate to a provenance or project node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affiliation {
    pub kind: AffiliationKind,
    pub node: NodeId,
    pub key: String,
    pub name: String,
}

/// Input for creating or refreshing a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub seniority: Option<Seniority>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub years_experience: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Input for creating or refreshing a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: Option<f64>,
    pub status: ProjectStatus,
}

/// Input for one `ASSIGNED_TO` edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentSpec {
    pub allocation: f64,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl AssignmentSpec {
    pub fn new(allocation: f64) -> Self {
        Self {
            allocation,
            role: None,
            start_date: None,
            end_date: None,
        }
    }

    pub fn ending(mut self, end_date: Option<NaiveDate>) -> Self {
        self.end_date = end_date;
        self
    }

    pub fn starting(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub(crate) fn validate(&self) -> GraphResult<()> {
        if !(self.allocation > 0.0 && self.allocation <= 1.0 + ALLOCATION_EPSILON) {
            return Err(GraphError::InvalidAllocation(self.allocation));
        }
        Ok(())
    }

    pub(crate) fn into_properties(self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("allocation".to_string(), self.allocation.into());
        props.insert("role".to_string(), self.role.into());
        props.insert("start_date".to_string(), self.start_date.into());
        props.insert("end_date".to_string(), self.end_date.into());
        props
    }
}

impl GraphStore {
    /// Insert or refresh a candidate by business key
    pub fn upsert_candidate(&mut self, spec: &CandidateSpec) -> GraphResult<NodeId> {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), spec.name.clone().into());
        props.insert("location".to_string(), spec.location.clone().into());
        props.insert(
            "seniority".to_string(),
            spec.seniority.map(|s| s.as_str().to_string()).into(),
        );
        props.insert("hourly_rate".to_string(), spec.hourly_rate.into());
        props.insert("years_experience".to_string(), spec.years_experience.into());
        props.insert("summary".to_string(), spec.summary.clone().into());

        self.upsert_keyed(CANDIDATE, &spec.id, props)
    }

    /// Insert a skill node under its normalized id, or return the existing one
    pub fn upsert_skill(&mut self, skill: &SkillId, display: &str, category: Option<&str>) -> GraphResult<NodeId> {
        if let Some(existing) = self.find_node(&Label::new(SKILL), skill.as_str()) {
            if let Some(category) = category {
                self.set_node_property(existing, "category", category)?;
            }
            return Ok(existing);
        }

        let mut props = PropertyMap::new();
        props.insert("name".to_string(), display.trim().into());
        props.insert(
            "category".to_string(),
            category.unwrap_or("general").into(),
        );
        self.upsert_keyed(SKILL, skill.as_str(), props)
    }

    /// Attach a skill to a candidate; repeated calls keep a single edge
    pub fn add_candidate_skill(
        &mut self,
        candidate: NodeId,
        raw_skill: &str,
        proficiency: Option<u8>,
    ) -> GraphResult<Option<NodeId>> {
        let Some(skill) = SkillId::normalize(raw_skill) else {
            return Ok(None);
        };
        let skill_node = self.upsert_skill(&skill, raw_skill, None)?;

        let existing = self
            .get_outgoing_edges(candidate)
            .into_iter()
            .find(|e| e.is_type(HAS_SKILL) && e.target == skill_node)
            .map(|e| e.id);

        match existing {
            Some(edge_id) => {
                if let (Some(edge), Some(level)) = (self.get_edge_mut(edge_id), proficiency) {
                    edge.set_property("proficiency", level as i64);
                }
            }
            None => {
                let mut props = PropertyMap::new();
                props.insert("proficiency".to_string(), proficiency.map(|p| p as i64).into());
                self.create_edge_with_properties(candidate, skill_node, HAS_SKILL, props)?;
            }
        }

        Ok(Some(skill_node))
    }

    /// Link a candidate to a company, university or certification node,
    /// creating the provenance node on first sight
    pub fn link_affiliation(
        &mut self,
        candidate: NodeId,
        kind: AffiliationKind,
        name: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> GraphResult<EdgeId> {
        let key = name.trim().to_lowercase();
        let target = match self.find_node(&Label::new(kind.label()), &key) {
            Some(node) => node,
            None => {
                let mut props = PropertyMap::new();
                props.insert(KEY_PROPERTY.to_string(), key.clone().into());
                props.insert("name".to_string(), name.trim().into());
                self.create_node_with_properties(kind.label(), props)?
            }
        };

        let existing = self
            .get_outgoing_edges(candidate)
            .into_iter()
            .find(|e| e.is_type(kind.edge_type()) && e.target == target)
            .map(|e| e.id);
        if let Some(edge) = existing {
            self.delete_edge(edge)?;
        }

        let mut props = PropertyMap::new();
        match kind {
            AffiliationKind::Certification => {
                props.insert("date".to_string(), start_date.or(end_date).into());
            }
            _ => {
                props.insert("start_date".to_string(), start_date.into());
                props.insert("end_date".to_string(), end_date.into());
            }
        }
        self.create_edge_with_properties(candidate, target, kind.edge_type(), props)
    }

    /// Insert or refresh a project and its `REQUIRES` edges
    pub fn upsert_project(&mut self, spec: &ProjectSpec) -> GraphResult<NodeId> {
        let mut required: Vec<(SkillId, &str)> = Vec::new();
        for raw in &spec.required_skills {
            if let Some(skill) = SkillId::normalize(raw) {
                if !required.iter().any(|(s, _)| *s == skill) {
                    required.push((skill, raw.as_str()));
                }
            }
        }

        let mut props = PropertyMap::new();
        props.insert("name".to_string(), spec.name.clone().into());
        props.insert(
            "required_skills".to_string(),
            required
                .iter()
                .map(|(s, _)| s.as_str().to_string())
                .collect::<Vec<_>>()
                .into(),
        );
        props.insert("start_date".to_string(), spec.start_date.into());
        props.insert("end_date".to_string(), spec.end_date.into());
        props.insert("budget".to_string(), spec.budget.into());
        props.insert("status".to_string(), spec.status.as_str().into());

        let project = self.upsert_keyed(PROJECT, &spec.id, props)?;

        let stale: Vec<EdgeId> = self
            .get_outgoing_edges(project)
            .into_iter()
            .filter(|e| e.is_type(REQUIRES))
            .map(|e| e.id)
            .collect();
        for edge in stale {
            self.delete_edge(edge)?;
        }
        for (skill, raw) in &required {
            let skill_node = self.upsert_skill(skill, raw, None)?;
            self.create_edge(project, skill_node, REQUIRES)?;
        }

        Ok(project)
    }

    /// Write an `ASSIGNED_TO` edge, rejecting writes that would push the
    /// candidate's active allocation above 1.0.
    ///
    /// Callers that must serialize against concurrent writers go through
    /// [`crate::graph::SharedGraph`], which holds the candidate lock around
    /// the read of the current load and this insert.
    pub fn insert_assignment(
        &mut self,
        candidate: NodeId,
        project: NodeId,
        spec: AssignmentSpec,
        today: NaiveDate,
    ) -> GraphResult<EdgeId> {
        use super::view::GraphView;

        spec.validate()?;
        let candidate_row = self
            .candidate(candidate)
            .ok_or(GraphError::NodeNotFound(candidate))?;
        if self.project(project).is_none() {
            return Err(GraphError::NodeNotFound(project));
        }

        // Records of finished work never compete for current capacity.
        let still_running = spec.end_date.map_or(true, |end| end >= today);
        let headroom = 1.0 - self.active_load(candidate, today);
        if still_running && spec.allocation > headroom + ALLOCATION_EPSILON {
            return Err(GraphError::AllocationExceeded {
                candidate: candidate_row.id,
                requested: spec.allocation,
                headroom: headroom.max(0.0),
            });
        }

        let mut props = spec.into_properties();
        props.insert("assigned_at".to_string(), today.into());
        let edge = self.create_edge_with_properties(candidate, project, ASSIGNED_TO, props)?;
        debug!(candidate = %candidate_row.id, %edge, "assignment written");
        Ok(edge)
    }

    /// Delete projects with the given status, together with their edges
    pub fn remove_projects_with_status(&mut self, status: ProjectStatus) -> GraphResult<usize> {
        use super::view::GraphView;

        let doomed: Vec<NodeId> = self
            .projects()
            .into_iter()
            .filter(|p| p.status == status)
            .map(|p| p.node)
            .collect();
        for node in &doomed {
            self.delete_node(*node)?;
        }
        Ok(doomed.len())
    }

    fn upsert_keyed(&mut self, label: &str, key: &str, props: PropertyMap) -> GraphResult<NodeId> {
        match self.find_node(&Label::new(label), key) {
            Some(node) => {
                for (k, v) in props {
                    self.set_node_property(node, k, v)?;
                }
                Ok(node)
            }
            None => {
                let mut props = props;
                props.insert(KEY_PROPERTY.to_string(), PropertyValue::String(key.to_string()));
                self.create_node_with_properties(label, props)
            }
        }
    }
}
