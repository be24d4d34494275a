//! Typed read access to staffing state
//!
//! [`GraphView`] is the read seam shared by the live store and the scenario
//! overlay. Query templates and the matching engine only ever read through
//! it, so a simulation can run the same code against hypothetical state.

use super::node::Node;
use super::staffing::{
    Affiliation, AffiliationKind, AssignmentRow, CandidateRow, ProjectRow, ProjectStatus,
    ASSIGNED_TO, CANDIDATE, HAS_SKILL, PROJECT, SKILL,
};
use super::store::{GraphStore, KEY_PROPERTY};
use super::types::{EdgeType, Label, NodeId};
use crate::skills::SkillId;
use chrono::NaiveDate;

pub trait GraphView: Send + Sync {
    /// All candidates, ordered by node id
    fn candidates(&self) -> Vec<CandidateRow>;

    fn candidate(&self, node: NodeId) -> Option<CandidateRow>;

    fn candidate_by_key(&self, key: &str) -> Option<CandidateRow>;

    /// Normalized skills of a candidate, sorted
    fn candidate_skills(&self, node: NodeId) -> Vec<SkillId>;

    /// Every assignment of a candidate, historical ones included
    fn assignments_of(&self, candidate: NodeId) -> Vec<AssignmentRow>;

    /// Every assignment onto a project
    fn members_of(&self, project: NodeId) -> Vec<AssignmentRow>;

    /// Company, university and certification links of a candidate
    fn provenance_of(&self, candidate: NodeId) -> Vec<Affiliation>;

    fn projects(&self) -> Vec<ProjectRow>;

    fn project(&self, node: NodeId) -> Option<ProjectRow>;

    fn project_by_key(&self, key: &str) -> Option<ProjectRow>;

    /// Known skills as `(normalized id, display name)`
    fn skills(&self) -> Vec<(SkillId, String)>;

    /// Sum of allocations over assignments still active on `today`
    fn active_load(&self, candidate: NodeId, today: NaiveDate) -> f64 {
        self.assignments_of(candidate)
            .iter()
            .filter(|a| a.is_active_on(today))
            .map(|a| a.allocation)
            .sum()
    }

    /// Load that remains committed once `date` has passed
    fn load_after(&self, candidate: NodeId, date: NaiveDate) -> f64 {
        self.assignments_of(candidate)
            .iter()
            .filter(|a| a.occupies_after(date))
            .map(|a| a.allocation)
            .sum()
    }

    /// Provenance links plus one entry per distinct assigned project
    fn affiliations_of(&self, candidate: NodeId) -> Vec<Affiliation> {
        let mut links = self.provenance_of(candidate);
        let mut seen = Vec::new();
        for assignment in self.assignments_of(candidate) {
            if seen.contains(&assignment.project) {
                continue;
            }
            seen.push(assignment.project);
            if let Some(project) = self.project(assignment.project) {
                links.push(Affiliation {
                    kind: AffiliationKind::Project,
                    node: project.node,
                    key: project.id,
                    name: project.name,
                });
            }
        }
        links
    }
}

fn number(node: &Node, key: &str) -> Option<f64> {
    node.get_property(key).and_then(|v| v.as_number())
}

fn date(node: &Node, key: &str) -> Option<NaiveDate> {
    node.get_property(key).and_then(|v| v.as_date())
}

fn candidate_row(node: &Node) -> CandidateRow {
    CandidateRow {
        node: node.id,
        id: node.get_str(KEY_PROPERTY).unwrap_or_default().to_string(),
        name: node.get_str("name").unwrap_or_default().to_string(),
        location: node.get_str("location").map(str::to_string),
        seniority: node.get_str("seniority").and_then(|s| s.parse().ok()),
        hourly_rate: number(node, "hourly_rate"),
        years_experience: number(node, "years_experience"),
        summary: node.get_str("summary").map(str::to_string),
    }
}

fn project_row(node: &Node) -> ProjectRow {
    ProjectRow {
        node: node.id,
        id: node.get_str(KEY_PROPERTY).unwrap_or_default().to_string(),
        name: node.get_str("name").unwrap_or_default().to_string(),
        required_skills: node
            .get_property("required_skills")
            .map(|v| v.as_string_list())
            .unwrap_or_default()
            .iter()
            .filter_map(|s| SkillId::normalize(s))
            .collect(),
        start_date: date(node, "start_date"),
        end_date: date(node, "end_date"),
        budget: number(node, "budget"),
        status: node
            .get_str("status")
            .and_then(|s| s.parse().ok())
            .unwrap_or(ProjectStatus::Active),
    }
}

impl GraphStore {
    fn labelled(&self, node: NodeId, label: &str) -> Option<&Node> {
        self.get_node(node).filter(|n| n.has_label(&Label::new(label)))
    }

    fn assignment_rows<'a>(&self, edges: impl Iterator<Item = &'a super::edge::Edge>) -> Vec<AssignmentRow> {
        edges
            .filter(|e| e.is_type(ASSIGNED_TO))
            .map(|e| AssignmentRow {
                edge: e.id,
                candidate: e.source,
                project: e.target,
                allocation: e.get_property("allocation").and_then(|v| v.as_number()).unwrap_or(0.0),
                role: e.get_property("role").and_then(|v| v.as_string()).map(str::to_string),
                start_date: e.get_property("start_date").and_then(|v| v.as_date()),
                end_date: e.get_property("end_date").and_then(|v| v.as_date()),
            })
            .collect()
    }
}

impl GraphView for GraphStore {
    fn candidates(&self) -> Vec<CandidateRow> {
        self.get_nodes_by_label(&Label::new(CANDIDATE))
            .into_iter()
            .map(candidate_row)
            .collect()
    }

    fn candidate(&self, node: NodeId) -> Option<CandidateRow> {
        self.labelled(node, CANDIDATE).map(candidate_row)
    }

    fn candidate_by_key(&self, key: &str) -> Option<CandidateRow> {
        self.find_node(&Label::new(CANDIDATE), key)
            .and_then(|node| self.candidate(node))
    }

    fn candidate_skills(&self, node: NodeId) -> Vec<SkillId> {
        let mut skills: Vec<SkillId> = self
            .get_outgoing_edges(node)
            .into_iter()
            .filter(|e| e.is_type(HAS_SKILL))
            .filter_map(|e| self.labelled(e.target, SKILL))
            .filter_map(|n| n.get_str(KEY_PROPERTY).and_then(SkillId::normalize))
            .collect();
        skills.sort();
        skills.dedup();
        skills
    }

    fn assignments_of(&self, candidate: NodeId) -> Vec<AssignmentRow> {
        self.assignment_rows(self.get_outgoing_edges(candidate).into_iter())
    }

    fn members_of(&self, project: NodeId) -> Vec<AssignmentRow> {
        self.assignment_rows(self.get_incoming_edges(project).into_iter())
    }

    fn provenance_of(&self, candidate: NodeId) -> Vec<Affiliation> {
        let kinds = [
            AffiliationKind::Company,
            AffiliationKind::University,
            AffiliationKind::Certification,
        ];
        self.get_outgoing_edges(candidate)
            .into_iter()
            .filter_map(|edge| {
                let kind = kinds.iter().find(|k| edge.is_type(k.edge_type()))?;
                let target = self.labelled(edge.target, kind.label())?;
                Some(Affiliation {
                    kind: *kind,
                    node: target.id,
                    key: target.get_str(KEY_PROPERTY).unwrap_or_default().to_string(),
                    name: target.get_str("name").unwrap_or_default().to_string(),
                })
            })
            .collect()
    }

    fn projects(&self) -> Vec<ProjectRow> {
        self.get_nodes_by_label(&Label::new(PROJECT))
            .into_iter()
            .map(project_row)
            .collect()
    }

    fn project(&self, node: NodeId) -> Option<ProjectRow> {
        self.labelled(node, PROJECT).map(project_row)
    }

    fn project_by_key(&self, key: &str) -> Option<ProjectRow> {
        self.find_node(&Label::new(PROJECT), key)
            .and_then(|node| self.project(node))
    }

    fn skills(&self) -> Vec<(SkillId, String)> {
        self.get_nodes_by_label(&Label::new(SKILL))
            .into_iter()
            .filter_map(|n| {
                let id = n.get_str(KEY_PROPERTY).and_then(SkillId::normalize)?;
                let name = n.get_str("name").unwrap_or(id.as_str()).to_string();
                Some((id, name))
            })
            .collect()
    }
}

/// Number of `ASSIGNED_TO` edges in the store, for consistency checks
pub fn assignment_edge_count(store: &GraphStore) -> usize {
    store.get_edges_by_type(&EdgeType::new(ASSIGNED_TO)).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::staffing::{AssignmentSpec, CandidateSpec, ProjectSpec};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed() -> (GraphStore, NodeId, NodeId, NodeId) {
        let mut store = GraphStore::new();
        let c = store
            .upsert_candidate(&CandidateSpec {
                id: "c-1".to_string(),
                name: "Ada".to_string(),
                location: Some("Berlin".to_string()),
                ..Default::default()
            })
            .unwrap();
        let p1 = store
            .upsert_project(&ProjectSpec {
                id: "p-1".to_string(),
                name: "Atlas".to_string(),
                required_skills: vec![],
                start_date: None,
                end_date: None,
                budget: None,
                status: ProjectStatus::Active,
            })
            .unwrap();
        let p2 = store
            .upsert_project(&ProjectSpec {
                id: "p-2".to_string(),
                name: "Borealis".to_string(),
                required_skills: vec![],
                start_date: None,
                end_date: None,
                budget: None,
                status: ProjectStatus::Historical,
            })
            .unwrap();
        (store, c, p1, p2)
    }

    #[test]
    fn test_active_load_ignores_ended_assignments() {
        let (mut store, c, p1, p2) = seed();
        let start = day(2026, 1, 1);
        store
            .insert_assignment(c, p1, AssignmentSpec::new(0.5).ending(Some(day(2026, 3, 31))), start)
            .unwrap();
        store.insert_assignment(c, p2, AssignmentSpec::new(0.25), start).unwrap();

        assert!((store.active_load(c, day(2026, 3, 31)) - 0.75).abs() < 1e-9);
        assert!((store.active_load(c, day(2026, 4, 1)) - 0.25).abs() < 1e-9);
        assert!((store.load_after(c, day(2026, 3, 31)) - 0.25).abs() < 1e-9);
        assert_eq!(assignment_edge_count(&store), 2);
    }

    #[test]
    fn test_affiliations_include_projects_once() {
        let (mut store, c, p1, _) = seed();
        let start = day(2026, 1, 1);
        store.link_affiliation(c, AffiliationKind::Company, "Acme Corp", None, None).unwrap();
        store.insert_assignment(c, p1, AssignmentSpec::new(0.25), start).unwrap();
        store.insert_assignment(c, p1, AssignmentSpec::new(0.25), start).unwrap();

        let links = store.affiliations_of(c);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].kind, AffiliationKind::Company);
        assert_eq!(links[0].key, "acme corp");
        assert_eq!(links[1].name, "Atlas");
    }

    #[test]
    fn test_lookup_by_key_respects_label() {
        let (store, c, _, _) = seed();
        assert_eq!(store.candidate_by_key("c-1").map(|r| r.node), Some(c));
        assert!(store.candidate_by_key("p-1").is_none());
        assert_eq!(store.project_by_key("p-2").map(|p| p.status), Some(ProjectStatus::Historical));
    }
}
