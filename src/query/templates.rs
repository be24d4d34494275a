//! Deterministic query templates
//!
//! One function per template. Each reads through a
//! [`GraphView`](crate::graph::GraphView), so the same code runs against the
//! live store and against a simulation overlay. Every result carries the
//! template id, a parameterized template text with its parameters, and an
//! explanation built from the filter values.

use super::executor::{QueryResult, QueryValue, Record, RecordBatch};
use super::plan::{AggregateFunction, Aggregation, GroupKey, Intent, NumericField, QueryFilters, TimeWindow};
use super::QueryError;
use crate::cancel::CancelToken;
use crate::graph::staffing::ALLOCATION_EPSILON;
use crate::graph::{AffiliationKind, CandidateRow, GraphView, NodeId, ProjectRow, ProjectStatus, PropertyValue};
use crate::requirement::normalize_location;
use crate::scoring::{location_matches, profile_of, CandidateProfile};
use crate::skills::SkillId;
use chrono::{Duration, NaiveDate};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Template id plus the parameterized text it stands for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTemplate {
    pub id: String,
    pub text: String,
    pub parameters: IndexMap<String, PropertyValue>,
}

impl QueryTemplate {
    pub fn new(id: &str, text: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            text: text.into(),
            parameters: IndexMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }
}

/// Headcount and free capacity of a set of candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub candidates: usize,
    /// Load below 1.0
    pub available: usize,
    pub fully_booked: usize,
    /// Sum of headroom
    pub free_capacity: f64,
}

impl CapacitySnapshot {
    pub fn of(profiles: &[CandidateProfile]) -> Self {
        let available = profiles.iter().filter(|p| p.is_available()).count();
        Self {
            candidates: profiles.len(),
            available,
            fully_booked: profiles.len() - available,
            free_capacity: round2(profiles.iter().map(CandidateProfile::headroom).sum()),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Candidate by id, then by case-insensitive full name
pub fn resolve_candidate(view: &dyn GraphView, raw: &str) -> Option<CandidateRow> {
    let raw = raw.trim();
    view.candidate_by_key(raw).or_else(|| {
        view.candidates()
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(raw))
    })
}

/// Project by id, then by case-insensitive name
pub fn resolve_project(view: &dyn GraphView, raw: &str) -> Option<ProjectRow> {
    let raw = raw.trim();
    view.project_by_key(raw).or_else(|| {
        view.projects()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(raw))
    })
}

/// Candidates named by the person and project filters, `None` when neither
/// is set. A name that resolves to nothing is an `Err` carrying the reason.
fn scope(view: &dyn GraphView, filters: &QueryFilters, today: NaiveDate) -> Result<Option<FxHashSet<NodeId>>, String> {
    let mut scope: Option<FxHashSet<NodeId>> = None;
    if let Some(person) = &filters.person {
        let candidate = resolve_candidate(view, person).ok_or_else(|| format!("no candidate named '{}'", person))?;
        scope = Some(std::iter::once(candidate.node).collect());
    }
    if let Some(project) = &filters.project {
        let project = resolve_project(view, project).ok_or_else(|| format!("no project named '{}'", project))?;
        let members: FxHashSet<NodeId> = view
            .members_of(project.node)
            .into_iter()
            .filter(|a| a.is_active_on(today))
            .map(|a| a.candidate)
            .collect();
        scope = Some(match scope {
            Some(current) => current.intersection(&members).copied().collect(),
            None => members,
        });
    }
    Ok(scope)
}

fn attributes_match(candidate: &CandidateRow, filters: &QueryFilters) -> bool {
    filters.seniority.map_or(true, |s| candidate.seniority == Some(s))
        && location_matches(candidate.location.as_deref(), filters.location.as_deref())
}

/// Profiles passing every filter, in view order
fn matching_profiles(
    view: &dyn GraphView,
    filters: &QueryFilters,
    today: NaiveDate,
    respect_availability: bool,
    cancel: &CancelToken,
) -> Result<Result<Vec<CandidateProfile>, String>, QueryError> {
    let scope = match scope(view, filters, today) {
        Ok(scope) => scope,
        Err(reason) => return Ok(Err(reason)),
    };
    let mut profiles = Vec::new();
    for candidate in view.candidates() {
        cancel.check()?;
        if scope.as_ref().map_or(false, |s| !s.contains(&candidate.node)) || !attributes_match(&candidate, filters) {
            continue;
        }
        let profile = profile_of(view, candidate, today);
        if !filters.skills.iter().all(|s| profile.has_skill(s)) {
            continue;
        }
        if respect_availability && filters.available_only && !profile.is_available() {
            continue;
        }
        profiles.push(profile);
    }
    Ok(Ok(profiles))
}

/// `MATCH (c:Candidate) WHERE ...` for the filters in play
fn candidate_template(id: &str, filters: &QueryFilters, today: NaiveDate, tail: &str) -> QueryTemplate {
    let mut clauses = Vec::new();
    let mut params: Vec<(&str, PropertyValue)> = Vec::new();
    if !filters.skills.is_empty() {
        clauses.push("ALL(s IN $skills WHERE (c)-[:HAS_SKILL]->(:Skill {id: s}))");
        let skills: Vec<String> = filters.skills.iter().map(|s| s.as_str().to_string()).collect();
        params.push(("skills", skills.into()));
    }
    if let Some(location) = &filters.location {
        clauses.push("c.location CONTAINS $location");
        params.push(("location", location.as_str().into()));
    }
    if let Some(seniority) = filters.seniority {
        clauses.push("c.seniority = $seniority");
        params.push(("seniority", seniority.as_str().into()));
    }
    if let Some(person) = &filters.person {
        clauses.push("(c.id = $person OR c.name = $person)");
        params.push(("person", person.as_str().into()));
    }
    if let Some(project) = &filters.project {
        clauses.push("(c)-[:ASSIGNED_TO]->(:Project {id: $project})");
        params.push(("project", project.as_str().into()));
    }
    if filters.available_only {
        clauses.push("load(c, $today) < 1.0");
    }
    params.push(("today", today.into()));

    let mut text = "MATCH (c:Candidate)".to_string();
    if !clauses.is_empty() {
        text.push_str(" WHERE ");
        text.push_str(&clauses.join(" AND "));
    }
    text.push(' ');
    text.push_str(tail);

    params
        .into_iter()
        .fold(QueryTemplate::new(id, text), |template, (name, value)| template.with_param(name, value))
}

fn no_data(intent: Intent, template: QueryTemplate, explanation: String, columns: &[&str]) -> QueryResult {
    QueryResult {
        intent,
        template,
        value: QueryValue::NoData,
        explanation,
        rows: RecordBatch::new(columns),
    }
}

fn skill_names(skills: &[SkillId]) -> Vec<String> {
    skills.iter().map(|s| s.as_str().to_string()).collect()
}

const CANDIDATE_COLUMNS: &[&str] = &[
    "id", "name", "location", "seniority", "hourly_rate", "years_experience", "skills", "current_load",
];

fn candidate_record(profile: &CandidateProfile) -> Record {
    let c = &profile.candidate;
    Record::new()
        .with("id", c.id.as_str())
        .with("name", c.name.as_str())
        .with("location", c.location.clone())
        .with("seniority", c.seniority.map(|s| s.as_str()))
        .with("hourly_rate", c.hourly_rate)
        .with("years_experience", c.years_experience)
        .with("skills", skill_names(&profile.skills))
        .with("current_load", round2(profile.current_load))
}

/// `count_candidates`: distinct candidates matching all filters
pub fn count_candidates(
    view: &dyn GraphView,
    filters: &QueryFilters,
    today: NaiveDate,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let template = candidate_template("count_candidates", filters, today, "RETURN count(DISTINCT c)");
    let profiles = match matching_profiles(view, filters, today, true, cancel)? {
        Ok(profiles) => profiles,
        Err(reason) => return Ok(no_data(Intent::Counting, template, reason, &["id", "name"])),
    };

    let mut rows = RecordBatch::new(&["id", "name"]);
    for profile in &profiles {
        rows.push(
            Record::new()
                .with("id", profile.candidate.id.as_str())
                .with("name", profile.candidate.name.as_str()),
        );
    }
    Ok(QueryResult {
        intent: Intent::Counting,
        template,
        value: QueryValue::Count(profiles.len()),
        explanation: format!("{} matching {}", profiles.len(), filters.describe()),
        rows,
    })
}

fn active_members(view: &dyn GraphView, project: NodeId, today: NaiveDate) -> usize {
    view.members_of(project)
        .into_iter()
        .filter(|a| a.is_active_on(today))
        .map(|a| a.candidate)
        .collect::<FxHashSet<NodeId>>()
        .len()
}

/// `count_projects`: projects in one status, or all of them
pub fn count_projects(
    view: &dyn GraphView,
    status: Option<ProjectStatus>,
    today: NaiveDate,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let template = match status {
        Some(status) => QueryTemplate::new(
            "count_projects",
            "MATCH (p:Project) WHERE p.status = $status RETURN count(p)",
        )
        .with_param("status", status.as_str()),
        None => QueryTemplate::new("count_projects", "MATCH (p:Project) RETURN count(p)"),
    };
    cancel.check()?;

    let mut projects: Vec<ProjectRow> = view
        .projects()
        .into_iter()
        .filter(|p| status.map_or(true, |s| p.status == s))
        .collect();
    projects.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    let mut rows = RecordBatch::new(&["id", "name", "status", "members"]);
    for project in &projects {
        rows.push(
            Record::new()
                .with("id", project.id.as_str())
                .with("name", project.name.as_str())
                .with("status", project.status.as_str())
                .with("members", active_members(view, project.node, today)),
        );
    }
    let kind = status.map(|s| format!("{} ", s.as_str())).unwrap_or_default();
    Ok(QueryResult {
        intent: Intent::Counting,
        template,
        value: QueryValue::Count(projects.len()),
        explanation: format!("{} {}projects", projects.len(), kind),
        rows,
    })
}

/// `count_certified`: candidates passing the filters who hold a
/// certification, one whose name contains `certification` when given
pub fn count_certified(
    view: &dyn GraphView,
    filters: &QueryFilters,
    certification: Option<&str>,
    today: NaiveDate,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let term = certification.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
    let tail = match term {
        Some(_) => "MATCH (c)-[:HAS_CERT]->(x:Certification) WHERE toLower(x.name) CONTAINS $certification RETURN count(DISTINCT c)",
        None => "MATCH (c)-[:HAS_CERT]->(:Certification) RETURN count(DISTINCT c)",
    };
    let mut template = candidate_template("count_certified", filters, today, tail);
    if let Some(term) = &term {
        template = template.with_param("certification", term.as_str());
    }
    let columns: &[&str] = &["id", "name", "certifications"];
    let profiles = match matching_profiles(view, filters, today, true, cancel)? {
        Ok(profiles) => profiles,
        Err(reason) => return Ok(no_data(Intent::Counting, template, reason, columns)),
    };

    let mut rows = RecordBatch::new(columns);
    for profile in &profiles {
        let held: Vec<String> = view
            .provenance_of(profile.node())
            .into_iter()
            .filter(|a| a.kind == AffiliationKind::Certification)
            .map(|a| a.name)
            .filter(|name| term.as_ref().map_or(true, |t| name.to_lowercase().contains(t.as_str())))
            .collect();
        if held.is_empty() {
            continue;
        }
        rows.push(
            Record::new()
                .with("id", profile.candidate.id.as_str())
                .with("name", profile.candidate.name.as_str())
                .with("certifications", held),
        );
    }
    let what = term.map_or_else(|| "a certification".to_string(), |t| format!("a {} certification", t));
    Ok(QueryResult {
        intent: Intent::Counting,
        template,
        value: QueryValue::Count(rows.len()),
        explanation: format!("{} {} hold {}", rows.len(), filters.describe(), what),
        rows,
    })
}

/// `list_candidates`: candidate rows sorted by name then id, capped
pub fn list_candidates(
    view: &dyn GraphView,
    filters: &QueryFilters,
    today: NaiveDate,
    cap: usize,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let template = candidate_template(
        "list_candidates",
        filters,
        today,
        "RETURN c, skills(c), load(c, $today) ORDER BY c.name, c.id LIMIT $limit",
    )
    .with_param("limit", cap);
    let mut profiles = match matching_profiles(view, filters, today, true, cancel)? {
        Ok(profiles) => profiles,
        Err(reason) => return Ok(no_data(Intent::Filtering, template, reason, CANDIDATE_COLUMNS)),
    };
    profiles.sort_by(|a, b| {
        a.candidate
            .name
            .cmp(&b.candidate.name)
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });

    let total = profiles.len();
    let mut rows = RecordBatch::new(CANDIDATE_COLUMNS);
    for profile in profiles.iter().take(cap) {
        rows.push(candidate_record(profile));
    }

    let explanation = match (&filters.person, filters.is_unrestricted() && filters.project.is_none()) {
        (Some(person), true) => match profiles.first() {
            Some(profile) => format!(
                "profile of {}: {} skills, load {:.2}",
                person,
                profile.skills.len(),
                profile.current_load
            ),
            None => format!("no profile for {}", person),
        },
        _ if total > cap => format!("first {} of {} {}", cap, total, filters.describe()),
        _ => format!("{} {}", total, filters.describe()),
    };
    Ok(QueryResult {
        intent: Intent::Filtering,
        template,
        value: QueryValue::Rows(rows.len()),
        explanation,
        rows,
    })
}

fn field_value(profile: &CandidateProfile, field: NumericField) -> Option<f64> {
    match field {
        NumericField::HourlyRate => profile.candidate.hourly_rate,
        NumericField::YearsExperience => profile.candidate.years_experience,
        NumericField::CurrentLoad => Some(profile.current_load),
        NumericField::SkillCount => Some(profile.skills.len() as f64),
    }
}

fn group_label(profile: &CandidateProfile, key: GroupKey) -> String {
    match key {
        GroupKey::Location => profile
            .candidate
            .location
            .as_deref()
            .and_then(normalize_location)
            .unwrap_or_else(|| "unknown".to_string()),
        GroupKey::Seniority => profile
            .candidate
            .seniority
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "unspecified".to_string()),
    }
}

fn apply(function: AggregateFunction, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let result = match function {
        AggregateFunction::Avg => values.iter().sum::<f64>() / values.len() as f64,
        AggregateFunction::Sum => values.iter().sum(),
        AggregateFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregateFunction::Count => values.len() as f64,
    };
    Some(round2(result))
}

/// `aggregate_candidates`: one statistic over a numeric field, optionally
/// grouped. Candidates without a value for the field are skipped; nothing
/// left to aggregate is `NoData`.
pub fn aggregate_candidates(
    view: &dyn GraphView,
    filters: &QueryFilters,
    aggregation: Aggregation,
    today: NaiveDate,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let Aggregation { function, field, group_by } = aggregation;
    let expression = format!("{}(c.{})", function.as_str(), field.as_str());
    let tail = match group_by {
        Some(key) => format!("RETURN c.{}, {} ORDER BY c.{}", key.as_str(), expression, key.as_str()),
        None => format!("RETURN {}", expression),
    };
    let template = candidate_template("aggregate_candidates", filters, today, &tail)
        .with_param("function", function.as_str())
        .with_param("field", field.as_str());
    let columns: &[&str] = &["group", "value", "candidates"];

    let profiles = match matching_profiles(view, filters, today, true, cancel)? {
        Ok(profiles) => profiles,
        Err(reason) => return Ok(no_data(Intent::Aggregation, template, reason, columns)),
    };

    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for profile in &profiles {
        if let Some(value) = field_value(profile, field) {
            let label = group_by.map_or_else(|| "all".to_string(), |key| group_label(profile, key));
            groups.entry(label).or_default().push(value);
        }
    }

    let subject = format!("{} {} of {}", function.as_str(), field.as_str(), filters.describe());
    if groups.is_empty() {
        return Ok(no_data(
            Intent::Aggregation,
            template,
            format!("no data for {}", subject),
            columns,
        ));
    }

    let mut rows = RecordBatch::new(columns);
    let mut results = Vec::with_capacity(groups.len());
    for (label, values) in &groups {
        if let Some(result) = apply(function, values) {
            rows.push(
                Record::new()
                    .with("group", label.as_str())
                    .with("value", result)
                    .with("candidates", values.len()),
            );
            results.push((label.clone(), result));
        }
    }

    let (value, explanation) = match group_by {
        Some(key) => (
            QueryValue::Groups(results.clone()),
            format!("{} per {} over {} groups", subject, key.as_str(), results.len()),
        ),
        None => {
            let result = results.first().map(|(_, v)| *v).unwrap_or_default();
            (QueryValue::Number(result), format!("{} is {}", subject, result))
        }
    };
    Ok(QueryResult {
        intent: Intent::Aggregation,
        template,
        value,
        explanation,
        rows,
    })
}

/// `capacity_summary`: headcount, availability and free capacity.
/// The availability filter is ignored, since the summary reports it.
pub fn capacity_summary(
    view: &dyn GraphView,
    filters: &QueryFilters,
    today: NaiveDate,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let scoped = QueryFilters {
        available_only: false,
        ..filters.clone()
    };
    let template = candidate_template(
        "capacity_summary",
        &scoped,
        today,
        "RETURN count(c), count(load(c, $today) < 1.0), count(load(c, $today) >= 1.0), sum(1.0 - load(c, $today))",
    );
    let columns: &[&str] = &["measure", "value"];
    let profiles = match matching_profiles(view, &scoped, today, false, cancel)? {
        Ok(profiles) => profiles,
        Err(reason) => return Ok(no_data(Intent::Aggregation, template, reason, columns)),
    };
    if profiles.is_empty() {
        let explanation = format!("no {}", scoped.describe());
        return Ok(no_data(Intent::Aggregation, template, explanation, columns));
    }

    let snapshot = CapacitySnapshot::of(&profiles);
    let groups = vec![
        ("candidates".to_string(), snapshot.candidates as f64),
        ("available".to_string(), snapshot.available as f64),
        ("fully_booked".to_string(), snapshot.fully_booked as f64),
        ("free_capacity".to_string(), snapshot.free_capacity),
    ];
    let mut rows = RecordBatch::new(columns);
    for (measure, value) in &groups {
        rows.push(Record::new().with("measure", measure.as_str()).with("value", *value));
    }
    Ok(QueryResult {
        intent: Intent::Aggregation,
        template,
        value: QueryValue::Groups(groups),
        explanation: format!(
            "{} of {} {} have free capacity, {:.2} FTE in total",
            snapshot.available,
            snapshot.candidates,
            scoped.describe(),
            snapshot.free_capacity
        ),
        rows,
    })
}

/// Company, university and project links usable for reasoning
fn links_of(view: &dyn GraphView, candidate: NodeId, kind: Option<AffiliationKind>) -> Vec<(NodeId, String)> {
    view.affiliations_of(candidate)
        .into_iter()
        .filter(|a| a.kind != AffiliationKind::Certification)
        .filter(|a| kind.map_or(true, |k| a.kind == k))
        .map(|a| (a.node, format!("{}:{}", a.kind.as_str(), a.name)))
        .collect()
}

/// `shared_affiliations`: candidate pairs linked through a shared company,
/// university or project. With a person, each collaborator is reported
/// once; without, each unordered pair is reported once.
pub fn shared_affiliations(
    view: &dyn GraphView,
    filters: &QueryFilters,
    link: Option<AffiliationKind>,
    today: NaiveDate,
    cap: usize,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let edge_types = match link {
        Some(kind) => kind.edge_type().to_string(),
        None => "WORKED_AT|STUDIED_AT|ASSIGNED_TO".to_string(),
    };
    let anchor_clause = if filters.person.is_some() {
        " WHERE a.id = $person"
    } else {
        " WHERE id(a) < id(b)"
    };
    let mut template = QueryTemplate::new(
        "shared_affiliations",
        format!(
            "MATCH (a:Candidate)-[:{0}]->(x)<-[:{0}]-(b:Candidate){1} AND a <> b RETURN DISTINCT a, b, collect(x)",
            edge_types, anchor_clause
        ),
    );
    if let Some(person) = &filters.person {
        template = template.with_param("person", person.as_str());
    }
    if let Some(kind) = link {
        template = template.with_param("link", kind.as_str());
    }

    // members per affiliation node, for candidates passing the other filters
    let others = QueryFilters {
        person: None,
        ..filters.clone()
    };
    let mut members: FxHashMap<NodeId, (String, Vec<NodeId>)> = FxHashMap::default();
    let mut names: FxHashMap<NodeId, (String, String)> = FxHashMap::default();
    for candidate in view.candidates() {
        cancel.check()?;
        names.insert(candidate.node, (candidate.id.clone(), candidate.name.clone()));
        for (node, label) in links_of(view, candidate.node, link) {
            let entry = members.entry(node).or_insert_with(|| (label, Vec::new()));
            if !entry.1.contains(&candidate.node) {
                entry.1.push(candidate.node);
            }
        }
    }
    let eligible: FxHashSet<NodeId> = match matching_profiles(view, &others, today, true, cancel)? {
        Ok(profiles) => profiles.iter().map(CandidateProfile::node).collect(),
        Err(reason) => {
            return Ok(no_data(Intent::Reasoning, template, reason, &["a", "b", "shared"]));
        }
    };

    match &filters.person {
        Some(person) => {
            let columns: &[&str] = &["id", "name", "shared"];
            let Some(anchor) = resolve_candidate(view, person) else {
                return Ok(no_data(
                    Intent::Reasoning,
                    template,
                    format!("no candidate named '{}'", person),
                    columns,
                ));
            };
            let mut collaborators: BTreeMap<NodeId, Vec<String>> = BTreeMap::new();
            for (node, _) in links_of(view, anchor.node, link) {
                cancel.check()?;
                let Some((label, nodes)) = members.get(&node) else {
                    continue;
                };
                for other in nodes {
                    if *other != anchor.node && eligible.contains(other) {
                        let shared = collaborators.entry(*other).or_default();
                        if !shared.contains(label) {
                            shared.push(label.clone());
                        }
                    }
                }
            }

            let mut rows = RecordBatch::new(columns);
            let mut ordered: Vec<(&(String, String), &Vec<String>)> = collaborators
                .iter()
                .filter_map(|(node, shared)| names.get(node).map(|n| (n, shared)))
                .collect();
            ordered.sort_by(|a, b| a.0 .1.cmp(&b.0 .1).then_with(|| a.0 .0.cmp(&b.0 .0)));
            for ((id, name), shared) in ordered.iter().take(cap) {
                rows.push(
                    Record::new()
                        .with("id", id.as_str())
                        .with("name", name.as_str())
                        .with("shared", (*shared).clone()),
                );
            }
            Ok(QueryResult {
                intent: Intent::Reasoning,
                template,
                value: QueryValue::Pairs(collaborators.len()),
                explanation: format!("{} has shared history with {} candidates", anchor.name, collaborators.len()),
                rows,
            })
        }
        None => {
            let mut pairs: FxHashMap<(NodeId, NodeId), Vec<String>> = FxHashMap::default();
            for (label, nodes) in members.values() {
                cancel.check()?;
                let nodes: Vec<NodeId> = nodes.iter().copied().filter(|n| eligible.contains(n)).collect();
                for (i, a) in nodes.iter().enumerate() {
                    for b in &nodes[i + 1..] {
                        let key = if a < b { (*a, *b) } else { (*b, *a) };
                        let shared = pairs.entry(key).or_default();
                        if !shared.contains(label) {
                            shared.push(label.clone());
                        }
                    }
                }
            }

            let mut ordered: Vec<(&(NodeId, NodeId), &Vec<String>)> = pairs.iter().collect();
            ordered.sort_by_key(|(key, _)| **key);
            let columns: &[&str] = &["a", "b", "shared"];
            let mut rows = RecordBatch::new(columns);
            for ((a, b), shared) in ordered.iter().take(cap) {
                let name = |node: &NodeId| names.get(node).map(|(_, n)| n.clone()).unwrap_or_default();
                let mut shared = (*shared).clone();
                shared.sort();
                rows.push(
                    Record::new()
                        .with("a", name(a))
                        .with("b", name(b))
                        .with("shared", shared),
                );
            }
            Ok(QueryResult {
                intent: Intent::Reasoning,
                template,
                value: QueryValue::Pairs(pairs.len()),
                explanation: format!("{} pairs of {} share a company, university or project", pairs.len(), others.describe()),
                rows,
            })
        }
    }
}

fn overlap(a: &[SkillId], b: &[SkillId]) -> Vec<String> {
    a.iter().filter(|s| b.contains(s)).map(|s| s.as_str().to_string()).collect()
}

/// `shared_skills`: candidates with at least one skill in common, most
/// overlap first. With a person, each other candidate is reported once;
/// without, each unordered pair is.
pub fn shared_skills(
    view: &dyn GraphView,
    filters: &QueryFilters,
    today: NaiveDate,
    cap: usize,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let mut template = QueryTemplate::new(
        "shared_skills",
        if filters.person.is_some() {
            "MATCH (a:Candidate)-[:HAS_SKILL]->(s:Skill)<-[:HAS_SKILL]-(b:Candidate) WHERE a.id = $person AND a <> b \
             RETURN b, collect(s) ORDER BY count(s) DESC, b.name"
        } else {
            "MATCH (a:Candidate)-[:HAS_SKILL]->(s:Skill)<-[:HAS_SKILL]-(b:Candidate) WHERE id(a) < id(b) \
             RETURN a, b, collect(s) ORDER BY count(s) DESC"
        },
    );
    if let Some(person) = &filters.person {
        template = template.with_param("person", person.as_str());
    }
    let others = QueryFilters {
        person: None,
        ..filters.clone()
    };
    let mut eligible = match matching_profiles(view, &others, today, true, cancel)? {
        Ok(profiles) => profiles,
        Err(reason) => return Ok(no_data(Intent::Reasoning, template, reason, &["a", "b", "shared"])),
    };
    eligible.sort_by_key(CandidateProfile::node);

    match &filters.person {
        Some(person) => {
            let columns: &[&str] = &["id", "name", "shared"];
            let Some(anchor) = resolve_candidate(view, person) else {
                return Ok(no_data(
                    Intent::Reasoning,
                    template,
                    format!("no candidate named '{}'", person),
                    columns,
                ));
            };
            let anchor_skills = view.candidate_skills(anchor.node);
            let mut matches: Vec<(&CandidateProfile, Vec<String>)> = Vec::new();
            for profile in &eligible {
                cancel.check()?;
                if profile.node() == anchor.node {
                    continue;
                }
                let shared = overlap(&anchor_skills, &profile.skills);
                if !shared.is_empty() {
                    matches.push((profile, shared));
                }
            }
            matches.sort_by(|a, b| {
                b.1.len()
                    .cmp(&a.1.len())
                    .then_with(|| a.0.candidate.name.cmp(&b.0.candidate.name))
            });

            let mut rows = RecordBatch::new(columns);
            for (profile, shared) in matches.iter().take(cap) {
                rows.push(
                    Record::new()
                        .with("id", profile.candidate.id.as_str())
                        .with("name", profile.candidate.name.as_str())
                        .with("shared", shared.clone()),
                );
            }
            Ok(QueryResult {
                intent: Intent::Reasoning,
                template,
                value: QueryValue::Pairs(matches.len()),
                explanation: format!("{} shares skills with {} candidates", anchor.name, matches.len()),
                rows,
            })
        }
        None => {
            let mut pairs: Vec<(&CandidateProfile, &CandidateProfile, Vec<String>)> = Vec::new();
            for (i, a) in eligible.iter().enumerate() {
                cancel.check()?;
                for b in &eligible[i + 1..] {
                    let shared = overlap(&a.skills, &b.skills);
                    if !shared.is_empty() {
                        pairs.push((a, b, shared));
                    }
                }
            }
            // stable, so equal overlaps keep node order
            pairs.sort_by(|x, y| y.2.len().cmp(&x.2.len()));

            let columns: &[&str] = &["a", "b", "shared"];
            let mut rows = RecordBatch::new(columns);
            for (a, b, shared) in pairs.iter().take(cap) {
                rows.push(
                    Record::new()
                        .with("a", a.candidate.name.as_str())
                        .with("b", b.candidate.name.as_str())
                        .with("shared", shared.clone()),
                );
            }
            Ok(QueryResult {
                intent: Intent::Reasoning,
                template,
                value: QueryValue::Pairs(pairs.len()),
                explanation: format!("{} pairs of {} share at least one skill", pairs.len(), others.describe()),
                rows,
            })
        }
    }
}

/// Earliest assignment end after which the candidate drops below full load
fn release_date(view: &dyn GraphView, candidate: NodeId, today: NaiveDate) -> Option<NaiveDate> {
    let mut ends: Vec<NaiveDate> = view
        .assignments_of(candidate)
        .into_iter()
        .filter(|a| a.is_active_on(today))
        .filter_map(|a| a.end_date)
        .collect();
    ends.sort();
    ends.dedup();
    ends.into_iter()
        .find(|end| view.load_after(candidate, *end) < 1.0 - ALLOCATION_EPSILON)
}

/// `availability_timeline`: busy candidates whose load drops below 1.0 on
/// or before the cutoff. Questions about now also list candidates who are
/// free today; questions about one person report that person whatever the
/// cutoff.
pub fn availability_timeline(
    view: &dyn GraphView,
    filters: &QueryFilters,
    window: TimeWindow,
    today: NaiveDate,
    default_days: i64,
    cap: usize,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let cutoff = window
        .until
        .unwrap_or_else(|| today + Duration::days(window.days.unwrap_or(default_days)));
    let scoped = QueryFilters {
        available_only: false,
        ..filters.clone()
    };
    let mut template = candidate_template(
        "availability_timeline",
        &scoped,
        today,
        "WITH c WHERE load(c, $today) >= 1.0 AND load_after(c, $until) < 1.0 RETURN c, release(c) ORDER BY release(c), c.name",
    )
    .with_param("until", cutoff);
    if let Some(after) = filters.after {
        template = template.with_param("after", after);
    }

    let columns: &[&str] = &["id", "name", "status", "available_from", "current_load"];
    let profiles = match matching_profiles(view, &scoped, today, false, cancel)? {
        Ok(profiles) => profiles,
        Err(reason) => return Ok(no_data(Intent::Temporal, template, reason, columns)),
    };
    let single = filters.person.is_some();
    let asks_now = cutoff <= today;

    let mut entries: Vec<(NaiveDate, &CandidateProfile, &'static str)> = Vec::new();
    for profile in &profiles {
        cancel.check()?;
        if profile.is_available() {
            if asks_now || single {
                entries.push((today, profile, "available_now"));
            }
            continue;
        }
        match release_date(view, profile.node(), today) {
            Some(end) => {
                let in_window = end <= cutoff && filters.after.map_or(true, |after| end >= after);
                if single || in_window {
                    entries.push((end + Duration::days(1), profile, "frees_up"));
                }
            }
            None if single => entries.push((NaiveDate::MAX, profile, "committed")),
            None => {}
        }
    }
    entries.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.candidate.name.cmp(&b.1.candidate.name))
    });

    let mut rows = RecordBatch::new(columns);
    for (from, profile, status) in entries.iter().take(cap) {
        let available_from = (*status != "committed").then_some(*from);
        rows.push(
            Record::new()
                .with("id", profile.candidate.id.as_str())
                .with("name", profile.candidate.name.as_str())
                .with("status", *status)
                .with("available_from", available_from)
                .with("current_load", round2(profile.current_load)),
        );
    }

    let explanation = if single {
        match entries.first() {
            Some((_, profile, "available_now")) => format!("{} has free capacity now", profile.candidate.name),
            Some((from, profile, "frees_up")) => format!("{} becomes available on {}", profile.candidate.name, from),
            Some((_, profile, _)) => format!("{} has no planned end to current assignments", profile.candidate.name),
            None => "no matching candidate".to_string(),
        }
    } else {
        format!("{} of {} are available by {}", entries.len(), scoped.describe(), cutoff)
    };
    Ok(QueryResult {
        intent: Intent::Temporal,
        template,
        value: QueryValue::Rows(entries.len()),
        explanation,
        rows,
    })
}

/// `current_assignments`: assignments active today for candidates passing
/// the filters, by candidate name then project name
pub fn current_assignments(
    view: &dyn GraphView,
    filters: &QueryFilters,
    today: NaiveDate,
    cap: usize,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let template = candidate_template(
        "current_assignments",
        filters,
        today,
        "MATCH (c)-[a:ASSIGNED_TO]->(p:Project) WHERE a.end_date IS NULL OR a.end_date >= $today \
         RETURN c, p, a ORDER BY c.name, p.name",
    );
    let columns: &[&str] = &["id", "name", "project", "role", "allocation", "end_date"];
    let profiles = match matching_profiles(view, filters, today, true, cancel)? {
        Ok(profiles) => profiles,
        Err(reason) => return Ok(no_data(Intent::Temporal, template, reason, columns)),
    };
    let only = filters
        .project
        .as_deref()
        .and_then(|raw| resolve_project(view, raw))
        .map(|p| p.node);

    let mut entries = Vec::new();
    for profile in &profiles {
        cancel.check()?;
        for assignment in view.assignments_of(profile.node()) {
            if !assignment.is_active_on(today) || only.map_or(false, |node| node != assignment.project) {
                continue;
            }
            let project = view
                .project(assignment.project)
                .map(|p| p.name)
                .unwrap_or_else(|| assignment.project.to_string());
            entries.push((profile, project, assignment));
        }
    }
    entries.sort_by(|a, b| {
        a.0.candidate
            .name
            .cmp(&b.0.candidate.name)
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut rows = RecordBatch::new(columns);
    for (profile, project, assignment) in entries.iter().take(cap) {
        rows.push(
            Record::new()
                .with("id", profile.candidate.id.as_str())
                .with("name", profile.candidate.name.as_str())
                .with("project", project.as_str())
                .with("role", assignment.role.clone())
                .with("allocation", round2(assignment.allocation))
                .with("end_date", assignment.end_date),
        );
    }
    let people: FxHashSet<NodeId> = entries.iter().map(|(p, _, _)| p.node()).collect();
    Ok(QueryResult {
        intent: Intent::Temporal,
        template,
        value: QueryValue::Rows(entries.len()),
        explanation: format!("{} active assignments across {} candidates", entries.len(), people.len()),
        rows,
    })
}

/// `projects_ending`: open projects by planned end date. Without a window
/// every open project with an end date ahead is listed.
pub fn projects_ending(
    view: &dyn GraphView,
    filters: &QueryFilters,
    window: TimeWindow,
    today: NaiveDate,
    cap: usize,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let cutoff = window
        .until
        .or_else(|| window.days.map(|days| today + Duration::days(days)));
    let mut template = QueryTemplate::new(
        "projects_ending",
        match cutoff {
            Some(_) => "MATCH (p:Project) WHERE p.status <> 'historical' AND $today <= p.end_date <= $until \
                        RETURN p ORDER BY p.end_date, p.name",
            None => "MATCH (p:Project) WHERE p.status <> 'historical' AND p.end_date >= $today \
                     RETURN p ORDER BY p.end_date, p.name",
        },
    )
    .with_param("today", today);
    if let Some(cutoff) = cutoff {
        template = template.with_param("until", cutoff);
    }
    let columns: &[&str] = &["id", "name", "status", "end_date", "days_left", "members"];
    let only = match filters.project.as_deref() {
        Some(raw) => match resolve_project(view, raw) {
            Some(project) => Some(project.node),
            None => {
                return Ok(no_data(
                    Intent::Temporal,
                    template,
                    format!("no project named '{}'", raw),
                    columns,
                ))
            }
        },
        None => None,
    };
    cancel.check()?;

    let mut ending: Vec<(NaiveDate, ProjectRow)> = view
        .projects()
        .into_iter()
        .filter(|p| p.status != ProjectStatus::Historical)
        .filter(|p| only.map_or(true, |node| node == p.node))
        .filter_map(|p| p.end_date.map(|end| (end, p)))
        .filter(|(end, _)| {
            *end >= today
                && cutoff.map_or(true, |cutoff| *end <= cutoff)
                && filters.after.map_or(true, |after| *end >= after)
        })
        .collect();
    ending.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));

    let mut rows = RecordBatch::new(columns);
    for (end, project) in ending.iter().take(cap) {
        rows.push(
            Record::new()
                .with("id", project.id.as_str())
                .with("name", project.name.as_str())
                .with("status", project.status.as_str())
                .with("end_date", *end)
                .with("days_left", (*end - today).num_days())
                .with("members", active_members(view, project.node, today)),
        );
    }
    let explanation = match cutoff {
        Some(cutoff) => format!("{} open projects end by {}", ending.len(), cutoff),
        None => format!("{} open projects have a planned end", ending.len()),
    };
    Ok(QueryResult {
        intent: Intent::Temporal,
        template,
        value: QueryValue::Rows(ending.len()),
        explanation,
        rows,
    })
}

/// Holders and available holders per skill
fn holder_counts(
    view: &dyn GraphView,
    today: NaiveDate,
    cancel: &CancelToken,
) -> Result<FxHashMap<SkillId, (usize, usize)>, QueryError> {
    let mut counts: FxHashMap<SkillId, (usize, usize)> = FxHashMap::default();
    for candidate in view.candidates() {
        cancel.check()?;
        let profile = profile_of(view, candidate, today);
        for skill in &profile.skills {
            let entry = counts.entry(skill.clone()).or_default();
            entry.0 += 1;
            if profile.is_available() {
                entry.1 += 1;
            }
        }
    }
    Ok(counts)
}

/// `skill_gap`: required skills of open projects nobody available holds
pub fn skill_gap(view: &dyn GraphView, today: NaiveDate, cancel: &CancelToken) -> Result<QueryResult, QueryError> {
    let template = QueryTemplate::new(
        "skill_gap",
        "MATCH (p:Project)-[:REQUIRES]->(s:Skill) WHERE p.status <> 'historical' \
         OPTIONAL MATCH (c:Candidate)-[:HAS_SKILL]->(s) \
         WITH p, s, count(c) AS holders, count(CASE WHEN load(c, $today) < 1.0 THEN c END) AS available \
         WHERE available = 0 RETURN p, s, holders",
    )
    .with_param("today", today);
    let columns: &[&str] = &["project", "skill", "holders", "available_holders"];

    let projects: Vec<ProjectRow> = view
        .projects()
        .into_iter()
        .filter(|p| p.status != ProjectStatus::Historical)
        .collect();
    if projects.is_empty() {
        return Ok(no_data(Intent::Scenario, template, "no open projects to check".to_string(), columns));
    }

    let counts = holder_counts(view, today, cancel)?;
    let mut rows = RecordBatch::new(columns);
    let mut missing: Vec<String> = Vec::new();
    for project in &projects {
        for skill in &project.required_skills {
            let (holders, available) = counts.get(skill).copied().unwrap_or_default();
            if available > 0 {
                continue;
            }
            rows.push(
                Record::new()
                    .with("project", project.name.as_str())
                    .with("skill", skill.as_str())
                    .with("holders", holders)
                    .with("available_holders", available),
            );
            if !missing.iter().any(|m| m == skill.as_str()) {
                missing.push(skill.as_str().to_string());
            }
        }
    }

    let explanation = if missing.is_empty() {
        format!("every required skill of {} open projects has an available holder", projects.len())
    } else {
        format!("no available holder for {}", missing.join(", "))
    };
    Ok(QueryResult {
        intent: Intent::Scenario,
        template,
        value: QueryValue::Rows(rows.len()),
        explanation,
        rows,
    })
}

/// `skill_risk`: skills held by at most `threshold` candidates
pub fn skill_risk(
    view: &dyn GraphView,
    threshold: usize,
    today: NaiveDate,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let template = QueryTemplate::new(
        "skill_risk",
        "MATCH (c:Candidate)-[:HAS_SKILL]->(s:Skill) WITH s, count(c) AS holders \
         WHERE holders <= $threshold RETURN s, holders ORDER BY holders, s.id",
    )
    .with_param("threshold", threshold);
    let columns: &[&str] = &["skill", "holders", "required_by"];

    let counts = holder_counts(view, today, cancel)?;
    let mut required_by: FxHashMap<SkillId, usize> = FxHashMap::default();
    for project in view.projects() {
        if project.status == ProjectStatus::Historical {
            continue;
        }
        for skill in project.required_skills {
            *required_by.entry(skill).or_default() += 1;
        }
    }

    let mut risky: Vec<(usize, &SkillId)> = counts
        .iter()
        .filter(|(_, (holders, _))| *holders <= threshold)
        .map(|(skill, (holders, _))| (*holders, skill))
        .collect();
    risky.sort();

    let mut rows = RecordBatch::new(columns);
    for (holders, skill) in &risky {
        rows.push(
            Record::new()
                .with("skill", skill.as_str())
                .with("holders", *holders)
                .with("required_by", required_by.get(*skill).copied().unwrap_or(0)),
        );
    }
    Ok(QueryResult {
        intent: Intent::Scenario,
        template,
        value: QueryValue::Rows(rows.len()),
        explanation: format!("{} skills are held by {} or fewer candidates", rows.len(), threshold),
        rows,
    })
}


/// `team_composition`: candidates with free capacity ranked for a new team.
/// Headroom weighs most, then breadth of skills. Requested skills earn a
/// bonus each, and a candidate must cover at least one of them.
pub fn team_composition(
    view: &dyn GraphView,
    filters: &QueryFilters,
    today: NaiveDate,
    cap: usize,
    cancel: &CancelToken,
) -> Result<QueryResult, QueryError> {
    let scoped = QueryFilters {
        skills: Vec::new(),
        available_only: false,
        ..filters.clone()
    };
    let template = candidate_template(
        "team_composition",
        &scoped,
        today,
        "WITH c, load(c, $today) AS load WHERE load < 1.0 \
         RETURN c, (1.0 - load) * 100 + 5 * size(skills(c)) + 25 * size([s IN $skills WHERE s IN skills(c)]) AS score \
         ORDER BY score DESC, c.name LIMIT $limit",
    )
    .with_param("skills", skill_names(&filters.skills))
    .with_param("limit", cap);
    let columns: &[&str] = &["id", "name", "current_load", "skill_count", "covers", "score"];
    let profiles = match matching_profiles(view, &scoped, today, false, cancel)? {
        Ok(profiles) => profiles,
        Err(reason) => return Ok(no_data(Intent::Scenario, template, reason, columns)),
    };

    let mut ranked: Vec<(f64, &CandidateProfile, Vec<String>)> = Vec::new();
    for profile in profiles.iter().filter(|p| p.is_available()) {
        let covers = overlap(&filters.skills, &profile.skills);
        if !filters.skills.is_empty() && covers.is_empty() {
            continue;
        }
        let score = profile.headroom() * 100.0 + 5.0 * profile.skills.len() as f64 + 25.0 * covers.len() as f64;
        ranked.push((round2(score), profile, covers));
    }
    ranked.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| a.1.candidate.name.cmp(&b.1.candidate.name))
    });
    ranked.truncate(cap);

    let mut rows = RecordBatch::new(columns);
    let mut covered: FxHashSet<String> = FxHashSet::default();
    for (score, profile, covers) in &ranked {
        covered.extend(covers.iter().cloned());
        rows.push(
            Record::new()
                .with("id", profile.candidate.id.as_str())
                .with("name", profile.candidate.name.as_str())
                .with("current_load", round2(profile.current_load))
                .with("skill_count", profile.skills.len())
                .with("covers", covers.clone())
                .with("score", *score),
        );
    }
    let missing: Vec<&str> = filters
        .skills
        .iter()
        .map(SkillId::as_str)
        .filter(|s| !covered.contains(*s))
        .collect();
    let mut explanation = format!("{} candidates with free capacity ranked for the team", ranked.len());
    if !missing.is_empty() {
        explanation.push_str(&format!("; nobody available covers {}", missing.join(", ")));
    }
    Ok(QueryResult {
        intent: Intent::Scenario,
        template,
        value: QueryValue::Rows(ranked.len()),
        explanation,
        rows,
    })
}
