//! Typed query plans
//!
//! A plan is the only thing that crosses from classification into
//! execution. It carries an intent tag and structured parameters; there is
//! no query text in it, so nothing a model says can change which query
//! runs.

use crate::graph::{AffiliationKind, ProjectStatus, Seniority};
use crate::requirement::Requirement;
use crate::skills::SkillId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Counting,
    Filtering,
    Aggregation,
    Reasoning,
    Temporal,
    Scenario,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::Counting,
        Intent::Filtering,
        Intent::Aggregation,
        Intent::Reasoning,
        Intent::Temporal,
        Intent::Scenario,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Intent::Counting => "counting",
            Intent::Filtering => "filtering",
            Intent::Aggregation => "aggregation",
            Intent::Reasoning => "reasoning",
            Intent::Temporal => "temporal",
            Intent::Scenario => "scenario",
        }
    }

    pub fn tags() -> Vec<&'static str> {
        Self::ALL.iter().map(Intent::tag).collect()
    }
}

impl FromStr for Intent {
    type Err = String;

    /// Exact tag match only, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|intent| intent.tag() == wanted)
            .ok_or_else(|| format!("'{}' is not an allowed intent", s.trim()))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Entity filters shared by every template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Candidates must hold all of these
    pub skills: Vec<SkillId>,
    pub location: Option<String>,
    pub seniority: Option<Seniority>,
    /// Candidate name or id
    pub person: Option<String>,
    /// Project name or id
    pub project: Option<String>,
    /// Only candidates with load < 1.0
    pub available_only: bool,
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl QueryFilters {
    /// True when no candidate-narrowing filter is set
    pub fn is_unrestricted(&self) -> bool {
        self.skills.is_empty()
            && self.location.is_none()
            && self.seniority.is_none()
            && !self.available_only
    }

    /// Fill fields missing here from `other`; fields already set win
    pub fn merge_missing(&mut self, other: QueryFilters) {
        for skill in other.skills {
            if !self.skills.contains(&skill) {
                self.skills.push(skill);
            }
        }
        self.location = self.location.take().or(other.location);
        self.seniority = self.seniority.or(other.seniority);
        self.person = self.person.take().or(other.person);
        self.project = self.project.take().or(other.project);
        self.available_only |= other.available_only;
        self.after = self.after.or(other.after);
        self.before = self.before.or(other.before);
    }

    /// Human-readable summary used in explanations
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(seniority) = self.seniority {
            parts.push(seniority.to_string());
        }
        if !self.skills.is_empty() {
            let names: Vec<&str> = self.skills.iter().map(SkillId::as_str).collect();
            parts.push(format!("skilled in {}", names.join(" and ")));
        }
        if let Some(location) = &self.location {
            parts.push(format!("in {}", location));
        }
        if self.available_only {
            parts.push("with free capacity".to_string());
        }
        if parts.is_empty() {
            "all candidates".to_string()
        } else {
            format!("candidates {}", parts.join(", "))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "avg",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Count => "count",
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "avg" | "average" | "mean" => Ok(AggregateFunction::Avg),
            "sum" | "total" => Ok(AggregateFunction::Sum),
            "min" | "minimum" | "lowest" => Ok(AggregateFunction::Min),
            "max" | "maximum" | "highest" => Ok(AggregateFunction::Max),
            "count" => Ok(AggregateFunction::Count),
            other => Err(format!("unknown aggregation function '{}'", other)),
        }
    }
}

/// Numeric candidate attributes that can be aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    HourlyRate,
    YearsExperience,
    CurrentLoad,
    SkillCount,
}

impl NumericField {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericField::HourlyRate => "hourly_rate",
            NumericField::YearsExperience => "years_experience",
            NumericField::CurrentLoad => "current_load",
            NumericField::SkillCount => "skill_count",
        }
    }
}

impl FromStr for NumericField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "hourly_rate" | "rate" => Ok(NumericField::HourlyRate),
            "years_experience" | "experience" | "years_of_experience" => Ok(NumericField::YearsExperience),
            "current_load" | "load" | "allocation" | "utilization" => Ok(NumericField::CurrentLoad),
            "skill_count" | "skills" | "number_of_skills" => Ok(NumericField::SkillCount),
            other => Err(format!("unknown numeric field '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    Location,
    Seniority,
}

impl GroupKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKey::Location => "location",
            GroupKey::Seniority => "seniority",
        }
    }
}

impl FromStr for GroupKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "location" | "city" => Ok(GroupKey::Location),
            "seniority" | "level" => Ok(GroupKey::Seniority),
            other => Err(format!("unknown grouping key '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub field: NumericField,
    pub group_by: Option<GroupKey>,
}

/// What an aggregation question measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measure {
    Statistic(Aggregation),
    /// Headcount, availability and free capacity of the workforce
    Capacity,
}

/// Time bounds of a temporal question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Explicit cutoff date
    pub until: Option<NaiveDate>,
    /// Relative horizon from today, used when `until` is absent
    pub days: Option<i64>,
}

/// What a temporal question lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalFocus {
    /// Candidates whose load drops below 1.0 in the window
    #[default]
    Availability,
    /// Assignments active today
    Assignments,
    /// Open projects by end date
    ProjectEnds,
}

/// What a counting question counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum CountTarget {
    #[default]
    Candidates,
    /// `status: None` counts every project
    Projects { status: Option<ProjectStatus> },
    /// Candidates holding a certification whose name contains the term
    CertificationHolders { certification: Option<String> },
}

/// What two candidates must have in common for reasoning plans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "via", content = "kind", rename_all = "snake_case")]
pub enum Link {
    Affiliation(AffiliationKind),
    Skill,
}

/// A hypothetical change applied on a simulation overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ScenarioChange {
    AddAssignment {
        candidate: String,
        project: String,
        allocation: f64,
    },
    /// `project: None` removes every active assignment of the candidate
    RemoveAssignment {
        candidate: String,
        project: Option<String>,
    },
    ChangeAllocation {
        candidate: String,
        project: String,
        allocation: f64,
    },
    /// The project ends today; its members are freed
    ReleaseProject { project: String },
    /// Staff a new project from a requirement, matched against the overlay
    StaffRequirement { requirement: Requirement },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioPlan {
    Simulate { changes: Vec<ScenarioChange> },
    /// Required skills of projects against holders in the workforce
    SkillGap,
    /// Skills held by very few candidates
    Risk,
    /// Available candidates ranked for a new team, no changes applied
    TeamComposition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Heuristic,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub intent: Intent,
    pub filters: QueryFilters,
    /// Set for aggregation plans
    pub measure: Option<Measure>,
    /// Counting plans count candidates unless told otherwise
    #[serde(default)]
    pub target: CountTarget,
    /// Optional restriction of reasoning plans to one link kind
    pub link: Option<Link>,
    /// Set for temporal plans
    pub window: Option<TimeWindow>,
    #[serde(default)]
    pub focus: TemporalFocus,
    /// Set for scenario plans
    pub scenario: Option<ScenarioPlan>,
    pub source: PlanSource,
}

impl QueryPlan {
    pub fn new(intent: Intent, filters: QueryFilters, source: PlanSource) -> Self {
        Self {
            intent,
            filters,
            measure: None,
            target: CountTarget::Candidates,
            link: None,
            window: None,
            focus: TemporalFocus::Availability,
            scenario: None,
            source,
        }
    }

    pub fn with_measure(mut self, measure: Measure) -> Self {
        self.measure = Some(measure);
        self
    }

    pub fn with_target(mut self, target: CountTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_link(mut self, link: Option<Link>) -> Self {
        self.link = link;
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_focus(mut self, focus: TemporalFocus) -> Self {
        self.focus = focus;
        self
    }

    pub fn with_scenario(mut self, scenario: ScenarioPlan) -> Self {
        self.scenario = Some(scenario);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlanOutcome {
    Plan(QueryPlan),
    Clarification { reason: String },
}

impl PlanOutcome {
    pub fn clarification(reason: impl Into<String>) -> Self {
        PlanOutcome::Clarification { reason: reason.into() }
    }

    pub fn plan(&self) -> Option<&QueryPlan> {
        match self {
            PlanOutcome::Plan(plan) => Some(plan),
            PlanOutcome::Clarification { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_tags_round_trip_exactly() {
        for intent in Intent::ALL {
            assert_eq!(intent.tag().parse::<Intent>(), Ok(intent));
        }
        assert_eq!(" Counting ".parse::<Intent>(), Ok(Intent::Counting));
        assert!("count".parse::<Intent>().is_err());
        assert!("MATCH (n) RETURN n".parse::<Intent>().is_err());
    }

    #[test]
    fn test_field_aliases() {
        assert_eq!("hourly rate".parse::<NumericField>(), Ok(NumericField::HourlyRate));
        assert_eq!("years-experience".parse::<NumericField>(), Ok(NumericField::YearsExperience));
        assert!("salary_band".parse::<NumericField>().is_err());
        assert_eq!("average".parse::<AggregateFunction>(), Ok(AggregateFunction::Avg));
    }

    #[test]
    fn test_merge_missing_keeps_existing() {
        let mut mine = QueryFilters {
            location: Some("Berlin".to_string()),
            skills: crate::skills::normalize_all(&["python"]),
            ..Default::default()
        };
        mine.merge_missing(QueryFilters {
            location: Some("Paris".to_string()),
            skills: crate::skills::normalize_all(&["py", "rust"]),
            seniority: Some(Seniority::Senior),
            ..Default::default()
        });
        assert_eq!(mine.location.as_deref(), Some("Berlin"));
        assert_eq!(mine.skills.len(), 2);
        assert_eq!(mine.seniority, Some(Seniority::Senior));
    }

    #[test]
    fn test_plan_defaults_to_candidates_and_availability() {
        let plan: QueryPlan = serde_json::from_value(serde_json::json!({
            "intent": "counting",
            "filters": QueryFilters::default(),
            "measure": null,
            "link": null,
            "window": null,
            "scenario": null,
            "source": "heuristic"
        }))
        .unwrap();
        assert_eq!(plan.target, CountTarget::Candidates);
        assert_eq!(plan.focus, TemporalFocus::Availability);

        let certified = plan.with_target(CountTarget::CertificationHolders {
            certification: Some("aws".to_string()),
        });
        let value = serde_json::to_value(&certified.target).unwrap();
        assert_eq!(value["entity"], "certification_holders");
    }

    #[test]
    fn test_describe_filters() {
        let filters = QueryFilters {
            skills: crate::skills::normalize_all(&["Python"]),
            seniority: Some(Seniority::Senior),
            available_only: true,
            ..Default::default()
        };
        assert_eq!(filters.describe(), "candidates senior, skilled in python, with free capacity");
        assert_eq!(QueryFilters::default().describe(), "all candidates");
    }
}
