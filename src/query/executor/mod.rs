//! Plan execution
//!
//! Dispatches a typed plan to its template. Execution is synchronous and
//! read-only; callers hand in a view, typically a read guard on the shared
//! store or a simulation overlay.

pub mod record;

pub use record::{Record, RecordBatch};

use super::plan::{CountTarget, Intent, Link, Measure, QueryPlan, ScenarioPlan, TemporalFocus};
use super::templates::{self, QueryTemplate};
use super::QueryError;
use crate::cancel::CancelToken;
use crate::config::QueryConfig;
use crate::graph::GraphView;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Shaped answer of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum QueryValue {
    Count(usize),
    /// Rounded to two decimals
    Number(f64),
    Groups(Vec<(String, f64)>),
    Rows(usize),
    Pairs(usize),
    /// Nothing to compute over; not an error
    NoData,
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Count(n) => write!(f, "{}", n),
            QueryValue::Number(x) => write!(f, "{:.2}", x),
            QueryValue::Groups(groups) => {
                let parts: Vec<String> = groups.iter().map(|(k, v)| format!("{}={:.2}", k, v)).collect();
                write!(f, "{}", parts.join(", "))
            }
            QueryValue::Rows(n) => write!(f, "{} rows", n),
            QueryValue::Pairs(n) => write!(f, "{} pairs", n),
            QueryValue::NoData => write!(f, "no data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub intent: Intent,
    pub template: QueryTemplate,
    pub value: QueryValue,
    pub explanation: String,
    pub rows: RecordBatch,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        matches!(self.value, QueryValue::NoData | QueryValue::Count(0) | QueryValue::Rows(0) | QueryValue::Pairs(0))
    }
}

/// Runs plans against a view
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    config: QueryConfig,
}

impl QueryExecutor {
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Execute one plan. Simulation plans are rejected; they belong to the
    /// scenario simulator, which owns the overlay.
    pub fn execute(
        &self,
        plan: &QueryPlan,
        view: &dyn GraphView,
        today: NaiveDate,
        cancel: &CancelToken,
    ) -> Result<QueryResult, QueryError> {
        cancel.check()?;
        let cap = self.config.result_cap;
        let filters = &plan.filters;

        let result = match plan.intent {
            Intent::Counting => match &plan.target {
                CountTarget::Candidates => templates::count_candidates(view, filters, today, cancel)?,
                CountTarget::Projects { status } => templates::count_projects(view, *status, today, cancel)?,
                CountTarget::CertificationHolders { certification } => {
                    templates::count_certified(view, filters, certification.as_deref(), today, cancel)?
                }
            },
            Intent::Filtering => templates::list_candidates(view, filters, today, cap, cancel)?,
            Intent::Aggregation => match plan.measure {
                Some(Measure::Statistic(aggregation)) => {
                    templates::aggregate_candidates(view, filters, aggregation, today, cancel)?
                }
                Some(Measure::Capacity) => templates::capacity_summary(view, filters, today, cancel)?,
                None => {
                    return Err(QueryError::Validation(
                        "aggregation plan names no measure".to_string(),
                    ))
                }
            },
            Intent::Reasoning => match plan.link {
                Some(Link::Skill) => templates::shared_skills(view, filters, today, cap, cancel)?,
                Some(Link::Affiliation(kind)) => {
                    templates::shared_affiliations(view, filters, Some(kind), today, cap, cancel)?
                }
                None => templates::shared_affiliations(view, filters, None, today, cap, cancel)?,
            },
            Intent::Temporal => match plan.focus {
                TemporalFocus::Availability => templates::availability_timeline(
                    view,
                    filters,
                    plan.window.unwrap_or_default(),
                    today,
                    self.config.temporal_window_days,
                    cap,
                    cancel,
                )?,
                TemporalFocus::Assignments => templates::current_assignments(view, filters, today, cap, cancel)?,
                TemporalFocus::ProjectEnds => {
                    templates::projects_ending(view, filters, plan.window.unwrap_or_default(), today, cap, cancel)?
                }
            },
            Intent::Scenario => match &plan.scenario {
                Some(ScenarioPlan::SkillGap) => templates::skill_gap(view, today, cancel)?,
                Some(ScenarioPlan::Risk) => templates::skill_risk(view, self.config.risk_threshold, today, cancel)?,
                Some(ScenarioPlan::TeamComposition) => templates::team_composition(view, filters, today, cap, cancel)?,
                Some(ScenarioPlan::Simulate { .. }) => {
                    return Err(QueryError::Validation(
                        "simulation plans run in the scenario simulator".to_string(),
                    ))
                }
                None => {
                    return Err(QueryError::Validation(
                        "scenario plan names no scenario".to_string(),
                    ))
                }
            },
        };

        debug!(
            intent = %plan.intent,
            template = %result.template.id,
            value = %result.value,
            "query executed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        AffiliationKind, AssignmentSpec, CandidateSpec, GraphStore, NodeId, ProjectSpec, ProjectStatus, Seniority,
    };
    use crate::query::plan::{AggregateFunction, Aggregation, GroupKey, NumericField, PlanSource, QueryFilters, TimeWindow};
    use crate::graph::PropertyValue;
    use crate::skills::normalize_all;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn candidate(store: &mut GraphStore, id: &str, seniority: Seniority, rate: f64, location: &str, skills: &[&str]) -> NodeId {
        let node = store
            .upsert_candidate(&CandidateSpec {
                id: id.to_string(),
                name: format!("Name {}", id),
                location: Some(location.to_string()),
                seniority: Some(seniority),
                hourly_rate: Some(rate),
                years_experience: Some(5.0),
                ..Default::default()
            })
            .unwrap();
        for skill in skills {
            store.add_candidate_skill(node, skill, None).unwrap();
        }
        node
    }

    fn project(store: &mut GraphStore, id: &str, skills: &[&str], status: ProjectStatus) -> NodeId {
        store
            .upsert_project(&ProjectSpec {
                id: id.to_string(),
                name: format!("Project {}", id),
                required_skills: skills.iter().map(|s| s.to_string()).collect(),
                start_date: None,
                end_date: None,
                budget: None,
                status,
            })
            .unwrap()
    }

    fn plan(intent: Intent, filters: QueryFilters) -> QueryPlan {
        QueryPlan::new(intent, filters, PlanSource::Heuristic)
    }

    fn run(store: &GraphStore, plan: &QueryPlan) -> QueryResult {
        QueryExecutor::default()
            .execute(plan, store, today(), &CancelToken::new())
            .unwrap()
    }

    fn python() -> QueryFilters {
        QueryFilters {
            skills: normalize_all(&["python"]),
            ..Default::default()
        }
    }

    #[test]
    fn test_count_is_case_and_synonym_insensitive() {
        let mut store = GraphStore::new();
        candidate(&mut store, "a", Seniority::Mid, 50.0, "Berlin", &["Python"]);
        candidate(&mut store, "b", Seniority::Mid, 50.0, "Berlin", &["py"]);
        candidate(&mut store, "c", Seniority::Mid, 50.0, "Berlin", &["PYTHON3", "Go"]);
        candidate(&mut store, "d", Seniority::Mid, 50.0, "Berlin", &["Java"]);

        let result = run(&store, &plan(Intent::Counting, python()));
        assert_eq!(result.value, QueryValue::Count(3));
        assert_eq!(result.template.id, "count_candidates");
        assert!(result.template.text.contains("$skills"));
    }

    #[test]
    fn test_available_only_excludes_full_candidates() {
        let mut store = GraphStore::new();
        let busy = candidate(&mut store, "a", Seniority::Mid, 50.0, "Berlin", &["python"]);
        candidate(&mut store, "b", Seniority::Mid, 50.0, "Berlin", &["python"]);
        let p = project(&mut store, "p", &[], ProjectStatus::Active);
        store.insert_assignment(busy, p, AssignmentSpec::new(1.0), today()).unwrap();

        let filters = QueryFilters {
            available_only: true,
            ..python()
        };
        assert_eq!(run(&store, &plan(Intent::Counting, filters)).value, QueryValue::Count(1));
    }

    #[test]
    fn test_list_sorted_capped_and_profile() {
        let mut store = GraphStore::new();
        for id in ["c", "a", "b"] {
            candidate(&mut store, id, Seniority::Mid, 50.0, "Berlin", &["rust"]);
        }
        let executor = QueryExecutor::new(QueryConfig {
            result_cap: 2,
            ..Default::default()
        });
        let result = executor
            .execute(&plan(Intent::Filtering, QueryFilters::default()), &store, today(), &CancelToken::new())
            .unwrap();
        assert_eq!(result.value, QueryValue::Rows(2));
        let names: Vec<_> = result.rows.column("name").into_iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["Name a", "Name b"]);
        assert!(result.explanation.starts_with("first 2 of 3"));

        let profile = QueryFilters {
            person: Some("name c".to_string()),
            ..Default::default()
        };
        let result = run(&store, &plan(Intent::Filtering, profile));
        assert_eq!(result.value, QueryValue::Rows(1));
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("id")), Some("c"));

        let unknown = QueryFilters {
            person: Some("nobody".to_string()),
            ..Default::default()
        };
        assert_eq!(run(&store, &plan(Intent::Filtering, unknown)).value, QueryValue::NoData);
    }

    #[test]
    fn test_aggregation_and_empty_set() {
        let mut store = GraphStore::new();
        candidate(&mut store, "a", Seniority::Senior, 100.0, "Berlin", &["python"]);
        candidate(&mut store, "b", Seniority::Senior, 80.0, "Paris, France", &["python"]);
        candidate(&mut store, "c", Seniority::Junior, 40.0, "Paris", &["python"]);

        let avg_rate = Measure::Statistic(Aggregation {
            function: AggregateFunction::Avg,
            field: NumericField::HourlyRate,
            group_by: None,
        });
        let senior = QueryFilters {
            seniority: Some(Seniority::Senior),
            ..python()
        };
        let result = run(&store, &plan(Intent::Aggregation, senior).with_measure(avg_rate));
        assert_eq!(result.value, QueryValue::Number(90.0));

        let grouped = Measure::Statistic(Aggregation {
            function: AggregateFunction::Max,
            field: NumericField::HourlyRate,
            group_by: Some(GroupKey::Location),
        });
        let result = run(&store, &plan(Intent::Aggregation, python()).with_measure(grouped));
        assert_eq!(
            result.value,
            QueryValue::Groups(vec![("Berlin".to_string(), 100.0), ("Paris".to_string(), 80.0)])
        );

        let nobody = QueryFilters {
            seniority: Some(Seniority::Principal),
            ..python()
        };
        let result = run(&store, &plan(Intent::Aggregation, nobody).with_measure(avg_rate));
        assert_eq!(result.value, QueryValue::NoData);
        assert!(result.is_empty());
    }

    #[test]
    fn test_capacity_summary() {
        let mut store = GraphStore::new();
        let a = candidate(&mut store, "a", Seniority::Mid, 50.0, "Berlin", &[]);
        candidate(&mut store, "b", Seniority::Mid, 50.0, "Berlin", &[]);
        let p = project(&mut store, "p", &[], ProjectStatus::Active);
        store.insert_assignment(a, p, AssignmentSpec::new(0.75), today()).unwrap();

        let result = run(
            &store,
            &plan(Intent::Aggregation, QueryFilters::default()).with_measure(Measure::Capacity),
        );
        assert_eq!(result.template.id, "capacity_summary");
        match result.value {
            QueryValue::Groups(groups) => {
                assert_eq!(groups[0], ("candidates".to_string(), 2.0));
                assert_eq!(groups[1], ("available".to_string(), 2.0));
                assert_eq!(groups[3], ("free_capacity".to_string(), 1.25));
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_reasoning_pairs_are_unique() {
        let mut store = GraphStore::new();
        let a = candidate(&mut store, "a", Seniority::Mid, 50.0, "Berlin", &[]);
        let b = candidate(&mut store, "b", Seniority::Mid, 50.0, "Berlin", &[]);
        let c = candidate(&mut store, "c", Seniority::Mid, 50.0, "Berlin", &[]);
        // a and b share both a company and a university
        for node in [a, b] {
            store.link_affiliation(node, AffiliationKind::Company, "Initech", None, None).unwrap();
            store.link_affiliation(node, AffiliationKind::University, "MIT", None, None).unwrap();
        }
        store.link_affiliation(c, AffiliationKind::Company, "Initech", None, None).unwrap();

        let result = run(&store, &plan(Intent::Reasoning, QueryFilters::default()));
        assert_eq!(result.value, QueryValue::Pairs(3));
        assert_eq!(result.rows.len(), 3);

        let only_universities = plan(Intent::Reasoning, QueryFilters::default())
            .with_link(Some(Link::Affiliation(AffiliationKind::University)));
        assert_eq!(run(&store, &only_universities).value, QueryValue::Pairs(1));
    }

    #[test]
    fn test_timeline_lists_candidates_freeing_up() {
        let mut store = GraphStore::new();
        let soon = candidate(&mut store, "soon", Seniority::Mid, 50.0, "Berlin", &[]);
        let later = candidate(&mut store, "later", Seniority::Mid, 50.0, "Berlin", &[]);
        candidate(&mut store, "free", Seniority::Mid, 50.0, "Berlin", &[]);
        let p = project(&mut store, "p", &[], ProjectStatus::Active);
        let end_soon = today() + chrono::Duration::days(10);
        let end_later = today() + chrono::Duration::days(90);
        store
            .insert_assignment(soon, p, AssignmentSpec::new(1.0).ending(Some(end_soon)), today())
            .unwrap();
        store
            .insert_assignment(later, p, AssignmentSpec::new(1.0).ending(Some(end_later)), today())
            .unwrap();

        let result = run(&store, &plan(Intent::Temporal, QueryFilters::default()));
        assert_eq!(result.value, QueryValue::Rows(1));
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("id")), Some("soon"));

        let now = plan(Intent::Temporal, QueryFilters::default()).with_window(TimeWindow {
            until: None,
            days: Some(0),
        });
        let result = run(&store, &now);
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("status")), Some("available_now"));

        let person = QueryFilters {
            person: Some("later".to_string()),
            ..Default::default()
        };
        let result = run(&store, &plan(Intent::Temporal, person));
        assert_eq!(result.value, QueryValue::Rows(1));
        assert!(result.explanation.contains(&(end_later + chrono::Duration::days(1)).to_string()));
    }

    #[test]
    fn test_gap_and_risk() {
        let mut store = GraphStore::new();
        let busy = candidate(&mut store, "a", Seniority::Mid, 50.0, "Berlin", &["rust"]);
        candidate(&mut store, "b", Seniority::Mid, 50.0, "Berlin", &["python"]);
        candidate(&mut store, "c", Seniority::Mid, 50.0, "Berlin", &["python"]);
        candidate(&mut store, "d", Seniority::Mid, 50.0, "Berlin", &["python"]);
        let p = project(&mut store, "p", &["Rust", "Python", "Haskell"], ProjectStatus::Active);
        store.insert_assignment(busy, p, AssignmentSpec::new(1.0), today()).unwrap();

        let gap = plan(Intent::Scenario, QueryFilters::default()).with_scenario(ScenarioPlan::SkillGap);
        let result = run(&store, &gap);
        assert_eq!(result.value, QueryValue::Rows(2));
        let skills: Vec<_> = result.rows.column("skill").into_iter().map(|v| v.to_string()).collect();
        assert!(skills.contains(&"rust".to_string()) && skills.contains(&"haskell".to_string()));

        let risk = plan(Intent::Scenario, QueryFilters::default()).with_scenario(ScenarioPlan::Risk);
        let result = run(&store, &risk);
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("skill")), Some("rust"));
        assert_eq!(result.value, QueryValue::Rows(1));
    }

    #[test]
    fn test_counting_projects_and_certifications() {
        let mut store = GraphStore::new();
        project(&mut store, "p1", &[], ProjectStatus::Active);
        project(&mut store, "p2", &[], ProjectStatus::Active);
        project(&mut store, "p3", &[], ProjectStatus::Historical);
        let a = candidate(&mut store, "a", Seniority::Mid, 50.0, "Berlin", &["aws"]);
        let b = candidate(&mut store, "b", Seniority::Senior, 90.0, "Berlin", &["aws"]);
        candidate(&mut store, "c", Seniority::Senior, 90.0, "Berlin", &["aws"]);
        store
            .link_affiliation(a, AffiliationKind::Certification, "AWS Solutions Architect", None, None)
            .unwrap();
        store.link_affiliation(b, AffiliationKind::Certification, "CKA", None, None).unwrap();

        let active = plan(Intent::Counting, QueryFilters::default()).with_target(CountTarget::Projects {
            status: Some(ProjectStatus::Active),
        });
        let result = run(&store, &active);
        assert_eq!(result.value, QueryValue::Count(2));
        assert_eq!(result.template.id, "count_projects");
        let every = plan(Intent::Counting, QueryFilters::default()).with_target(CountTarget::Projects { status: None });
        assert_eq!(run(&store, &every).value, QueryValue::Count(3));

        let aws = plan(Intent::Counting, QueryFilters::default()).with_target(CountTarget::CertificationHolders {
            certification: Some("AWS".to_string()),
        });
        let result = run(&store, &aws);
        assert_eq!(result.value, QueryValue::Count(1));
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("id")), Some("a"));
        let any = plan(Intent::Counting, QueryFilters::default())
            .with_target(CountTarget::CertificationHolders { certification: None });
        assert_eq!(run(&store, &any).value, QueryValue::Count(2));
    }

    #[test]
    fn test_shared_skills_orders_by_overlap() {
        let mut store = GraphStore::new();
        candidate(&mut store, "anchor", Seniority::Mid, 50.0, "Berlin", &["python", "rust", "go"]);
        candidate(&mut store, "close", Seniority::Mid, 50.0, "Berlin", &["py", "rust"]);
        candidate(&mut store, "loose", Seniority::Mid, 50.0, "Berlin", &["go", "java"]);
        candidate(&mut store, "none", Seniority::Mid, 50.0, "Berlin", &["java"]);

        let person = QueryFilters {
            person: Some("anchor".to_string()),
            ..Default::default()
        };
        let result = run(&store, &plan(Intent::Reasoning, person).with_link(Some(Link::Skill)));
        assert_eq!(result.template.id, "shared_skills");
        assert_eq!(result.value, QueryValue::Pairs(2));
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("id")), Some("close"));
        assert_eq!(
            result.rows.get(0).and_then(|r| r.get("shared")).cloned(),
            Some(PropertyValue::from(vec!["python".to_string(), "rust".to_string()]))
        );

        // anchor-close, anchor-loose and loose-none
        let result = run(&store, &plan(Intent::Reasoning, QueryFilters::default()).with_link(Some(Link::Skill)));
        assert_eq!(result.value, QueryValue::Pairs(3));
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("b")), Some("Name close"));
    }

    #[test]
    fn test_current_assignments_and_project_ends() {
        let mut store = GraphStore::new();
        let a = candidate(&mut store, "a", Seniority::Mid, 50.0, "Berlin", &[]);
        let b = candidate(&mut store, "b", Seniority::Mid, 50.0, "Berlin", &[]);
        let ending = |id: &str, days: i64, status: ProjectStatus| ProjectSpec {
            id: id.to_string(),
            name: format!("Project {}", id),
            required_skills: vec![],
            start_date: None,
            end_date: Some(today() + chrono::Duration::days(days)),
            budget: None,
            status,
        };
        let soon = store.upsert_project(&ending("soon", 20, ProjectStatus::Active)).unwrap();
        let late = store.upsert_project(&ending("late", 200, ProjectStatus::Active)).unwrap();
        store.upsert_project(&ending("gone", -30, ProjectStatus::Historical)).unwrap();
        store.insert_assignment(a, soon, AssignmentSpec::new(0.5).with_role("Dev"), today()).unwrap();
        store.insert_assignment(a, late, AssignmentSpec::new(0.25), today()).unwrap();
        store
            .insert_assignment(
                b,
                late,
                AssignmentSpec::new(1.0).ending(Some(today() - chrono::Duration::days(1))),
                today(),
            )
            .unwrap();

        let assignments = plan(Intent::Temporal, QueryFilters::default()).with_focus(TemporalFocus::Assignments);
        let result = run(&store, &assignments);
        assert_eq!(result.value, QueryValue::Rows(2));
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("project")), Some("Project late"));
        assert_eq!(result.rows.get(1).and_then(|r| r.get_str("role")), Some("Dev"));

        let one_project = QueryFilters {
            project: Some("soon".to_string()),
            ..Default::default()
        };
        let result = run(&store, &plan(Intent::Temporal, one_project).with_focus(TemporalFocus::Assignments));
        assert_eq!(result.value, QueryValue::Rows(1));

        let ends = plan(Intent::Temporal, QueryFilters::default()).with_focus(TemporalFocus::ProjectEnds);
        let result = run(&store, &ends);
        assert_eq!(result.value, QueryValue::Rows(2));
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("id")), Some("soon"));

        let within = ends.clone().with_window(TimeWindow {
            until: None,
            days: Some(30),
        });
        let result = run(&store, &within);
        assert_eq!(result.value, QueryValue::Rows(1));
        assert_eq!(result.template.id, "projects_ending");
    }

    #[test]
    fn test_team_composition_ranks_headroom_and_coverage() {
        let mut store = GraphStore::new();
        let busy = candidate(&mut store, "busy", Seniority::Mid, 50.0, "Berlin", &["python", "rust", "go"]);
        let half = candidate(&mut store, "half", Seniority::Mid, 50.0, "Berlin", &["python", "rust"]);
        candidate(&mut store, "free", Seniority::Mid, 50.0, "Berlin", &["python"]);
        candidate(&mut store, "other", Seniority::Mid, 50.0, "Berlin", &["java", "scala"]);
        let p = project(&mut store, "p", &[], ProjectStatus::Active);
        store.insert_assignment(busy, p, AssignmentSpec::new(1.0), today()).unwrap();
        store.insert_assignment(half, p, AssignmentSpec::new(0.5), today()).unwrap();

        let team = plan(Intent::Scenario, python()).with_scenario(ScenarioPlan::TeamComposition);
        let result = run(&store, &team);
        assert_eq!(result.template.id, "team_composition");
        // free: 100 + 5 + 25, half: 50 + 10 + 25; busy has no headroom
        assert_eq!(result.value, QueryValue::Rows(2));
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("id")), Some("free"));
        assert_eq!(result.rows.get(1).and_then(|r| r.get("score")), Some(&PropertyValue::Float(85.0)));

        let open = plan(Intent::Scenario, QueryFilters::default()).with_scenario(ScenarioPlan::TeamComposition);
        let result = run(&store, &open);
        assert_eq!(result.value, QueryValue::Rows(3));
        assert_eq!(result.rows.get(0).and_then(|r| r.get_str("id")), Some("other"));
    }

    #[test]
    fn test_rejected_plans_and_cancellation() {
        let store = GraphStore::new();
        let simulate = plan(Intent::Scenario, QueryFilters::default())
            .with_scenario(ScenarioPlan::Simulate { changes: vec![] });
        let executor = QueryExecutor::default();
        assert!(matches!(
            executor.execute(&simulate, &store, today(), &CancelToken::new()),
            Err(QueryError::Validation(_))
        ));
        assert!(matches!(
            executor.execute(&plan(Intent::Aggregation, QueryFilters::default()), &store, today(), &CancelToken::new()),
            Err(QueryError::Validation(_))
        ));

        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            executor.execute(&plan(Intent::Counting, QueryFilters::default()), &store, today(), &cancel),
            Err(QueryError::Interrupted(_))
        ));
    }
}
