//! Two-tier question planning
//!
//! The heuristic tier answers when exactly one rule fires. Otherwise the
//! model tier may pick one of the fixed intent tags; its filters are merged
//! under the heuristic ones. Whatever the model says, the resulting plan is
//! still one of the typed templates.

use super::heuristics::{QuestionReader, Reading, Verdict};
use super::plan::{
    AggregateFunction, Aggregation, GroupKey, Intent, Measure, NumericField, PlanOutcome, PlanSource,
    QueryFilters, QueryPlan, ScenarioPlan,
};
use super::QueryError;
use crate::cancel::CancelToken;
use crate::config::QueryConfig;
use crate::llm::IntentClassifier;
use crate::requirement::normalize_location;
use crate::skills::normalize_all;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const UNCLEAR: &str = "could not tell what kind of question this is; try naming a skill, a person or a number to compute";

/// Why a model reply produced no plan
enum Rejection {
    /// Reply ignored; ask for clarification
    Unusable(String),
    /// Reply asked for something no template can compute
    Invalid(String),
}

pub struct QueryPlanner {
    classifier: Option<Arc<dyn IntentClassifier>>,
    timeout: Duration,
}

impl QueryPlanner {
    /// Heuristic tier only
    pub fn new(config: &QueryConfig) -> Self {
        Self {
            classifier: None,
            timeout: Duration::from_millis(config.classifier_timeout_ms),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn has_model_tier(&self) -> bool {
        self.classifier.is_some()
    }

    pub async fn plan(
        &self,
        question: &str,
        reader: &QuestionReader,
        cancel: &CancelToken,
    ) -> Result<PlanOutcome, QueryError> {
        cancel.check()?;
        let question = question.trim();
        if question.is_empty() {
            return Ok(PlanOutcome::clarification("the question is empty"));
        }

        let reading = reader.read(question);
        let fired = match reading.verdict() {
            Verdict::Confident(plan) => {
                debug!(intent = %plan.intent, "heuristic tier confident");
                return Ok(PlanOutcome::Plan(plan));
            }
            Verdict::Ambiguous { fired, .. } => {
                debug!(?fired, "heuristic tier ambiguous");
                fired
            }
            Verdict::Unsure => {
                debug!("heuristic tier found no intent");
                Vec::new()
            }
        };

        let Some(classifier) = &self.classifier else {
            return Ok(clarify(&fired, UNCLEAR));
        };

        let budget = cancel
            .deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .map_or(self.timeout, |left| left.min(self.timeout));
        let tags = Intent::tags();
        let reply = tokio::time::timeout(budget, classifier.classify(question, &tags)).await;
        cancel.check()?;

        let value = match reply {
            Err(_) => {
                warn!(timeout_ms = budget.as_millis() as u64, "intent classifier timed out");
                return Ok(clarify(&fired, "the intent classifier did not answer in time"));
            }
            Ok(Err(e)) => {
                warn!(error = %e, "intent classifier failed");
                return Ok(clarify(&fired, "the intent classifier is unavailable"));
            }
            Ok(Ok(value)) => value,
        };

        match model_plan(&value, &reading) {
            Ok(plan) => {
                info!(intent = %plan.intent, "model tier classified question");
                Ok(PlanOutcome::Plan(plan))
            }
            Err(Rejection::Unusable(reason)) => {
                debug!(%reason, "model reply ignored");
                Ok(clarify(&fired, reason))
            }
            Err(Rejection::Invalid(reason)) => Err(QueryError::Validation(reason)),
        }
    }
}

/// Both tiers came up empty. Several fired rules are named back to the
/// caller rather than resolved by precedence.
fn clarify(fired: &[Intent], reason: impl Into<String>) -> PlanOutcome {
    if fired.len() < 2 {
        return PlanOutcome::clarification(reason);
    }
    let tags: Vec<&str> = fired.iter().map(Intent::tag).collect();
    PlanOutcome::clarification(format!(
        "the question reads as more than one kind ({}); rephrase it as one of them",
        tags.join(", ")
    ))
}

fn model_plan(value: &Value, reading: &Reading) -> Result<QueryPlan, Rejection> {
    let tag = value
        .get("intent")
        .and_then(Value::as_str)
        .ok_or_else(|| Rejection::Unusable("the classifier reply carries no intent tag".to_string()))?;
    let intent: Intent = tag.parse().map_err(Rejection::Unusable)?;

    let mut reading = reading.clone();
    reading.filters.merge_missing(model_filters(value.get("filters")));
    if intent == Intent::Aggregation && reading.measure.is_none() {
        reading.measure = Some(model_measure(value.get("aggregation"))?);
    }
    if intent == Intent::Scenario && reading.scenario.is_none() {
        reading.scenario = match value.get("scenario").and_then(Value::as_str) {
            Some("skill_gap") | Some("gap") => Some(ScenarioPlan::SkillGap),
            Some("risk") => Some(ScenarioPlan::Risk),
            Some("team_composition") | Some("team") => Some(ScenarioPlan::TeamComposition),
            _ => None,
        };
    }

    reading
        .plan_for(intent, PlanSource::Model)
        .ok_or_else(|| Rejection::Unusable(format!("not enough detail to answer a {} question", intent)))
}

/// Text field that is present, not blank and not a spelled-out null
fn text(value: &Value, key: &str) -> Option<String> {
    let raw = value.get(key)?.as_str()?.trim();
    if raw.is_empty() || matches!(raw.to_lowercase().as_str(), "null" | "none" | "n/a") {
        None
    } else {
        Some(raw.to_string())
    }
}

fn date(value: &Value, key: &str) -> Option<NaiveDate> {
    text(value, key).and_then(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok())
}

/// Normalize model filters; malformed entries are dropped, not trusted
fn model_filters(value: Option<&Value>) -> QueryFilters {
    let Some(value) = value.filter(|v| v.is_object()) else {
        return QueryFilters::default();
    };
    let skills: Vec<String> = match value.get("skills") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        Some(Value::String(csv)) => csv.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    QueryFilters {
        skills: normalize_all(&skills),
        location: text(value, "location").as_deref().and_then(normalize_location),
        seniority: text(value, "seniority").and_then(|s| s.parse().ok()),
        person: text(value, "person"),
        project: text(value, "project"),
        available_only: value.get("available_only").and_then(Value::as_bool).unwrap_or(false),
        after: date(value, "after"),
        before: date(value, "before"),
    }
}

fn model_measure(value: Option<&Value>) -> Result<Measure, Rejection> {
    let Some(value) = value.filter(|v| v.is_object()) else {
        return Err(Rejection::Unusable("the classifier named no aggregation".to_string()));
    };
    let field = text(value, "field")
        .ok_or_else(|| Rejection::Unusable("the classifier named no field to aggregate".to_string()))?;
    if field.eq_ignore_ascii_case("capacity") {
        return Ok(Measure::Capacity);
    }
    let field: NumericField = field.parse().map_err(Rejection::Invalid)?;
    let function: AggregateFunction = text(value, "function")
        .unwrap_or_else(|| "avg".to_string())
        .parse()
        .map_err(Rejection::Invalid)?;
    let group_by = text(value, "group_by")
        .map(|key| key.parse::<GroupKey>())
        .transpose()
        .map_err(Rejection::Invalid)?;
    Ok(Measure::Statistic(Aggregation {
        function,
        field,
        group_by,
    }))
}
