//! Staffing service facade
//!
//! Wires the store handle, the matching engine, the planner, the executor
//! and the simulator behind three calls: [`StaffingService::match_team`],
//! [`StaffingService::answer_question`] and [`StaffingService::simulate`].
//! Collaborators are injected; without them the service still answers from
//! heuristics and accepts requirement JSON directly.

use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::config::StaffingConfig;
use crate::error::{StaffingError, StaffingResult};
use crate::graph::{Roster, RosterSummary, SharedGraph};
use crate::llm::{IntentClassifier, LlmClient, LlmIntentClassifier, LlmRequirementExtractor, RequirementExtractor};
use crate::matching::{MatchOptions, MatchingEngine, TeamAssignment};
use crate::query::{
    PlanOutcome, QueryExecutor, QueryPlan, QueryPlanner, QueryResult, QuestionReader, ScenarioChange, ScenarioPlan,
    Vocabulary,
};
use crate::requirement::Requirement;
use crate::scenario::{ImpactReport, ScenarioSimulator};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Reply to a business question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "answer", rename_all = "snake_case")]
pub enum Answer {
    Result { plan: QueryPlan, result: QueryResult },
    Simulation { plan: QueryPlan, report: ImpactReport },
    Clarification { reason: String },
}

impl Answer {
    pub fn plan(&self) -> Option<&QueryPlan> {
        match self {
            Answer::Result { plan, .. } | Answer::Simulation { plan, .. } => Some(plan),
            Answer::Clarification { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&QueryResult> {
        match self {
            Answer::Result { result, .. } => Some(result),
            _ => None,
        }
    }

    /// One line for logs and the command line
    pub fn summary(&self) -> String {
        match self {
            Answer::Result { result, .. } => format!("{} ({})", result.value, result.explanation),
            Answer::Simulation { report, .. } => report.summary(),
            Answer::Clarification { reason } => format!("clarification needed: {}", reason),
        }
    }
}

/// Reply to a what-if request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SimulationOutcome {
    Report(ImpactReport),
    Clarification { reason: String },
}

pub struct StaffingService {
    graph: SharedGraph,
    engine: Arc<MatchingEngine>,
    executor: QueryExecutor,
    planner: QueryPlanner,
    simulator: ScenarioSimulator,
    extractor: Option<Arc<dyn RequirementExtractor>>,
    config: StaffingConfig,
    clock: Arc<dyn Clock>,
}

impl StaffingService {
    /// A service without model collaborators
    pub fn new(graph: SharedGraph, config: StaffingConfig, clock: Arc<dyn Clock>) -> Self {
        let engine = Arc::new(MatchingEngine::new(
            graph.clone(),
            config.scoring.clone(),
            config.matching.clone(),
            Arc::clone(&clock),
        ));
        Self {
            executor: QueryExecutor::new(config.query.clone()),
            planner: QueryPlanner::new(&config.query),
            simulator: ScenarioSimulator::new(Arc::clone(&engine)),
            extractor: None,
            graph,
            engine,
            config,
            clock,
        }
    }

    /// A service whose collaborators come from the `llm` config section
    pub fn from_config(graph: SharedGraph, config: StaffingConfig, clock: Arc<dyn Clock>) -> StaffingResult<Self> {
        let llm = config.llm.clone();
        let mut service = Self::new(graph, config, clock);
        if let Some(llm) = llm {
            info!(provider = ?llm.provider, model = %llm.model, "language model collaborators enabled");
            service = service
                .with_extractor(Arc::new(LlmRequirementExtractor::new(LlmClient::new(&llm)?)))
                .with_classifier(Arc::new(LlmIntentClassifier::new(LlmClient::new(&llm)?)));
        }
        Ok(service)
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn RequirementExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.planner = QueryPlanner::new(&self.config.query).with_classifier(classifier);
        self
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn config(&self) -> &StaffingConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Load a roster document into the store
    pub async fn load_roster(&self, roster: &Roster) -> StaffingResult<RosterSummary> {
        let today = self.today();
        Ok(roster.load_into(&mut *self.graph.write().await?, today)?)
    }

    /// Extract a requirement from `text` and staff `project_key` with it.
    ///
    /// Without an extractor, `text` must be requirement JSON.
    pub async fn match_team(
        &self,
        text: &str,
        project_key: &str,
        options: MatchOptions,
        cancel: &CancelToken,
    ) -> StaffingResult<TeamAssignment> {
        cancel.check()?;
        let raw = self.extract(text, cancel).await?;
        let requirement = Requirement::from_json(&raw, &self.config.matching)?;
        self.match_requirement(&requirement, project_key, options, cancel).await
    }

    pub async fn match_requirement(
        &self,
        requirement: &Requirement,
        project_key: &str,
        options: MatchOptions,
        cancel: &CancelToken,
    ) -> StaffingResult<TeamAssignment> {
        Ok(self
            .engine
            .staff_project(requirement, project_key, options, cancel)
            .await?)
    }

    async fn extract(&self, text: &str, cancel: &CancelToken) -> StaffingResult<Value> {
        let Some(extractor) = &self.extractor else {
            return serde_json::from_str(text).map_err(|e| {
                StaffingError::Validation(format!(
                    "no requirement extractor configured and the text is not requirement JSON: {}",
                    e
                ))
            });
        };

        let budget = budget(Duration::from_millis(self.config.matching.extractor_timeout_ms), cancel);
        let reply = tokio::time::timeout(budget, extractor.extract(text)).await;
        cancel.check()?;
        match reply {
            Err(_) => {
                warn!(timeout_ms = budget.as_millis() as u64, "requirement extractor timed out");
                Err(StaffingError::UpstreamTimeout(format!(
                    "requirement extractor gave no answer within {} ms",
                    budget.as_millis()
                )))
            }
            Ok(reply) => Ok(reply?),
        }
    }

    /// Vocabulary snapshot of the current graph
    async fn reader(&self) -> StaffingResult<QuestionReader> {
        let store = self.graph.read().await?;
        Ok(QuestionReader::new(
            Vocabulary::from_view(&*store),
            self.config.matching.default_team_size,
        ))
    }

    pub async fn plan(&self, question: &str, cancel: &CancelToken) -> StaffingResult<PlanOutcome> {
        let reader = self.reader().await?;
        Ok(self.planner.plan(question, &reader, cancel).await?)
    }

    /// Plan and answer a business question. Simulation questions run on an
    /// overlay; everything else runs its template against the store.
    pub async fn answer_question(&self, question: &str, cancel: &CancelToken) -> StaffingResult<Answer> {
        let plan = match self.plan(question, cancel).await? {
            PlanOutcome::Plan(plan) => plan,
            PlanOutcome::Clarification { reason } => {
                info!(%reason, "question needs clarification");
                return Ok(Answer::Clarification { reason });
            }
        };

        if let Some(ScenarioPlan::Simulate { changes }) = &plan.scenario {
            let report = self.simulator.simulate(changes, cancel).await?;
            return Ok(Answer::Simulation { plan, report });
        }

        let today = self.today();
        let result = {
            let store = self.graph.read().await?;
            self.executor.execute(&plan, &*store, today, cancel)?
        };
        info!(intent = %plan.intent, source = ?plan.source, value = %result.value, "question answered");
        Ok(Answer::Result { plan, result })
    }

    /// Plan a what-if question and simulate it
    pub async fn simulate(&self, text: &str, cancel: &CancelToken) -> StaffingResult<SimulationOutcome> {
        match self.plan(text, cancel).await? {
            PlanOutcome::Plan(QueryPlan {
                scenario: Some(ScenarioPlan::Simulate { changes }),
                ..
            }) => Ok(SimulationOutcome::Report(self.simulate_changes(&changes, cancel).await?)),
            PlanOutcome::Plan(plan) => Ok(SimulationOutcome::Clarification {
                reason: format!("this reads as a {} question, not a change to simulate", plan.intent),
            }),
            PlanOutcome::Clarification { reason } => Ok(SimulationOutcome::Clarification { reason }),
        }
    }

    pub async fn simulate_changes(&self, changes: &[ScenarioChange], cancel: &CancelToken) -> StaffingResult<ImpactReport> {
        Ok(self.simulator.simulate(changes, cancel).await?)
    }
}

/// `limit`, shortened to whatever is left before the token's deadline
fn budget(limit: Duration, cancel: &CancelToken) -> Duration {
    cancel
        .deadline()
        .map(|deadline| deadline.saturating_duration_since(Instant::now()))
        .map_or(limit, |left| left.min(limit))
}
