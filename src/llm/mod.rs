//! Language-model collaborators
//!
//! Two narrow seams: requirement extraction (document text to requirement
//! JSON) and intent classification (question to one allowed tag plus
//! filters). Both return parsed JSON only; shape validation happens in the
//! callers, which treat every reply as untrusted.

pub mod client;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use client::LlmClient;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM API error: {0}")]
    Api(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("LLM request timed out")]
    Timeout,
    #[error("No JSON object in reply")]
    NoJson,
}

pub type LlmResult<T> = Result<T, LlmError>;

/// Turns a requirement document into loosely shaped requirement JSON
#[async_trait]
pub trait RequirementExtractor: Send + Sync {
    async fn extract(&self, document: &str) -> LlmResult<Value>;
}

/// Picks one of `allowed` for a question, with optional filters
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, question: &str, allowed: &[&str]) -> LlmResult<Value>;
}

/// Pull the outermost JSON object out of free text.
///
/// Takes everything from the first `{` to the last `}`, which also strips
/// markdown fences and chatter around the object.
pub fn extract_json_object(text: &str) -> LlmResult<Value> {
    let start = text.find('{').ok_or(LlmError::NoJson)?;
    let end = text.rfind('}').ok_or(LlmError::NoJson)?;
    if end < start {
        return Err(LlmError::NoJson);
    }
    serde_json::from_str(&text[start..=end]).map_err(|e| LlmError::Serialization(e.to_string()))
}

/// Characters of document text sent to the extractor
const DOCUMENT_BUDGET: usize = 4500;

pub struct LlmRequirementExtractor {
    client: LlmClient,
}

impl LlmRequirementExtractor {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn prompt(document: &str) -> String {
        let excerpt: String = document.chars().take(DOCUMENT_BUDGET).collect();
        format!(
            r#"Extract structured staffing requirements from this request for proposal.

Output ONLY valid JSON in this format:
{{
    "project_title": "Project title",
    "required_skills": ["Skill1", "Skill2"],
    "team_size": 5,
    "location": "City Name or null if remote work is allowed",
    "allocation_needed": 1.0,
    "duration_months": 3,
    "budget": 120000,
    "deadline": "YYYY-MM-DD"
}}

Rules:
- Omit a field when the document does not state it.
- required_skills must be a JSON array of strings.

Document:
{}"#,
            excerpt
        )
    }
}

#[async_trait]
impl RequirementExtractor for LlmRequirementExtractor {
    async fn extract(&self, document: &str) -> LlmResult<Value> {
        let reply = self.client.complete(&Self::prompt(document)).await?;
        extract_json_object(&reply)
    }
}

pub struct LlmIntentClassifier {
    client: LlmClient,
}

impl LlmIntentClassifier {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn prompt(question: &str, allowed: &[&str]) -> String {
        format!(
            r#"Classify the business question into exactly one intent from this list: {}.
Do not write a query. Output ONLY JSON:
{{
    "intent": "<one of the listed intents>",
    "filters": {{
        "skills": ["skill"],
        "location": "city or null",
        "seniority": "junior|mid|senior|lead|principal or null",
        "person": "full name or null",
        "available_only": false
    }},
    "aggregation": {{ "function": "avg|sum|min|max|count", "field": "hourly_rate|years_experience|current_load|skill_count", "group_by": "location|seniority or null" }},
    "scenario": "skill_gap|risk|team_composition or null"
}}

Question: "{}""#,
            allowed.join(", "),
            question
        )
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, question: &str, allowed: &[&str]) -> LlmResult<Value> {
        let reply = self.client.complete(&Self::prompt(question, allowed)).await?;
        extract_json_object(&reply)
    }
}
