//! Staffing requirements
//!
//! The extractor returns loosely shaped JSON. [`Requirement::from_json`]
//! checks its shape, fills documented defaults and normalizes skills and
//! location before anything touches the graph.

use crate::config::MatchingConfig;
use crate::skills::{normalize_all, SkillId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequirementError {
    #[error("Malformed requirement field '{field}': {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("Invalid requirement: {0}")]
    Invalid(String),
}

pub type RequirementResult<T> = Result<T, RequirementError>;

/// Location strings the extractor produces when there is no usable city
const NO_LOCATION: &[&str] = &[
    "remote",
    "remote allowed",
    "remote not allowed",
    "not allowed",
    "n/a",
    "na",
    "none",
    "null",
    "unknown",
    "any",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub required_skills: Vec<SkillId>,
    pub team_size: usize,
    /// City only; `None` means no location constraint
    pub location: Option<String>,
    pub budget: Option<f64>,
    pub duration_months: u32,
    /// Allocation requested for every member, in (0, 1]
    pub allocation_needed: f64,
    pub project_title: Option<String>,
    pub deadline: Option<NaiveDate>,
}

impl Requirement {
    /// A requirement with the given skills and team size, other fields at
    /// their defaults
    pub fn new<S: AsRef<str>>(skills: &[S], team_size: usize) -> Self {
        let defaults = MatchingConfig::default();
        Self {
            required_skills: normalize_all(skills),
            team_size,
            location: None,
            budget: None,
            duration_months: defaults.default_duration_months,
            allocation_needed: defaults.default_allocation,
            project_title: None,
            deadline: None,
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = normalize_location(location);
        self
    }

    pub fn with_allocation(mut self, allocation: f64) -> Self {
        self.allocation_needed = allocation;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.project_title = Some(title.into());
        self
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Parse extractor output
    pub fn from_json(value: &Value, defaults: &MatchingConfig) -> RequirementResult<Self> {
        let obj = value.as_object().ok_or(RequirementError::Malformed {
            field: "requirement",
            reason: "expected a JSON object".to_string(),
        })?;
        let field = |name: &str| obj.get(name).filter(|v| !v.is_null());

        let required_skills = match field("required_skills") {
            None => Vec::new(),
            Some(Value::String(csv)) => normalize_all(&csv.split(',').collect::<Vec<_>>()),
            Some(Value::Array(items)) => {
                let names = items
                    .iter()
                    .map(|item| {
                        item.as_str().ok_or_else(|| RequirementError::Malformed {
                            field: "required_skills",
                            reason: format!("expected strings, got {}", item),
                        })
                    })
                    .collect::<RequirementResult<Vec<&str>>>()?;
                normalize_all(&names)
            }
            Some(other) => {
                return Err(RequirementError::Malformed {
                    field: "required_skills",
                    reason: format!("expected array or string, got {}", other),
                })
            }
        };

        let team_size = match field("team_size") {
            None => defaults.default_team_size,
            Some(v) => {
                let n = number(v, "team_size")?;
                if n < 0.0 || n.fract() != 0.0 {
                    return Err(RequirementError::Malformed {
                        field: "team_size",
                        reason: format!("expected a non-negative integer, got {}", v),
                    });
                }
                n as usize
            }
        };

        let allocation_needed = match field("allocation_needed") {
            None => defaults.default_allocation,
            Some(v) => number(v, "allocation_needed")?,
        };

        let duration_months = match field("duration_months") {
            None => defaults.default_duration_months,
            Some(v) => match number(v, "duration_months")? {
                n if n >= 1.0 => n.round() as u32,
                _ => defaults.default_duration_months,
            },
        };

        let budget = field("budget").map(|v| number(v, "budget")).transpose()?;

        let location = field("location")
            .and_then(Value::as_str)
            .and_then(normalize_location);

        let project_title = ["project_title", "rfp_title", "project_name"]
            .iter()
            .find_map(|key| field(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let deadline = match field("deadline").and_then(Value::as_str) {
            Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    debug!(deadline = raw, "ignoring unparsable deadline");
                    None
                }
            },
            None => None,
        };

        let requirement = Self {
            required_skills,
            team_size,
            location,
            budget,
            duration_months,
            allocation_needed,
            project_title,
            deadline,
        };
        requirement.validate()?;
        Ok(requirement)
    }

    pub fn validate(&self) -> RequirementResult<()> {
        if self.required_skills.is_empty() && self.team_size == 0 {
            return Err(RequirementError::Invalid(
                "requirement has neither required skills nor a team size".to_string(),
            ));
        }
        if self.team_size == 0 {
            return Err(RequirementError::Invalid("team size must be positive".to_string()));
        }
        if !(self.allocation_needed > 0.0 && self.allocation_needed <= 1.0) {
            return Err(RequirementError::Invalid(format!(
                "allocation must be in (0, 1], got {}",
                self.allocation_needed
            )));
        }
        if let Some(budget) = self.budget {
            if budget < 0.0 {
                return Err(RequirementError::Invalid(format!("negative budget {}", budget)));
            }
        }
        Ok(())
    }
}

fn number(value: &Value, field: &'static str) -> RequirementResult<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(['_', ','], "").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).ok_or_else(|| RequirementError::Malformed {
        field,
        reason: format!("expected a number, got {}", value),
    })
}

/// Reduce extractor location output to a city, or `None` when unconstrained
pub fn normalize_location(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NO_LOCATION.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }
    let city = trimmed.split(',').next().unwrap_or(trimmed).trim();
    if city.is_empty() {
        None
    } else {
        Some(city.to_string())
    }
}
