//! Runtime configuration
//!
//! Every section has serde defaults, so a partial YAML file (or none at
//! all) yields a working configuration. LLM credentials can be supplied
//! through `STAFFGRAPH_*` environment variables instead of the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffingConfig {
    pub scoring: ScoringConfig,
    pub matching: MatchingConfig,
    pub query: QueryConfig,
    pub llm: Option<LlmConfig>,
}

/// Weights of the three score components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub skill_weight: f64,
    pub location_weight: f64,
    pub availability_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            skill_weight: 10.0,
            location_weight: 10.0,
            availability_weight: 20.0,
        }
    }
}

/// Defaults applied to extracted requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub default_team_size: usize,
    pub default_allocation: f64,
    pub default_duration_months: u32,
    pub default_role: String,
    /// Timeout for the requirement extractor, in milliseconds
    pub extractor_timeout_ms: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            default_team_size: 5,
            default_allocation: 1.0,
            default_duration_months: 3,
            default_role: "Developer".to_string(),
            extractor_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Maximum rows returned by listing templates
    pub result_cap: usize,
    /// Horizon used by availability questions without an explicit date
    pub temporal_window_days: i64,
    /// Timeout for the intent classifier, in milliseconds
    pub classifier_timeout_ms: u64,
    /// Skills with at most this many holders count as a concentration risk
    pub risk_threshold: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            result_cap: 20,
            temporal_window_days: 30,
            classifier_timeout_ms: 5_000,
            risk_threshold: 2,
        }
    }
}

/// LLM provider options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Ollama,
    Gemini,
    AzureOpenAI,
    /// Canned offline replies
    Mock,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "ollama" => Ok(LlmProvider::Ollama),
            "gemini" => Ok(LlmProvider::Gemini),
            "azure" | "azureopenai" | "azure_openai" => Ok(LlmProvider::AzureOpenAI),
            "mock" => Ok(LlmProvider::Mock),
            other => Err(ConfigError::Invalid(format!("unknown LLM provider '{}'", other))),
        }
    }
}

/// Configuration for the extraction and classification collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    /// Model name, or deployment name for Azure
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Required for Azure, optional for the rest
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl LlmConfig {
    pub fn mock() -> Self {
        Self {
            provider: LlmProvider::Mock,
            model: "mock".to_string(),
            api_key: None,
            api_base_url: None,
            api_version: None,
            system_prompt: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl StaffingConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: StaffingConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&text)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `STAFFGRAPH_LLM_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("STAFFGRAPH_LLM_PROVIDER") {
            let provider: LlmProvider = provider.parse()?;
            let model = lookup("STAFFGRAPH_LLM_MODEL").unwrap_or_default();
            let llm = self.llm.get_or_insert_with(LlmConfig::mock);
            llm.provider = provider;
            if !model.is_empty() {
                llm.model = model;
            }
        }

        if let Some(llm) = self.llm.as_mut() {
            if let Some(key) = lookup("STAFFGRAPH_LLM_API_KEY") {
                llm.api_key = Some(key);
            }
            if let Some(url) = lookup("STAFFGRAPH_LLM_BASE_URL") {
                llm.api_base_url = Some(url);
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let m = &self.matching;
        if m.default_team_size == 0 {
            return Err(ConfigError::Invalid("matching.default_team_size must be positive".to_string()));
        }
        if !(m.default_allocation > 0.0 && m.default_allocation <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "matching.default_allocation must be in (0, 1], got {}",
                m.default_allocation
            )));
        }
        if self.query.result_cap == 0 {
            return Err(ConfigError::Invalid("query.result_cap must be positive".to_string()));
        }
        if let Some(llm) = &self.llm {
            if llm.provider == LlmProvider::AzureOpenAI && llm.api_base_url.is_none() {
                return Err(ConfigError::Invalid("Azure OpenAI requires llm.api_base_url".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StaffingConfig::default();
        assert_eq!(config.scoring.skill_weight, 10.0);
        assert_eq!(config.scoring.availability_weight, 20.0);
        assert_eq!(config.matching.default_team_size, 5);
        assert_eq!(config.query.result_cap, 20);
        assert!(config.llm.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = StaffingConfig::from_yaml_str(
            "scoring:\n  location_weight: 50\nquery:\n  result_cap: 5\n",
        )
        .unwrap();
        assert_eq!(config.scoring.location_weight, 50.0);
        assert_eq!(config.scoring.skill_weight, 10.0);
        assert_eq!(config.query.result_cap, 5);
        assert_eq!(config.query.temporal_window_days, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = StaffingConfig::from_yaml_str("matching:\n  default_allocation: 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = StaffingConfig::from_yaml_str("llm:\n  provider: AzureOpenAI\n  model: gpt\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("STAFFGRAPH_LLM_PROVIDER", "ollama"),
            ("STAFFGRAPH_LLM_MODEL", "llama3"),
            ("STAFFGRAPH_LLM_BASE_URL", "http://gpu-box:11434"),
        ]
        .into_iter()
        .collect();

        let mut config = StaffingConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        let llm = config.llm.unwrap();
        assert_eq!(llm.provider, LlmProvider::Ollama);
        assert_eq!(llm.model, "llama3");
        assert_eq!(llm.api_base_url.as_deref(), Some("http://gpu-box:11434"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "llm:\n  provider: Mock\n  model: canned").unwrap();
        let config = StaffingConfig::load(file.path()).unwrap();
        assert_eq!(config.llm.map(|l| l.provider), Some(LlmProvider::Mock));
    }
}
