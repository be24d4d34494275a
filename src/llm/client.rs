//! LLM client for the extraction and classification collaborators

use crate::config::{LlmConfig, LlmProvider};
use crate::llm::{LlmError, LlmResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a staffing analyst. Answer with a single JSON object and nothing else.";

pub struct LlmClient {
    client: Client,
    config: LlmConfig,
    api_base_url: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        let api_base_url = config.api_base_url.clone().unwrap_or_else(|| match config.provider {
            LlmProvider::OpenAI => "https://api.openai.com/v1".to_string(),
            LlmProvider::Ollama => "http://localhost:11434".to_string(),
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta".to_string(),
            LlmProvider::AzureOpenAI | LlmProvider::Mock => String::new(),
        });

        if config.provider == LlmProvider::AzureOpenAI && api_base_url.is_empty() {
            return Err(LlmError::Config("Azure OpenAI requires api_base_url".to_string()));
        }

        Ok(Self {
            client,
            config: config.clone(),
            api_base_url,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    /// Send one prompt and return the raw completion text
    pub async fn complete(&self, prompt: &str) -> LlmResult<String> {
        debug!(provider = ?self.config.provider, chars = prompt.len(), "llm request");
        match self.config.provider {
            LlmProvider::OpenAI => self.openai_chat(prompt).await,
            LlmProvider::AzureOpenAI => self.azure_chat(prompt).await,
            LlmProvider::Ollama => self.ollama_chat(prompt).await,
            LlmProvider::Gemini => self.gemini_chat(prompt).await,
            LlmProvider::Mock => Ok("{}".to_string()),
        }
    }

    fn system_prompt(&self) -> String {
        self.config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }

    async fn openai_chat(&self, prompt: &str) -> LlmResult<String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::Config("OpenAI requires API key".to_string()))?;

        let url = format!("{}/chat/completions", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&ChatRequest {
                model: Some(&self.config.model),
                messages: self.messages(prompt),
                temperature: 0.0,
            })
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            return Err(LlmError::Api(format!("OpenAI error: {}", resp.status())));
        }

        let result: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;
        Ok(result.first_content())
    }

    async fn azure_chat(&self, prompt: &str) -> LlmResult<String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::Config("Azure OpenAI requires API key".to_string()))?;
        let api_version = self.config.api_version.as_deref().unwrap_or("2024-02-01");

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.api_base_url.trim_end_matches('/'),
            self.config.model,
            api_version
        );
        let resp = self
            .client
            .post(&url)
            .header("api-key", api_key)
            .json(&ChatRequest {
                model: None,
                messages: self.messages(prompt),
                temperature: 0.0,
            })
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            return Err(LlmError::Api(format!("Azure OpenAI error: {}", resp.status())));
        }

        let result: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;
        Ok(result.first_content())
    }

    async fn ollama_chat(&self, prompt: &str) -> LlmResult<String> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            prompt: String,
            system: String,
            stream: bool,
            format: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            response: String,
        }

        let url = format!("{}/api/generate", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .json(&Request {
                model: &self.config.model,
                prompt: prompt.to_string(),
                system: self.system_prompt(),
                stream: false,
                format: "json",
            })
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            return Err(LlmError::Api(format!("Ollama error: {}", resp.status())));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;
        Ok(result.response)
    }

    async fn gemini_chat(&self, prompt: &str) -> LlmResult<String> {
        #[derive(Serialize)]
        struct Request {
            contents: Vec<Content>,
            #[serde(rename = "generationConfig")]
            generation_config: GenerationConfig,
        }

        #[derive(Serialize, Deserialize)]
        struct Content {
            role: Option<String>,
            parts: Vec<Part>,
        }

        #[derive(Serialize, Deserialize)]
        struct Part {
            text: String,
        }

        #[derive(Serialize)]
        struct GenerationConfig {
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Response {
            candidates: Option<Vec<Candidate>>,
        }

        #[derive(Deserialize)]
        struct Candidate {
            content: Content,
        }

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::Config("Gemini requires API key".to_string()))?;

        // No system role on this endpoint; the instruction rides in front of the prompt.
        let full_prompt = format!("{}\n\n{}", self.system_prompt(), prompt);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base_url, self.config.model, api_key
        );

        let resp = self
            .client
            .post(&url)
            .json(&Request {
                contents: vec![Content {
                    role: Some("user".to_string()),
                    parts: vec![Part { text: full_prompt }],
                }],
                generation_config: GenerationConfig { temperature: 0.0 },
            })
            .send()
            .await
            .map_err(network_error)?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("Gemini error: {}", text)));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;

        Ok(result
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|part| part.text)
            .unwrap_or_default())
    }

    fn messages(&self, prompt: &str) -> Vec<Message> {
        vec![
            Message {
                role: "system".to_string(),
                content: self.system_prompt(),
            },
            Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            },
        ]
    }
}

fn network_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Network(e.to_string())
    }
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

impl ChatResponse {
    fn first_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_answers_offline() {
        let client = LlmClient::new(&LlmConfig::mock()).unwrap();
        assert_eq!(client.provider(), LlmProvider::Mock);
        assert_eq!(client.complete("anything").await.unwrap(), "{}");
    }

    #[test]
    fn test_azure_requires_endpoint() {
        let mut config = LlmConfig::mock();
        config.provider = LlmProvider::AzureOpenAI;
        assert!(matches!(LlmClient::new(&config), Err(LlmError::Config(_))));
    }

    #[tokio::test]
    async fn test_openai_requires_key() {
        let mut config = LlmConfig::mock();
        config.provider = LlmProvider::OpenAI;
        let client = LlmClient::new(&config).unwrap();
        assert!(matches!(client.complete("q").await, Err(LlmError::Config(_))));
    }
}
