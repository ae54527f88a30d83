//! Chat completions against hosted LLM providers.
//!
//! OpenAI and Groq share the chat-completions format. Anthropic uses the
//! Messages API with the system prompt as a top-level field.

use std::time::Duration;

use linkwise_core::{Error, Result};
use linkwise_net::HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// LLM provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
    Groq,
}

impl LlmProvider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "anthropic" => Some(Self::Anthropic),
            "groq" => Some(Self::Groq),
            _ => None,
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAI => write!(f, "openai"),
            LlmProvider::Anthropic => write!(f, "anthropic"),
            LlmProvider::Groq => write!(f, "groq"),
        }
    }
}

/// Chat message in a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// One resolved provider with its model and key.
#[derive(Clone)]
pub struct LlmClient {
    http: HttpClient,
    provider: LlmProvider,
    model: String,
    api_key: String,
    url: String,
    temperature: f64,
    max_tokens: usize,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("url", &self.url)
            .finish()
    }
}

impl LlmClient {
    /// Client for the provider the config resolves to, or `None` when no
    /// API key is configured.
    pub fn from_config(config: &LlmConfig, user_agent: &str) -> Result<Option<Self>> {
        let (provider, model, api_key) = match config.resolve_provider() {
            Some(resolved) => resolved,
            None => return Ok(None),
        };
        let http = HttpClient::new(
            &format!("llm-{}", provider),
            user_agent,
            Duration::from_secs(config.timeout_secs),
            true,
            &config.rate_limit,
        )?;
        debug!("LLM provider selected provider={} model={}", provider, model);
        Ok(Some(Self {
            http,
            provider,
            model,
            api_key,
            url: config.url_for(provider).to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }))
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one completion and return the assistant text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let text = match self.provider {
            LlmProvider::OpenAI | LlmProvider::Groq => self.complete_openai_compat(messages).await?,
            LlmProvider::Anthropic => self.complete_anthropic(messages).await?,
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(Error::Collaborator(format!("{} returned an empty completion", self.provider)));
        }
        Ok(text)
    }

    async fn complete_openai_compat(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        let headers = [("authorization", format!("Bearer {}", self.api_key))];
        let response: Value = self.http.post_json(&self.url, &headers, &body).await?;
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Collaborator(format!("{}: no completion in response", self.provider)))
    }

    async fn complete_anthropic(&self, messages: &[ChatMessage]) -> Result<String> {
        // Separate system message from conversation
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let conversation: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != "system").collect();

        let mut body = json!({
            "model": self.model,
            "messages": conversation,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        let headers = [
            ("x-api-key", self.api_key.clone()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ];
        let response: Value = self.http.post_json(&self.url, &headers, &body).await?;

        if response["type"] == "error" {
            let message = response["error"]["message"].as_str().unwrap_or("Unknown error");
            return Err(Error::Collaborator(format!("anthropic: {}", message)));
        }
        let text: String = response["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect()
            })
            .unwrap_or_default();
        Ok(text)
    }
}
