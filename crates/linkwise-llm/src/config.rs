//! LLM configuration and provider selection.

use std::path::Path;

use linkwise_core::{Error, RateLimitConfig, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::provider::LlmProvider;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

/// Environment variables holding the API keys.
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const GROQ_KEY_VAR: &str = "GROQ_API_KEY";

/// Stored LLM configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `auto`, `openai`, `anthropic` or `groq`.
    pub preferred_provider: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_model: String,
    pub anthropic_model: String,
    pub groq_model: String,
    pub openai_url: String,
    pub anthropic_url: String,
    pub groq_url: String,
    pub temperature: f64,
    pub max_tokens: usize,
    pub timeout_secs: u64,
    pub rate_limit: RateLimitConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "auto".into(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.into(),
            groq_model: DEFAULT_GROQ_MODEL.into(),
            openai_url: OPENAI_URL.into(),
            anthropic_url: ANTHROPIC_URL.into(),
            groq_url: GROQ_URL.into(),
            temperature: 0.2,
            max_tokens: 512,
            timeout_secs: 30,
            rate_limit: RateLimitConfig::new(5, 1.0),
        }
    }
}

impl LlmConfig {
    /// Load config from a JSON file, then fill missing API keys from the
    /// environment. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.fill_keys_from(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Defaults plus API keys from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.fill_keys_from(|name| std::env::var(name).ok());
        config
    }

    /// Fill unset API keys from `lookup` (an environment accessor).
    pub fn fill_keys_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if self.openai_api_key.is_none() {
            self.openai_api_key = lookup(OPENAI_KEY_VAR);
        }
        if self.anthropic_api_key.is_none() {
            self.anthropic_api_key = lookup(ANTHROPIC_KEY_VAR);
        }
        if self.groq_api_key.is_none() {
            self.groq_api_key = lookup(GROQ_KEY_VAR);
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Saved LLM config to {}", path.display());
        Ok(())
    }

    /// Resolve which provider, model and key to use.
    pub fn resolve_provider(&self) -> Option<(LlmProvider, String, String)> {
        // Explicit preference
        if self.preferred_provider != "auto" {
            return LlmProvider::parse(&self.preferred_provider)
                .and_then(|p| self.key_for(p).map(|k| (p, self.model_for(p), k)));
        }

        // Auto mode: Anthropic > Groq > OpenAI
        [LlmProvider::Anthropic, LlmProvider::Groq, LlmProvider::OpenAI]
            .into_iter()
            .find_map(|p| self.key_for(p).map(|k| (p, self.model_for(p), k)))
    }

    fn key_for(&self, provider: LlmProvider) -> Option<String> {
        match provider {
            LlmProvider::OpenAI => self.openai_api_key.clone(),
            LlmProvider::Anthropic => self.anthropic_api_key.clone(),
            LlmProvider::Groq => self.groq_api_key.clone(),
        }
    }

    fn model_for(&self, provider: LlmProvider) -> String {
        match provider {
            LlmProvider::OpenAI => self.openai_model.clone(),
            LlmProvider::Anthropic => self.anthropic_model.clone(),
            LlmProvider::Groq => self.groq_model.clone(),
        }
    }

    pub fn url_for(&self, provider: LlmProvider) -> &str {
        match provider {
            LlmProvider::OpenAI => &self.openai_url,
            LlmProvider::Anthropic => &self.anthropic_url,
            LlmProvider::Groq => &self.groq_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_keys(keys: &[(&str, &str)]) -> LlmConfig {
        let env: HashMap<String, String> = keys
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = LlmConfig::default();
        config.fill_keys_from(|name| env.get(name).cloned());
        config
    }

    #[test]
    fn test_auto_prefers_anthropic_then_groq() {
        let config = with_keys(&[(OPENAI_KEY_VAR, "o"), (GROQ_KEY_VAR, "g")]);
        let (provider, model, key) = config.resolve_provider().unwrap();
        assert_eq!(provider, LlmProvider::Groq);
        assert_eq!(model, DEFAULT_GROQ_MODEL);
        assert_eq!(key, "g");

        let config = with_keys(&[(OPENAI_KEY_VAR, "o"), (ANTHROPIC_KEY_VAR, "a")]);
        assert_eq!(config.resolve_provider().unwrap().0, LlmProvider::Anthropic);
    }

    #[test]
    fn test_explicit_preference_needs_its_key() {
        let mut config = with_keys(&[(ANTHROPIC_KEY_VAR, "a")]);
        config.preferred_provider = "openai".into();
        assert!(config.resolve_provider().is_none());

        config.openai_api_key = Some("o".into());
        assert_eq!(config.resolve_provider().unwrap().0, LlmProvider::OpenAI);
    }

    #[test]
    fn test_blank_keys_are_ignored() {
        let config = with_keys(&[(OPENAI_KEY_VAR, "  ")]);
        assert!(config.resolve_provider().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("llm.json");
        let mut config = LlmConfig::default();
        config.preferred_provider = "groq".into();
        config.groq_model = "llama-3.1-8b-instant".into();
        config.save(&path).unwrap();

        let loaded = LlmConfig::load(&path).unwrap();
        assert_eq!(loaded.preferred_provider, "groq");
        assert_eq!(loaded.groq_model, "llama-3.1-8b-instant");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(LlmConfig::load(&path), Err(Error::Config(_))));
    }
}
