//! Term generator backed by a chat model.

use async_trait::async_trait;
use linkwise_core::{Error, Result, TermGenerator};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::provider::{ChatMessage, LlmClient};

const SYSTEM_PROMPT: &str = "You help link named entities to encyclopedia articles. \
Answer with JSON only, without explanations.";

fn language_name(code: &str) -> &str {
    match code {
        "de" => "German",
        "en" => "English",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "nl" => "Dutch",
        "pl" => "Polish",
        other => other,
    }
}

/// Strings from a reply that should be a JSON array.
///
/// Tolerates text around the array and falls back to one entry per line.
pub fn parse_string_list(reply: &str) -> Vec<String> {
    let parsed = match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Vec<String>>(&reply[start..=end]).ok()
        }
        _ => None,
    };
    let items = parsed.unwrap_or_else(|| {
        reply
            .lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches(|c: char| c == '-' || c == '*' || c.is_ascii_digit() || c == '.')
                    .trim()
                    .trim_matches(|c: char| c == '"' || c == ',')
                    .to_string()
            })
            .collect()
    });

    let mut out: Vec<String> = Vec::new();
    for item in items.into_iter().map(|s| s.trim().to_string()) {
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// A single term from a reply that should be a JSON string.
pub fn parse_single_term(reply: &str) -> Option<String> {
    let reply = reply.trim();
    let term = serde_json::from_str::<String>(reply)
        .ok()
        .or_else(|| reply.lines().next().map(|l| l.trim().trim_matches('"').to_string()))?;
    let term = term.trim().to_string();
    (!term.is_empty()).then_some(term)
}

/// Synonyms and translations from an LLM. Unavailable without an API key.
pub struct LlmTermGenerator {
    client: Option<LlmClient>,
}

impl LlmTermGenerator {
    pub fn new(client: LlmClient) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn from_config(config: &LlmConfig, user_agent: &str) -> Result<Self> {
        let client = LlmClient::from_config(config, user_agent)?;
        if client.is_none() {
            warn!("No LLM API key configured; synonym and translation fallbacks are disabled");
        }
        Ok(Self { client })
    }

    fn client(&self) -> Result<&LlmClient> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Collaborator("no LLM provider configured".into()))
    }
}

#[async_trait]
impl TermGenerator for LlmTermGenerator {
    async fn generate_synonyms(&self, term: &str, language: &str, max_n: usize) -> Result<Vec<String>> {
        if max_n == 0 {
            return Ok(Vec::new());
        }
        let client = self.client()?;
        let prompt = format!(
            "List up to {} alternative names, spellings or synonyms for the {} term \"{}\" \
             that are likely titles of encyclopedia articles. Reply with a JSON array of strings.",
            max_n,
            language_name(language),
            term
        );
        let reply = client
            .complete(&[ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
            .await?;

        let wanted = term.trim().to_lowercase();
        let mut synonyms = parse_string_list(&reply);
        synonyms.retain(|s| s.to_lowercase() != wanted);
        synonyms.truncate(max_n);
        debug!("LLM synonyms term={} count={}", term, synonyms.len());
        Ok(synonyms)
    }

    async fn translate(&self, term: &str, source: &str, target: &str) -> Result<Option<String>> {
        if source == target {
            return Ok(Some(term.to_string()));
        }
        let client = self.client()?;
        let prompt = format!(
            "Translate the {} term \"{}\" to {}. For proper names give the title the {} \
             encyclopedia uses. Reply with a single JSON string.",
            language_name(source),
            term,
            language_name(target),
            language_name(target)
        );
        let reply = client
            .complete(&[ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
            .await?;
        let translation = parse_single_term(&reply);
        debug!("LLM translation term={} result={:?}", term, translation);
        Ok(translation)
    }

    fn is_available(&self) -> bool {
        self.client.is_some()
    }
}
