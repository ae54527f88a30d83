//! Synonym and translation collaborator.
//!
//! The `TermGenerator` trait abstracts over whatever produces alternative
//! names for an entity. Implementations:
//! - `NoopTermGenerator`: always unavailable, fallbacks that need terms are skipped
//! - `DictionaryTermGenerator`: static synonym and translation tables
//! - `LlmTermGenerator` (in `linkwise-llm`): asks a chat model

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};

#[async_trait]
pub trait TermGenerator: Send + Sync {
    /// Up to `max_n` alternative names for `term`, best first.
    async fn generate_synonyms(&self, term: &str, language: &str, max_n: usize)
        -> Result<Vec<String>>;

    /// Translate `term`. `None` when no translation is known.
    async fn translate(&self, term: &str, source: &str, target: &str) -> Result<Option<String>>;

    /// Whether the generator can produce anything at all.
    fn is_available(&self) -> bool;
}

/// Generator that knows no terms.
pub struct NoopTermGenerator;

#[async_trait]
impl TermGenerator for NoopTermGenerator {
    async fn generate_synonyms(
        &self,
        _term: &str,
        _language: &str,
        _max_n: usize,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn translate(&self, _term: &str, _source: &str, _target: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// On-disk shape of a dictionary file.
///
/// ```json
/// {
///   "synonyms": { "Zugspitze": ["Zugspitz", "Zugspitze (Berg)"] },
///   "translations": { "en": { "Schloss Neuschwanstein": "Neuschwanstein Castle" } }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    synonyms: HashMap<String, Vec<String>>,
    #[serde(default)]
    translations: HashMap<String, HashMap<String, String>>,
}

/// Static lookup tables, matched case-insensitively on the term.
#[derive(Debug, Default, Clone)]
pub struct DictionaryTermGenerator {
    synonyms: HashMap<String, Vec<String>>,
    /// target language -> lowercased term -> translation
    translations: HashMap<String, HashMap<String, String>>,
}

impl DictionaryTermGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: DictionaryFile = serde_json::from_str(&raw)
            .map_err(|e| Error::Collaborator(format!("{}: {}", path.display(), e)))?;

        let mut generator = Self::new();
        for (term, synonyms) in file.synonyms {
            generator = generator.with_synonyms(&term, synonyms);
        }
        for (target, table) in file.translations {
            for (term, translation) in table {
                generator = generator.with_translation(&term, &target, translation);
            }
        }
        Ok(generator)
    }

    pub fn with_synonyms<I, S>(mut self, term: &str, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms
            .entry(normalize(term))
            .or_default()
            .extend(synonyms.into_iter().map(Into::into));
        self
    }

    pub fn with_translation(
        mut self,
        term: &str,
        target: &str,
        translation: impl Into<String>,
    ) -> Self {
        self.translations
            .entry(target.to_lowercase())
            .or_default()
            .insert(normalize(term), translation.into());
        self
    }
}

fn normalize(term: &str) -> String {
    term.trim().to_lowercase()
}

#[async_trait]
impl TermGenerator for DictionaryTermGenerator {
    async fn generate_synonyms(
        &self,
        term: &str,
        _language: &str,
        max_n: usize,
    ) -> Result<Vec<String>> {
        let key = normalize(term);
        let found = self
            .synonyms
            .get(&key)
            .map(|list| {
                list.iter()
                    .filter(|s| !s.trim().is_empty() && normalize(s) != key)
                    .take(max_n)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(found)
    }

    async fn translate(&self, term: &str, _source: &str, target: &str) -> Result<Option<String>> {
        Ok(self
            .translations
            .get(&target.to_lowercase())
            .and_then(|table| table.get(&normalize(term)))
            .cloned())
    }

    fn is_available(&self) -> bool {
        !self.synonyms.is_empty() || !self.translations.is_empty()
    }
}
