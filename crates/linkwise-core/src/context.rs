//! Per-entity processing context shared by the resolvers.
//!
//! One context is created per entity and flows through every resolver.
//! Writes are additive: a resolver only replaces its own source record and
//! there is no API for removing another service's data.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::sources::{DbpediaRecord, Sources, WikidataRecord, WikipediaRecord};

/// Knowledge sources an entity is linked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Wikipedia,
    Wikidata,
    Dbpedia,
}

impl ServiceKind {
    /// Pipeline order.
    pub fn all() -> &'static [ServiceKind] {
        &[Self::Wikipedia, Self::Wikidata, Self::Dbpedia]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wikipedia => "wikipedia",
            Self::Wikidata => "wikidata",
            Self::Dbpedia => "dbpedia",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known `processing_data` keys used to pass values between services.
pub mod keys {
    /// Article URL suggested by the extraction stage.
    pub const SUGGESTED_WIKIPEDIA_URL: &str = "suggested_wikipedia_url";
    pub const ENGLISH_TITLE: &str = "english_title";
    pub const GERMAN_TITLE: &str = "german_title";
    pub const WIKIPEDIA_TITLE: &str = "wikipedia_title";
    pub const WIKIPEDIA_LANGUAGE: &str = "wikipedia_language";
    pub const WIKIPEDIA_URL: &str = "wikipedia_url";
    pub const WIKIDATA_ID: &str = "wikidata_id";
    pub const REDIRECT_CHAIN: &str = "redirect_chain";
    pub const DBPEDIA_ATTEMPTED_STAGES: &str = "dbpedia_attempted_stages";
}

/// A relationship between two entities, produced by the inference stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    /// True when the relationship was inferred rather than stated in text.
    #[serde(default)]
    pub inferred: bool,
}

/// Public-facing output of a context.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputData {
    pub sources: Sources,
}

/// Mutable per-entity record carried through the linking pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct EntityProcessingContext {
    entity_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(skip)]
    processing_data: HashMap<String, Value>,
    #[serde(skip)]
    service_data: HashMap<String, Value>,
    output_data: OutputData,
    processed_by_services: BTreeSet<String>,
    pub relationships: Vec<Relationship>,
}

impl EntityProcessingContext {
    /// Create a context. The entity name must not be blank.
    pub fn new(entity_name: impl Into<String>) -> Result<Self> {
        let entity_name = entity_name.into().trim().to_string();
        if entity_name.is_empty() {
            return Err(Error::InvalidInput("entity name must not be empty".into()));
        }
        Ok(Self {
            entity_name,
            entity_id: None,
            entity_type: None,
            original_text: None,
            processing_data: HashMap::new(),
            service_data: HashMap::new(),
            output_data: OutputData::default(),
            processed_by_services: BTreeSet::new(),
            relationships: Vec::new(),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.original_text = Some(text.into());
        self
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    // ---------------------------------------------------------------
    // Scratch space
    // ---------------------------------------------------------------

    pub fn processing_value(&self, key: &str) -> Option<&Value> {
        self.processing_data.get(key)
    }

    /// String value of a processing key, ignoring blank strings.
    pub fn processing_str(&self, key: &str) -> Option<&str> {
        self.processing_data
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn set_processing_value(&mut self, key: impl Into<String>, value: Value) {
        self.processing_data.insert(key.into(), value);
    }

    /// Set a key only if no service has written it yet.
    pub fn set_processing_default(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        let occupied = self
            .processing_data
            .get(&key)
            .map(|v| !v.is_null())
            .unwrap_or(false);
        if occupied {
            return false;
        }
        self.processing_data.insert(key, value);
        true
    }

    // ---------------------------------------------------------------
    // Raw service payloads
    // ---------------------------------------------------------------

    pub fn service_data(&self, service: ServiceKind) -> Option<&Value> {
        self.service_data.get(service.as_str())
    }

    pub fn set_service_data(&mut self, service: ServiceKind, payload: Value) {
        self.service_data.insert(service.as_str().to_string(), payload);
    }

    // ---------------------------------------------------------------
    // Source records
    // ---------------------------------------------------------------

    pub fn sources(&self) -> &Sources {
        &self.output_data.sources
    }

    pub fn set_wikipedia(&mut self, record: WikipediaRecord) {
        self.output_data.sources.wikipedia = Some(record);
    }

    pub fn set_wikidata(&mut self, record: WikidataRecord) {
        self.output_data.sources.wikidata = Some(record);
    }

    pub fn set_dbpedia(&mut self, record: DbpediaRecord) {
        self.output_data.sources.dbpedia = Some(record);
    }

    /// Attach an unstructured provider-specific value next to the records.
    pub fn set_source_extra(&mut self, key: impl Into<String>, value: Value) {
        self.output_data.sources.extras.insert(key.into(), value);
    }

    // ---------------------------------------------------------------
    // Idempotency guard
    // ---------------------------------------------------------------

    pub fn is_processed_by(&self, service: ServiceKind) -> bool {
        self.processed_by_services.contains(service.as_str())
    }

    pub fn mark_processed(&mut self, service: ServiceKind) {
        self.processed_by_services.insert(service.as_str().to_string());
    }

    pub fn processed_services(&self) -> impl Iterator<Item = &str> {
        self.processed_by_services.iter().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{LinkStatus, WikipediaRecord};
    use serde_json::json;

    #[test]
    fn test_empty_name_rejected() {
        assert!(EntityProcessingContext::new("").is_err());
        assert!(EntityProcessingContext::new("   ").is_err());
        let ctx = EntityProcessingContext::new("  Zugspitze ").unwrap();
        assert_eq!(ctx.entity_name(), "Zugspitze");
    }

    #[test]
    fn test_processed_guard() {
        let mut ctx = EntityProcessingContext::new("Zugspitze").unwrap();
        assert!(!ctx.is_processed_by(ServiceKind::Wikipedia));
        ctx.mark_processed(ServiceKind::Wikipedia);
        ctx.mark_processed(ServiceKind::Wikipedia);
        assert!(ctx.is_processed_by(ServiceKind::Wikipedia));
        assert_eq!(ctx.processed_services().count(), 1);
    }

    #[test]
    fn test_processing_default_does_not_overwrite() {
        let mut ctx = EntityProcessingContext::new("Zugspitze").unwrap();
        assert!(ctx.set_processing_default(keys::ENGLISH_TITLE, json!("Zugspitze")));
        assert!(!ctx.set_processing_default(keys::ENGLISH_TITLE, json!("Other")));
        assert_eq!(ctx.processing_str(keys::ENGLISH_TITLE), Some("Zugspitze"));
    }

    #[test]
    fn test_blank_processing_string_ignored() {
        let mut ctx = EntityProcessingContext::new("Zugspitze").unwrap();
        ctx.set_processing_value(keys::ENGLISH_TITLE, json!(""));
        assert_eq!(ctx.processing_str(keys::ENGLISH_TITLE), None);
    }

    #[test]
    fn test_service_writes_are_independent() {
        let mut ctx = EntityProcessingContext::new("Zugspitze").unwrap();
        ctx.set_wikipedia(WikipediaRecord::not_found("Zugspitze", "de"));
        ctx.set_wikidata(crate::sources::WikidataRecord::not_found("de"));
        assert_eq!(ctx.sources().status_of(ServiceKind::Wikipedia), Some("not_found"));
        assert_eq!(ctx.sources().status_of(ServiceKind::Wikidata), Some("not_found"));
        assert_eq!(ctx.sources().status_of(ServiceKind::Dbpedia), None);
        assert_eq!(
            ctx.sources().wikipedia.as_ref().unwrap().status,
            LinkStatus::NotFound
        );
    }

    #[test]
    fn test_serialization_hides_scratch_space() {
        let mut ctx = EntityProcessingContext::new("Zugspitze")
            .unwrap()
            .with_id("e1")
            .with_type("mountain");
        ctx.set_processing_value(keys::ENGLISH_TITLE, json!("Zugspitze"));
        ctx.set_service_data(ServiceKind::Wikipedia, json!({"pageid": 1}));
        ctx.set_source_extra("osm", json!({"id": 42}));
        ctx.mark_processed(ServiceKind::Wikipedia);

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["entity_name"], "Zugspitze");
        assert_eq!(json["entity_id"], "e1");
        assert!(json.get("processing_data").is_none());
        assert!(json.get("service_data").is_none());
        assert_eq!(json["output_data"]["sources"]["osm"]["id"], 42);
        assert_eq!(json["processed_by_services"][0], "wikipedia");
    }
}
