//! Entity input: names on the command line or a JSON file.

use std::path::Path;

use anyhow::Context;
use linkwise_core::{keys, EntityProcessingContext, Relationship};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntityInput {
    Name(String),
    Record(EntityRecord),
}

#[derive(Debug, Deserialize)]
struct EntityRecord {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "type")]
    entity_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    wikipedia_url: Option<String>,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

impl EntityInput {
    fn into_context(self) -> linkwise_core::Result<EntityProcessingContext> {
        let record = match self {
            EntityInput::Name(name) => EntityRecord {
                name,
                id: None,
                entity_type: None,
                text: None,
                wikipedia_url: None,
                relationships: Vec::new(),
            },
            EntityInput::Record(record) => record,
        };

        let id = record
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut ctx = EntityProcessingContext::new(record.name)?.with_id(id);
        if let Some(entity_type) = record.entity_type {
            ctx = ctx.with_type(entity_type);
        }
        if let Some(text) = record.text {
            ctx = ctx.with_text(text);
        }
        if let Some(url) = record.wikipedia_url.filter(|u| !u.trim().is_empty()) {
            ctx.set_processing_value(keys::SUGGESTED_WIKIPEDIA_URL, json!(url));
        }
        ctx.relationships = record.relationships;
        Ok(ctx)
    }
}

/// Contexts for entity names given on the command line.
pub fn from_names(names: &[String]) -> anyhow::Result<Vec<EntityProcessingContext>> {
    names
        .iter()
        .map(|name| {
            EntityInput::Name(name.clone())
                .into_context()
                .with_context(|| format!("invalid entity name '{}'", name))
        })
        .collect()
}

/// Contexts from a JSON array of names or entity objects.
pub fn from_json(raw: &str) -> anyhow::Result<Vec<EntityProcessingContext>> {
    let inputs: Vec<EntityInput> =
        serde_json::from_str(raw).context("entities must be a JSON array of names or objects")?;
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            input
                .into_context()
                .with_context(|| format!("entity #{}", i + 1))
        })
        .collect()
}

pub fn from_file(path: &Path) -> anyhow::Result<Vec<EntityProcessingContext>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read entities from {}", path.display()))?;
    from_json(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_get_correlation_ids() {
        let contexts = from_names(&["Zugspitze".to_string(), "Watzmann".to_string()]).unwrap();
        assert_eq!(contexts.len(), 2);
        let first = contexts[0].entity_id.clone().unwrap();
        let second = contexts[1].entity_id.clone().unwrap();
        assert_eq!(first.len(), 36);
        assert_ne!(first, second);
    }

    #[test]
    fn test_mixed_json() {
        let raw = r#"[
            "Zugspitze",
            {
                "name": "München",
                "id": "e2",
                "type": "city",
                "text": "München liegt an der Isar.",
                "wikipedia_url": "https://de.wikipedia.org/wiki/M%C3%BCnchen",
                "relationships": [{"subject": "München", "predicate": "located_on", "object": "Isar"}]
            }
        ]"#;
        let contexts = from_json(raw).unwrap();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].entity_name(), "Zugspitze");

        let munich = &contexts[1];
        assert_eq!(munich.entity_id.as_deref(), Some("e2"));
        assert_eq!(munich.entity_type.as_deref(), Some("city"));
        assert_eq!(
            munich.processing_str(keys::SUGGESTED_WIKIPEDIA_URL),
            Some("https://de.wikipedia.org/wiki/M%C3%BCnchen")
        );
        assert_eq!(munich.relationships.len(), 1);
        assert!(!munich.relationships[0].inferred);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let err = from_json(r#"["Zugspitze", {"name": "  "}]"#).unwrap_err();
        assert!(format!("{:#}", err).contains("entity #2"));
        assert!(from_json(r#"{"name": "Zugspitze"}"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        std::fs::write(&path, r#"["Q937"]"#).unwrap();
        let contexts = from_file(&path).unwrap();
        assert_eq!(contexts[0].entity_name(), "Q937");
        assert!(from_file(&dir.path().join("missing.json")).is_err());
    }
}
