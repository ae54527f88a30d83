//! Typed per-source records written by the resolvers.
//!
//! Each knowledge source gets its own record shape. The status of a record
//! is gated on a minimum field set: a record can be downgraded by
//! `validated()` but never silently upgraded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ServiceKind;

/// Outcome of a Wikipedia or Wikidata lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Found,
    Partial,
    NotFound,
    Error,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Partial => "partial",
            Self::NotFound => "not_found",
            Self::Error => "error",
        }
    }
}

/// Outcome of a DBpedia lookup. `Linked` is the strictest gate in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbpediaStatus {
    Linked,
    NotLinked,
    Error,
}

impl DbpediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linked => "linked",
            Self::NotLinked => "not_linked",
            Self::Error => "error",
        }
    }
}

/// Which resolution path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    #[default]
    Api,
    Cache,
    Fallback,
}

/// Identifier of a fallback stage, stamped into `fallback_source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStage {
    /// Alternate language edition (Wikipedia) or English search (Wikidata).
    Language,
    /// OpenSearch title suggestions.
    OpensearchTitle,
    /// Synonyms from the term generator.
    Synonym,
    /// Rendered article HTML.
    HtmlScrape,
    /// `wbsearchentities` on the raw entity name.
    DirectSearch,
    /// Another SPARQL endpoint for the same resource.
    AlternateEndpoint,
    /// DBpedia Lookup keyword search.
    LookupApi,
}

impl FallbackStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Language => "language",
            Self::OpensearchTitle => "opensearch_title",
            Self::Synonym => "synonym",
            Self::HtmlScrape => "html_scrape",
            Self::DirectSearch => "direct_search",
            Self::AlternateEndpoint => "alternate_endpoint",
            Self::LookupApi => "lookup_api",
        }
    }

    /// Parse a stage tag as written by `as_str`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "language" => Some(Self::Language),
            "opensearch_title" => Some(Self::OpensearchTitle),
            "synonym" => Some(Self::Synonym),
            "html_scrape" => Some(Self::HtmlScrape),
            "direct_search" => Some(Self::DirectSearch),
            "alternate_endpoint" => Some(Self::AlternateEndpoint),
            "lookup_api" => Some(Self::LookupApi),
            _ => None,
        }
    }
}

impl std::fmt::Display for FallbackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

// ---------------------------------------------------------------
// Wikipedia
// ---------------------------------------------------------------

/// Article summary from a Wikipedia language edition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikipediaRecord {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Edition actually used, which may differ from the requested one.
    pub language: String,
    #[serde(default)]
    pub extract: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english_title: Option<String>,
    pub status: LinkStatus,
    #[serde(default)]
    pub source: ResultSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_source: Option<FallbackStage>,
    #[serde(default)]
    pub fallback_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WikipediaRecord {
    pub fn not_found(title: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
            language: language.into(),
            extract: None,
            categories: Vec::new(),
            wikidata_id: None,
            english_title: None,
            status: LinkStatus::NotFound,
            source: ResultSource::Api,
            fallback_source: None,
            fallback_attempts: 0,
            error: None,
        }
    }

    pub fn error(
        title: impl Into<String>,
        language: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: LinkStatus::Error,
            error: Some(message.into()),
            ..Self::not_found(title, language)
        }
    }

    /// Title, URL and extract are the minimum for `found`.
    pub fn has_required_fields(&self) -> bool {
        !self.title.trim().is_empty() && non_empty(&self.url) && non_empty(&self.extract)
    }

    /// Downgrade `found` to `partial` when required fields are missing.
    pub fn validated(mut self) -> Self {
        if self.status == LinkStatus::Found && !self.has_required_fields() {
            self.status = LinkStatus::Partial;
        }
        self
    }

    pub fn extract_len(&self) -> usize {
        self.extract
            .as_deref()
            .map(|e| e.trim().chars().count())
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------
// Wikidata
// ---------------------------------------------------------------

/// Reference to another Wikidata item, with its label once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl EntityRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Wikidata item with its core claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikidataRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub types: Vec<EntityRef>,
    #[serde(default)]
    pub part_of: Vec<EntityRef>,
    #[serde(default)]
    pub has_parts: Vec<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, rename = "sameAs", skip_serializing_if = "Vec::is_empty")]
    pub same_as: Vec<String>,
    pub language: String,
    pub status: LinkStatus,
    #[serde(default)]
    pub source: ResultSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_source: Option<FallbackStage>,
    #[serde(default)]
    pub fallback_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WikidataRecord {
    pub fn not_found(language: impl Into<String>) -> Self {
        Self {
            id: None,
            uri: None,
            label: None,
            description: None,
            aliases: Vec::new(),
            types: Vec::new(),
            part_of: Vec::new(),
            has_parts: Vec::new(),
            coordinates: None,
            same_as: Vec::new(),
            language: language.into(),
            status: LinkStatus::NotFound,
            source: ResultSource::Api,
            fallback_source: None,
            fallback_attempts: 0,
            error: None,
        }
    }

    pub fn error(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: LinkStatus::Error,
            error: Some(message.into()),
            ..Self::not_found(language)
        }
    }

    pub fn has_required_fields(&self) -> bool {
        non_empty(&self.id) && non_empty(&self.label) && non_empty(&self.description)
    }

    /// Cap the status at what the fields support: `found` needs id, label
    /// and description; an id alone is `partial`.
    pub fn validated(mut self) -> Self {
        if self.status == LinkStatus::Error {
            return self;
        }
        let ceiling = if self.has_required_fields() {
            LinkStatus::Found
        } else if non_empty(&self.id) {
            LinkStatus::Partial
        } else {
            LinkStatus::NotFound
        };
        self.status = match (self.status, ceiling) {
            (LinkStatus::Found, c) => c,
            (LinkStatus::Partial, LinkStatus::NotFound) => LinkStatus::NotFound,
            (s, _) => s,
        };
        self
    }
}

// ---------------------------------------------------------------
// DBpedia
// ---------------------------------------------------------------

/// DBpedia resource description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbpediaRecord {
    pub status: DbpediaStatus,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub part_of: Vec<String>,
    #[serde(default)]
    pub has_parts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, rename = "wikiPage", skip_serializing_if = "Option::is_none")]
    pub wiki_page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub language: String,
    #[serde(default)]
    pub source: ResultSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_source: Option<FallbackStage>,
    #[serde(default)]
    pub fallback_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DbpediaRecord {
    pub fn not_linked(uri: Option<String>, language: impl Into<String>) -> Self {
        Self {
            status: DbpediaStatus::NotLinked,
            uri,
            label: None,
            abstract_text: None,
            types: Vec::new(),
            categories: Vec::new(),
            part_of: Vec::new(),
            has_parts: Vec::new(),
            latitude: None,
            longitude: None,
            wiki_page: None,
            image: None,
            homepage: None,
            language: language.into(),
            source: ResultSource::Api,
            fallback_source: None,
            fallback_attempts: 0,
            error: None,
        }
    }

    pub fn has_required_fields(&self) -> bool {
        non_empty(&self.uri) && non_empty(&self.label) && non_empty(&self.abstract_text)
    }

    /// Derive the status from the data: `linked` iff URI, label and
    /// abstract are all present. Partial data is still `not_linked`.
    pub fn validated(mut self) -> Self {
        if self.status == DbpediaStatus::Error {
            return self;
        }
        self.status = if self.has_required_fields() {
            DbpediaStatus::Linked
        } else {
            DbpediaStatus::NotLinked
        };
        self
    }
}

// ---------------------------------------------------------------
// Source map
// ---------------------------------------------------------------

/// Canonical public-facing record per knowledge source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Sources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikipedia: Option<WikipediaRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikidata: Option<WikidataRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbpedia: Option<DbpediaRecord>,
    /// Provider-specific extras that have no typed home.
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

impl Sources {
    /// Status tag of the record for a service, if one was written.
    pub fn status_of(&self, service: ServiceKind) -> Option<&'static str> {
        match service {
            ServiceKind::Wikipedia => self.wikipedia.as_ref().map(|r| r.status.as_str()),
            ServiceKind::Wikidata => self.wikidata.as_ref().map(|r| r.status.as_str()),
            ServiceKind::Dbpedia => self.dbpedia.as_ref().map(|r| r.status.as_str()),
        }
    }

    /// Whether the service produced a validated link.
    pub fn is_linked(&self, service: ServiceKind) -> bool {
        match service {
            ServiceKind::Wikipedia => self
                .wikipedia
                .as_ref()
                .map(|r| r.status == LinkStatus::Found)
                .unwrap_or(false),
            ServiceKind::Wikidata => self
                .wikidata
                .as_ref()
                .map(|r| r.status == LinkStatus::Found)
                .unwrap_or(false),
            ServiceKind::Dbpedia => self
                .dbpedia
                .as_ref()
                .map(|r| r.status == DbpediaStatus::Linked)
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dbpedia_gate_requires_abstract() {
        let mut record = DbpediaRecord::not_linked(
            Some("http://dbpedia.org/resource/Zugspitze".into()),
            "en",
        );
        record.label = Some("Zugspitze".into());
        record.status = DbpediaStatus::Linked;

        let record = record.validated();
        assert_eq!(record.status, DbpediaStatus::NotLinked);
    }

    #[test]
    fn test_dbpedia_gate_links_complete_record() {
        let mut record = DbpediaRecord::not_linked(
            Some("http://dbpedia.org/resource/Zugspitze".into()),
            "en",
        );
        record.label = Some("Zugspitze".into());
        record.abstract_text = Some("The Zugspitze is the highest peak of Germany.".into());
        assert_eq!(record.validated().status, DbpediaStatus::Linked);
    }

    #[test]
    fn test_dbpedia_blank_abstract_is_not_linked() {
        let mut record = DbpediaRecord::not_linked(Some("http://dbpedia.org/resource/X".into()), "en");
        record.label = Some("X".into());
        record.abstract_text = Some("   ".into());
        assert_eq!(record.validated().status, DbpediaStatus::NotLinked);
    }

    #[test]
    fn test_wikidata_found_without_description_is_partial() {
        let mut record = WikidataRecord::not_found("en");
        record.id = Some("Q937".into());
        record.label = Some("Albert Einstein".into());
        record.status = LinkStatus::Found;
        assert_eq!(record.validated().status, LinkStatus::Partial);
    }

    #[test]
    fn test_wikidata_partial_is_never_upgraded() {
        let mut record = WikidataRecord::not_found("en");
        record.id = Some("Q937".into());
        record.label = Some("Albert Einstein".into());
        record.description = Some("physicist".into());
        record.status = LinkStatus::Partial;
        assert_eq!(record.validated().status, LinkStatus::Partial);
    }

    #[test]
    fn test_wikipedia_found_without_extract_is_partial() {
        let mut record = WikipediaRecord::not_found("Zugspitze", "de");
        record.url = Some("https://de.wikipedia.org/wiki/Zugspitze".into());
        record.status = LinkStatus::Found;
        assert_eq!(record.validated().status, LinkStatus::Partial);
    }

    #[test]
    fn test_stage_tags_round_trip() {
        for stage in [
            FallbackStage::Language,
            FallbackStage::OpensearchTitle,
            FallbackStage::HtmlScrape,
            FallbackStage::LookupApi,
        ] {
            assert_eq!(FallbackStage::parse(stage.as_str()), Some(stage));
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, serde_json::json!(stage.as_str()));
        }
    }

    #[test]
    fn test_record_serialization_shape() {
        let mut record = DbpediaRecord::not_linked(None, "en");
        record.abstract_text = Some("text".into());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "not_linked");
        assert_eq!(json["abstract"], "text");
        assert!(json.get("wikiPage").is_none());
    }
}
