//! Wikidata resolver.
//!
//! The primary path needs a QID: taken from the Wikipedia record, from a
//! previously propagated value, from the entity name itself, or from the
//! Wikipedia page properties. Items are fetched with `wbgetentities` in
//! batches and the items they reference are labelled in a second batch.
//! Entities without a validated item then run the chain
//! direct search → English search → synonym search.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use linkwise_core::{
    cache_key, keys, CacheStore, Coordinates, EntityProcessingContext, EntityRef, Error,
    FallbackStage, LinkStatus, LinkerConfig, Result, ResultSource, ServiceKind,
    ServiceStatistics, TermGenerator, WikidataConfig, WikidataRecord,
};
use linkwise_net::HttpClient;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::fallback::{run_chain, FallbackPlan, StageExecutor, StageFailure};
use crate::recorder::StatsRecorder;
use crate::{dbpedia, mediawiki, Resolver};

pub const CACHE_NAMESPACE: &str = "wikidata";

const ENTITY_PROPS: &str = "labels|descriptions|aliases|claims|sitelinks/urls";
const SEARCH_LIMIT: usize = 5;
/// Titles per page-properties query.
const PAGEPROPS_BATCH: usize = 50;

const INSTANCE_OF: &str = "P31";
const PART_OF: &str = "P361";
const HAS_PARTS: &str = "P527";
const COORDINATES: &str = "P625";
const EXACT_MATCH: &str = "P2888";

static QID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[Qq][1-9][0-9]*$").unwrap());

/// QID spelled by the entity name itself, if any.
pub fn qid_from_name(name: &str) -> Option<String> {
    let name = name.trim();
    QID_RE.is_match(name).then(|| name.to_uppercase())
}

// ---------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: HashMap<String, EntityDoc>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LangValue {
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Claim {
    mainsnak: Snak,
}

#[derive(Debug, Clone, Deserialize)]
struct Snak {
    #[serde(default)]
    datavalue: Option<DataValue>,
}

#[derive(Debug, Clone, Deserialize)]
struct DataValue {
    value: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct Sitelink {
    title: String,
    #[serde(default)]
    url: Option<String>,
}

/// The API encodes empty maps as `[]`.
fn lenient_map<'de, D, V>(deserializer: D) -> std::result::Result<HashMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrSeq<V> {
        Map(HashMap<String, V>),
        Seq(Vec<Value>),
    }
    Ok(match MapOrSeq::<V>::deserialize(deserializer)? {
        MapOrSeq::Map(map) => map,
        MapOrSeq::Seq(_) => HashMap::new(),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EntityDoc {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    missing: Option<Value>,
    #[serde(default, deserialize_with = "lenient_map")]
    labels: HashMap<String, LangValue>,
    #[serde(default, deserialize_with = "lenient_map")]
    descriptions: HashMap<String, LangValue>,
    #[serde(default, deserialize_with = "lenient_map")]
    aliases: HashMap<String, Vec<LangValue>>,
    #[serde(default, deserialize_with = "lenient_map")]
    claims: HashMap<String, Vec<Claim>>,
    #[serde(default, deserialize_with = "lenient_map")]
    sitelinks: HashMap<String, Sitelink>,
}

impl EntityDoc {
    fn exists(&self) -> bool {
        self.missing.is_none() && self.id.is_some()
    }

    /// First value among `languages`, with the language it was found in.
    fn text_in<'a>(
        map: &'a HashMap<String, LangValue>,
        languages: &[&'a str],
    ) -> Option<(&'a str, &'a str)> {
        languages.iter().find_map(|lang| {
            map.get(*lang)
                .map(|v| v.value.trim())
                .filter(|v| !v.is_empty())
                .map(|v| (*lang, v))
        })
    }

    fn values(&self, property: &str) -> impl Iterator<Item = &Value> {
        self.claims
            .get(property)
            .into_iter()
            .flatten()
            .filter_map(|claim| claim.mainsnak.datavalue.as_ref().map(|d| &d.value))
    }

    fn item_refs(&self, property: &str) -> Vec<EntityRef> {
        let mut refs: Vec<EntityRef> = Vec::new();
        for id in self
            .values(property)
            .filter_map(|v| v.get("id").and_then(Value::as_str))
        {
            if !refs.iter().any(|r| r.id == id) {
                refs.push(EntityRef::new(id));
            }
        }
        refs
    }

    fn coordinates(&self) -> Option<Coordinates> {
        self.values(COORDINATES).find_map(|v| {
            Some(Coordinates {
                latitude: v.get("latitude")?.as_f64()?,
                longitude: v.get("longitude")?.as_f64()?,
            })
        })
    }

    fn sitelink(&self, language: &str) -> Option<&Sitelink> {
        self.sitelinks.get(&format!("{}wiki", language))
    }
}

/// An item turned into a record, plus values for other services.
#[derive(Debug, Clone)]
struct Candidate {
    record: WikidataRecord,
    english_title: Option<String>,
}

// ---------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------

struct Pending {
    qid: Option<String>,
    /// Wikipedia page to ask for its item id, when no QID is known yet.
    page: Option<(String, String)>,
    candidate: Option<Candidate>,
    primary_error: Option<String>,
}

pub struct WikidataResolver {
    config: WikidataConfig,
    language: String,
    wikipedia_api_url: String,
    article_url: String,
    dbpedia_resource_prefix: String,
    client: HttpClient,
    wikipedia_client: HttpClient,
    cache: Arc<dyn CacheStore>,
    terms: Arc<dyn TermGenerator>,
    stats: StatsRecorder,
}

impl WikidataResolver {
    pub fn new(
        config: &LinkerConfig,
        cache: Arc<dyn CacheStore>,
        terms: Arc<dyn TermGenerator>,
    ) -> Result<Self> {
        let wikidata = &config.wikidata;
        let client = HttpClient::new(
            "wikidata",
            &config.user_agent,
            Duration::from_secs(wikidata.timeout_secs),
            config.verify_ssl,
            &wikidata.rate_limit,
        )?;
        let wikipedia_client = HttpClient::new(
            "wikipedia-pageprops",
            &config.user_agent,
            Duration::from_secs(config.wikipedia.timeout_secs),
            config.verify_ssl,
            &config.wikipedia.rate_limit,
        )?;
        Ok(Self {
            config: wikidata.clone(),
            language: config.language.clone(),
            wikipedia_api_url: config.wikipedia.api_url.clone(),
            article_url: config.wikipedia.article_url.clone(),
            dbpedia_resource_prefix: config.dbpedia.resource_prefix.clone(),
            client,
            wikipedia_client,
            cache,
            terms,
            stats: StatsRecorder::new(),
        })
    }

    fn languages(&self, language: &str) -> Vec<String> {
        let mut languages = vec![language.to_string()];
        if language != "en" {
            languages.push("en".into());
        }
        languages
    }

    /// `wbgetentities` for up to one batch of ids.
    async fn fetch_entities(
        &self,
        ids: &[String],
        language: &str,
        props: &str,
        call_type: &str,
    ) -> Result<HashMap<String, EntityDoc>> {
        self.stats.api_call(call_type);
        let languages = self.languages(language);
        let sites: Vec<String> = languages.iter().map(|l| format!("{}wiki", l)).collect();
        let query = [
            ("action", "wbgetentities".to_string()),
            ("format", "json".to_string()),
            ("ids", ids.join("|")),
            ("props", props.to_string()),
            ("languages", languages.join("|")),
            ("sitefilter", sites.join("|")),
        ];
        let response: EntitiesResponse = self.client.get_json(&self.config.api_url, &query).await?;
        if let Some(error) = response.error {
            return Err(Error::Http(format!("wbgetentities: {}", error)));
        }
        Ok(response.entities)
    }

    /// `wbsearchentities`: id of the first hit.
    async fn search(&self, term: &str, language: &str) -> Result<Option<String>> {
        self.stats.api_call("wbsearchentities");
        let query = [
            ("action", "wbsearchentities".to_string()),
            ("format", "json".to_string()),
            ("type", "item".to_string()),
            ("limit", SEARCH_LIMIT.to_string()),
            ("language", language.to_string()),
            ("uselang", language.to_string()),
            ("search", term.to_string()),
        ];
        let response: SearchResponse = self.client.get_json(&self.config.api_url, &query).await?;
        Ok(response.search.into_iter().next().map(|hit| hit.id))
    }

    fn build_candidate(&self, doc: &EntityDoc, language: &str) -> Option<Candidate> {
        if !doc.exists() {
            return None;
        }
        let id = doc.id.clone()?;
        let languages = self.languages(language);
        let preference: Vec<&str> = languages.iter().map(String::as_str).collect();

        let label = EntityDoc::text_in(&doc.labels, &preference);
        let description = EntityDoc::text_in(&doc.descriptions, &preference);

        let mut aliases: Vec<String> = Vec::new();
        for lang in &preference {
            for alias in doc.aliases.get(*lang).into_iter().flatten() {
                if !aliases.contains(&alias.value) {
                    aliases.push(alias.value.clone());
                }
            }
        }

        let mut same_as: Vec<String> = Vec::new();
        for lang in &preference {
            if let Some(link) = doc.sitelink(lang) {
                let url = link
                    .url
                    .clone()
                    .unwrap_or_else(|| mediawiki::article_url(&self.article_url, lang, &link.title));
                same_as.push(url);
            }
        }
        let english_title = doc.sitelink("en").map(|link| link.title.clone());
        if let Some(uri) = english_title
            .as_deref()
            .and_then(|t| dbpedia::resource_uri(&self.dbpedia_resource_prefix, t))
        {
            same_as.push(uri);
        }
        for url in doc.values(EXACT_MATCH).filter_map(Value::as_str) {
            if !same_as.iter().any(|u| u == url) {
                same_as.push(url.to_string());
            }
        }

        let record = WikidataRecord {
            uri: Some(format!("{}{}", self.config.entity_uri_prefix, id)),
            id: Some(id),
            label: label.map(|(_, v)| v.to_string()),
            description: description.map(|(_, v)| v.to_string()),
            aliases,
            types: doc.item_refs(INSTANCE_OF),
            part_of: doc.item_refs(PART_OF),
            has_parts: doc.item_refs(HAS_PARTS),
            coordinates: doc.coordinates(),
            same_as,
            status: LinkStatus::Found,
            ..WikidataRecord::not_found(label.map(|(lang, _)| lang).unwrap_or(language))
        };
        Some(Candidate {
            record: record.validated(),
            english_title,
        })
    }

    /// Label the items referenced by claims, in one secondary batch.
    async fn resolve_labels(&self, records: &mut [&mut WikidataRecord]) {
        let mut ids: Vec<String> = Vec::new();
        for record in records.iter() {
            for r in record.types.iter().chain(&record.part_of).chain(&record.has_parts) {
                if r.label.is_none() && !ids.contains(&r.id) {
                    ids.push(r.id.clone());
                }
            }
        }
        if ids.is_empty() {
            return;
        }

        let mut labels: HashMap<String, String> = HashMap::new();
        let languages = self.languages(&self.language);
        let preference: Vec<&str> = languages.iter().map(String::as_str).collect();
        for chunk in ids.chunks(self.config.batch_size.max(1)) {
            match self
                .fetch_entities(chunk, &self.language, "labels", "labels")
                .await
            {
                Ok(docs) => {
                    for (id, doc) in docs {
                        if let Some((_, label)) = EntityDoc::text_in(&doc.labels, &preference) {
                            labels.insert(id, label.to_string());
                        }
                    }
                }
                Err(e) => warn!("Wikidata label lookup failed ids={}: {}", chunk.len(), e),
            }
        }

        for record in records.iter_mut() {
            for r in record
                .types
                .iter_mut()
                .chain(record.part_of.iter_mut())
                .chain(record.has_parts.iter_mut())
            {
                if r.label.is_none() {
                    r.label = labels.get(&r.id).cloned();
                }
            }
        }
    }

    /// Fetch one item, label its references and build the record.
    async fn fetch_candidate(&self, id: &str, language: &str) -> Result<Option<Candidate>> {
        let docs = self
            .fetch_entities(&[id.to_string()], language, ENTITY_PROPS, "wbgetentities")
            .await?;
        let mut candidate = match docs.get(id).and_then(|doc| self.build_candidate(doc, language)) {
            Some(candidate) => candidate,
            None => return Ok(None),
        };
        self.resolve_labels(&mut [&mut candidate.record]).await;
        Ok(Some(candidate))
    }

    fn plan(&self) -> FallbackPlan {
        FallbackPlan::new(self.config.max_fallback_attempts)
            .stage(FallbackStage::DirectSearch, self.config.direct_search)
            .stage(
                FallbackStage::Language,
                self.config.language_fallback && self.language != "en",
            )
            .stage(FallbackStage::Synonym, self.config.synonym_fallback)
    }

    fn prepare(&self, ctx: &mut EntityProcessingContext) -> Option<Pending> {
        if ctx.is_processed_by(ServiceKind::Wikidata) {
            debug!("Skipping already processed entity={}", ctx.entity_name());
            return None;
        }

        let key = cache_key(ctx.entity_name(), &self.language, CACHE_NAMESPACE);
        if let Some(value) = self.cache.get(CACHE_NAMESPACE, &key) {
            match serde_json::from_value::<WikidataRecord>(value) {
                Ok(mut record) => {
                    debug!("Wikidata cache hit entity={}", ctx.entity_name());
                    record.source = ResultSource::Cache;
                    self.stats.cache_hit();
                    self.commit(ctx, record.validated(), None);
                    return None;
                }
                Err(e) => warn!("Ignoring unreadable cache entry entity={}: {}", ctx.entity_name(), e),
            }
        }

        let wikipedia = ctx
            .sources()
            .wikipedia
            .as_ref()
            .filter(|r| matches!(r.status, LinkStatus::Found | LinkStatus::Partial));
        let qid = wikipedia
            .and_then(|r| r.wikidata_id.clone())
            .or_else(|| ctx.processing_str(keys::WIKIDATA_ID).map(str::to_string))
            .or_else(|| qid_from_name(ctx.entity_name()));
        let page = match (&qid, wikipedia) {
            (None, Some(record)) => Some((record.language.clone(), record.title.clone())),
            _ => None,
        };

        Some(Pending {
            qid,
            page,
            candidate: None,
            primary_error: None,
        })
    }

    /// Ask Wikipedia for the item ids of pages that have none yet.
    async fn lookup_page_items(&self, pending: &mut [Option<Pending>]) {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (language, title) in pending.iter().flatten().filter_map(|p| p.page.as_ref()) {
            let titles = groups.entry(language.clone()).or_default();
            if !titles.contains(title) {
                titles.push(title.clone());
            }
        }

        for (language, titles) in &groups {
            let api = mediawiki::endpoint(&self.wikipedia_api_url, language);
            for chunk in titles.chunks(PAGEPROPS_BATCH) {
                self.stats.api_call("pageprops");
                match mediawiki::wikibase_items(&self.wikipedia_client, &api, chunk).await {
                    Ok(items) => {
                        for p in pending.iter_mut().flatten() {
                            if let Some((lang, title)) = &p.page {
                                if lang == language {
                                    if let Some(id) = items.get(title) {
                                        p.qid = Some(id.clone());
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => warn!(
                        "Wikipedia page properties lookup failed language={}: {}",
                        language, e
                    ),
                }
            }
        }
    }

    /// Batch-fetch every known QID and label the references.
    async fn fetch_primary(&self, pending: &mut [Option<Pending>]) {
        let mut ids: Vec<String> = Vec::new();
        for id in pending.iter().flatten().filter_map(|p| p.qid.as_ref()) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        if ids.is_empty() {
            return;
        }

        let results = join_all(ids.chunks(self.config.batch_size.max(1)).map(|chunk| async move {
            (
                chunk,
                self.fetch_entities(chunk, &self.language, ENTITY_PROPS, "wbgetentities")
                    .await,
            )
        }))
        .await;

        for (chunk, result) in results {
            for p in pending.iter_mut().flatten() {
                let qid = match &p.qid {
                    Some(qid) if chunk.contains(qid) => qid.clone(),
                    _ => continue,
                };
                match &result {
                    Ok(docs) => {
                        p.candidate = docs
                            .get(&qid)
                            .and_then(|doc| self.build_candidate(doc, &self.language));
                    }
                    Err(e) => p.primary_error = Some(e.to_string()),
                }
            }
            if let Err(e) = &result {
                warn!("Wikidata batch fetch failed ids={}: {}", chunk.len(), e);
            }
        }

        let mut records: Vec<&mut WikidataRecord> = pending
            .iter_mut()
            .flatten()
            .filter_map(|p| p.candidate.as_mut().map(|c| &mut c.record))
            .collect();
        self.resolve_labels(&mut records).await;
    }

    async fn resolve_entity(&self, ctx: &mut EntityProcessingContext, pending: Pending) {
        let Pending {
            candidate,
            primary_error,
            ..
        } = pending;

        let mut best = candidate.map(|c| (c, None));
        let mut attempts = 0;
        let mut succeeded = None;

        let settled = best
            .as_ref()
            .map(|(c, _)| c.record.status == LinkStatus::Found)
            .unwrap_or(false);
        if !settled {
            debug!("Wikidata fallback chain entity={}", ctx.entity_name());
            let mut chain = WikidataChain {
                resolver: self,
                entity_name: ctx.entity_name().to_string(),
                english_title: ctx.processing_str(keys::ENGLISH_TITLE).map(str::to_string),
                best: best.take(),
            };
            let outcome = run_chain(&self.plan(), &mut chain).await;
            attempts = outcome.attempts;
            best = match (outcome.value, outcome.stage) {
                (Some(found), Some(stage)) => {
                    self.stats.fallback(stage);
                    succeeded = Some(stage);
                    Some((found, Some(stage)))
                }
                _ => chain.best,
            };
        }

        let (mut record, english_title) = match (best, primary_error) {
            (Some((candidate, origin)), _) => {
                let mut record = candidate.record;
                if origin.is_some() {
                    record.source = ResultSource::Fallback;
                    record.fallback_source = succeeded;
                }
                (record, candidate.english_title)
            }
            (None, Some(message)) => (WikidataRecord::error(self.language.clone(), message), None),
            (None, None) => (WikidataRecord::not_found(self.language.clone()), None),
        };
        record.fallback_attempts = attempts;
        let record = record.validated();

        if record.status == LinkStatus::Found {
            let key = cache_key(ctx.entity_name(), &self.language, CACHE_NAMESPACE);
            match serde_json::to_value(&record) {
                Ok(value) => {
                    if let Err(e) = self.cache.put(CACHE_NAMESPACE, &key, value) {
                        warn!("Failed to cache Wikidata record entity={}: {}", ctx.entity_name(), e);
                    }
                }
                Err(e) => warn!("Failed to serialise Wikidata record: {}", e),
            }
        }

        self.commit(ctx, record, english_title);
    }

    fn commit(
        &self,
        ctx: &mut EntityProcessingContext,
        record: WikidataRecord,
        english_title: Option<String>,
    ) {
        if matches!(record.status, LinkStatus::Found | LinkStatus::Partial) {
            if let Some(id) = &record.id {
                ctx.set_processing_value(keys::WIKIDATA_ID, json!(id));
            }
            if let Some(title) = english_title {
                ctx.set_processing_default(keys::ENGLISH_TITLE, json!(title));
            }
        }
        ctx.set_service_data(
            ServiceKind::Wikidata,
            serde_json::to_value(&record).unwrap_or(Value::Null),
        );
        self.stats.link_outcome(record.status);
        ctx.set_wikidata(record);
        ctx.mark_processed(ServiceKind::Wikidata);
    }
}

#[async_trait]
impl Resolver for WikidataResolver {
    fn service(&self) -> ServiceKind {
        ServiceKind::Wikidata
    }

    async fn process_batch(&self, contexts: &mut [EntityProcessingContext]) {
        let mut pending: Vec<Option<Pending>> =
            contexts.iter_mut().map(|ctx| self.prepare(ctx)).collect();
        let count = pending.iter().flatten().count();
        if count == 0 {
            return;
        }

        self.lookup_page_items(&mut pending).await;
        self.fetch_primary(&mut pending).await;

        let tasks = contexts
            .iter_mut()
            .zip(pending)
            .filter_map(|(ctx, p)| p.map(|p| self.resolve_entity(ctx, p)));
        join_all(tasks).await;

        let stats = self.stats.snapshot();
        info!(
            "Wikidata batch complete entities={} successful={} partial={} failed={}",
            count, stats.successful, stats.partial, stats.failed
        );
    }

    fn get_statistics(&self) -> ServiceStatistics {
        self.stats.snapshot()
    }
}

/// Fallback state for one entity.
struct WikidataChain<'a> {
    resolver: &'a WikidataResolver,
    entity_name: String,
    english_title: Option<String>,
    /// Best item seen so far that did not validate as found.
    best: Option<(Candidate, Option<FallbackStage>)>,
}

impl WikidataChain<'_> {
    /// Search `term`, fetch the first hit and accept it if it validates.
    async fn search_and_fetch(
        &mut self,
        term: &str,
        search_language: &str,
        stage: FallbackStage,
    ) -> std::result::Result<Candidate, StageFailure> {
        let id = match self.resolver.search(term, search_language).await? {
            Some(id) => id,
            None => return Err(StageFailure::NoMatch),
        };
        let candidate = match self
            .resolver
            .fetch_candidate(&id, &self.resolver.language)
            .await?
        {
            Some(candidate) => candidate,
            None => return Err(StageFailure::NoMatch),
        };
        if candidate.record.status == LinkStatus::Found {
            return Ok(candidate);
        }
        if self.best.is_none() && candidate.record.status == LinkStatus::Partial {
            self.best = Some((candidate, Some(stage)));
        }
        Err(StageFailure::NoMatch)
    }

    async fn english_term(&self) -> std::result::Result<String, StageFailure> {
        if let Some(title) = &self.english_title {
            return Ok(title.clone());
        }
        let terms = &self.resolver.terms;
        if !terms.is_available() {
            return Err(StageFailure::NotApplicable);
        }
        terms
            .translate(&self.entity_name, &self.resolver.language, "en")
            .await?
            .filter(|t| !t.trim().is_empty())
            .ok_or(StageFailure::NotApplicable)
    }

    async fn synonyms(&mut self) -> std::result::Result<Candidate, StageFailure> {
        let terms = self.resolver.terms.clone();
        if !terms.is_available() {
            return Err(StageFailure::NotApplicable);
        }
        let max = self.resolver.config.max_synonym_fallback_attempts;
        let synonyms = terms
            .generate_synonyms(&self.entity_name, &self.resolver.language, max)
            .await?;
        let name = self.entity_name.to_lowercase();
        let language = self.resolver.language.clone();

        let mut answered = false;
        let mut last_error = None;
        for synonym in synonyms
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && s.to_lowercase() != name)
            .take(max)
        {
            match self
                .search_and_fetch(synonym, &language, FallbackStage::Synonym)
                .await
            {
                Ok(candidate) => return Ok(candidate),
                Err(StageFailure::Failed(e)) => {
                    warn!(
                        "Wikidata synonym search failed entity={} synonym={}: {}",
                        self.entity_name, synonym, e
                    );
                    last_error = Some(e);
                }
                Err(_) => answered = true,
            }
        }
        match last_error {
            Some(e) if !answered => Err(StageFailure::Failed(e)),
            _ => Err(StageFailure::NoMatch),
        }
    }
}

#[async_trait]
impl<'a> StageExecutor<Candidate> for WikidataChain<'a> {
    async fn run_stage(
        &mut self,
        stage: FallbackStage,
    ) -> std::result::Result<Candidate, StageFailure> {
        match stage {
            FallbackStage::DirectSearch => {
                let name = self.entity_name.clone();
                let language = self.resolver.language.clone();
                self.search_and_fetch(&name, &language, stage).await
            }
            FallbackStage::Language => {
                let term = self.english_term().await?;
                self.search_and_fetch(&term, "en", stage).await
            }
            FallbackStage::Synonym => self.synonyms().await,
            _ => Err(StageFailure::NotApplicable),
        }
    }
}
