//! DBpedia resolver.
//!
//! The resource URI is derived from the English title. Resources are
//! described by one SPARQL query per endpoint and batch, using a `VALUES`
//! clause, with labels and abstracts restricted to the endpoint language.
//! Resources that redirect are re-queried once at the target. Anything not
//! linked then tries the alternate endpoints and the Lookup API.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use linkwise_core::{
    cache_key, keys, CacheStore, DbpediaConfig, DbpediaRecord, DbpediaStatus,
    EntityProcessingContext, FallbackStage, LinkStatus, LinkerConfig, Result, ResultSource,
    ServiceKind, ServiceStatistics, TermGenerator,
};
use linkwise_net::HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::fallback::{run_chain, FallbackPlan, StageExecutor, StageFailure};
use crate::recorder::StatsRecorder;
use crate::Resolver;

pub const CACHE_NAMESPACE: &str = "dbpedia";

const LIST_SEPARATOR: &str = "|";

/// DBpedia resource URI for a Wikipedia title.
///
/// The first letter is upper-cased, spaces become underscores, and the
/// characters that may not appear inside a SPARQL IRI are percent-encoded.
pub fn resource_uri(prefix: &str, title: &str) -> Option<String> {
    let title = title.trim();
    let mut chars = title.chars();
    let first = chars.next()?;

    let mut uri = String::from(prefix);
    for c in first.to_uppercase().chain(chars) {
        match c {
            ' ' => uri.push('_'),
            '<' | '>' | '"' | '{' | '}' | '|' | '\\' | '^' | '`' => {
                uri.push_str(&format!("%{:02X}", c as u32))
            }
            c => uri.push(c),
        }
    }
    Some(uri)
}

/// SPARQL query describing every URI in `uris`.
pub fn batch_query(uris: &[String], language: &str) -> String {
    let values: Vec<String> = uris.iter().map(|u| format!("<{}>", u)).collect();
    format!(
        r#"PREFIX dbo: <http://dbpedia.org/ontology/>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX foaf: <http://xmlns.com/foaf/0.1/>
PREFIX geo: <http://www.w3.org/2003/01/geo/wgs84_pos#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
SELECT ?uri
  (SAMPLE(?l) AS ?label)
  (SAMPLE(?a) AS ?abstract)
  (GROUP_CONCAT(DISTINCT ?t; separator="{sep}") AS ?types)
  (GROUP_CONCAT(DISTINCT ?c; separator="{sep}") AS ?categories)
  (GROUP_CONCAT(DISTINCT ?po; separator="{sep}") AS ?partOf)
  (GROUP_CONCAT(DISTINCT ?hp; separator="{sep}") AS ?hasParts)
  (SAMPLE(?lat) AS ?latitude)
  (SAMPLE(?long) AS ?longitude)
  (SAMPLE(?home) AS ?homepage)
  (SAMPLE(?img) AS ?image)
  (SAMPLE(?page) AS ?wikiPage)
  (SAMPLE(?target) AS ?redirect)
WHERE {{
  VALUES ?uri {{ {values} }}
  OPTIONAL {{ ?uri rdfs:label ?l . FILTER(LANG(?l) = "{lang}") }}
  OPTIONAL {{ ?uri dbo:abstract ?a . FILTER(LANG(?a) = "{lang}") }}
  OPTIONAL {{ ?uri a ?t . FILTER(STRSTARTS(STR(?t), "http://dbpedia.org/ontology/")) }}
  OPTIONAL {{ ?uri dct:subject ?c }}
  OPTIONAL {{ ?uri dbo:isPartOf ?po }}
  OPTIONAL {{ ?uri dbo:hasPart ?hp }}
  OPTIONAL {{ ?uri geo:lat ?lat ; geo:long ?long }}
  OPTIONAL {{ ?uri foaf:homepage ?home }}
  OPTIONAL {{ ?uri dbo:thumbnail ?img }}
  OPTIONAL {{ ?uri foaf:isPrimaryTopicOf ?page }}
  OPTIONAL {{ ?uri dbo:wikiPageRedirects ?target }}
}}
GROUP BY ?uri"#,
        sep = LIST_SEPARATOR,
        values = values.join(" "),
        lang = language,
    )
}

// ---------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<HashMap<String, Binding>>,
}

#[derive(Debug, Deserialize)]
struct Binding {
    value: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    docs: Vec<LookupDoc>,
}

#[derive(Debug, Deserialize)]
struct LookupDoc {
    #[serde(default)]
    resource: Vec<String>,
}

/// One described resource.
#[derive(Debug, Clone)]
struct Description {
    record: DbpediaRecord,
    redirect: Option<String>,
}

fn text(row: &HashMap<String, Binding>, name: &str) -> Option<String> {
    row.get(name)
        .map(|b| b.value.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn list(row: &HashMap<String, Binding>, name: &str) -> Vec<String> {
    text(row, name)
        .map(|v| {
            v.split(LIST_SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn describe(response: SparqlResponse, language: &str) -> HashMap<String, Description> {
    response
        .results
        .bindings
        .iter()
        .filter_map(|row| {
            let uri = text(row, "uri")?;
            let record = DbpediaRecord {
                label: text(row, "label"),
                abstract_text: text(row, "abstract"),
                types: list(row, "types"),
                categories: list(row, "categories"),
                part_of: list(row, "partOf"),
                has_parts: list(row, "hasParts"),
                latitude: text(row, "latitude").and_then(|v| v.parse().ok()),
                longitude: text(row, "longitude").and_then(|v| v.parse().ok()),
                wiki_page: text(row, "wikiPage"),
                image: text(row, "image"),
                homepage: text(row, "homepage"),
                ..DbpediaRecord::not_linked(Some(uri.clone()), language)
            }
            .validated();
            Some((
                uri,
                Description {
                    record,
                    redirect: text(row, "redirect"),
                },
            ))
        })
        .collect()
}

// ---------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------

/// A resource URI on a specific endpoint.
#[derive(Debug, Clone, PartialEq)]
struct Target {
    uri: String,
    endpoint: String,
    language: String,
}

struct Pending {
    target: Option<Target>,
    alternates: Vec<Target>,
    description: Option<Description>,
    primary_error: Option<String>,
}

pub struct DbpediaResolver {
    config: DbpediaConfig,
    /// Pipeline language, the source of translations to English.
    language: String,
    client: HttpClient,
    cache: Arc<dyn CacheStore>,
    terms: Arc<dyn TermGenerator>,
    stats: StatsRecorder,
}

impl DbpediaResolver {
    pub fn new(
        config: &LinkerConfig,
        cache: Arc<dyn CacheStore>,
        terms: Arc<dyn TermGenerator>,
    ) -> Result<Self> {
        let dbpedia = &config.dbpedia;
        let client = HttpClient::new(
            "dbpedia",
            &config.user_agent,
            Duration::from_secs(dbpedia.timeout_secs),
            config.verify_ssl,
            &dbpedia.rate_limit,
        )?;
        Ok(Self {
            config: dbpedia.clone(),
            language: config.language.clone(),
            client,
            cache,
            terms,
            stats: StatsRecorder::new(),
        })
    }

    fn english_target(&self, title: &str) -> Option<Target> {
        resource_uri(&self.config.resource_prefix, title).map(|uri| Target {
            uri,
            endpoint: self.config.sparql_endpoint.clone(),
            language: self.config.language.clone(),
        })
    }

    fn german_target(&self, title: &str) -> Option<Target> {
        resource_uri(&self.config.de_resource_prefix, title).map(|uri| Target {
            uri,
            endpoint: self.config.de_sparql_endpoint.clone(),
            language: "de".into(),
        })
    }

    /// English title known to the other services, if any.
    fn english_title(ctx: &EntityProcessingContext) -> Option<String> {
        if let Some(title) = ctx.processing_str(keys::ENGLISH_TITLE) {
            return Some(title.to_string());
        }
        let wikipedia = ctx.sources().wikipedia.as_ref()?;
        if !matches!(wikipedia.status, LinkStatus::Found | LinkStatus::Partial) {
            return None;
        }
        wikipedia.english_title.clone().or_else(|| {
            (wikipedia.language == "en").then(|| wikipedia.title.clone())
        })
    }

    fn german_title(ctx: &EntityProcessingContext) -> Option<String> {
        if let Some(title) = ctx.processing_str(keys::GERMAN_TITLE) {
            return Some(title.to_string());
        }
        ctx.sources()
            .wikipedia
            .as_ref()
            .filter(|r| r.language == "de" && r.status != LinkStatus::Error)
            .filter(|r| r.status != LinkStatus::NotFound)
            .map(|r| r.title.clone())
    }

    /// Primary target plus the alternates the chain may try.
    async fn targets(&self, ctx: &EntityProcessingContext) -> (Option<Target>, Vec<Target>) {
        let mut english = Self::english_title(ctx);
        if english.is_none() && self.terms.is_available() {
            let source = ctx
                .processing_str(keys::WIKIPEDIA_LANGUAGE)
                .unwrap_or(&self.language)
                .to_string();
            if source != "en" {
                match self.terms.translate(ctx.entity_name(), &source, "en").await {
                    Ok(translated) => english = translated.filter(|t| !t.trim().is_empty()),
                    Err(e) => debug!("Translation failed entity={}: {}", ctx.entity_name(), e),
                }
            }
        }
        let german = if self.config.use_de {
            Self::german_title(ctx).and_then(|t| self.german_target(&t))
        } else {
            None
        };

        match english.and_then(|t| self.english_target(&t)) {
            Some(primary) => {
                let mut alternates: Vec<Target> = self
                    .config
                    .alternate_endpoints
                    .iter()
                    .filter(|e| **e != primary.endpoint)
                    .map(|endpoint| Target {
                        endpoint: endpoint.clone(),
                        ..primary.clone()
                    })
                    .collect();
                alternates.extend(german);
                (Some(primary), alternates)
            }
            None => (german, Vec::new()),
        }
    }

    async fn prepare(&self, ctx: &mut EntityProcessingContext) -> Option<Pending> {
        if ctx.is_processed_by(ServiceKind::Dbpedia) {
            debug!("Skipping already processed entity={}", ctx.entity_name());
            return None;
        }

        let key = cache_key(ctx.entity_name(), &self.config.language, CACHE_NAMESPACE);
        if let Some(value) = self.cache.get(CACHE_NAMESPACE, &key) {
            match serde_json::from_value::<DbpediaRecord>(value) {
                Ok(mut record) => {
                    debug!("DBpedia cache hit entity={}", ctx.entity_name());
                    record.source = ResultSource::Cache;
                    self.stats.cache_hit();
                    self.commit(ctx, record.validated(), &[]);
                    return None;
                }
                Err(e) => warn!("Ignoring unreadable cache entry entity={}: {}", ctx.entity_name(), e),
            }
        }

        let (target, alternates) = self.targets(ctx).await;
        if target.is_none() {
            debug!("No DBpedia resource URI entity={}", ctx.entity_name());
        }
        Some(Pending {
            target,
            alternates,
            description: None,
            primary_error: None,
        })
    }

    /// Describe resources on one endpoint, batch by batch.
    async fn describe_on(
        &self,
        endpoint: &str,
        uris: &[String],
        language: &str,
    ) -> Vec<(Vec<String>, Result<HashMap<String, Description>>)> {
        let batches = uris.chunks(self.config.batch_size.max(1)).map(|chunk| async move {
            self.stats.api_call("sparql");
            let query = batch_query(chunk, language);
            let result = self
                .client
                .sparql::<SparqlResponse>(endpoint, &query)
                .await
                .map(|response| describe(response, language));
            (chunk.to_vec(), result)
        });
        join_all(batches).await
    }

    /// Describe one resource, following a redirect once.
    async fn describe_one(&self, target: &Target) -> Result<Option<Description>> {
        let uris = [target.uri.clone()];
        let mut results = self.describe_on(&target.endpoint, &uris, &target.language).await;
        let described = match results.pop() {
            Some((_, result)) => result?.remove(&target.uri),
            None => None,
        };
        match described {
            Some(d) if d.record.status != DbpediaStatus::Linked => match d.redirect.clone() {
                Some(redirect) => {
                    let redirected = Target {
                        uri: redirect,
                        ..target.clone()
                    };
                    let uris = [redirected.uri.clone()];
                    let mut results = self
                        .describe_on(&redirected.endpoint, &uris, &redirected.language)
                        .await;
                    let followed = match results.pop() {
                        Some((_, result)) => result?.remove(&redirected.uri),
                        None => None,
                    };
                    Ok(followed.or(Some(d)))
                }
                None => Ok(Some(d)),
            },
            other => Ok(other),
        }
    }

    /// Batch-describe every primary target, grouped by endpoint, then
    /// re-query the redirect targets of unlinked resources in one pass.
    async fn fetch_primary(&self, pending: &mut [Option<Pending>]) {
        let mut groups: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for target in pending.iter().flatten().filter_map(|p| p.target.as_ref()) {
            let uris = groups
                .entry((target.endpoint.clone(), target.language.clone()))
                .or_default();
            if !uris.contains(&target.uri) {
                uris.push(target.uri.clone());
            }
        }

        for ((endpoint, language), uris) in &groups {
            for (chunk, result) in self.describe_on(endpoint, uris, language).await {
                match result {
                    Ok(described) => {
                        for p in pending.iter_mut().flatten() {
                            if let Some(t) = &p.target {
                                if &t.endpoint == endpoint
                                    && &t.language == language
                                    && chunk.contains(&t.uri)
                                {
                                    p.description = described.get(&t.uri).cloned().or_else(|| {
                                        Some(Description {
                                            record: DbpediaRecord::not_linked(
                                                Some(t.uri.clone()),
                                                language.clone(),
                                            ),
                                            redirect: None,
                                        })
                                    });
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("DBpedia batch query failed endpoint={} uris={}: {}", endpoint, chunk.len(), e);
                        for p in pending.iter_mut().flatten() {
                            if let Some(t) = &p.target {
                                if &t.endpoint == endpoint
                                    && &t.language == language
                                    && chunk.contains(&t.uri)
                                {
                                    p.primary_error = Some(e.to_string());
                                }
                            }
                        }
                    }
                }
            }
        }

        self.follow_redirects(pending, &groups).await;
    }

    async fn follow_redirects(
        &self,
        pending: &mut [Option<Pending>],
        groups: &BTreeMap<(String, String), Vec<String>>,
    ) {
        for (endpoint, language) in groups.keys() {
            let mut redirects: Vec<String> = Vec::new();
            for p in pending.iter().flatten() {
                if let (Some(t), Some(d)) = (&p.target, &p.description) {
                    let in_group = &t.endpoint == endpoint && &t.language == language;
                    if in_group && d.record.status != DbpediaStatus::Linked {
                        if let Some(r) = &d.redirect {
                            if !redirects.contains(r) {
                                redirects.push(r.clone());
                            }
                        }
                    }
                }
            }
            if redirects.is_empty() {
                continue;
            }

            debug!("Following DBpedia redirects endpoint={} count={}", endpoint, redirects.len());
            let mut followed: HashMap<String, Description> = HashMap::new();
            for (_, result) in self.describe_on(endpoint, &redirects, language).await {
                match result {
                    Ok(described) => followed.extend(described),
                    Err(e) => warn!("DBpedia redirect query failed endpoint={}: {}", endpoint, e),
                }
            }

            for p in pending.iter_mut().flatten() {
                let in_group = p
                    .target
                    .as_ref()
                    .map(|t| &t.endpoint == endpoint && &t.language == language)
                    .unwrap_or(false);
                if !in_group {
                    continue;
                }
                let target = p
                    .description
                    .as_ref()
                    .filter(|d| d.record.status != DbpediaStatus::Linked)
                    .and_then(|d| d.redirect.as_ref())
                    .and_then(|r| followed.get(r));
                if let Some(d) = target {
                    p.description = Some(d.clone());
                }
            }
        }
    }

    fn plan(&self, attempted: &[FallbackStage]) -> FallbackPlan {
        FallbackPlan::new(self.config.max_fallback_attempts)
            .stage(
                FallbackStage::AlternateEndpoint,
                self.config.alternate_endpoint_fallback,
            )
            .stage(FallbackStage::LookupApi, self.config.lookup_fallback)
            .without(attempted)
    }

    fn attempted_stages(ctx: &EntityProcessingContext) -> Vec<FallbackStage> {
        ctx.processing_value(keys::DBPEDIA_ATTEMPTED_STAGES)
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .filter_map(FallbackStage::parse)
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn resolve_entity(&self, ctx: &mut EntityProcessingContext, pending: Pending) {
        let Pending {
            target,
            alternates,
            description,
            primary_error,
        } = pending;

        let language = target
            .as_ref()
            .map(|t| t.language.clone())
            .unwrap_or_else(|| self.config.language.clone());
        let mut record = match (description, &primary_error) {
            (Some(d), _) => d.record,
            (None, Some(message)) => DbpediaRecord {
                status: DbpediaStatus::Error,
                error: Some(message.clone()),
                ..DbpediaRecord::not_linked(target.as_ref().map(|t| t.uri.clone()), language.clone())
            },
            (None, None) => DbpediaRecord::not_linked(target.as_ref().map(|t| t.uri.clone()), language.clone()),
        };

        let mut attempted = Self::attempted_stages(ctx);
        if record.status != DbpediaStatus::Linked {
            debug!("DBpedia fallback chain entity={}", ctx.entity_name());
            let mut chain = DbpediaChain {
                resolver: self,
                entity_name: ctx.entity_name().to_string(),
                alternates,
            };
            let outcome = run_chain(&self.plan(&attempted), &mut chain).await;
            attempted.extend(outcome.attempted.iter().copied());
            record.fallback_attempts = outcome.attempts;
            if let (Some(found), Some(stage)) = (outcome.value, outcome.stage) {
                self.stats.fallback(stage);
                record = DbpediaRecord {
                    source: ResultSource::Fallback,
                    fallback_source: Some(stage),
                    fallback_attempts: outcome.attempts,
                    ..found
                };
            } else if record.status == DbpediaStatus::Error {
                if let Some(e) = outcome.last_error {
                    record.error = Some(e.to_string());
                }
            }
            ctx.set_processing_value(
                keys::DBPEDIA_ATTEMPTED_STAGES,
                json!(attempted.iter().map(|s| s.as_str()).collect::<Vec<_>>()),
            );
        }
        let record = record.validated();

        if record.status == DbpediaStatus::Linked {
            let key = cache_key(ctx.entity_name(), &self.config.language, CACHE_NAMESPACE);
            match serde_json::to_value(&record) {
                Ok(value) => {
                    if let Err(e) = self.cache.put(CACHE_NAMESPACE, &key, value) {
                        warn!("Failed to cache DBpedia record entity={}: {}", ctx.entity_name(), e);
                    }
                }
                Err(e) => warn!("Failed to serialise DBpedia record: {}", e),
            }
        }

        self.commit(ctx, record, &attempted);
    }

    fn commit(
        &self,
        ctx: &mut EntityProcessingContext,
        record: DbpediaRecord,
        attempted: &[FallbackStage],
    ) {
        if !attempted.is_empty() {
            debug!(
                "DBpedia stages attempted entity={} stages={:?}",
                ctx.entity_name(),
                attempted
            );
        }
        ctx.set_service_data(
            ServiceKind::Dbpedia,
            serde_json::to_value(&record).unwrap_or(Value::Null),
        );
        self.stats.dbpedia_outcome(record.status);
        ctx.set_dbpedia(record);
        ctx.mark_processed(ServiceKind::Dbpedia);
    }

    async fn lookup(&self, name: &str) -> Result<Option<String>> {
        self.stats.api_call("lookup");
        let query = [
            ("query", name.to_string()),
            ("format", "json".to_string()),
            ("maxResults", self.config.lookup_max_results.to_string()),
        ];
        let response: LookupResponse = self.client.get_json(&self.config.lookup_url, &query).await?;
        Ok(response
            .docs
            .into_iter()
            .find_map(|doc| doc.resource.into_iter().next()))
    }
}

#[async_trait]
impl Resolver for DbpediaResolver {
    fn service(&self) -> ServiceKind {
        ServiceKind::Dbpedia
    }

    async fn process_batch(&self, contexts: &mut [EntityProcessingContext]) {
        let mut pending: Vec<Option<Pending>> =
            join_all(contexts.iter_mut().map(|ctx| self.prepare(ctx))).await;
        let count = pending.iter().flatten().count();
        if count == 0 {
            return;
        }

        self.fetch_primary(&mut pending).await;

        let tasks = contexts
            .iter_mut()
            .zip(pending)
            .filter_map(|(ctx, p)| p.map(|p| self.resolve_entity(ctx, p)));
        join_all(tasks).await;

        let stats = self.stats.snapshot();
        info!(
            "DBpedia batch complete entities={} linked={} failed={}",
            count, stats.successful, stats.failed
        );
    }

    fn get_statistics(&self) -> ServiceStatistics {
        self.stats.snapshot()
    }
}

struct DbpediaChain<'a> {
    resolver: &'a DbpediaResolver,
    entity_name: String,
    alternates: Vec<Target>,
}

impl DbpediaChain<'_> {
    async fn alternate_endpoints(&mut self) -> std::result::Result<DbpediaRecord, StageFailure> {
        if self.alternates.is_empty() {
            return Err(StageFailure::NotApplicable);
        }
        let mut answered = false;
        let mut last_error = None;
        for target in &self.alternates {
            debug!("Trying alternate DBpedia endpoint endpoint={}", target.endpoint);
            match self.resolver.describe_one(target).await {
                Ok(Some(d)) if d.record.status == DbpediaStatus::Linked => return Ok(d.record),
                Ok(_) => answered = true,
                Err(e) => last_error = Some(e),
            }
        }
        match last_error {
            Some(e) if !answered => Err(StageFailure::Failed(e)),
            _ => Err(StageFailure::NoMatch),
        }
    }

    async fn lookup_api(&mut self) -> std::result::Result<DbpediaRecord, StageFailure> {
        let uri = match self.resolver.lookup(&self.entity_name).await? {
            Some(uri) => uri,
            None => return Err(StageFailure::NoMatch),
        };
        let config = &self.resolver.config;
        let target = Target {
            uri,
            endpoint: config.sparql_endpoint.clone(),
            language: config.language.clone(),
        };
        match self.resolver.describe_one(&target).await? {
            Some(d) if d.record.status == DbpediaStatus::Linked => Ok(d.record),
            _ => Err(StageFailure::NoMatch),
        }
    }
}

#[async_trait]
impl<'a> StageExecutor<DbpediaRecord> for DbpediaChain<'a> {
    async fn run_stage(
        &mut self,
        stage: FallbackStage,
    ) -> std::result::Result<DbpediaRecord, StageFailure> {
        match stage {
            FallbackStage::AlternateEndpoint => self.alternate_endpoints().await,
            FallbackStage::LookupApi => self.lookup_api().await,
            _ => Err(StageFailure::NotApplicable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_uri() {
        let prefix = "http://dbpedia.org/resource/";
        assert_eq!(
            resource_uri(prefix, "zugspitze").as_deref(),
            Some("http://dbpedia.org/resource/Zugspitze")
        );
        assert_eq!(
            resource_uri(prefix, " Lake Constance ").as_deref(),
            Some("http://dbpedia.org/resource/Lake_Constance")
        );
        assert_eq!(
            resource_uri(prefix, "A<b>").as_deref(),
            Some("http://dbpedia.org/resource/A%3Cb%3E")
        );
        assert_eq!(resource_uri(prefix, "  "), None);
    }

    #[test]
    fn test_batch_query_lists_every_uri() {
        let uris = vec![
            "http://dbpedia.org/resource/Zugspitze".to_string(),
            "http://dbpedia.org/resource/Munich".to_string(),
        ];
        let query = batch_query(&uris, "en");
        assert!(query.contains(
            "VALUES ?uri { <http://dbpedia.org/resource/Zugspitze> <http://dbpedia.org/resource/Munich> }"
        ));
        assert!(query.contains(r#"FILTER(LANG(?a) = "en")"#));
        assert!(query.contains("GROUP BY ?uri"));
    }

    fn response(bindings: Value) -> SparqlResponse {
        serde_json::from_value(json!({"head": {"vars": []}, "results": {"bindings": bindings}}))
            .unwrap()
    }

    #[test]
    fn test_describe_linked_resource() {
        let described = describe(
            response(json!([{
                "uri": {"type": "uri", "value": "http://dbpedia.org/resource/Zugspitze"},
                "label": {"type": "literal", "xml:lang": "en", "value": "Zugspitze"},
                "abstract": {"type": "literal", "xml:lang": "en", "value": "The Zugspitze is the highest peak of Germany."},
                "types": {"type": "literal", "value": "http://dbpedia.org/ontology/Mountain|http://dbpedia.org/ontology/Place"},
                "categories": {"type": "literal", "value": ""},
                "latitude": {"type": "typed-literal", "value": "47.421"},
                "longitude": {"type": "typed-literal", "value": "10.985"}
            }])),
            "en",
        );
        let d = &described["http://dbpedia.org/resource/Zugspitze"];
        assert_eq!(d.record.status, DbpediaStatus::Linked);
        assert_eq!(d.record.types.len(), 2);
        assert!(d.record.categories.is_empty());
        assert_eq!(d.record.latitude, Some(47.421));
        assert!(d.redirect.is_none());
    }

    #[test]
    fn test_label_without_abstract_is_not_linked() {
        let described = describe(
            response(json!([{
                "uri": {"type": "uri", "value": "http://dbpedia.org/resource/Foo"},
                "label": {"type": "literal", "value": "Foo"},
                "redirect": {"type": "uri", "value": "http://dbpedia.org/resource/Bar"}
            }])),
            "en",
        );
        let d = &described["http://dbpedia.org/resource/Foo"];
        assert_eq!(d.record.status, DbpediaStatus::NotLinked);
        assert_eq!(d.redirect.as_deref(), Some("http://dbpedia.org/resource/Bar"));
    }
}
