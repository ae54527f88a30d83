//! Wikipedia resolver.
//!
//! Primary path: one MediaWiki `action=query` per language and batch of
//! titles, following normalisation and redirects. Entities that are missing,
//! failed, or came back with a trivially short extract then run the chain
//! language edition → OpenSearch titles → synonyms → rendered HTML.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use linkwise_core::{
    cache_key, keys, CacheStore, EntityProcessingContext, FallbackStage, LinkStatus, LinkerConfig,
    Result, ResultSource, ServiceKind, ServiceStatistics, TermGenerator, WikipediaConfig,
    WikipediaRecord,
};
use linkwise_net::HttpClient;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::fallback::{run_chain, FallbackPlan, StageExecutor, StageFailure};
use crate::recorder::StatsRecorder;
use crate::{html, mediawiki, Resolver};

pub const CACHE_NAMESPACE: &str = "wikipedia";

/// Paragraphs kept when synthesising an extract from HTML.
const HTML_PARAGRAPHS: usize = 3;

const PAGE_PROPS: &[(&str, &str)] = &[
    ("prop", "extracts|categories|langlinks|pageprops|info"),
    ("exintro", "1"),
    ("explaintext", "1"),
    ("exlimit", "max"),
    ("cllimit", "max"),
    ("clshow", "!hidden"),
    ("lllimit", "max"),
    ("ppprop", "wikibase_item"),
    ("inprop", "url"),
];

/// A page reduced to what the record and the other services need.
#[derive(Debug, Clone)]
struct PageSummary {
    title: String,
    url: String,
    language: String,
    extract: Option<String>,
    categories: Vec<String>,
    wikidata_id: Option<String>,
    langlinks: HashMap<String, String>,
    redirect_chain: Vec<String>,
}

impl PageSummary {
    fn title_in(&self, language: &str) -> Option<&str> {
        if self.language == language {
            Some(self.title.as_str())
        } else {
            self.langlinks.get(language).map(String::as_str)
        }
    }

    fn extract_len(&self) -> usize {
        self.extract
            .as_deref()
            .map(|e| e.chars().count())
            .unwrap_or(0)
    }

    fn to_record(&self) -> WikipediaRecord {
        WikipediaRecord {
            url: Some(self.url.clone()),
            extract: self.extract.clone(),
            categories: self.categories.clone(),
            wikidata_id: self.wikidata_id.clone(),
            english_title: self.title_in("en").map(str::to_string),
            status: LinkStatus::Found,
            ..WikipediaRecord::not_found(self.title.clone(), self.language.clone())
        }
    }
}

/// Outcome of the primary batch lookup for one entity.
enum Primary {
    Page(PageSummary),
    Missing,
    Failed(String),
}

/// What to look up for one entity.
struct Lookup {
    title: String,
    language: String,
    suggested_url: Option<String>,
    primary: Primary,
}

pub struct WikipediaResolver {
    config: WikipediaConfig,
    language: String,
    fallback_language: String,
    client: HttpClient,
    cache: Arc<dyn CacheStore>,
    terms: Arc<dyn TermGenerator>,
    stats: StatsRecorder,
}

impl WikipediaResolver {
    pub fn new(
        config: &LinkerConfig,
        cache: Arc<dyn CacheStore>,
        terms: Arc<dyn TermGenerator>,
    ) -> Result<Self> {
        let wikipedia = &config.wikipedia;
        let client = HttpClient::new(
            "wikipedia",
            &config.user_agent,
            Duration::from_secs(wikipedia.timeout_secs),
            config.verify_ssl,
            &wikipedia.rate_limit,
        )?;
        Ok(Self {
            config: wikipedia.clone(),
            language: config.language.clone(),
            fallback_language: config.wikipedia_fallback_language(),
            client,
            cache,
            terms,
            stats: StatsRecorder::new(),
        })
    }

    /// Fetch page summaries for up to one batch of titles in one edition.
    /// Missing titles are absent from the map.
    async fn fetch_pages(
        &self,
        language: &str,
        titles: &[String],
    ) -> Result<HashMap<String, PageSummary>> {
        self.stats.api_call("query");
        let api = mediawiki::endpoint(&self.config.api_url, language);
        let body = mediawiki::query_titles(&self.client, &api, titles, PAGE_PROPS).await?;

        Ok(titles
            .iter()
            .filter_map(|requested| {
                let (page, chain) = body.resolve(requested)?;
                let summary = PageSummary {
                    title: page.title.clone(),
                    url: page.fullurl.clone().unwrap_or_else(|| {
                        mediawiki::article_url(&self.config.article_url, language, &page.title)
                    }),
                    language: language.to_string(),
                    extract: page
                        .extract
                        .as_deref()
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(str::to_string),
                    categories: page.category_names(),
                    wikidata_id: page.wikibase_item().map(str::to_string),
                    langlinks: page
                        .langlinks
                        .iter()
                        .map(|l| (l.lang.clone(), l.title.clone()))
                        .collect(),
                    redirect_chain: chain,
                };
                Some((requested.clone(), summary))
            })
            .collect())
    }

    /// Fetch titles in batch-sized chunks and merge the results.
    async fn fetch_pages_chunked(
        &self,
        language: &str,
        titles: &[String],
    ) -> Result<HashMap<String, PageSummary>> {
        let mut pages = HashMap::new();
        for chunk in titles.chunks(self.config.batch_size.max(1)) {
            pages.extend(self.fetch_pages(language, chunk).await?);
        }
        Ok(pages)
    }

    /// Extract long enough to settle the entity without fallbacks.
    fn is_acceptable(&self, page: &PageSummary) -> bool {
        page.extract_len() > 0
            && (self.config.accept_short_extracts
                || page.extract_len() >= self.config.min_extract_length)
    }

    /// Edition tried by the language fallback for a lookup in `language`.
    fn alternate_language(&self, language: &str) -> Option<String> {
        let alt = if self.fallback_language != language {
            &self.fallback_language
        } else {
            &self.language
        };
        (alt != language).then(|| alt.clone())
    }

    fn plan(&self) -> FallbackPlan {
        FallbackPlan::new(self.config.max_fallback_attempts)
            .stage(FallbackStage::Language, self.config.language_fallback)
            .stage(FallbackStage::OpensearchTitle, self.config.opensearch_fallback)
            .stage(FallbackStage::Synonym, self.config.synonym_fallback)
            .stage(FallbackStage::HtmlScrape, self.config.html_fallback)
    }

    /// Work out what to look up, or settle the entity from cache.
    fn prepare(&self, ctx: &mut EntityProcessingContext) -> Option<Lookup> {
        if ctx.is_processed_by(ServiceKind::Wikipedia) {
            debug!("Skipping already processed entity={}", ctx.entity_name());
            return None;
        }

        let suggested_url = ctx
            .processing_str(keys::SUGGESTED_WIKIPEDIA_URL)
            .map(str::to_string);
        let (title, language) = suggested_url
            .as_deref()
            .and_then(|url| parse_article_url(url, &self.language))
            .unwrap_or_else(|| (ctx.entity_name().to_string(), self.language.clone()));

        let key = cache_key(&title, &language, CACHE_NAMESPACE);
        if let Some(value) = self.cache.get(CACHE_NAMESPACE, &key) {
            match serde_json::from_value::<WikipediaRecord>(value) {
                Ok(mut record) => {
                    debug!("Wikipedia cache hit entity={}", ctx.entity_name());
                    record.source = ResultSource::Cache;
                    self.stats.cache_hit();
                    self.commit(ctx, record.validated(), None);
                    return None;
                }
                Err(e) => warn!("Ignoring unreadable cache entry title={}: {}", title, e),
            }
        }

        Some(Lookup {
            title,
            language,
            suggested_url,
            primary: Primary::Missing,
        })
    }

    /// Run the primary batch query for every pending lookup.
    async fn fetch_primary(&self, lookups: &mut [Option<Lookup>]) {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for lookup in lookups.iter().flatten() {
            let titles = groups.entry(lookup.language.clone()).or_default();
            if !titles.contains(&lookup.title) {
                titles.push(lookup.title.clone());
            }
        }

        let batch_size = self.config.batch_size.max(1);
        let requests = groups.iter().flat_map(|(language, titles)| {
            titles
                .chunks(batch_size)
                .map(move |chunk| (language.as_str(), chunk))
        });
        let results = join_all(requests.map(|(language, chunk)| async move {
            (language, chunk, self.fetch_pages(language, chunk).await)
        }))
        .await;

        for (language, chunk, result) in results {
            if let Err(e) = &result {
                warn!(
                    "Wikipedia batch query failed language={} titles={}: {}",
                    language,
                    chunk.len(),
                    e
                );
            }
            for lookup in lookups.iter_mut().flatten() {
                if lookup.language != language || !chunk.contains(&lookup.title) {
                    continue;
                }
                lookup.primary = match &result {
                    Ok(pages) => match pages.get(&lookup.title) {
                        Some(page) => Primary::Page(page.clone()),
                        None => Primary::Missing,
                    },
                    Err(e) => Primary::Failed(e.to_string()),
                };
            }
        }
    }

    /// Settle one entity: fallbacks if needed, then write the record.
    async fn resolve_entity(&self, ctx: &mut EntityProcessingContext, lookup: Lookup) {
        let Lookup {
            title,
            language,
            suggested_url,
            primary,
        } = lookup;

        let (initial, primary_error) = match primary {
            Primary::Page(page) => (Some(page), None),
            Primary::Missing => (None, None),
            Primary::Failed(message) => (None, Some(message)),
        };

        let mut page = initial.clone().map(|p| (p, None));
        let mut attempts = 0;
        let mut succeeded = None;

        let settled = initial.as_ref().map(|p| self.is_acceptable(p)).unwrap_or(false);
        if !settled {
            debug!(
                "Wikipedia fallback chain entity={} title={} language={}",
                ctx.entity_name(),
                title,
                language
            );
            let mut chain = WikipediaChain {
                resolver: self,
                entity_name: ctx.entity_name().to_string(),
                title: title.clone(),
                language: language.clone(),
                known_url: suggested_url,
                best: page.take(),
            };
            let outcome = run_chain(&self.plan(), &mut chain).await;
            attempts = outcome.attempts;
            page = match (outcome.value, outcome.stage) {
                (Some(found), Some(stage)) => {
                    self.stats.fallback(stage);
                    succeeded = Some(stage);
                    Some((found, Some(stage)))
                }
                _ => chain.best,
            };
        }

        // A kept candidate from a stage that did not succeed is tagged as a
        // fallback result without a stage.
        let mut record = match (&page, primary_error) {
            (Some((summary, origin)), _) => {
                let mut record = summary.to_record();
                if origin.is_some() {
                    record.source = ResultSource::Fallback;
                    record.fallback_source = succeeded;
                }
                record
            }
            (None, Some(message)) => WikipediaRecord::error(title.clone(), language.clone(), message),
            (None, None) => WikipediaRecord::not_found(title.clone(), language.clone()),
        };
        record.fallback_attempts = attempts;
        let record = record.validated();

        if record.status == LinkStatus::Found {
            let key = cache_key(&title, &language, CACHE_NAMESPACE);
            match serde_json::to_value(&record) {
                Ok(value) => {
                    if let Err(e) = self.cache.put(CACHE_NAMESPACE, &key, value) {
                        warn!("Failed to cache Wikipedia record title={}: {}", title, e);
                    }
                }
                Err(e) => warn!("Failed to serialise Wikipedia record title={}: {}", title, e),
            }
        }

        self.commit(ctx, record, page.as_ref().map(|(p, _)| p));
    }

    /// Write the record and the values other services read.
    fn commit(
        &self,
        ctx: &mut EntityProcessingContext,
        record: WikipediaRecord,
        page: Option<&PageSummary>,
    ) {
        if matches!(record.status, LinkStatus::Found | LinkStatus::Partial) {
            ctx.set_processing_value(keys::WIKIPEDIA_TITLE, json!(record.title));
            ctx.set_processing_value(keys::WIKIPEDIA_LANGUAGE, json!(record.language));
            if let Some(url) = &record.url {
                ctx.set_processing_value(keys::WIKIPEDIA_URL, json!(url));
            }
            if let Some(id) = &record.wikidata_id {
                ctx.set_processing_default(keys::WIKIDATA_ID, json!(id));
            }
            if let Some(english) = &record.english_title {
                ctx.set_processing_default(keys::ENGLISH_TITLE, json!(english));
            }
            let german = page
                .and_then(|p| p.title_in("de"))
                .map(str::to_string)
                .or_else(|| (record.language == "de").then(|| record.title.clone()));
            if let Some(german) = german {
                ctx.set_processing_default(keys::GERMAN_TITLE, json!(german));
            }
            if let Some(page) = page.filter(|p| !p.redirect_chain.is_empty()) {
                ctx.set_processing_value(keys::REDIRECT_CHAIN, json!(page.redirect_chain));
            }
        }

        ctx.set_service_data(
            ServiceKind::Wikipedia,
            serde_json::to_value(&record).unwrap_or(Value::Null),
        );
        self.stats.link_outcome(record.status);
        ctx.set_wikipedia(record);
        ctx.mark_processed(ServiceKind::Wikipedia);
    }
}

#[async_trait]
impl Resolver for WikipediaResolver {
    fn service(&self) -> ServiceKind {
        ServiceKind::Wikipedia
    }

    async fn process_batch(&self, contexts: &mut [EntityProcessingContext]) {
        let mut lookups: Vec<Option<Lookup>> =
            contexts.iter_mut().map(|ctx| self.prepare(ctx)).collect();
        let pending = lookups.iter().flatten().count();
        if pending == 0 {
            return;
        }

        self.fetch_primary(&mut lookups).await;

        let tasks = contexts
            .iter_mut()
            .zip(lookups)
            .filter_map(|(ctx, lookup)| lookup.map(|lookup| self.resolve_entity(ctx, lookup)));
        join_all(tasks).await;

        let stats = self.stats.snapshot();
        info!(
            "Wikipedia batch complete entities={} successful={} partial={} failed={}",
            pending, stats.successful, stats.partial, stats.failed
        );
    }

    fn get_statistics(&self) -> ServiceStatistics {
        self.stats.snapshot()
    }
}

/// Fallback state for one entity.
struct WikipediaChain<'a> {
    resolver: &'a WikipediaResolver,
    entity_name: String,
    title: String,
    language: String,
    known_url: Option<String>,
    /// Best page seen so far that is not good enough to stop on.
    best: Option<(PageSummary, Option<FallbackStage>)>,
}

impl WikipediaChain<'_> {
    /// Accept a page or remember it as the best partial candidate.
    fn consider(
        &mut self,
        page: PageSummary,
        stage: FallbackStage,
    ) -> std::result::Result<PageSummary, StageFailure> {
        if self.resolver.is_acceptable(&page) {
            return Ok(page);
        }
        let longer = self
            .best
            .as_ref()
            .map(|(best, _)| page.extract_len() > best.extract_len())
            .unwrap_or(true);
        if page.extract_len() > 0 && longer {
            self.best = Some((page, Some(stage)));
        }
        Err(StageFailure::NoMatch)
    }

    /// Try candidate titles in order and take the first acceptable page.
    async fn first_acceptable(
        &mut self,
        candidates: Vec<String>,
        stage: FallbackStage,
    ) -> std::result::Result<PageSummary, StageFailure> {
        if candidates.is_empty() {
            return Err(StageFailure::NoMatch);
        }
        let mut pages = self
            .resolver
            .fetch_pages_chunked(&self.language, &candidates)
            .await?;
        for candidate in &candidates {
            if let Some(page) = pages.remove(candidate) {
                if let Ok(page) = self.consider(page, stage) {
                    return Ok(page);
                }
            }
        }
        Err(StageFailure::NoMatch)
    }

    fn is_trivial_variant(&self, candidate: &str) -> bool {
        let candidate = candidate.trim().to_lowercase();
        candidate.is_empty()
            || candidate == self.title.to_lowercase()
            || candidate == self.entity_name.to_lowercase()
    }

    async fn language_edition(&mut self) -> std::result::Result<PageSummary, StageFailure> {
        let alt = self
            .resolver
            .alternate_language(&self.language)
            .ok_or(StageFailure::NotApplicable)?;
        let title = self
            .best
            .as_ref()
            .and_then(|(page, _)| page.title_in(&alt))
            .unwrap_or(self.title.as_str())
            .to_string();

        let mut pages = self.resolver.fetch_pages(&alt, &[title.clone()]).await?;
        match pages.remove(&title) {
            Some(page) => self.consider(page, FallbackStage::Language),
            None => Err(StageFailure::NoMatch),
        }
    }

    async fn opensearch_titles(&mut self) -> std::result::Result<PageSummary, StageFailure> {
        self.resolver.stats.api_call("opensearch");
        let api = mediawiki::endpoint(&self.resolver.config.api_url, &self.language);
        let suggestions = mediawiki::opensearch(
            &self.resolver.client,
            &api,
            &self.title,
            self.resolver.config.opensearch_limit,
        )
        .await?;

        let mut candidates: Vec<String> = Vec::new();
        for title in suggestions {
            if !self.is_trivial_variant(&title) && !candidates.contains(&title) {
                candidates.push(title);
            }
        }
        debug!(
            "OpenSearch candidates entity={} count={}",
            self.entity_name,
            candidates.len()
        );
        self.first_acceptable(candidates, FallbackStage::OpensearchTitle)
            .await
    }

    async fn synonyms(&mut self) -> std::result::Result<PageSummary, StageFailure> {
        let terms = &self.resolver.terms;
        if !terms.is_available() {
            return Err(StageFailure::NotApplicable);
        }
        let max = self.resolver.config.max_synonyms;
        let synonyms = terms
            .generate_synonyms(&self.entity_name, &self.language, max)
            .await?;

        let mut candidates: Vec<String> = Vec::new();
        for synonym in synonyms {
            let synonym = synonym.trim().to_string();
            if !self.is_trivial_variant(&synonym) && !candidates.contains(&synonym) {
                candidates.push(synonym);
            }
        }
        candidates.truncate(max);
        self.first_acceptable(candidates, FallbackStage::Synonym).await
    }

    async fn scrape_html(&mut self) -> std::result::Result<PageSummary, StageFailure> {
        let base = self.best.as_ref().map(|(page, _)| page.clone());
        let url = self
            .known_url
            .clone()
            .or_else(|| base.as_ref().map(|p| p.url.clone()))
            .ok_or(StageFailure::NotApplicable)?;

        self.resolver.stats.api_call("html");
        let body = self.resolver.client.get_text(&url, &[]).await?;
        let extract = html::extract_paragraphs(&body, HTML_PARAGRAPHS);
        if extract.is_empty() {
            return Err(StageFailure::NoMatch);
        }

        let title = html::first_heading(&body)
            .or_else(|| base.as_ref().map(|p| p.title.clone()))
            .unwrap_or_else(|| self.title.clone());
        let page = match base {
            Some(base) => PageSummary {
                title,
                url,
                extract: Some(extract),
                ..base
            },
            None => PageSummary {
                title,
                url,
                language: self.language.clone(),
                extract: Some(extract),
                categories: Vec::new(),
                wikidata_id: None,
                langlinks: HashMap::new(),
                redirect_chain: Vec::new(),
            },
        };
        self.consider(page, FallbackStage::HtmlScrape)
    }
}

#[async_trait]
impl<'a> StageExecutor<PageSummary> for WikipediaChain<'a> {
    async fn run_stage(
        &mut self,
        stage: FallbackStage,
    ) -> std::result::Result<PageSummary, StageFailure> {
        match stage {
            FallbackStage::Language => self.language_edition().await,
            FallbackStage::OpensearchTitle => self.opensearch_titles().await,
            FallbackStage::Synonym => self.synonyms().await,
            FallbackStage::HtmlScrape => self.scrape_html().await,
            _ => Err(StageFailure::NotApplicable),
        }
    }
}

/// Title and edition from an article URL such as
/// `https://de.wikipedia.org/wiki/Zugspitze`. Hosts outside
/// `wikipedia.org` keep `default_language`.
pub fn parse_article_url(url: &str, default_language: &str) -> Option<(String, String)> {
    let parsed = url::Url::parse(url).ok()?;
    let path = parsed.path();
    let start = path.find("/wiki/")? + "/wiki/".len();
    let title = urlencoding::decode(&path[start..])
        .ok()?
        .replace('_', " ")
        .trim()
        .to_string();
    if title.is_empty() {
        return None;
    }
    let language = parsed
        .host_str()
        .and_then(|host| host.strip_suffix(".wikipedia.org"))
        .and_then(|sub| sub.split('.').next())
        .filter(|lang| !lang.is_empty())
        .unwrap_or(default_language)
        .to_string();
    Some((title, language))
}
