#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use linkwise_core::{
    CacheStore, EntityProcessingContext, LinkerConfig, MemoryCache, NoopCache, NoopTermGenerator,
    RateLimitConfig, TermGenerator,
};
use serde_json::{json, Value};
use wiremock::MockServer;

/// Config with every endpoint pointed at the mock server.
pub fn config(server: &MockServer) -> LinkerConfig {
    let base = server.uri();
    let mut config = LinkerConfig::default();
    config.language = "de".into();
    config.user_agent = "linkwise-test".into();

    config.wikipedia.api_url = format!("{}/{{lang}}/w/api.php", base);
    config.wikipedia.article_url = format!("{}/{{lang}}/wiki/{{title}}", base);
    config.wikipedia.timeout_secs = 5;
    config.wikipedia.rate_limit = fast_limits();

    config.wikidata.api_url = format!("{}/wikidata/w/api.php", base);
    config.wikidata.timeout_secs = 5;
    config.wikidata.rate_limit = fast_limits();

    config.dbpedia.sparql_endpoint = format!("{}/sparql", base);
    config.dbpedia.alternate_endpoints = Vec::new();
    config.dbpedia.de_sparql_endpoint = format!("{}/de/sparql", base);
    config.dbpedia.lookup_url = format!("{}/lookup/api/search", base);
    config.dbpedia.timeout_secs = 5;
    config.dbpedia.rate_limit = fast_limits();
    config
}

pub fn fast_limits() -> RateLimitConfig {
    RateLimitConfig {
        max_calls: 100,
        period_secs: 1.0,
        backoff_base_secs: 0.01,
        backoff_max_secs: 0.05,
        max_retries: 2,
    }
}

pub fn no_cache() -> Arc<dyn CacheStore> {
    Arc::new(NoopCache)
}

pub fn memory_cache() -> Arc<dyn CacheStore> {
    Arc::new(MemoryCache::new(100, Duration::from_secs(3600)))
}

pub fn no_terms() -> Arc<dyn TermGenerator> {
    Arc::new(NoopTermGenerator)
}

pub fn context(name: &str) -> EntityProcessingContext {
    EntityProcessingContext::new(name).unwrap()
}

pub const ZUGSPITZE_EXTRACT: &str = "Die Zugspitze ist mit 2962 m über Normalhöhennull der höchste \
    Gipfel des Wettersteingebirges und zugleich der höchste Berg Deutschlands.";

/// MediaWiki `action=query` body holding one existing page.
pub fn page_body(title: &str, extract: &str, qid: Option<&str>) -> Value {
    let mut page = json!({
        "pageid": 42,
        "ns": 0,
        "title": title,
        "extract": extract,
        "categories": [{"ns": 14, "title": "Kategorie:Berg in Bayern"}],
        "langlinks": [{"lang": "en", "title": title}],
        "fullurl": format!("https://de.wikipedia.org/wiki/{}", title)
    });
    if let Some(qid) = qid {
        page["pageprops"] = json!({"wikibase_item": qid});
    }
    json!({"batchcomplete": true, "query": {"pages": [page]}})
}

/// MediaWiki `action=query` body reporting a missing page.
pub fn missing_body(title: &str) -> Value {
    json!({"batchcomplete": true, "query": {"pages": [{"ns": 0, "title": title, "missing": true}]}})
}
