mod common;

use std::sync::Arc;

use common::*;
use linkwise_core::{
    keys, DictionaryTermGenerator, FallbackStage, LinkStatus, ResultSource, ServiceKind,
    WikidataRecord, WikipediaRecord,
};
use linkwise_resolve::{Resolver, WikidataResolver};
use serde_json::{json, Value};
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API: &str = "/wikidata/w/api.php";

fn einstein() -> Value {
    json!({"entities": {"Q937": {
        "type": "item",
        "id": "Q937",
        "labels": {"de": {"language": "de", "value": "Albert Einstein"}},
        "descriptions": {"de": {"language": "de", "value": "deutsch-amerikanischer Physiker"}},
        "aliases": {"en": [{"language": "en", "value": "Einstein"}]},
        "claims": {"P31": [{"mainsnak": {"snaktype": "value", "datavalue": {
            "value": {"entity-type": "item", "numeric-id": 5, "id": "Q5"},
            "type": "wikibase-entityid"}}}]},
        "sitelinks": {"enwiki": {"site": "enwiki", "title": "Albert Einstein",
            "url": "https://en.wikipedia.org/wiki/Albert_Einstein"}}
    }}})
}

fn zugspitze_item() -> Value {
    json!({"entities": {"Q3375": {
        "type": "item",
        "id": "Q3375",
        "labels": {"de": {"language": "de", "value": "Zugspitze"}},
        "descriptions": {"de": {"language": "de", "value": "höchster Berg Deutschlands"}},
        "aliases": [],
        "claims": [],
        "sitelinks": []
    }}})
}

#[tokio::test]
async fn test_qid_name_is_fetched_directly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbgetentities"))
        .and(query_param("ids", "Q937"))
        .respond_with(ResponseTemplate::new(200).set_body_json(einstein()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbgetentities"))
        .and(query_param("ids", "Q5"))
        .and(query_param("props", "labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entities": {"Q5": {
            "id": "Q5",
            "labels": {"de": {"language": "de", "value": "Mensch"}}
        }}})))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = WikidataResolver::new(&config(&server), no_cache(), no_terms()).unwrap();
    let mut ctx = context("Q937");
    resolver.process_entity(&mut ctx).await;

    let record = ctx.sources().wikidata.clone().unwrap();
    assert_eq!(record.status, LinkStatus::Found);
    assert_eq!(record.fallback_attempts, 0);
    assert_eq!(record.source, ResultSource::Api);
    assert_eq!(record.id.as_deref(), Some("Q937"));
    assert_eq!(record.uri.as_deref(), Some("http://www.wikidata.org/entity/Q937"));
    assert_eq!(record.label.as_deref(), Some("Albert Einstein"));
    assert_eq!(record.aliases, vec!["Einstein"]);
    assert_eq!(record.types.len(), 1);
    assert_eq!(record.types[0].label.as_deref(), Some("Mensch"));
    assert!(record
        .same_as
        .contains(&"https://en.wikipedia.org/wiki/Albert_Einstein".to_string()));
    assert!(record
        .same_as
        .contains(&"http://dbpedia.org/resource/Albert_Einstein".to_string()));

    assert_eq!(ctx.processing_str(keys::WIKIDATA_ID), Some("Q937"));
    assert_eq!(ctx.processing_str(keys::ENGLISH_TITLE), Some("Albert Einstein"));
    assert!(ctx.is_processed_by(ServiceKind::Wikidata));
}

#[tokio::test]
async fn test_synonym_fallback_finds_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbsearchentities"))
        .and(query_param("search", "Höchster Berg Deutschlands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"search": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbsearchentities"))
        .and(query_param("search", "Zugspitze"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"search": [{"id": "Q3375", "label": "Zugspitze"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbgetentities"))
        .and(query_param("ids", "Q3375"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zugspitze_item()))
        .expect(1)
        .mount(&server)
        .await;

    let terms = DictionaryTermGenerator::new()
        .with_synonyms("Höchster Berg Deutschlands", ["Zugspitze"]);
    let resolver = WikidataResolver::new(&config(&server), no_cache(), Arc::new(terms)).unwrap();
    let mut ctx = context("Höchster Berg Deutschlands");
    resolver.process_entity(&mut ctx).await;

    let record = ctx.sources().wikidata.clone().unwrap();
    assert_eq!(record.status, LinkStatus::Found);
    assert_eq!(record.fallback_source, Some(FallbackStage::Synonym));
    assert_eq!(record.source, ResultSource::Fallback);
    assert_eq!(record.fallback_attempts, 2);
    assert_eq!(record.id.as_deref(), Some("Q3375"));

    let stats = resolver.get_statistics();
    assert_eq!(stats.fallback_usage["synonym"], 1);
    assert_eq!(stats.api_calls["wbsearchentities"], 2);
}

#[tokio::test]
async fn test_item_id_from_wikipedia_page_properties() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/de/w/api.php"))
        .and(query_param("prop", "pageprops"))
        .and(query_param("titles", "Zugspitze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"query": {"pages": [
            {"pageid": 7, "title": "Zugspitze", "pageprops": {"wikibase_item": "Q3375"}}
        ]}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbgetentities"))
        .and(query_param("ids", "Q3375"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zugspitze_item()))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = WikidataResolver::new(&config(&server), no_cache(), no_terms()).unwrap();
    let mut ctx = context("Zugspitze");
    ctx.set_wikipedia(WikipediaRecord {
        url: Some("https://de.wikipedia.org/wiki/Zugspitze".into()),
        extract: Some(ZUGSPITZE_EXTRACT.into()),
        status: LinkStatus::Found,
        ..WikipediaRecord::not_found("Zugspitze", "de")
    });
    resolver.process_entity(&mut ctx).await;

    let record = ctx.sources().wikidata.clone().unwrap();
    assert_eq!(record.status, LinkStatus::Found);
    assert_eq!(record.fallback_attempts, 0);
    assert_eq!(resolver.get_statistics().api_calls["pageprops"], 1);
}

#[tokio::test]
async fn test_item_without_description_is_partial() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbgetentities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entities": {"Q42": {
            "id": "Q42",
            "labels": {"en": {"language": "en", "value": "Douglas Adams"}}
        }}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbsearchentities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"search": []})))
        .mount(&server)
        .await;

    let resolver = WikidataResolver::new(&config(&server), no_cache(), no_terms()).unwrap();
    let mut ctx = context("Q42");
    resolver.process_entity(&mut ctx).await;

    let record = ctx.sources().wikidata.clone().unwrap();
    assert_eq!(record.status, LinkStatus::Partial);
    assert_eq!(record.id.as_deref(), Some("Q42"));
    assert_eq!(record.language, "en");
    assert_eq!(record.fallback_attempts, 1);
    assert_eq!(resolver.get_statistics().partial, 1);
}

#[tokio::test]
async fn test_no_match_anywhere_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbsearchentities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"search": []})))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = WikidataResolver::new(&config(&server), no_cache(), no_terms()).unwrap();
    let mut contexts = vec![context("Gibtesnicht")];
    resolver.process_batch(&mut contexts).await;

    let record = contexts[0].sources().wikidata.clone().unwrap();
    assert_eq!(record.status, LinkStatus::NotFound);
    assert_eq!(record.fallback_attempts, 1);
    assert!(contexts[0].processing_str(keys::WIKIDATA_ID).is_none());
}

#[tokio::test]
async fn test_synonym_search_error_moves_on_to_next_synonym() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbsearchentities"))
        .and(query_param("search", "Höchster Berg Deutschlands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"search": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbsearchentities"))
        .and(query_param("search", "Zugspitzmassiv"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbsearchentities"))
        .and(query_param("search", "Zugspitze"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"search": [{"id": "Q3375", "label": "Zugspitze"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("action", "wbgetentities"))
        .and(query_param("ids", "Q3375"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zugspitze_item()))
        .expect(1)
        .mount(&server)
        .await;

    let terms = DictionaryTermGenerator::new()
        .with_synonyms("Höchster Berg Deutschlands", ["Zugspitzmassiv", "Zugspitze"]);
    let resolver = WikidataResolver::new(&config(&server), no_cache(), Arc::new(terms)).unwrap();
    let mut ctx = context("Höchster Berg Deutschlands");
    resolver.process_entity(&mut ctx).await;

    let record = ctx.sources().wikidata.clone().unwrap();
    assert_eq!(record.status, LinkStatus::Found);
    assert_eq!(record.id.as_deref(), Some("Q3375"));
    assert_eq!(record.fallback_source, Some(FallbackStage::Synonym));
    assert_eq!(resolver.get_statistics().api_calls["wbsearchentities"], 3);
}

#[tokio::test]
async fn test_processed_entity_is_left_alone() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(einstein()))
        .expect(0)
        .mount(&server)
        .await;

    let resolver = WikidataResolver::new(&config(&server), no_cache(), no_terms()).unwrap();
    let mut ctx = context("Q937");
    let previous = WikidataRecord::not_found("de");
    ctx.set_wikidata(previous.clone());
    ctx.mark_processed(ServiceKind::Wikidata);

    resolver.process_entity(&mut ctx).await;
    resolver.process_entity(&mut ctx).await;

    assert_eq!(ctx.sources().wikidata.as_ref(), Some(&previous));
    assert_eq!(ctx.sources().wikidata.as_ref().unwrap().fallback_attempts, 0);
    let stats = resolver.get_statistics();
    assert_eq!(stats.processed(), 0);
    assert!(stats.api_calls.is_empty());
}

#[tokio::test]
async fn test_batch_returns_a_record_per_entity_when_everything_fails() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let resolver = WikidataResolver::new(&config(&server), no_cache(), no_terms()).unwrap();
    let names = ["Q937", "Zugspitze", "Watzmann"];
    let mut contexts: Vec<_> = names.iter().map(|n| context(n)).collect();
    resolver.process_batch(&mut contexts).await;

    assert_eq!(contexts.len(), names.len());
    for (ctx, name) in contexts.iter().zip(names) {
        assert_eq!(ctx.entity_name(), name);
        let record = ctx.sources().wikidata.as_ref().unwrap();
        assert!(matches!(record.status, LinkStatus::Error | LinkStatus::NotFound));
        assert!(ctx.is_processed_by(ServiceKind::Wikidata));
    }
    let first = contexts[0].sources().wikidata.as_ref().unwrap();
    assert_eq!(first.status, LinkStatus::Error);
    assert!(first.error.is_some());
    assert_eq!(resolver.get_statistics().failed, 3);
}
