//! MediaWiki Action API plumbing shared by the Wikipedia and Wikidata resolvers.

use std::collections::HashMap;

use linkwise_core::{Error, Result};
use linkwise_net::HttpClient;
use serde::Deserialize;
use serde_json::Value;

/// Redirect hops followed before giving up on a title.
const MAX_REDIRECT_HOPS: usize = 5;

pub(crate) fn endpoint(template: &str, language: &str) -> String {
    template.replace("{lang}", language)
}

pub(crate) fn article_url(template: &str, language: &str, title: &str) -> String {
    let slug = title.trim().replace(' ', "_");
    template
        .replace("{lang}", language)
        .replace("{title}", &urlencoding::encode(&slug))
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    query: Option<QueryBody>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueryBody {
    #[serde(default)]
    normalized: Vec<TitleMapping>,
    #[serde(default)]
    redirects: Vec<TitleMapping>,
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct TitleMapping {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Page {
    #[serde(default)]
    pub pageid: Option<u64>,
    pub title: String,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub invalid: bool,
    #[serde(default)]
    pub extract: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub langlinks: Vec<LangLink>,
    #[serde(default)]
    pub pageprops: Option<PageProps>,
    #[serde(default)]
    pub fullurl: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Category {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LangLink {
    pub lang: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageProps {
    #[serde(default)]
    pub wikibase_item: Option<String>,
}

impl Page {
    fn exists(&self) -> bool {
        !self.missing && !self.invalid && self.pageid.map(|id| id > 0).unwrap_or(false)
    }

    pub fn wikibase_item(&self) -> Option<&str> {
        self.pageprops
            .as_ref()
            .and_then(|p| p.wikibase_item.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Category names without the namespace prefix.
    pub fn category_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| match c.title.split_once(':') {
                Some((_, name)) => name.to_string(),
                None => c.title.clone(),
            })
            .collect()
    }
}

impl QueryBody {
    /// Follow normalisation and redirects from a requested title to its page.
    ///
    /// Returns `None` when the page is missing. The second element lists the
    /// titles that redirected, in order.
    pub fn resolve(&self, requested: &str) -> Option<(&Page, Vec<String>)> {
        let mut current = self
            .normalized
            .iter()
            .find(|m| m.from == requested)
            .map(|m| m.to.as_str())
            .unwrap_or(requested);

        let mut chain = Vec::new();
        for _ in 0..MAX_REDIRECT_HOPS {
            match self.redirects.iter().find(|m| m.from == current) {
                Some(hop) => {
                    chain.push(current.to_string());
                    current = hop.to.as_str();
                }
                None => break,
            }
        }

        self.pages
            .iter()
            .find(|p| p.title == current)
            .filter(|p| p.exists())
            .map(|p| (p, chain))
    }
}

/// Run a `action=query` request for a set of titles.
pub(crate) async fn query_titles(
    client: &HttpClient,
    api_url: &str,
    titles: &[String],
    params: &[(&str, &str)],
) -> Result<QueryBody> {
    let mut query: Vec<(&str, String)> = vec![
        ("action", "query".to_string()),
        ("format", "json".to_string()),
        ("formatversion", "2".to_string()),
        ("redirects", "1".to_string()),
        ("titles", titles.join("|")),
    ];
    query.extend(params.iter().map(|(k, v)| (*k, v.to_string())));

    let response: QueryResponse = client.get_json(api_url, &query).await?;
    if let Some(err) = response.error {
        return Err(Error::Http(format!("{}: {} {}", api_url, err.code, err.info)));
    }
    Ok(response.query.unwrap_or_default())
}

/// Titles suggested by `action=opensearch`, best first.
pub(crate) async fn opensearch(
    client: &HttpClient,
    api_url: &str,
    search: &str,
    limit: usize,
) -> Result<Vec<String>> {
    let query = [
        ("action", "opensearch".to_string()),
        ("format", "json".to_string()),
        ("namespace", "0".to_string()),
        ("redirects", "resolve".to_string()),
        ("limit", limit.to_string()),
        ("search", search.to_string()),
    ];
    let response: Value = client.get_json(api_url, &query).await?;
    let titles = response
        .get(1)
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Parse(format!("{}: unexpected opensearch shape", api_url)))?;
    Ok(titles
        .iter()
        .filter_map(|t| t.as_str())
        .map(str::to_string)
        .collect())
}

/// Wikidata item ids from page properties, keyed by requested title.
pub(crate) async fn wikibase_items(
    client: &HttpClient,
    api_url: &str,
    titles: &[String],
) -> Result<HashMap<String, String>> {
    let body = query_titles(
        client,
        api_url,
        titles,
        &[("prop", "pageprops"), ("ppprop", "wikibase_item")],
    )
    .await?;
    Ok(titles
        .iter()
        .filter_map(|t| {
            body.resolve(t)
                .and_then(|(page, _)| page.wikibase_item())
                .map(|id| (t.clone(), id.to_string()))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> QueryBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_follows_normalisation_and_redirects() {
        let body = body(json!({
            "normalized": [{"from": "zugspitze", "to": "Zugspitze"}],
            "redirects": [{"from": "Zugspitze", "to": "Zugspitze (Berg)"}],
            "pages": [{"pageid": 7, "title": "Zugspitze (Berg)", "extract": "text"}]
        }));
        let (page, chain) = body.resolve("zugspitze").unwrap();
        assert_eq!(page.title, "Zugspitze (Berg)");
        assert_eq!(chain, vec!["Zugspitze"]);
    }

    #[test]
    fn test_missing_pages() {
        let body = body(json!({
            "pages": [
                {"title": "Nirgendwo", "missing": true},
                {"pageid": 0, "title": "Leer"}
            ]
        }));
        assert!(body.resolve("Nirgendwo").is_none());
        assert!(body.resolve("Leer").is_none());
        assert!(body.resolve("Unknown").is_none());
    }

    #[test]
    fn test_page_helpers() {
        let page: Page = serde_json::from_value(json!({
            "pageid": 1,
            "title": "Zugspitze",
            "categories": [{"ns": 14, "title": "Kategorie:Berg in Bayern"}],
            "langlinks": [{"lang": "en", "title": "Zugspitze"}],
            "pageprops": {"wikibase_item": "Q3375"}
        }))
        .unwrap();
        assert_eq!(page.category_names(), vec!["Berg in Bayern"]);
        assert_eq!(page.langlinks[0].lang, "en");
        assert_eq!(page.wikibase_item(), Some("Q3375"));
    }

    #[test]
    fn test_article_url() {
        assert_eq!(
            article_url("https://{lang}.wikipedia.org/wiki/{title}", "de", "Zugspitze (Berg)"),
            "https://de.wikipedia.org/wiki/Zugspitze_%28Berg%29"
        );
    }
}
