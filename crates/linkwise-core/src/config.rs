//! Linker configuration: defaults, JSON file, flat key/value map, environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

pub const DEFAULT_USER_AGENT: &str =
    "linkwise/0.1 (entity linking; https://github.com/linkwise/linkwise)";

/// Prefix for environment variables read by [`LinkerConfig::from_env`].
pub const ENV_PREFIX: &str = "LINKWISE_";

/// Upper bound for any rate-limit window or backoff delay.
pub const MAX_RATE_SECS: f64 = 86_400.0;

/// Call-rate bounds and backoff for one external API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Calls allowed per window.
    pub max_calls: usize,
    /// Sliding window length.
    pub period_secs: f64,
    pub backoff_base_secs: f64,
    pub backoff_max_secs: f64,
    /// Consecutive 429 responses tolerated for one call before giving up.
    pub max_retries: u32,
}

impl RateLimitConfig {
    pub fn new(max_calls: usize, period_secs: f64) -> Self {
        Self {
            max_calls,
            period_secs,
            ..Self::default()
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 10,
            period_secs: 1.0,
            backoff_base_secs: 1.0,
            backoff_max_secs: 60.0,
            max_retries: 5,
        }
    }
}

/// Wikipedia resolver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikipediaConfig {
    pub enabled: bool,
    /// MediaWiki API; `{lang}` is replaced by the edition code.
    pub api_url: String,
    /// Article URL; `{lang}` and `{title}` are replaced.
    pub article_url: String,
    /// Titles per query (MediaWiki returns at most 20 intro extracts).
    pub batch_size: usize,
    pub timeout_secs: u64,
    /// Extracts shorter than this still run the fallback chain.
    pub min_extract_length: usize,
    pub accept_short_extracts: bool,
    /// Alternate edition for the language fallback.
    pub fallback_language: String,
    pub opensearch_limit: usize,
    pub max_fallback_attempts: u32,
    pub language_fallback: bool,
    pub opensearch_fallback: bool,
    pub synonym_fallback: bool,
    pub html_fallback: bool,
    pub max_synonyms: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://{lang}.wikipedia.org/w/api.php".into(),
            article_url: "https://{lang}.wikipedia.org/wiki/{title}".into(),
            batch_size: 20,
            timeout_secs: 15,
            min_extract_length: 100,
            accept_short_extracts: false,
            fallback_language: "en".into(),
            opensearch_limit: 5,
            max_fallback_attempts: 3,
            language_fallback: true,
            opensearch_fallback: true,
            synonym_fallback: true,
            html_fallback: true,
            max_synonyms: 10,
            rate_limit: RateLimitConfig::new(20, 1.0),
        }
    }
}

/// Wikidata resolver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikidataConfig {
    pub enabled: bool,
    pub api_url: String,
    /// Entity URI prefix; the QID is appended.
    pub entity_uri_prefix: String,
    /// IDs per `wbgetentities` call (API maximum is 50).
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub direct_search: bool,
    pub language_fallback: bool,
    pub synonym_fallback: bool,
    pub max_synonym_fallback_attempts: usize,
    pub max_fallback_attempts: u32,
    pub rate_limit: RateLimitConfig,
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://www.wikidata.org/w/api.php".into(),
            entity_uri_prefix: "http://www.wikidata.org/entity/".into(),
            batch_size: 50,
            timeout_secs: 15,
            direct_search: true,
            language_fallback: true,
            synonym_fallback: true,
            max_synonym_fallback_attempts: 3,
            max_fallback_attempts: 3,
            rate_limit: RateLimitConfig::new(10, 1.0),
        }
    }
}

/// DBpedia resolver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbpediaConfig {
    pub enabled: bool,
    pub sparql_endpoint: String,
    pub alternate_endpoints: Vec<String>,
    pub de_sparql_endpoint: String,
    pub resource_prefix: String,
    pub de_resource_prefix: String,
    pub lookup_url: String,
    /// `DBPEDIA_USE_DE`: global switch for the German endpoint.
    pub use_de: bool,
    /// Language of labels and abstracts on the default endpoint.
    pub language: String,
    /// URIs per SPARQL `VALUES` clause.
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub alternate_endpoint_fallback: bool,
    pub lookup_fallback: bool,
    pub lookup_max_results: usize,
    pub max_fallback_attempts: u32,
    pub rate_limit: RateLimitConfig,
}

impl Default for DbpediaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sparql_endpoint: "https://dbpedia.org/sparql".into(),
            alternate_endpoints: vec!["http://dbpedia.org/sparql".into()],
            de_sparql_endpoint: "http://de.dbpedia.org/sparql".into(),
            resource_prefix: "http://dbpedia.org/resource/".into(),
            de_resource_prefix: "http://de.dbpedia.org/resource/".into(),
            lookup_url: "https://lookup.dbpedia.org/api/search".into(),
            use_de: false,
            language: "en".into(),
            batch_size: 20,
            timeout_secs: 30,
            alternate_endpoint_fallback: true,
            lookup_fallback: true,
            lookup_max_results: 5,
            max_fallback_attempts: 2,
            rate_limit: RateLimitConfig::new(5, 1.0),
        }
    }
}

/// Cache collaborator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Directory for the file cache; in-memory when unset.
    pub dir: Option<PathBuf>,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            ttl_secs: 7 * 24 * 3600,
            max_entries: 10_000,
        }
    }
}

/// Top-level linker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkerConfig {
    /// Target language of the pipeline (ISO code).
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    #[serde(default)]
    pub wikipedia: WikipediaConfig,
    #[serde(default)]
    pub wikidata: WikidataConfig,
    #[serde(default)]
    pub dbpedia: DbpediaConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_language() -> String {
    "de".into()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_true() -> bool {
    true
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            user_agent: default_user_agent(),
            verify_ssl: true,
            wikipedia: WikipediaConfig::default(),
            wikidata: WikidataConfig::default(),
            dbpedia: DbpediaConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl LinkerConfig {
    /// Load config from a JSON file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save config to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Saved linker config to {}", path.display());
        Ok(())
    }

    /// Build from defaults overlaid with a flat key/value map.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_map(map)?;
        Ok(config)
    }

    /// Build from defaults overlaid with `LINKWISE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let map: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| k.strip_prefix(ENV_PREFIX).map(|k| (k.to_string(), v)))
            .collect();
        Self::from_map(&map)
    }

    /// Overlay recognised flat keys. Unknown keys are ignored.
    pub fn apply_map(&mut self, map: &HashMap<String, String>) -> Result<()> {
        for (key, value) in map {
            let value = value.trim();
            match key.to_ascii_uppercase().as_str() {
                "LANGUAGE" => self.language = value.to_string(),
                "USER_AGENT" => self.user_agent = value.to_string(),
                "VERIFY_SSL" => self.verify_ssl = parse_bool(key, value)?,

                "WIKIPEDIA_ENABLED" => self.wikipedia.enabled = parse_bool(key, value)?,
                "WIKIPEDIA_API_URL" => self.wikipedia.api_url = value.to_string(),
                "WIKIPEDIA_BATCH_SIZE" => self.wikipedia.batch_size = parse_num(key, value)?,
                "WIKIPEDIA_TIMEOUT" => self.wikipedia.timeout_secs = parse_num(key, value)?,
                "WIKIPEDIA_FALLBACK" => {
                    let on = parse_bool(key, value)?;
                    self.wikipedia.language_fallback = on;
                    self.wikipedia.opensearch_fallback = on;
                    self.wikipedia.synonym_fallback = on;
                    self.wikipedia.html_fallback = on;
                }
                "WIKIPEDIA_FALLBACK_LANGUAGE" => {
                    self.wikipedia.fallback_language = value.to_string()
                }
                "WIKIPEDIA_MAX_FALLBACK_ATTEMPTS" => {
                    self.wikipedia.max_fallback_attempts = parse_num(key, value)?
                }
                "WIKIPEDIA_MIN_EXTRACT_LENGTH" => {
                    self.wikipedia.min_extract_length = parse_num(key, value)?
                }

                "WIKIDATA_ENABLED" => self.wikidata.enabled = parse_bool(key, value)?,
                "WIKIDATA_API_URL" => self.wikidata.api_url = value.to_string(),
                "WIKIDATA_BATCH_SIZE" => self.wikidata.batch_size = parse_num(key, value)?,
                "WIKIDATA_TIMEOUT" => self.wikidata.timeout_secs = parse_num(key, value)?,
                "WIKIDATA_LANGUAGE_FALLBACK" => {
                    self.wikidata.language_fallback = parse_bool(key, value)?
                }
                "WIKIDATA_SYNONYM_FALLBACK" => {
                    self.wikidata.synonym_fallback = parse_bool(key, value)?
                }
                "WIKIDATA_MAX_SYNONYM_FALLBACK_ATTEMPTS" => {
                    self.wikidata.max_synonym_fallback_attempts = parse_num(key, value)?
                }

                "DBPEDIA_ENABLED" => self.dbpedia.enabled = parse_bool(key, value)?,
                "DBPEDIA_ENDPOINT" => self.dbpedia.sparql_endpoint = value.to_string(),
                "DBPEDIA_BATCH_SIZE" => self.dbpedia.batch_size = parse_num(key, value)?,
                "DBPEDIA_TIMEOUT" => self.dbpedia.timeout_secs = parse_num(key, value)?,
                "DBPEDIA_USE_DE" => self.dbpedia.use_de = parse_bool(key, value)?,
                "DBPEDIA_LOOKUP_FALLBACK" => {
                    self.dbpedia.lookup_fallback = parse_bool(key, value)?
                }
                "DBPEDIA_LOOKUP_URL" => self.dbpedia.lookup_url = value.to_string(),

                "CACHE_ENABLED" => self.cache.enabled = parse_bool(key, value)?,
                "CACHE_DIR" => self.cache.dir = Some(PathBuf::from(value)),
                "CACHE_TTL" => self.cache.ttl_secs = parse_num(key, value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Edition used by the Wikipedia language fallback; never the primary one.
    pub fn wikipedia_fallback_language(&self) -> String {
        let configured = self.wikipedia.fallback_language.trim();
        if !configured.is_empty() && !configured.eq_ignore_ascii_case(&self.language) {
            configured.to_string()
        } else if self.language.eq_ignore_ascii_case("en") {
            "de".into()
        } else {
            "en".into()
        }
    }

    /// Check for configuration errors that must stop the run.
    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(Error::Config("language must not be empty".into()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("user_agent must not be empty".into()));
        }

        if self.wikipedia.enabled {
            check_url(
                "wikipedia.api_url",
                &self.wikipedia.api_url.replace("{lang}", "en"),
            )?;
            check_url(
                "wikipedia.article_url",
                &self
                    .wikipedia
                    .article_url
                    .replace("{lang}", "en")
                    .replace("{title}", "Main_Page"),
            )?;
            check_batch("wikipedia.batch_size", self.wikipedia.batch_size, 50)?;
            check_rate("wikipedia.rate_limit", &self.wikipedia.rate_limit)?;
        }
        if self.wikidata.enabled {
            check_url("wikidata.api_url", &self.wikidata.api_url)?;
            check_batch("wikidata.batch_size", self.wikidata.batch_size, 50)?;
            check_rate("wikidata.rate_limit", &self.wikidata.rate_limit)?;
        }
        if self.dbpedia.enabled {
            check_url("dbpedia.sparql_endpoint", &self.dbpedia.sparql_endpoint)?;
            for endpoint in &self.dbpedia.alternate_endpoints {
                check_url("dbpedia.alternate_endpoints", endpoint)?;
            }
            if self.dbpedia.use_de {
                check_url("dbpedia.de_sparql_endpoint", &self.dbpedia.de_sparql_endpoint)?;
            }
            if self.dbpedia.lookup_fallback {
                check_url("dbpedia.lookup_url", &self.dbpedia.lookup_url)?;
            }
            check_batch("dbpedia.batch_size", self.dbpedia.batch_size, 100)?;
            check_rate("dbpedia.rate_limit", &self.dbpedia.rate_limit)?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{}: invalid boolean '{}'", key, value))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{}: invalid number '{}'", key, value)))
}

fn check_url(field: &str, raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| Error::Config(format!("{}: invalid URL '{}': {}", field, raw, e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => Err(Error::Config(format!(
            "{}: expected an http(s) URL, got '{}'",
            field, raw
        ))),
    }
}

fn check_batch(field: &str, size: usize, max: usize) -> Result<()> {
    if size == 0 || size > max {
        return Err(Error::Config(format!(
            "{}: must be between 1 and {}, got {}",
            field, max, size
        )));
    }
    Ok(())
}

fn check_rate(field: &str, rate: &RateLimitConfig) -> Result<()> {
    let seconds = [
        ("period_secs", rate.period_secs),
        ("backoff_base_secs", rate.backoff_base_secs),
        ("backoff_max_secs", rate.backoff_max_secs),
    ];
    for (name, value) in seconds {
        if !value.is_finite() || value > MAX_RATE_SECS {
            return Err(Error::Config(format!(
                "{}.{}: must be a finite number of seconds up to {}, got {}",
                field, name, MAX_RATE_SECS, value
            )));
        }
    }
    if rate.max_calls == 0 || rate.period_secs <= 0.0 {
        return Err(Error::Config(format!(
            "{}: max_calls and period_secs must be positive",
            field
        )));
    }
    if rate.backoff_base_secs < 0.0 || rate.backoff_max_secs < rate.backoff_base_secs {
        return Err(Error::Config(format!(
            "{}: backoff_max_secs must be >= backoff_base_secs >= 0",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_validate() {
        let config = LinkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.language, "de");
        assert!(!config.dbpedia.use_de);
        assert_eq!(config.wikipedia.max_fallback_attempts, 3);
    }

    #[test]
    fn test_from_map() {
        let config = LinkerConfig::from_map(&map(&[
            ("DBPEDIA_USE_DE", "true"),
            ("WIKIPEDIA_BATCH_SIZE", "10"),
            ("LANGUAGE", "en"),
            ("SOMETHING_ELSE", "ignored"),
        ]))
        .unwrap();
        assert!(config.dbpedia.use_de);
        assert_eq!(config.wikipedia.batch_size, 10);
        assert_eq!(config.language, "en");
    }

    #[test]
    fn test_from_map_rejects_bad_values() {
        let err = LinkerConfig::from_map(&map(&[("DBPEDIA_USE_DE", "maybe")])).unwrap_err();
        assert!(err.is_fatal());
        assert!(LinkerConfig::from_map(&map(&[("WIKIDATA_BATCH_SIZE", "ten")])).is_err());
    }

    #[test]
    fn test_invalid_endpoint_is_fatal() {
        let mut config = LinkerConfig::default();
        config.dbpedia.sparql_endpoint = "not a url".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = LinkerConfig::default();
        config.wikidata.api_url = "ftp://www.wikidata.org/w/api.php".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_service_not_validated() {
        let mut config = LinkerConfig::default();
        config.dbpedia.enabled = false;
        config.dbpedia.sparql_endpoint = "".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_bounds() {
        let mut config = LinkerConfig::default();
        config.wikidata.batch_size = 0;
        assert!(config.validate().is_err());
        config.wikidata.batch_size = 51;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rate_limit_seconds_must_be_finite_and_bounded() {
        let mut config = LinkerConfig::default();
        config.dbpedia.rate_limit.backoff_max_secs = 1e30;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = LinkerConfig::default();
        config.wikidata.rate_limit.period_secs = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = LinkerConfig::default();
        config.wikipedia.rate_limit.backoff_base_secs = f64::NAN;
        assert!(config.validate().is_err());

        let config = LinkerConfig::from_map(&map(&[("WIKIPEDIA_TIMEOUT", "20")])).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fallback_language() {
        let mut config = LinkerConfig::default();
        assert_eq!(config.wikipedia_fallback_language(), "en");
        config.language = "en".into();
        assert_eq!(config.wikipedia_fallback_language(), "de");
        config.language = "fr".into();
        assert_eq!(config.wikipedia_fallback_language(), "en");
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkwise.json");

        let missing = LinkerConfig::load(&path).unwrap();
        assert_eq!(missing, LinkerConfig::default());

        let mut config = LinkerConfig::default();
        config.dbpedia.use_de = true;
        config.wikipedia.opensearch_limit = 3;
        config.save(&path).unwrap();

        let loaded = LinkerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_section_defaults() {
        let json = r#"{"language": "en", "dbpedia": {"use_de": true}}"#;
        let config: LinkerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.language, "en");
        assert!(config.dbpedia.use_de);
        assert_eq!(config.dbpedia.timeout_secs, 30);
        assert_eq!(config.dbpedia.rate_limit.max_calls, 5);
        assert_eq!(config.wikipedia.batch_size, 20);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(LinkerConfig::load(&path), Err(Error::Config(_))));
    }
}
