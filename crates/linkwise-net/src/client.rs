//! HTTP client shared by the resolvers of one service.
//!
//! Wraps `reqwest::Client` with the configured user agent, timeout and TLS
//! verification, and routes every request through the service's
//! [`RateLimiter`]. Status codes are mapped onto the crate error taxonomy:
//! 429 becomes `RateLimited` (retried by the limiter), timeouts become
//! `Timeout`, other non-success codes become `Http`.

use std::sync::Arc;
use std::time::Duration;

use linkwise_core::config::RateLimitConfig;
use linkwise_core::{Error, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::ratelimit::{RateLimitPolicy, RateLimiter};

pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
}

impl HttpClient {
    pub fn new(
        name: &str,
        user_agent: &str,
        timeout: Duration,
        verify_ssl: bool,
        rate_limit: &RateLimitConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client for {}: {}", name, e)))?;
        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::new(name, RateLimitPolicy::from(rate_limit))),
        })
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let body = self.get_text(url, query).await?;
        decode(url, &body)
    }

    /// GET a text body.
    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let client = &self.client;
        self.limiter
            .execute(&(url, query), move || async move {
                debug!("GET url={} params={}", url, query.len());
                match client.get(url).query(query).send().await {
                    Ok(response) => read_body(url, response).await,
                    Err(e) => Err(map_send_error(url, e)),
                }
            })
            .await
    }

    /// Run a SPARQL query by form POST and decode the JSON results.
    pub async fn sparql<T: DeserializeOwned>(&self, endpoint: &str, query: &str) -> Result<T> {
        let client = &self.client;
        let body = self
            .limiter
            .execute(&(endpoint, query), move || async move {
                debug!("SPARQL endpoint={} bytes={}", endpoint, query.len());
                let request = client
                    .post(endpoint)
                    .header(ACCEPT, SPARQL_RESULTS_JSON)
                    .form(&[("query", query), ("format", SPARQL_RESULTS_JSON)]);
                match request.send().await {
                    Ok(response) => read_body(endpoint, response).await,
                    Err(e) => Err(map_send_error(endpoint, e)),
                }
            })
            .await?;
        decode(endpoint, &body)
    }

    /// POST a JSON body with extra headers and decode the JSON reply.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<T> {
        let client = &self.client;
        let payload = body.to_string();
        let payload = &payload;
        let text = self
            .limiter
            .execute(&(url, payload), move || async move {
                debug!("POST url={} bytes={}", url, payload.len());
                let mut request = client
                    .post(url)
                    .header(CONTENT_TYPE, "application/json")
                    .body(payload.clone());
                for (name, value) in headers {
                    request = request.header(*name, value.as_str());
                }
                match request.send().await {
                    Ok(response) => read_body(url, response).await,
                    Err(e) => Err(map_send_error(url, e)),
                }
            })
            .await?;
        decode(url, &text)
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::Parse(format!("{}: {}", url, e)))
}

fn map_send_error(url: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{}: {}", url, e))
    } else {
        Error::Http(format!("{}: {}", url, e))
    }
}

async fn read_body(url: &str, response: Response) -> Result<String> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimited(format!("{} returned 429", url)));
    }
    if !status.is_success() {
        return Err(Error::Http(format!("{} returned {}", url, status)));
    }
    response.text().await.map_err(|e| map_send_error(url, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_limits() -> RateLimitConfig {
        RateLimitConfig {
            max_calls: 100,
            period_secs: 1.0,
            backoff_base_secs: 0.01,
            backoff_max_secs: 0.05,
            max_retries: 3,
        }
    }

    fn client() -> HttpClient {
        HttpClient::new("test", "linkwise-test", Duration::from_secs(5), true, &fast_limits())
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_json_sends_query_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("action", "query"))
            .and(header("user-agent", "linkwise-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/w/api.php", server.uri());
        let body: Value = client()
            .get_json(&url, &[("action", "query".to_string())])
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_429_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
            .mount(&server)
            .await;

        let body = client().get_text(&server.uri(), &[]).await.unwrap();
        assert_eq!(body, "fine");
    }

    #[tokio::test]
    async fn test_429_backoff_ignores_retry_after_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3600"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
            .mount(&server)
            .await;

        let body = tokio::time::timeout(Duration::from_secs(2), client().get_text(&server.uri(), &[]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body, "fine");
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client().get_text(&server.uri(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client()
            .get_json::<Value>(&server.uri(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = HttpClient::new(
            "test",
            "linkwise-test",
            Duration::from_millis(50),
            true,
            &fast_limits(),
        )
        .unwrap();
        let err = client.get_text(&server.uri(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_sparql_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sparql"))
            .and(body_string_contains("query=SELECT"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"results": {"bindings": []}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = format!("{}/sparql", server.uri());
        let body: Value = client()
            .sparql(&endpoint, "SELECT ?s WHERE { ?s ?p ?o }")
            .await
            .unwrap();
        assert!(body["results"]["bindings"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_json_sends_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "secret"))
            .and(body_string_contains("\"model\":\"m\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/v1/messages", server.uri());
        let body: Value = client()
            .post_json(&url, &[("x-api-key", "secret".to_string())], &json!({"model": "m"}))
            .await
            .unwrap();
        assert_eq!(body["id"], "msg_1");
    }
}
