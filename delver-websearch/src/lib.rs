//! Tavily-style web search client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use delver_core::{SearchError, WebPage, WebSearch};

#[derive(Clone)]
pub struct TavilyClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    max_results: usize,
}

impl fmt::Debug for TavilyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TavilyClient")
            .field("endpoint", &self.endpoint)
            .field("max_results", &self.max_results)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default, alias = "content")]
    text: String,
}

impl TavilyClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        max_results: usize,
    ) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|err| SearchError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: SecretString::new(api_key.into()),
            max_results,
        })
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, query: &str) -> Result<Vec<WebPage>, SearchError> {
        let body = TavilyRequest {
            api_key: self.api_key.expose_secret(),
            query,
            max_results: self.max_results,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| SearchError::Transport(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| SearchError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(SearchError::HttpStatus {
                status: status.as_u16(),
                message: text,
            });
        }

        let decoded: TavilyResponse =
            serde_json::from_str(&text).map_err(|err| SearchError::InvalidResponse(err.to_string()))?;

        Ok(decoded
            .results
            .into_iter()
            .filter(|result| !result.text.trim().is_empty())
            .map(|result| WebPage {
                title: result.title,
                url: result.url,
                text: result.text,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_maps_results_and_drops_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({
                "query": "import duties",
                "max_results": 5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"title": "Duties 101", "url": "https://example.com/duties", "content": "Import duties are..."},
                    {"title": "Empty", "url": "https://example.com/empty", "content": "  "}
                ]
            })))
            .mount(&server)
            .await;

        let client = TavilyClient::new(format!("{}/search", server.uri()), "key", 5).unwrap();
        let pages = client.search("import duties").await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "https://example.com/duties");
    }

    #[tokio::test]
    async fn http_failure_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = TavilyClient::new(format!("{}/search", server.uri()), "key", 5).unwrap();
        let err = client.search("q").await.unwrap_err();
        assert!(matches!(err, SearchError::HttpStatus { status: 401, .. }));
    }
}
