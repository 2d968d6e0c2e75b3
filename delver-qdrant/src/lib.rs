//! Qdrant vector search integration for Delver.
//!
//! [`QdrantBackend`] is the process-wide connection; [`QdrantBackend::open`]
//! validates a collection and returns a per-request [`QdrantIndex`] handle.

mod error;
pub mod mapper;

use std::fmt;
use std::time::Duration;

pub use error::QdrantStoreError;
use mapper::{scored_point_to_chunk, ApiResponse, ScoredPoint, SearchPointsRequest};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use delver_core::{ChunkHit, StoreError, VectorBackend, VectorIndex};

#[derive(Clone)]
pub struct QdrantBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl fmt::Debug for QdrantBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };
        f.debug_struct("QdrantBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &api_key)
            .finish()
    }
}

impl QdrantBackend {
    pub fn builder() -> QdrantBackendBuilder {
        QdrantBackendBuilder::default()
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request_builder(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.request(method, self.endpoint(path));
        if let Some(api_key) = self.api_key.as_deref() {
            request.header("api-key", api_key)
        } else {
            request
        }
    }

    async fn send_and_decode<T: for<'de> Deserialize<'de>>(
        &self,
        collection: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, QdrantStoreError> {
        let response = request.send().await.map_err(QdrantStoreError::from)?;
        let status = response.status();
        let body = response.text().await.map_err(QdrantStoreError::from)?;

        if !status.is_success() {
            return Err(http_error_from_response(collection, status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|err| QdrantStoreError::InvalidResponse {
            message: format!("failed to decode qdrant response body: {err}"),
        })
    }
}

#[async_trait::async_trait]
impl VectorBackend for QdrantBackend {
    async fn open(&self, collection: &str) -> Result<Box<dyn VectorIndex>, StoreError> {
        let _: ApiResponse<JsonValue> = self
            .send_and_decode(
                collection,
                self.request_builder(reqwest::Method::GET, &format!("collections/{collection}")),
            )
            .await
            .map_err(StoreError::from)?;

        Ok(Box::new(QdrantIndex {
            backend: self.clone(),
            collection: collection.to_string(),
        }))
    }
}

/// A search handle bound to one collection for a request scope.
pub struct QdrantIndex {
    backend: QdrantBackend,
    collection: String,
}

impl fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("collection", &self.collection)
            .finish()
    }
}

#[async_trait::async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ChunkHit>, StoreError> {
        if embedding.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let request = SearchPointsRequest {
            vector: embedding.to_vec(),
            limit,
            with_payload: true,
        };

        let response: ApiResponse<Vec<ScoredPoint>> = self
            .backend
            .send_and_decode(
                &self.collection,
                self.backend
                    .request_builder(
                        reqwest::Method::POST,
                        &format!("collections/{}/points/search", self.collection),
                    )
                    .json(&request),
            )
            .await
            .map_err(StoreError::from)?;

        let mut hits: Vec<ChunkHit> = response
            .result
            .into_iter()
            .filter_map(|point| scored_point_to_chunk(&self.collection, point))
            .collect();
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));

        tracing::debug!(
            collection = %self.collection,
            hits = hits.len(),
            "qdrant search completed"
        );
        Ok(hits)
    }
}

#[derive(Default, Clone)]
pub struct QdrantBackendBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
}

impl fmt::Debug for QdrantBackendBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };
        f.debug_struct("QdrantBackendBuilder")
            .field("base_url", &self.base_url)
            .field("api_key", &api_key)
            .finish()
    }
}

impl QdrantBackendBuilder {
    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.base_url = Some(value.into());
        self
    }

    pub fn host_port(self, host: &str, port: u16) -> Self {
        self.base_url(format!("http://{host}:{port}"))
    }

    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        self.api_key = Some(value.into());
        self
    }

    pub fn timeout(mut self, value: Duration) -> Self {
        self.timeout = Some(value);
        self
    }

    pub fn build(self) -> Result<QdrantBackend, QdrantStoreError> {
        let base_url = self.base_url.ok_or_else(|| QdrantStoreError::InvalidResponse {
            message: "base_url is required".to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(10)))
            .build()
            .map_err(QdrantStoreError::from)?;
        Ok(QdrantBackend {
            client,
            base_url,
            api_key: self.api_key,
        })
    }
}

fn http_error_from_response(collection: &str, status: u16, body: &str) -> QdrantStoreError {
    let message = qdrant_error_message(body);
    if status == 404 && message.to_lowercase().contains("collection") {
        return QdrantStoreError::CollectionNotFound {
            collection: collection.to_string(),
            message,
        };
    }
    QdrantStoreError::HttpStatus { status, message }
}

#[derive(Debug, Deserialize)]
struct QdrantErrorEnvelope {
    status: QdrantErrorStatus,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QdrantErrorStatus {
    Message(String),
    Structured { error: String },
}

fn qdrant_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "unknown qdrant error".to_string();
    }

    serde_json::from_str::<QdrantErrorEnvelope>(trimmed)
        .map(|envelope| match envelope.status {
            QdrantErrorStatus::Message(message) => message,
            QdrantErrorStatus::Structured { error } => error,
        })
        .unwrap_or_else(|_| trimmed.to_string())
}
