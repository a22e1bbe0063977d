//! Qdrant vector store over the REST API
//!
//! Each point carries a named dense vector `dense` (cosine) and a named sparse
//! vector `sparse`. Deletion and counting filter on the `file_id` payload field.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::FileId;

use super::embedding::SparseVector;
use super::vector_store::{PointPayload, ScoredPoint, VectorPoint, VectorStoreProvider};

const DENSE_VECTOR: &str = "dense";
const SPARSE_VECTOR: &str = "sparse";

/// Qdrant-backed vector store
pub struct QdrantVectorStore {
    client: Client,
    base_url: String,
    collection: String,
    dimensions: usize,
    max_retries: u32,
}

// ==================== Request/Response Types ====================

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: serde_json::Value,
    sparse_vectors: serde_json::Value,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: Vec<QdrantPoint<'a>>,
}

#[derive(Serialize)]
struct QdrantPoint<'a> {
    id: String,
    vector: NamedVectors<'a>,
    payload: &'a PointPayload,
}

#[derive(Serialize)]
struct NamedVectors<'a> {
    dense: &'a [f32],
    sparse: &'a SparseVector,
}

#[derive(Serialize)]
#[serde(untagged)]
enum QueryVector<'a> {
    Dense(&'a [f32]),
    Sparse(&'a SparseVector),
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: QueryVector<'a>,
    using: &'static str,
    limit: usize,
    with_payload: bool,
}

#[derive(Serialize)]
struct FileFilter {
    must: Vec<FieldCondition>,
}

#[derive(Serialize)]
struct FieldCondition {
    key: &'static str,
    #[serde(rename = "match")]
    match_value: MatchValue,
}

#[derive(Serialize)]
struct MatchValue {
    value: FileId,
}

#[derive(Serialize)]
struct FilterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<FileFilter>,
}

#[derive(Serialize)]
struct CountRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<FileFilter>,
    exact: bool,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct QueryResult {
    points: Vec<QueryHit>,
}

#[derive(Deserialize)]
struct QueryHit {
    score: f32,
    payload: Option<PointPayload>,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantVectorStore {
    /// Connect and create the collection if it does not exist
    pub async fn connect(config: &VectorDbConfig, dimensions: usize) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key.trim())
                    .map_err(|e| Error::Config(format!("Invalid Qdrant API key: {}", e)))?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create Qdrant client: {}", e)))?;

        let store = Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            dimensions,
            max_retries: config.max_retries,
        };

        store.ensure_collection().await?;
        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            tracing::info!(collection = %self.collection, "Using existing Qdrant collection");
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(Error::store(format!(
                "Qdrant collection lookup failed: HTTP {}",
                response.status()
            )));
        }

        let request = CreateCollectionRequest {
            vectors: serde_json::json!({
                DENSE_VECTOR: { "size": self.dimensions, "distance": "Cosine" }
            }),
            sparse_vectors: serde_json::json!({ SPARSE_VECTOR: {} }),
        };
        let _: QdrantResponse<serde_json::Value> = self
            .send(Method::PUT, &format!("/collections/{}", self.collection), &request)
            .await?;

        tracing::info!(
            collection = %self.collection,
            dimensions = self.dimensions,
            "Created Qdrant collection"
        );
        Ok(())
    }

    /// Send a JSON request, retrying on connection errors, 429 and 5xx
    async fn send<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            let result = self
                .client
                .request(method.clone(), &url)
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .map_err(|e| Error::store(format!("Invalid Qdrant response: {}", e)));
                    }
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt < self.max_retries {
                        attempt += 1;
                        tracing::warn!(%status, attempt, "Qdrant request failed, retrying");
                        sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(Error::store(format!(
                        "Qdrant request {} {} failed ({}): {}",
                        method, path, status, text
                    )));
                }
                Err(err) => {
                    if (err.is_connect() || err.is_timeout()) && attempt < self.max_retries {
                        attempt += 1;
                        tracing::warn!(error = %err, attempt, "Qdrant unreachable, retrying");
                        sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(Error::store(format!("Qdrant request failed: {}", err)));
                }
            }
        }
    }

    async fn query(&self, query: QueryVector<'_>, using: &'static str, limit: usize) -> Result<Vec<ScoredPoint>> {
        let request = QueryRequest {
            query,
            using,
            limit,
            with_payload: true,
        };
        let response: QdrantResponse<QueryResult> = self
            .send(
                Method::POST,
                &format!("/collections/{}/points/query", self.collection),
                &request,
            )
            .await?;

        Ok(response
            .result
            .points
            .into_iter()
            .filter_map(|hit| {
                hit.payload.map(|payload| ScoredPoint {
                    payload,
                    score: hit.score,
                })
            })
            .collect())
    }

    async fn count(&self, filter: Option<FileFilter>) -> Result<usize> {
        let response: QdrantResponse<CountResult> = self
            .send(
                Method::POST,
                &format!("/collections/{}/points/count", self.collection),
                &CountRequest { filter, exact: true },
            )
            .await?;
        Ok(response.result.count)
    }
}

#[async_trait]
impl VectorStoreProvider for QdrantVectorStore {
    async fn upsert_point(&self, point: VectorPoint) -> Result<()> {
        let request = UpsertRequest {
            points: vec![QdrantPoint {
                id: point.id.to_string(),
                vector: NamedVectors {
                    dense: &point.dense,
                    sparse: &point.sparse,
                },
                payload: &point.payload,
            }],
        };

        let _: QdrantResponse<serde_json::Value> = self
            .send(
                Method::PUT,
                &format!("/collections/{}/points?wait=true", self.collection),
                &request,
            )
            .await
            .map_err(|e| Error::indexing(e.to_string()))?;
        Ok(())
    }

    async fn search_dense(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        self.query(QueryVector::Dense(vector), DENSE_VECTOR, limit).await
    }

    async fn search_sparse(&self, vector: &SparseVector, limit: usize) -> Result<Vec<ScoredPoint>> {
        self.query(QueryVector::Sparse(vector), SPARSE_VECTOR, limit).await
    }

    async fn delete_by_file(&self, file_id: FileId) -> Result<usize> {
        let existing = self.count(Some(file_filter(file_id))).await?;

        let _: QdrantResponse<serde_json::Value> = self
            .send(
                Method::POST,
                &format!("/collections/{}/points/delete?wait=true", self.collection),
                &FilterRequest {
                    filter: Some(file_filter(file_id)),
                },
            )
            .await?;

        Ok(existing)
    }

    async fn count_by_file(&self, file_id: FileId) -> Result<usize> {
        self.count(Some(file_filter(file_id))).await
    }

    async fn len(&self) -> Result<usize> {
        self.count(None).await
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

fn file_filter(file_id: FileId) -> FileFilter {
    FileFilter {
        must: vec![FieldCondition {
            key: "file_id",
            match_value: MatchValue { value: file_id },
        }],
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: u32) -> Duration {
    let capped = attempt.min(5);
    Duration::from_millis(500 * (1 << capped))
}
