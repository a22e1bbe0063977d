//! Vector store provider trait for dense+sparse page points

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::FileId;

use super::embedding::SparseVector;

/// Payload stored with every point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointPayload {
    pub file_id: FileId,
    pub page_number: u32,
    pub filename: String,
    pub text_snippet: String,
}

/// One indexed page
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: Uuid,
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub payload: PointPayload,
}

/// A point returned from a nearest-neighbour query
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub payload: PointPayload,
    /// Cosine similarity (dense) or dot product (sparse)
    pub score: f32,
}

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `LocalVectorStore`: in-process index
/// - `QdrantVectorStore`: Qdrant REST API
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert or replace a point by id
    async fn upsert_point(&self, point: VectorPoint) -> Result<()>;

    /// Nearest neighbours on the dense vector, best first
    async fn search_dense(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>>;

    /// Nearest neighbours on the sparse vector, best first
    async fn search_sparse(&self, vector: &SparseVector, limit: usize) -> Result<Vec<ScoredPoint>>;

    /// Delete every point whose payload `file_id` matches
    async fn delete_by_file(&self, file_id: FileId) -> Result<usize>;

    /// Count points whose payload `file_id` matches
    async fn count_by_file(&self, file_id: FileId) -> Result<usize>;

    /// Get total number of points stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
