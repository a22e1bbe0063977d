//! In-process vector store
//!
//! Exact search over all points. Suitable for tests and single-node setups
//! with modest page counts; contents are lost on restart.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::FileId;

use super::embedding::SparseVector;
use super::vector_store::{ScoredPoint, VectorPoint, VectorStoreProvider};

/// Local vector store keyed by point id
pub struct LocalVectorStore {
    dimensions: usize,
    points: RwLock<HashMap<Uuid, VectorPoint>>,
}

impl LocalVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            points: RwLock::new(HashMap::new()),
        }
    }

    fn rank<F>(&self, limit: usize, score: F) -> Vec<ScoredPoint>
    where
        F: Fn(&VectorPoint) -> f32,
    {
        let points = self.points.read();
        let mut scored: Vec<ScoredPoint> = points
            .values()
            .map(|p| ScoredPoint {
                payload: p.payload.clone(),
                score: score(p),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.payload.file_id.cmp(&b.payload.file_id))
                .then(a.payload.page_number.cmp(&b.payload.page_number))
        });
        scored.truncate(limit);
        scored
    }
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn upsert_point(&self, point: VectorPoint) -> Result<()> {
        if point.dense.len() != self.dimensions {
            return Err(Error::indexing(format!(
                "Dense vector has {} dimensions, index expects {}",
                point.dense.len(),
                self.dimensions
            )));
        }
        self.points.write().insert(point.id, point);
        Ok(())
    }

    async fn search_dense(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        if vector.len() != self.dimensions {
            return Err(Error::encoding(format!(
                "Query vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        Ok(self.rank(limit, |p| cosine_similarity(vector, &p.dense)))
    }

    async fn search_sparse(&self, vector: &SparseVector, limit: usize) -> Result<Vec<ScoredPoint>> {
        let mut hits = self.rank(limit, |p| vector.dot(&p.sparse));
        // only points sharing at least one term
        hits.retain(|h| h.score > 0.0);
        Ok(hits)
    }

    async fn delete_by_file(&self, file_id: FileId) -> Result<usize> {
        let mut points = self.points.write();
        let before = points.len();
        points.retain(|_, p| p.payload.file_id != file_id);
        Ok(before - points.len())
    }

    async fn count_by_file(&self, file_id: FileId) -> Result<usize> {
        Ok(self
            .points
            .read()
            .values()
            .filter(|p| p.payload.file_id == file_id)
            .count())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.points.read().len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Cosine similarity, 0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
