//! Embedding provider trait for dense and sparse text encodings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sparse term-weight vector with indices sorted ascending
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Build from unordered `(index, weight)` pairs, summing duplicates
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, f32)>) -> Self {
        let mut merged = std::collections::BTreeMap::new();
        for (index, weight) in pairs {
            *merged.entry(index).or_insert(0.0f32) += weight;
        }
        let (indices, values) = merged.into_iter().unzip();
        Self { indices, values }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product over shared indices
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// Trait for encoding text into dense and sparse vectors
///
/// Implementations:
/// - `OllamaEmbedder`: dense vectors from a local Ollama server, sparse
///   vectors from the hashed term encoder
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dense embedding of fixed dimension
    ///
    /// Fails with `Error::Encoding` on blank input or a dimension mismatch.
    async fn encode_dense(&self, text: &str) -> Result<Vec<f32>>;

    /// Sparse term-weight embedding
    async fn encode_sparse(&self, text: &str) -> Result<SparseVector>;

    /// Get dense embedding dimensions
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_sorts_and_merges() {
        let v = SparseVector::from_pairs(vec![(9, 0.5), (2, 1.0), (9, 0.25)]);
        assert_eq!(v.indices, vec![2, 9]);
        assert_eq!(v.values, vec![1.0, 0.75]);
    }

    #[test]
    fn test_dot_over_shared_indices() {
        let a = SparseVector::from_pairs(vec![(1, 1.0), (4, 2.0), (7, 3.0)]);
        let b = SparseVector::from_pairs(vec![(4, 0.5), (7, 1.0), (8, 9.0)]);
        assert!((a.dot(&b) - 4.0).abs() < 1e-6);
        assert_eq!(a.dot(&SparseVector::default()), 0.0);
    }
}
