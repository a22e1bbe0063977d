//! Semantic, keyword and hybrid search over indexed pages

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, ScoredPoint, VectorStoreProvider};
use crate::types::{FileId, HybridHit, SearchHit, SearchType};

/// Stateless query engine over the dense and sparse indexes
pub struct HybridSearchEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    config: SearchConfig,
}

impl HybridSearchEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        config: SearchConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Dense nearest-neighbour search
    ///
    /// Hits scoring below `threshold` (default `semantic_threshold`) are dropped.
    pub async fn search_semantic(
        &self,
        query: &str,
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>> {
        self.validate(query, limit)?;
        let threshold = threshold.unwrap_or(self.config.semantic_threshold);

        let mut hits = self.semantic_hits(query, limit).await?;
        hits.retain(|h| h.score >= threshold);
        Ok(hits)
    }

    /// Sparse term-weight search
    ///
    /// Hits scoring below `threshold` (default `keyword_threshold`) are dropped.
    pub async fn search_keyword(
        &self,
        query: &str,
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>> {
        self.validate(query, limit)?;
        let threshold = threshold.unwrap_or(self.config.keyword_threshold);

        let mut hits = self.keyword_hits(query, limit).await?;
        hits.retain(|h| h.score >= threshold);
        Ok(hits)
    }

    /// Weighted merge of semantic and keyword results
    ///
    /// Each source is queried for `2 * limit` hits without a threshold.
    pub async fn search_hybrid(
        &self,
        query: &str,
        limit: usize,
        semantic_weight: Option<f32>,
        keyword_weight: Option<f32>,
    ) -> Result<Vec<HybridHit>> {
        self.validate(query, limit)?;
        let weights = normalize_weights(
            semantic_weight.unwrap_or(self.config.semantic_weight),
            keyword_weight.unwrap_or(self.config.keyword_weight),
        );

        let fetch = limit.saturating_mul(2);
        let (semantic, keyword) = tokio::try_join!(
            self.semantic_hits(query, fetch),
            self.keyword_hits(query, fetch),
        )?;

        tracing::debug!(
            semantic = semantic.len(),
            keyword = keyword.len(),
            ?weights,
            "Merging hybrid results"
        );

        Ok(merge_hybrid(semantic, keyword, weights, limit))
    }

    fn validate(&self, query: &str, limit: usize) -> Result<()> {
        if query.trim().is_empty() {
            return Err(Error::validation("Query must not be empty"));
        }
        if limit == 0 || limit > self.config.max_limit {
            return Err(Error::validation(format!(
                "Limit must be between 1 and {}",
                self.config.max_limit
            )));
        }
        Ok(())
    }

    async fn semantic_hits(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let vector = self.embedder.encode_dense(query).await?;
        let points = self.store.search_dense(&vector, limit).await?;
        Ok(to_hits(points, SearchType::Semantic))
    }

    async fn keyword_hits(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let vector = match self.embedder.encode_sparse(query).await {
            Ok(vector) => vector,
            Err(Error::Encoding(reason)) => {
                tracing::debug!(%reason, "Query has no keyword terms");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let points = self.store.search_sparse(&vector, limit).await?;
        Ok(to_hits(points, SearchType::Keyword))
    }
}

fn to_hits(points: Vec<ScoredPoint>, search_type: SearchType) -> Vec<SearchHit> {
    points
        .into_iter()
        .map(|p| SearchHit {
            file_id: p.payload.file_id,
            page_number: p.payload.page_number,
            filename: p.payload.filename,
            text_snippet: p.payload.text_snippet,
            score: p.score,
            search_type,
        })
        .collect()
}

/// Scale weights to sum to 1; both non-positive falls back to an even split
pub fn normalize_weights(semantic: f32, keyword: f32) -> (f32, f32) {
    let semantic = semantic.max(0.0);
    let keyword = keyword.max(0.0);
    let total = semantic + keyword;
    if total <= 0.0 || !total.is_finite() {
        return (0.5, 0.5);
    }
    (semantic / total, keyword / total)
}

/// Merge two ranked lists by `(file_id, page)`
///
/// Scores add up across sources after weighting. Output is sorted by combined
/// score descending, then `(file_id, page)` ascending, and cut to `limit`.
pub fn merge_hybrid(
    semantic: Vec<SearchHit>,
    keyword: Vec<SearchHit>,
    (semantic_weight, keyword_weight): (f32, f32),
    limit: usize,
) -> Vec<HybridHit> {
    let mut merged: BTreeMap<(FileId, u32), HybridHit> = BTreeMap::new();

    for (hits, from_keyword) in [(semantic, false), (keyword, true)] {
        for hit in hits {
            let entry = merged
                .entry((hit.file_id, hit.page_number))
                .or_insert_with(|| HybridHit {
                    file_id: hit.file_id,
                    page_number: hit.page_number,
                    filename: hit.filename.clone(),
                    text_snippet: hit.text_snippet.clone(),
                    semantic_score: None,
                    keyword_score: None,
                    combined_score: 0.0,
                    search_type: SearchType::Hybrid,
                });

            // a source may repeat a page; keep its best score
            let slot = if from_keyword {
                &mut entry.keyword_score
            } else {
                &mut entry.semantic_score
            };
            let best = slot.map_or(hit.score, |s| s.max(hit.score));
            *slot = Some(best);
            entry.combined_score = entry.semantic_score.unwrap_or(0.0) * semantic_weight
                + entry.keyword_score.unwrap_or(0.0) * keyword_weight;
        }
    }

    let mut results: Vec<HybridHit> = merged.into_values().collect();
    results.sort_by(|a, b| {
        b.combined_score
            .total_cmp(&a.combined_score)
            .then_with(|| a.key().cmp(&b.key()))
    });
    results.truncate(limit);
    results
}
