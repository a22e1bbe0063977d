//! Search endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{HybridHit, SearchHit, SearchType};

/// Query parameters for semantic and keyword search
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Query text
    pub q: String,
    pub limit: Option<usize>,
    /// Minimum score; the configured default applies when absent
    pub threshold: Option<f32>,
}

/// Query parameters for hybrid search
#[derive(Debug, Deserialize)]
pub struct HybridParams {
    pub q: String,
    pub limit: Option<usize>,
    pub semantic_weight: Option<f32>,
    pub keyword_weight: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse<T> {
    pub query: String,
    pub search_type: SearchType,
    pub total: usize,
    pub results: Vec<T>,
}

impl<T> SearchResponse<T> {
    fn new(query: String, search_type: SearchType, results: Vec<T>) -> Self {
        Self {
            query,
            search_type,
            total: results.len(),
            results,
        }
    }
}

/// GET /api/search/semantic
pub async fn semantic(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse<SearchHit>>> {
    let results = state
        .service()
        .search_semantic(&params.q, params.limit, params.threshold)
        .await?;
    Ok(Json(SearchResponse::new(params.q, SearchType::Semantic, results)))
}

/// GET /api/search/keyword
pub async fn keyword(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse<SearchHit>>> {
    let results = state
        .service()
        .search_keyword(&params.q, params.limit, params.threshold)
        .await?;
    Ok(Json(SearchResponse::new(params.q, SearchType::Keyword, results)))
}

/// GET /api/search/hybrid
pub async fn hybrid(
    State(state): State<AppState>,
    Query(params): Query<HybridParams>,
) -> Result<Json<SearchResponse<HybridHit>>> {
    tracing::debug!(query = %params.q, "Hybrid search");
    let results = state
        .service()
        .search_hybrid(
            &params.q,
            params.limit,
            params.semantic_weight,
            params.keyword_weight,
        )
        .await?;
    Ok(Json(SearchResponse::new(params.q, SearchType::Hybrid, results)))
}
