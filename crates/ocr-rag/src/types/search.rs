//! Search result types

use serde::{Deserialize, Serialize};

use super::FileId;

/// Which index produced a hit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Semantic,
    Keyword,
    Hybrid,
}

/// A single page hit from the dense or sparse index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub file_id: FileId,
    pub page_number: u32,
    pub filename: String,
    /// Leading characters of the page text
    pub text_snippet: String,
    /// Cosine similarity (semantic) or term-weight dot product (keyword)
    pub score: f32,
    pub search_type: SearchType,
}

/// A merged hit from hybrid search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HybridHit {
    pub file_id: FileId,
    pub page_number: u32,
    pub filename: String,
    pub text_snippet: String,
    /// Raw semantic score, if the page was a semantic hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    /// Raw keyword score, if the page was a keyword hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,
    /// Sum of weighted scores
    pub combined_score: f32,
    pub search_type: SearchType,
}

impl HybridHit {
    /// Merge key
    pub fn key(&self) -> (FileId, u32) {
        (self.file_id, self.page_number)
    }
}
