//! Retrieval: page indexing and hybrid search

pub mod index;
pub mod search;

pub use index::{point_id, snippet, PageIndex};
pub use search::{merge_hybrid, normalize_weights, HybridSearchEngine};
