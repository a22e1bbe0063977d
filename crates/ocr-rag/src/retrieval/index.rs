//! Page-level vector index adapter
//!
//! Turns page text into a dense+sparse point. Point ids are UUIDv5 values
//! derived from `(file_id, page)`, so re-indexing a page replaces its point.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, PointPayload, VectorPoint, VectorStoreProvider};
use crate::types::FileId;

/// Deterministic point id for a page
pub fn point_id(file_id: FileId, page_number: u32) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("ocr-rag/file/{}/page/{}", file_id, page_number).as_bytes(),
    )
}

/// First `max_chars` characters of `text`
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Indexes pages into a vector store
pub struct PageIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    snippet_chars: usize,
}

impl PageIndex {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        snippet_chars: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            snippet_chars,
        }
    }

    /// Underlying vector store
    pub fn store(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.store
    }

    /// Embed and write one page
    pub async fn upsert(&self, file_id: FileId, page_number: u32, text: &str, filename: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::indexing(format!(
                "Page {} of file {} has no text to index",
                page_number, file_id
            )));
        }

        let (dense, sparse) = tokio::try_join!(
            self.embedder.encode_dense(text),
            self.embedder.encode_sparse(text),
        )?;

        let point = VectorPoint {
            id: point_id(file_id, page_number),
            dense,
            sparse,
            payload: PointPayload {
                file_id,
                page_number,
                filename: filename.to_string(),
                text_snippet: snippet(text, self.snippet_chars),
            },
        };

        self.store.upsert_point(point).await
    }

    /// Remove every point of a file, returning how many were removed
    pub async fn delete_all_for_file(&self, file_id: FileId) -> Result<usize> {
        let removed = self.store.delete_by_file(file_id).await?;
        tracing::debug!(file_id, removed, "Deleted vectors for file");
        Ok(removed)
    }

    /// Number of points stored for a file
    pub async fn count_for_file(&self, file_id: FileId) -> Result<usize> {
        self.store.count_by_file(file_id).await
    }
}
