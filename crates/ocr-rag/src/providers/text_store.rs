//! Text store trait for extracted page text

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FileId, PageText};

/// Trait for persisting per-page text
#[async_trait]
pub trait TextStore: Send + Sync {
    /// Insert or replace the text of one page, returning the row id
    async fn upsert_page(&self, file_id: FileId, page_number: u32, text: &str) -> Result<i64>;

    /// All pages of a file ordered by page number
    async fn get_pages(&self, file_id: FileId) -> Result<Vec<PageText>>;
}
