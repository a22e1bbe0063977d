//! State store trait for file metadata and parsing state

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FileId, FileRecord, ParsingState};

/// Trait for persisting files and their parsing state
///
/// Implementations:
/// - `SqliteStore`: SQLite database (also implements `TextStore`)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store a new file in `pending` state
    async fn create_file(&self, filename: &str, data: &[u8]) -> Result<FileRecord>;

    /// Get file metadata
    async fn get_file(&self, file_id: FileId) -> Result<Option<FileRecord>>;

    /// Get the raw uploaded bytes
    async fn get_blob(&self, file_id: FileId) -> Result<Option<Vec<u8>>>;

    /// Get the current parsing state
    async fn get_state(&self, file_id: FileId) -> Result<Option<ParsingState>>;

    /// Move a file to `state`
    ///
    /// Returns false when the file does not exist or its current state is not
    /// a legal predecessor of `state`.
    async fn set_state(&self, file_id: FileId, state: ParsingState) -> Result<bool>;

    /// Number of files in `queued` or `parsing`
    async fn count_active(&self) -> Result<usize>;

    /// All file metadata, newest first
    async fn get_all_metadata(&self) -> Result<Vec<FileRecord>>;

    /// Delete a file and its page text
    ///
    /// Must refuse (return false) when the file is `queued` or `parsing`, in
    /// the same atomic step as the delete.
    async fn delete_file(&self, file_id: FileId) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
