//! SQLite database for file state and page text
//!
//! One connection guarded by a mutex backs both the `StateStore` and the
//! `TextStore`. Page rows cascade with their file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{StateStore, TextStore};
use crate::types::{FileId, FileRecord, PageText, ParsingState};

/// SQLite-based state and text store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Store(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Store(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            PRAGMA temp_store=MEMORY;
        "#).map_err(|e| Error::Store(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL UNIQUE,
                file_size INTEGER NOT NULL,
                data BLOB NOT NULL,
                parsing_state TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_parsing_state ON files(parsing_state);

            CREATE TABLE IF NOT EXISTS file_text (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL,
                page_number INTEGER NOT NULL,
                text TEXT NOT NULL,
                FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE,
                UNIQUE(file_id, page_number)
            );

            CREATE INDEX IF NOT EXISTS idx_file_text_file_id ON file_text(file_id);
        "#)
        .map_err(|e| Error::Store(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    // ==================== File Operations ====================

    /// Insert a new file in `pending` state
    pub fn insert_file(&self, filename: &str, data: &[u8]) -> Result<FileRecord> {
        let conn = self.conn.lock();
        let created_at = Utc::now();

        conn.execute(
            r#"
            INSERT INTO files (filename, file_size, data, parsing_state, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                filename,
                data.len() as i64,
                data,
                ParsingState::Pending.as_str(),
                created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| match &e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                Error::Validation(format!("File '{}' already exists", filename))
            }
            _ => Error::Store(format!("Failed to insert file: {}", e)),
        })?;

        Ok(FileRecord {
            id: conn.last_insert_rowid(),
            filename: filename.to_string(),
            file_size: data.len() as u64,
            created_at,
            parsing_state: ParsingState::Pending,
        })
    }

    /// Get a file record by id
    pub fn file_record(&self, file_id: FileId) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT id, filename, file_size, parsing_state, created_at FROM files WHERE id = ?1",
            params![file_id],
            row_to_file_record,
        )
        .optional()
        .map_err(|e| Error::Store(format!("Failed to get file: {}", e)))
    }

    /// Get the stored bytes of a file
    pub fn file_blob(&self, file_id: FileId) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT data FROM files WHERE id = ?1",
            params![file_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::Store(format!("Failed to get file data: {}", e)))
    }

    /// Get the parsing state of a file
    pub fn parsing_state(&self, file_id: FileId) -> Result<Option<ParsingState>> {
        let conn = self.conn.lock();

        let state: Option<String> = conn
            .query_row(
                "SELECT parsing_state FROM files WHERE id = ?1",
                params![file_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Store(format!("Failed to get parsing state: {}", e)))?;

        state
            .map(|s| s.parse::<ParsingState>().map_err(Error::Store))
            .transpose()
    }

    /// Move a file to `state` if its current state is a legal predecessor
    ///
    /// The guard runs inside the UPDATE so a concurrent writer cannot slip an
    /// illegal transition between read and write.
    pub fn update_parsing_state(&self, file_id: FileId, state: ParsingState) -> Result<bool> {
        let conn = self.conn.lock();

        let preds = state.predecessors();
        let first = preds[0].as_str();
        let second = preds.get(1).unwrap_or(&preds[0]).as_str();

        let count = conn
            .execute(
                r#"
                UPDATE files SET parsing_state = ?1
                WHERE id = ?2 AND parsing_state IN (?3, ?4)
                "#,
                params![state.as_str(), file_id, first, second],
            )
            .map_err(|e| Error::Store(format!("Failed to update parsing state: {}", e)))?;

        Ok(count > 0)
    }

    /// Count files in `queued` or `parsing`
    pub fn active_count(&self) -> Result<usize> {
        let conn = self.conn.lock();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM files WHERE parsing_state IN (?1, ?2)",
                params![ParsingState::Queued.as_str(), ParsingState::Parsing.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| Error::Store(format!("Failed to count active files: {}", e)))?;

        Ok(count as usize)
    }

    /// List all file records, newest first
    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare(
                "SELECT id, filename, file_size, parsing_state, created_at FROM files ORDER BY id DESC",
            )
            .map_err(|e| Error::Store(format!("Failed to prepare query: {}", e)))?;

        let records = stmt
            .query_map([], row_to_file_record)
            .map_err(|e| Error::Store(format!("Failed to list files: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Store(format!("Failed to read file row: {}", e)))?;

        Ok(records)
    }

    /// Delete a file; its page text goes with it
    ///
    /// Files that are `queued` or `parsing` are left in place; returns false
    /// for them as for missing files.
    pub fn remove_file(&self, file_id: FileId) -> Result<bool> {
        let conn = self.conn.lock();

        let count = conn
            .execute(
                "DELETE FROM files WHERE id = ?1 AND parsing_state NOT IN (?2, ?3)",
                params![
                    file_id,
                    ParsingState::Queued.as_str(),
                    ParsingState::Parsing.as_str(),
                ],
            )
            .map_err(|e| Error::Store(format!("Failed to delete file: {}", e)))?;

        Ok(count > 0)
    }

    // ==================== Page Text Operations ====================

    /// Insert or replace one page of text
    pub fn upsert_page_text(&self, file_id: FileId, page_number: u32, text: &str) -> Result<i64> {
        let conn = self.conn.lock();

        conn.query_row(
            r#"
            INSERT INTO file_text (file_id, page_number, text)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(file_id, page_number) DO UPDATE SET
                text = excluded.text
            RETURNING id
            "#,
            params![file_id, page_number as i64, text],
            |row| row.get(0),
        )
        .map_err(|e| Error::Store(format!("Failed to upsert page {} of file {}: {}", page_number, file_id, e)))
    }

    /// Pages of a file ordered by page number
    pub fn page_texts(&self, file_id: FileId) -> Result<Vec<PageText>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare(
                "SELECT file_id, page_number, text FROM file_text WHERE file_id = ?1 ORDER BY page_number ASC",
            )
            .map_err(|e| Error::Store(format!("Failed to prepare query: {}", e)))?;

        let pages = stmt
            .query_map(params![file_id], |row| {
                let page_number: i64 = row.get(1)?;
                Ok(PageText {
                    file_id: row.get(0)?,
                    page_number: page_number as u32,
                    text: row.get(2)?,
                })
            })
            .map_err(|e| Error::Store(format!("Failed to get pages: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Store(format!("Failed to read page row: {}", e)))?;

        Ok(pages)
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn create_file(&self, filename: &str, data: &[u8]) -> Result<FileRecord> {
        self.insert_file(filename, data)
    }

    async fn get_file(&self, file_id: FileId) -> Result<Option<FileRecord>> {
        self.file_record(file_id)
    }

    async fn get_blob(&self, file_id: FileId) -> Result<Option<Vec<u8>>> {
        self.file_blob(file_id)
    }

    async fn get_state(&self, file_id: FileId) -> Result<Option<ParsingState>> {
        self.parsing_state(file_id)
    }

    async fn set_state(&self, file_id: FileId, state: ParsingState) -> Result<bool> {
        self.update_parsing_state(file_id, state)
    }

    async fn count_active(&self) -> Result<usize> {
        self.active_count()
    }

    async fn get_all_metadata(&self) -> Result<Vec<FileRecord>> {
        self.list_files()
    }

    async fn delete_file(&self, file_id: FileId) -> Result<bool> {
        self.remove_file(file_id)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[async_trait]
impl TextStore for SqliteStore {
    async fn upsert_page(&self, file_id: FileId, page_number: u32, text: &str) -> Result<i64> {
        self.upsert_page_text(file_id, page_number, text)
    }

    async fn get_pages(&self, file_id: FileId) -> Result<Vec<PageText>> {
        self.page_texts(file_id)
    }
}

// ==================== Helper Functions ====================

fn row_to_file_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    let id: i64 = row.get(0)?;
    let filename: String = row.get(1)?;
    let file_size: i64 = row.get(2)?;
    let state_str: String = row.get(3)?;
    let created_at_str: String = row.get(4)?;

    let parsing_state = state_str.parse::<ParsingState>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;

    Ok(FileRecord {
        id,
        filename,
        file_size: file_size as u64,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        parsing_state,
    })
}
