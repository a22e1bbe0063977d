//! Core types for ingestion and retrieval

pub mod file_record;
pub mod search;

pub use file_record::{FileId, FileRecord, PageText, ParsingState, UploadOutcome};
pub use search::{HybridHit, SearchHit, SearchType};
