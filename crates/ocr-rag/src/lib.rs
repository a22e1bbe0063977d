//! ocr-rag: OCR document ingestion with hybrid dense+sparse retrieval
//!
//! Uploaded documents are stored, admitted into a bounded worker pool, and
//! run through page extraction (rasterization plus text recognition with an
//! accelerated-to-CPU fallback). Page text is persisted and indexed as dense
//! and sparse vectors, which back semantic, keyword and hybrid search.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use service::DocumentService;
pub use types::{FileId, FileRecord, HybridHit, PageText, ParsingState, SearchHit, UploadOutcome};
