//! Extraction job handed from admission to the worker pool

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::ingestion::CancelFlag;
use crate::types::FileId;

/// A file waiting for or undergoing extraction
///
/// Not persisted. Cloning is cheap; the bytes are shared.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub file_id: FileId,
    pub filename: String,
    pub data: Arc<[u8]>,
    pub submitted_at: DateTime<Utc>,
    /// Raised when extraction outlives its timeout or the job task panics
    pub cancel: CancelFlag,
}

impl ExtractionJob {
    pub fn new(file_id: FileId, filename: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_id,
            filename: filename.into(),
            data: data.into(),
            submitted_at: Utc::now(),
            cancel: CancelFlag::default(),
        }
    }
}
