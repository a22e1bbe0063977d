//! File record and parsing state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier assigned to a file by the state store
pub type FileId = i64;

/// Parsing state of an uploaded file
///
/// Files move along `pending -> queued -> parsing -> {done, failed}`. The only
/// backwards edge is `queued -> pending`, taken when a scheduled job never
/// reached a worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParsingState {
    /// Stored, not scheduled
    Pending,
    /// Admitted and handed to the dispatcher
    Queued,
    /// A worker is extracting text
    Parsing,
    /// Extraction finished (indexing may have partially failed)
    Done,
    /// Extraction raised an unrecovered error or timed out
    Failed,
}

impl ParsingState {
    /// All states in chain order
    pub const ALL: [ParsingState; 5] = [
        ParsingState::Pending,
        ParsingState::Queued,
        ParsingState::Parsing,
        ParsingState::Done,
        ParsingState::Failed,
    ];

    /// String form stored in the database and returned to callers
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsingState::Pending => "pending",
            ParsingState::Queued => "queued",
            ParsingState::Parsing => "parsing",
            ParsingState::Done => "done",
            ParsingState::Failed => "failed",
        }
    }

    /// Counted against the admission limit
    pub fn is_active(&self) -> bool {
        matches!(self, ParsingState::Queued | ParsingState::Parsing)
    }

    /// No further transitions leave this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ParsingState::Done | ParsingState::Failed)
    }

    /// States from which a file may move into `self`
    ///
    /// Skipping forward is allowed (a best-effort `parsing` write may be lost),
    /// moving backwards is not, except `queued -> pending`.
    pub fn predecessors(&self) -> &'static [ParsingState] {
        match self {
            ParsingState::Pending => &[ParsingState::Queued],
            ParsingState::Queued => &[ParsingState::Pending],
            ParsingState::Parsing => &[ParsingState::Queued],
            ParsingState::Done | ParsingState::Failed => {
                &[ParsingState::Queued, ParsingState::Parsing]
            }
        }
    }

    /// Whether `prev -> self` is a legal transition
    pub fn can_follow(&self, prev: ParsingState) -> bool {
        self.predecessors().contains(&prev)
    }
}

impl fmt::Display for ParsingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParsingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ParsingState::Pending),
            "queued" => Ok(ParsingState::Queued),
            "parsing" => Ok(ParsingState::Parsing),
            "done" => Ok(ParsingState::Done),
            "failed" => Ok(ParsingState::Failed),
            other => Err(format!("unknown parsing state '{}'", other)),
        }
    }
}

/// Metadata of an uploaded file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    /// Store-assigned identifier
    pub id: FileId,
    /// Original filename as uploaded
    pub filename: String,
    /// File size in bytes
    pub file_size: u64,
    /// When the file was uploaded
    pub created_at: DateTime<Utc>,
    /// Current parsing state
    pub parsing_state: ParsingState,
}

/// Extracted text of one page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageText {
    pub file_id: FileId,
    /// 1-based page number
    pub page_number: u32,
    pub text: String,
}

/// Result of an upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadOutcome {
    pub file_id: FileId,
    pub filename: String,
    pub file_size: u64,
    /// False when the dispatcher refused the job and the file went back to pending
    pub scheduled: bool,
}
