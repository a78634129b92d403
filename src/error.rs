//! Error types for the phrase scheduler
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::corpus::{PhraseId, WordId};

/// All error types that can occur while scheduling phrases
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Phrase id is not part of the corpus
    #[error("Phrase not found: {0}")]
    PhraseNotFound(PhraseId),

    /// Word id is not part of the corpus
    #[error("Word not found: {0}")]
    WordNotFound(WordId),

    /// Exposure target is not a word of the phrase
    #[error("Word {word} is not part of phrase {phrase}")]
    InvalidTarget { phrase: PhraseId, word: WordId },

    /// Corpus has nothing to schedule from
    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    /// Missing or invalid settings
    #[error("Config error: {0}")]
    Config(String),

    /// Concurrent write for the same user; retry the whole select-then-commit
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Corpus table could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),
}

impl SchedulerError {
    /// Whether the caller should re-run the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulerError::Conflict(_))
    }
}

impl From<rusqlite::Error> for SchedulerError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                SchedulerError::Conflict(err.to_string())
            }
            _ => SchedulerError::Sqlite(err),
        }
    }
}

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;
