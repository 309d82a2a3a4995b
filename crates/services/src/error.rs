//! Shared error types for the services crate.

use thiserror::Error;

use speech_core::model::{ChapterNumber, WordId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("patient not found")]
    PatientNotFound,
    #[error("chapter {0} not found")]
    ChapterNotFound(ChapterNumber),
    #[error("word {word:?} not found in chapter {chapter}")]
    WordNotFound { chapter: ChapterNumber, word: String },
    #[error("word {0} is not part of the curriculum")]
    UnknownWord(WordId),
    #[error(transparent)]
    Model(#[from] speech_core::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProgressError {
    /// True for lookups that did not resolve for the caller's scope.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ProgressError::PatientNotFound
                | ProgressError::ChapterNotFound(_)
                | ProgressError::WordNotFound { .. }
                | ProgressError::UnknownWord(_)
        )
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
