//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{CategoryId, QuestionError};
use storage::sqlite::SqliteInitError;

/// Errors emitted while loading a `QuestionBank`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error("question bank has no categories")]
    Empty,
    #[error("duplicate category id: {0}")]
    DuplicateCategory(CategoryId),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error("malformed question bank: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    QuestionBank(#[from] QuestionBankError),
}
