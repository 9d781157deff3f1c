use thiserror::Error;

use crate::model::{AchievementParseError, ImportError, ProgressError, QuestionError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Achievement(#[from] AchievementParseError),
}
