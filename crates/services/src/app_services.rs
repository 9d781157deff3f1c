use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::progress_tracker::ProgressTracker;
use crate::question_bank::QuestionBank;

/// Assembles the progress tracker and question bank for a front-end.
pub struct AppServices {
    clock: Clock,
    tracker: ProgressTracker,
    questions: Arc<QuestionBank>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the built-in question bank.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the bank is invalid.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::with_storage(&storage, clock).await
    }

    /// Build services over caller-provided storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::QuestionBank` if the built-in bank is invalid.
    pub async fn with_storage(storage: &Storage, clock: Clock) -> Result<Self, AppServicesError> {
        let questions = Arc::new(QuestionBank::builtin()?);
        let tracker = ProgressTracker::load(clock, storage).await;
        Ok(Self {
            clock,
            tracker,
            questions,
        })
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ProgressTracker {
        &mut self.tracker
    }

    #[must_use]
    pub fn questions(&self) -> Arc<QuestionBank> {
        Arc::clone(&self.questions)
    }
}
