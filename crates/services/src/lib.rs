#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod progress_tracker;
pub mod question_bank;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, QuestionBankError};
pub use progress_tracker::{
    AchievementListener, DEVICE_ID_KEY, PROGRESS_BACKUP_KEY, PROGRESS_KEY, ProgressTracker,
    SESSION_KEY,
};
pub use question_bank::{QuestionBank, QuizItem};
