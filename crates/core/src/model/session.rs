use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::CategoryId;

/// Counters accumulated over one play session.
///
/// Lives in session-scoped storage while the session is open and is pushed onto
/// `QuizProgress::session_history` when the session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub date: DateTime<Utc>,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub categories: Vec<CategoryId>,
    pub xp_earned: u64,
    /// Seconds spent answering.
    pub duration: f64,
}

impl SessionData {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            date: started_at,
            questions_answered: 0,
            correct_answers: 0,
            categories: Vec::new(),
            xp_earned: 0,
            duration: 0.0,
        }
    }

    /// True once at least one answer has been recorded.
    #[must_use]
    pub fn has_answers(&self) -> bool {
        self.questions_answered > 0
    }

    /// Fraction of correct answers, `None` before the first answer.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        if self.questions_answered == 0 {
            return None;
        }
        Some(f64::from(self.correct_answers) / f64::from(self.questions_answered))
    }

    pub(crate) fn count_answer(&mut self, is_correct: bool) {
        self.questions_answered = self.questions_answered.saturating_add(1);
        if is_correct {
            self.correct_answers = self.correct_answers.saturating_add(1);
        }
    }

    pub(crate) fn touch_category(&mut self, category: &CategoryId) {
        if !self.categories.contains(category) {
            self.categories.push(category.clone());
        }
    }
}
