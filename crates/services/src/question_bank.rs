use chrono::{Datelike, NaiveDate};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use quiz_core::model::{Category, CategoryId, Difficulty, Preferences, Question, QuestionId};

use crate::error::QuestionBankError;

const BUILTIN_BANK: &str = include_str!("../data/questions.json");

/// A question paired with the category it is scored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub category: CategoryId,
    pub question: Question,
}

/// Static, in-memory question catalogue.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    categories: Vec<Category>,
}

impl QuestionBank {
    /// Build a bank from categories, validating every question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` if there are no categories, a category id repeats,
    /// or a question is not answerable.
    pub fn new(categories: Vec<Category>) -> Result<Self, QuestionBankError> {
        if categories.is_empty() {
            return Err(QuestionBankError::Empty);
        }
        let mut seen = HashSet::new();
        for category in &categories {
            if !seen.insert(&category.id) {
                return Err(QuestionBankError::DuplicateCategory(category.id.clone()));
            }
            for question in &category.questions {
                question.validate()?;
            }
        }
        Ok(Self { categories })
    }

    /// Parse a JSON array of categories.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Json` on malformed input, or any error from `new`.
    pub fn from_json(json: &str) -> Result<Self, QuestionBankError> {
        let categories: Vec<Category> = serde_json::from_str(json)?;
        Self::new(categories)
    }

    /// The bank shipped with the binary.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` if the embedded data is invalid.
    pub fn builtin() -> Result<Self, QuestionBankError> {
        Self::from_json(BUILTIN_BANK)
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub fn category(&self, id: &CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| &c.id == id)
    }

    /// Look up a question anywhere in the bank.
    #[must_use]
    pub fn find_question(&self, id: &QuestionId) -> Option<(&Category, &Question)> {
        self.categories.iter().find_map(|category| {
            category
                .questions
                .iter()
                .find(|q| &q.id == id)
                .map(|q| (category, q))
        })
    }

    /// Up to `count` questions from one category in uniformly random order.
    #[must_use]
    pub fn random_questions<R: Rng + ?Sized>(
        &self,
        id: &CategoryId,
        count: usize,
        rng: &mut R,
    ) -> Vec<Question> {
        let Some(category) = self.category(id) else {
            return Vec::new();
        };
        if count == 0 {
            return Vec::new();
        }
        let mut questions = category.questions.clone();
        questions.shuffle(rng);
        questions.truncate(count);
        questions
    }

    /// Category of the daily challenge: the day of month modulo the category count.
    ///
    /// The same calendar date always yields the same category.
    #[must_use]
    pub fn daily_challenge(&self, date: NaiveDate) -> &Category {
        let day = usize::try_from(date.day()).unwrap_or(0);
        &self.categories[day % self.categories.len()]
    }

    #[must_use]
    pub fn questions_by_difficulty(&self, id: &CategoryId, difficulty: Difficulty) -> Vec<&Question> {
        self.category(id)
            .map(|c| {
                c.questions
                    .iter()
                    .filter(|q| q.difficulty == difficulty)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Practice set shaped by user preferences.
    ///
    /// Draws from the preferred categories (every category when none are preferred
    /// or none of them exist). Questions at the preferred difficulty come first; the
    /// set is topped up from other difficulties when too few match. Each group is
    /// shuffled independently.
    #[must_use]
    pub fn select_for_preferences<R: Rng + ?Sized>(
        &self,
        preferences: &Preferences,
        count: usize,
        rng: &mut R,
    ) -> Vec<QuizItem> {
        let preferred: Vec<&Category> = self
            .categories
            .iter()
            .filter(|c| preferences.preferred_categories.contains(&c.id))
            .collect();
        let pool: Vec<&Category> = if preferred.is_empty() {
            self.categories.iter().collect()
        } else {
            preferred
        };

        let (mut matching, mut others): (Vec<QuizItem>, Vec<QuizItem>) = pool
            .into_iter()
            .flat_map(|category| {
                category.questions.iter().map(|question| QuizItem {
                    category: category.id.clone(),
                    question: question.clone(),
                })
            })
            .partition(|item| item.question.difficulty == preferences.difficulty);

        matching.shuffle(rng);
        if matching.len() < count {
            others.shuffle(rng);
            let missing = count - matching.len();
            matching.extend(others.into_iter().take(missing));
        }
        matching.truncate(count);
        matching
    }
}
