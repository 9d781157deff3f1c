use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{
    Achievement, CategoryId, Preferences, PreferencesPatch, QuestionId, SessionData,
};
use crate::scoring;
use crate::time::calendar_days_between;

/// Completed sessions kept in `session_history`, newest first.
pub const SESSION_HISTORY_CAPACITY: usize = 30;

const ACCURACY_MASTER_MIN_ANSWERS: u32 = 20;
const ACCURACY_MASTER_RATIO: f64 = 0.9;
const CATEGORY_MASTER_MIN_ATTEMPTS: u32 = 10;
const CATEGORY_MASTER_RATIO: f64 = 0.8;
const TOP_CATEGORY_MIN_ATTEMPTS: u32 = 5;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Invariant violations found in a persisted or imported record.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("best streak ({best}) is below current streak ({current})")]
    StreakMismatch { best: u32, current: u32 },

    #[error("level must be at least 1")]
    InvalidLevel,

    #[error("duplicate achievement: {0}")]
    DuplicateAchievement(String),

    #[error("duplicate bookmark: {0}")]
    DuplicateBookmark(QuestionId),

    #[error("session history holds {len} entries (max 30)")]
    HistoryOverflow { len: usize },

    #[error("category {category}: correct ({correct}) exceeds attempted ({attempted})")]
    CategoryCorrectExceedsAttempted {
        category: CategoryId,
        correct: u32,
        attempted: u32,
    },

    #[error("category {category}: average time is not a finite non-negative number")]
    InvalidAverageTime { category: CategoryId },
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Running statistics for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    pub attempted: u32,
    pub correct: u32,
    pub last_played: DateTime<Utc>,
    pub best_score: u32,
    /// Mean seconds per answer.
    pub average_time: f64,
}

impl CategoryStat {
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            attempted: 0,
            correct: 0,
            last_played: now,
            best_score: 0,
            average_time: 0.0,
        }
    }

    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        if self.attempted == 0 {
            return None;
        }
        Some(f64::from(self.correct) / f64::from(self.attempted))
    }

    fn record(&mut self, is_correct: bool, time_spent_secs: f64, now: DateTime<Utc>) {
        self.attempted = self.attempted.saturating_add(1);
        if is_correct {
            self.correct = self.correct.saturating_add(1);
        }
        self.last_played = now;
        let n = f64::from(self.attempted);
        self.average_time = (self.average_time * (n - 1.0) + time_spent_secs) / n;
    }
}

/// Once-per-day challenge state. `date` is `None` until the first completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChallenge {
    #[serde(default, deserialize_with = "lenient_challenge_date")]
    pub date: Option<NaiveDate>,
    pub completed: bool,
    pub score: u32,
    pub time_spent: f64,
}

/// Accepts `YYYY-MM-DD` or the `Mon Oct 19 2026` form; anything else reads as no date.
fn lenient_challenge_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(parse_challenge_date))
}

fn parse_challenge_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%a %b %d %Y"))
        .ok()
}

/// How the streak moved when a new day was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    Unchanged,
    Extended { streak: u32 },
    Reset { previous: u32 },
}

/// Result of recording a single answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub xp_awarded: u64,
    pub leveled_up: bool,
    pub unlocked: Vec<Achievement>,
}

/// Read-only summary for share cards and dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareableStats {
    pub level: u32,
    pub xp: u64,
    pub streak: u32,
    pub total_questions: u32,
    /// Rounded percent, 0 with no answers.
    pub accuracy: u32,
    pub achievements: usize,
    pub top_category: Option<CategoryId>,
}

/// Cumulative learning history for one local installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizProgress {
    total_questions: u32,
    correct_answers: u32,
    current_streak: u32,
    best_streak: u32,
    last_played_date: DateTime<Utc>,
    xp: u64,
    level: u32,
    achievements: Vec<Achievement>,
    category_progress: BTreeMap<CategoryId, CategoryStat>,
    bookmarked_questions: Vec<QuestionId>,
    preferences: Preferences,
    session_history: Vec<SessionData>,
    daily_challenge_progress: DailyChallenge,
    /// Day the streak was last evaluated, so repeated launches on one day count once.
    #[serde(default)]
    streak_checked_on: Option<NaiveDate>,
}

impl QuizProgress {
    /// A zeroed record for a first launch.
    #[must_use]
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            total_questions: 0,
            correct_answers: 0,
            current_streak: 0,
            best_streak: 0,
            last_played_date: now,
            xp: 0,
            level: 1,
            achievements: Vec::new(),
            category_progress: BTreeMap::new(),
            bookmarked_questions: Vec::new(),
            preferences: Preferences::default(),
            session_history: Vec::new(),
            daily_challenge_progress: DailyChallenge::default(),
            streak_checked_on: None,
        }
    }

    /// Parse a persisted record and check its invariants.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::Json` on malformed input and `ImportError::Invalid` when
    /// the record breaks an invariant.
    pub fn from_json(json: &str) -> Result<Self, crate::model::ImportError> {
        let progress: Self = serde_json::from_str(json)?;
        progress.validate()?;
        Ok(progress)
    }

    /// Check the record invariants.
    ///
    /// # Errors
    ///
    /// Returns the first `ProgressError` found.
    pub fn validate(&self) -> Result<(), ProgressError> {
        if self.correct_answers > self.total_questions {
            return Err(ProgressError::CorrectExceedsTotal {
                correct: self.correct_answers,
                total: self.total_questions,
            });
        }
        if self.best_streak < self.current_streak {
            return Err(ProgressError::StreakMismatch {
                best: self.best_streak,
                current: self.current_streak,
            });
        }
        if self.level == 0 {
            return Err(ProgressError::InvalidLevel);
        }
        for (i, achievement) in self.achievements.iter().enumerate() {
            if self.achievements[..i].contains(achievement) {
                return Err(ProgressError::DuplicateAchievement(achievement.id()));
            }
        }
        for (i, id) in self.bookmarked_questions.iter().enumerate() {
            if self.bookmarked_questions[..i].contains(id) {
                return Err(ProgressError::DuplicateBookmark(id.clone()));
            }
        }
        if self.session_history.len() > SESSION_HISTORY_CAPACITY {
            return Err(ProgressError::HistoryOverflow {
                len: self.session_history.len(),
            });
        }
        for (category, stat) in &self.category_progress {
            if stat.correct > stat.attempted {
                return Err(ProgressError::CategoryCorrectExceedsAttempted {
                    category: category.clone(),
                    correct: stat.correct,
                    attempted: stat.attempted,
                });
            }
            if !stat.average_time.is_finite() || stat.average_time < 0.0 {
                return Err(ProgressError::InvalidAverageTime {
                    category: category.clone(),
                });
            }
        }
        Ok(())
    }

    // ─── Mutations ─────────────────────────────────────────────────────────────

    /// Compare `last_played_date` with `now` by calendar day and move the streak.
    ///
    /// Only the first check on a given calendar day has any effect.
    pub fn check_streak_continuity(&mut self, now: DateTime<Utc>) -> StreakChange {
        let today = now.date_naive();
        if self.streak_checked_on == Some(today) {
            return StreakChange::Unchanged;
        }
        self.streak_checked_on = Some(today);

        match calendar_days_between(self.last_played_date, now) {
            1 => {
                self.current_streak = self.current_streak.saturating_add(1);
                self.best_streak = self.best_streak.max(self.current_streak);
                StreakChange::Extended {
                    streak: self.current_streak,
                }
            }
            gap if gap >= 2 => {
                let previous = self.current_streak;
                self.current_streak = 0;
                StreakChange::Reset { previous }
            }
            _ => StreakChange::Unchanged,
        }
    }

    /// Record one answer against the record and the open session.
    ///
    /// Negative or non-finite times are counted as zero seconds.
    pub fn record_answer(
        &mut self,
        session: &mut SessionData,
        category: &CategoryId,
        is_correct: bool,
        time_spent_secs: f64,
        now: DateTime<Utc>,
    ) -> AnswerOutcome {
        let time_spent_secs = if time_spent_secs.is_finite() && time_spent_secs >= 0.0 {
            time_spent_secs
        } else {
            0.0
        };
        let mut unlocked = Vec::new();

        self.total_questions = self.total_questions.saturating_add(1);
        if is_correct {
            self.correct_answers = self.correct_answers.saturating_add(1);
        }
        session.count_answer(is_correct);

        let xp_awarded =
            scoring::xp_award(is_correct, time_spent_secs, self.current_streak, session);
        self.xp = self.xp.saturating_add(xp_awarded);
        session.xp_earned = session.xp_earned.saturating_add(xp_awarded);
        let leveled_up = self.check_level_up(&mut unlocked);

        self.category_progress
            .entry(category.clone())
            .or_insert_with(|| CategoryStat::new(now))
            .record(is_correct, time_spent_secs, now);

        session.touch_category(category);
        session.duration += time_spent_secs;
        self.last_played_date = now;

        self.check_achievements(&mut unlocked);

        AnswerOutcome {
            xp_awarded,
            leveled_up,
            unlocked,
        }
    }

    /// Toggle `id` in the bookmarks. Returns whether it is bookmarked afterwards.
    pub fn toggle_bookmark(&mut self, id: &QuestionId) -> bool {
        if let Some(pos) = self.bookmarked_questions.iter().position(|b| b == id) {
            self.bookmarked_questions.remove(pos);
            false
        } else {
            self.bookmarked_questions.push(id.clone());
            true
        }
    }

    pub fn update_preferences(&mut self, patch: PreferencesPatch) {
        self.preferences.apply(patch);
    }

    /// Complete today's challenge. `None` when it was already completed on `today`.
    pub fn complete_daily_challenge(
        &mut self,
        today: NaiveDate,
        score: u32,
        time_spent_secs: f64,
    ) -> Option<Vec<Achievement>> {
        if self.daily_challenge_progress.date == Some(today) {
            return None;
        }

        self.daily_challenge_progress = DailyChallenge {
            date: Some(today),
            completed: true,
            score,
            time_spent: time_spent_secs,
        };

        let mut unlocked = Vec::new();
        self.xp = self.xp.saturating_add(scoring::DAILY_CHALLENGE_XP);
        self.check_level_up(&mut unlocked);
        if self.unlock(Achievement::DailyChallenge) {
            unlocked.push(Achievement::DailyChallenge);
        }
        Some(unlocked)
    }

    /// Prepend a finished session to the history, evicting the oldest past capacity.
    ///
    /// Sessions without answers are ignored; returns whether it was stored.
    pub fn push_session(&mut self, session: SessionData) -> bool {
        if !session.has_answers() {
            return false;
        }
        self.session_history.insert(0, session);
        self.session_history.truncate(SESSION_HISTORY_CAPACITY);
        true
    }

    /// Add `achievement` if missing. Returns true when it was newly added.
    pub fn unlock(&mut self, achievement: Achievement) -> bool {
        if self.achievements.contains(&achievement) {
            return false;
        }
        self.achievements.push(achievement);
        true
    }

    fn check_level_up(&mut self, unlocked: &mut Vec<Achievement>) -> bool {
        if !scoring::qualifies_for_next_level(self.xp, self.level) {
            return false;
        }
        self.level = self.level.saturating_add(1);
        if self.unlock(Achievement::LevelUp) {
            unlocked.push(Achievement::LevelUp);
        }
        true
    }

    fn check_achievements(&mut self, unlocked: &mut Vec<Achievement>) {
        let mut candidates = Vec::new();

        if self.correct_answers == 1 {
            candidates.push(Achievement::FirstCorrect);
        }
        candidates.extend(Achievement::for_question_count(self.total_questions));
        candidates.extend(Achievement::for_streak(self.current_streak));

        if self.total_questions >= ACCURACY_MASTER_MIN_ANSWERS
            && self.accuracy().is_some_and(|acc| acc >= ACCURACY_MASTER_RATIO)
        {
            candidates.push(Achievement::AccuracyMaster);
        }

        candidates.extend(
            self.category_progress
                .iter()
                .filter(|(_, stat)| {
                    stat.attempted >= CATEGORY_MASTER_MIN_ATTEMPTS
                        && stat
                            .accuracy()
                            .is_some_and(|acc| acc >= CATEGORY_MASTER_RATIO)
                })
                .map(|(category, _)| Achievement::CategoryMaster(category.clone())),
        );

        for achievement in candidates {
            if self.unlock(achievement.clone()) {
                unlocked.push(achievement);
            }
        }
    }

    // ─── Queries ───────────────────────────────────────────────────────────────

    /// Overall fraction of correct answers, `None` before the first answer.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        if self.total_questions == 0 {
            return None;
        }
        Some(f64::from(self.correct_answers) / f64::from(self.total_questions))
    }

    /// Best-accuracy category among those with enough attempts; ties keep the first id.
    #[must_use]
    pub fn top_category(&self) -> Option<&CategoryId> {
        let mut best: Option<(&CategoryId, f64)> = None;
        for (category, stat) in &self.category_progress {
            if stat.attempted < TOP_CATEGORY_MIN_ATTEMPTS {
                continue;
            }
            let score = stat.accuracy().unwrap_or(0.0);
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((category, score));
            }
        }
        best.map(|(category, _)| category)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn shareable_stats(&self) -> ShareableStats {
        let accuracy = self
            .accuracy()
            .map_or(0, |acc| (acc * 100.0).round() as u32);
        ShareableStats {
            level: self.level,
            xp: self.xp,
            streak: self.current_streak,
            total_questions: self.total_questions,
            accuracy,
            achievements: self.achievements.len(),
            top_category: self.top_category().cloned(),
        }
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    #[must_use]
    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }

    #[must_use]
    pub fn last_played_date(&self) -> DateTime<Utc> {
        self.last_played_date
    }

    #[must_use]
    pub fn xp(&self) -> u64 {
        self.xp
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    #[must_use]
    pub fn has_achievement(&self, achievement: &Achievement) -> bool {
        self.achievements.contains(achievement)
    }

    #[must_use]
    pub fn category_progress(&self) -> &BTreeMap<CategoryId, CategoryStat> {
        &self.category_progress
    }

    #[must_use]
    pub fn category(&self, id: &CategoryId) -> Option<&CategoryStat> {
        self.category_progress.get(id)
    }

    #[must_use]
    pub fn bookmarked_questions(&self) -> &[QuestionId] {
        &self.bookmarked_questions
    }

    #[must_use]
    pub fn is_bookmarked(&self, id: &QuestionId) -> bool {
        self.bookmarked_questions.contains(id)
    }

    #[must_use]
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    #[must_use]
    pub fn session_history(&self) -> &[SessionData] {
        &self.session_history
    }

    #[must_use]
    pub fn daily_challenge(&self) -> &DailyChallenge {
        &self.daily_challenge_progress
    }
}
