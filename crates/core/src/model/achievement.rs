use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::CategoryId;

const CATEGORY_MASTER_PREFIX: &str = "master_";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AchievementParseError {
    #[error("unknown achievement id: {0}")]
    Unknown(String),
}

/// A one-time badge. Serialized as its string identifier (`first_correct`, `master_react`, ...).
///
/// Ids this build does not know deserialize into `Unrecognized` and are written back
/// unchanged, so a record from another client stays readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Achievement {
    FirstCorrect,
    QuizStarter,
    QuizEnthusiast,
    QuizMaster,
    Streak3,
    StreakWeek,
    StreakMonth,
    AccuracyMaster,
    LevelUp,
    DailyChallenge,
    CategoryMaster(CategoryId),
    Unrecognized(String),
}

impl Achievement {
    /// Stable identifier used in persisted progress.
    #[must_use]
    pub fn id(&self) -> String {
        let fixed = match self {
            Self::FirstCorrect => "first_correct",
            Self::QuizStarter => "quiz_starter",
            Self::QuizEnthusiast => "quiz_enthusiast",
            Self::QuizMaster => "quiz_master",
            Self::Streak3 => "streak_3",
            Self::StreakWeek => "streak_week",
            Self::StreakMonth => "streak_month",
            Self::AccuracyMaster => "accuracy_master",
            Self::LevelUp => "level_up",
            Self::DailyChallenge => "daily_challenge",
            Self::CategoryMaster(category) => {
                return format!("{CATEGORY_MASTER_PREFIX}{category}");
            }
            Self::Unrecognized(id) => return id.clone(),
        };
        fixed.to_owned()
    }

    /// Milestone badge for an exact answered-question count, if any.
    #[must_use]
    pub fn for_question_count(total: u32) -> Option<Self> {
        match total {
            10 => Some(Self::QuizStarter),
            50 => Some(Self::QuizEnthusiast),
            100 => Some(Self::QuizMaster),
            _ => None,
        }
    }

    /// Streak badge for an exact streak length, if any.
    #[must_use]
    pub fn for_streak(streak: u32) -> Option<Self> {
        match streak {
            3 => Some(Self::Streak3),
            7 => Some(Self::StreakWeek),
            30 => Some(Self::StreakMonth),
            _ => None,
        }
    }
}

impl fmt::Display for Achievement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for Achievement {
    type Err = AchievementParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s {
            "first_correct" => Self::FirstCorrect,
            "quiz_starter" => Self::QuizStarter,
            "quiz_enthusiast" => Self::QuizEnthusiast,
            "quiz_master" => Self::QuizMaster,
            "streak_3" => Self::Streak3,
            "streak_week" => Self::StreakWeek,
            "streak_month" => Self::StreakMonth,
            "accuracy_master" => Self::AccuracyMaster,
            "level_up" => Self::LevelUp,
            "daily_challenge" => Self::DailyChallenge,
            other => match other.strip_prefix(CATEGORY_MASTER_PREFIX) {
                Some(category) if !category.is_empty() => {
                    Self::CategoryMaster(CategoryId::new(category))
                }
                _ => return Err(AchievementParseError::Unknown(other.to_owned())),
            },
        };
        Ok(parsed)
    }
}

impl From<String> for Achievement {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(Self::Unrecognized(value))
    }
}

impl From<Achievement> for String {
    fn from(value: Achievement) -> Self {
        value.id()
    }
}
