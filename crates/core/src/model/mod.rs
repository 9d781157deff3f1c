mod achievement;
mod export;
mod ids;
mod preferences;
mod progress;
mod question;
mod session;

pub use achievement::{Achievement, AchievementParseError};
pub use export::{ImportError, ProgressExport};
pub use ids::{CategoryId, ParseIdError, QuestionId};
pub use preferences::{Preferences, PreferencesPatch};
pub use progress::{
    AnswerOutcome, CategoryStat, DailyChallenge, ProgressError, QuizProgress,
    SESSION_HISTORY_CAPACITY, ShareableStats, StreakChange,
};
pub use question::{Category, Difficulty, Question, QuestionError};
pub use session::SessionData;
