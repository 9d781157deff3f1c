use std::sync::Arc;

use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{debug, error, info, warn};

use quiz_core::Clock;
use quiz_core::model::{
    Achievement, AnswerOutcome, CategoryId, PreferencesPatch, ProgressExport,
    QuestionId, QuizProgress, SessionData, ShareableStats, StreakChange,
};
use storage::repository::{KeyValueStore, Storage};

/// Durable key holding the serialized `QuizProgress`.
pub const PROGRESS_KEY: &str = "quizmentor_progress";
/// Session-scoped key holding the open `SessionData`.
pub const SESSION_KEY: &str = "quizmentor_session";
/// Durable key holding the generated device identifier.
pub const DEVICE_ID_KEY: &str = "quizmentor_device_id";
/// Durable key receiving a stored record that could not be read, before it is replaced.
pub const PROGRESS_BACKUP_KEY: &str = "quizmentor_progress_backup";

/// Callback invoked once per newly unlocked achievement.
pub type AchievementListener = Box<dyn Fn(&Achievement) + Send + Sync>;

/// Where the in-memory record came from at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressSource {
    Stored,
    Missing,
    /// The key exists but could not be read or parsed; it must not be overwritten blindly.
    Unusable,
}

/// Local progress bookkeeping for one installation.
///
/// Owns the progress record and the open session, and writes both back to storage
/// after every mutation. Storage failures never reach the caller: loading falls back
/// to fresh state and saving is logged and skipped, so the in-memory record stays the
/// source of truth for the rest of the process.
pub struct ProgressTracker {
    clock: Clock,
    durable: Arc<dyn KeyValueStore>,
    session_store: Arc<dyn KeyValueStore>,
    progress: QuizProgress,
    session: SessionData,
    device_id: String,
    listener: Option<AchievementListener>,
    /// Set while the stored record is one we failed to read; cleared once it is backed up.
    guard_stored_progress: bool,
}

impl ProgressTracker {
    /// Load persisted state (or start fresh), then apply the streak-continuity check.
    ///
    /// Never fails: unreadable or missing state yields a fresh record. Storage is only
    /// written here when the record was missing or the streak check changed a stored one;
    /// an unreadable record stays untouched until it has been copied to
    /// [`PROGRESS_BACKUP_KEY`].
    pub async fn load(clock: Clock, storage: &Storage) -> Self {
        let durable = Arc::clone(&storage.durable);
        let session_store = Arc::clone(&storage.session);
        let now = clock.now();

        let (mut progress, source) = load_progress(durable.as_ref(), now).await;
        let session = load_session(session_store.as_ref(), now).await;

        let before_check = progress.clone();
        match progress.check_streak_continuity(now) {
            StreakChange::Unchanged => {}
            StreakChange::Extended { streak } => info!(streak, "streak extended"),
            StreakChange::Reset { previous } => info!(previous, "streak reset"),
        }

        let device_id = ensure_device_id(durable.as_ref(), &clock).await;
        info!(
            level = progress.level(),
            xp = progress.xp(),
            total = progress.total_questions(),
            "progress loaded"
        );

        let persist = match source {
            ProgressSource::Missing => true,
            ProgressSource::Stored => progress != before_check,
            ProgressSource::Unusable => false,
        };
        let mut tracker = Self {
            clock,
            durable,
            session_store,
            progress,
            session,
            device_id,
            listener: None,
            guard_stored_progress: source == ProgressSource::Unusable,
        };
        // Persist the streak check so a second launch today does not repeat it.
        if persist {
            tracker.save().await;
        }
        tracker
    }

    /// Install a callback fired for each achievement unlocked from now on.
    pub fn set_achievement_listener(&mut self, listener: AchievementListener) {
        self.listener = Some(listener);
    }

    /// Record one answered question.
    ///
    /// `question_id` is only used for diagnostics; scoring is per category.
    pub async fn record_answer(
        &mut self,
        question_id: &QuestionId,
        category: &CategoryId,
        is_correct: bool,
        time_spent_secs: f64,
    ) -> AnswerOutcome {
        let now = self.clock.now();
        let outcome = self.progress.record_answer(
            &mut self.session,
            category,
            is_correct,
            time_spent_secs,
            now,
        );
        debug!(
            question = %question_id,
            %category,
            is_correct,
            xp = outcome.xp_awarded,
            "answer recorded"
        );
        if outcome.leveled_up {
            info!(level = self.progress.level(), "level up");
        }
        self.notify(&outcome.unlocked);
        self.save().await;
        outcome
    }

    /// Toggle a bookmark. Returns whether the question is bookmarked afterwards.
    pub async fn bookmark_question(&mut self, id: &QuestionId) -> bool {
        let bookmarked = self.progress.toggle_bookmark(id);
        self.save().await;
        bookmarked
    }

    pub async fn update_preferences(&mut self, patch: PreferencesPatch) {
        self.progress.update_preferences(patch);
        self.save().await;
    }

    /// Complete today's challenge. Returns `false` if it was already done today.
    pub async fn complete_daily_challenge(&mut self, score: u32, time_spent_secs: f64) -> bool {
        let today = self.clock.today();
        let Some(unlocked) = self
            .progress
            .complete_daily_challenge(today, score, time_spent_secs)
        else {
            debug!(%today, "daily challenge already completed");
            return false;
        };
        info!(%today, score, "daily challenge completed");
        self.notify(&unlocked);
        self.save().await;
        true
    }

    /// Close the open session into history. Returns `false` if nothing was answered.
    pub async fn end_session(&mut self) -> bool {
        if !self.session.has_answers() {
            return false;
        }
        let finished = std::mem::replace(&mut self.session, SessionData::new(self.clock.now()));
        info!(
            answered = finished.questions_answered,
            correct = finished.correct_answers,
            xp = finished.xp_earned,
            "session ended"
        );
        self.progress.push_session(finished);
        self.save().await;
        true
    }

    /// Snapshot of the progress record.
    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        self.progress.clone()
    }

    /// Snapshot of the open session.
    #[must_use]
    pub fn current_session(&self) -> SessionData {
        self.session.clone()
    }

    #[must_use]
    pub fn shareable_stats(&self) -> ShareableStats {
        self.progress.shareable_stats()
    }

    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Forget everything except the device id.
    pub async fn clear_progress(&mut self) {
        if let Err(err) = self.durable.remove(PROGRESS_KEY).await {
            error!(error = %err, "failed to remove stored progress");
        }
        if let Err(err) = self.session_store.remove(SESSION_KEY).await {
            error!(error = %err, "failed to remove stored session");
        }
        let now = self.clock.now();
        self.progress = QuizProgress::fresh(now);
        self.session = SessionData::new(now);
        self.guard_stored_progress = false;
        info!("progress cleared");
    }

    /// Backup JSON with the record, device id and export time.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the record cannot be serialized.
    pub fn export_progress(&self) -> Result<String, serde_json::Error> {
        ProgressExport::new(self.progress.clone(), &self.device_id, self.clock.now()).to_json()
    }

    /// Replace the record from a backup. Malformed input leaves state untouched.
    pub async fn import_progress(&mut self, json: &str) -> bool {
        match ProgressExport::parse_progress(json) {
            Ok(progress) => {
                self.progress = progress;
                self.save().await;
                info!(
                    level = self.progress.level(),
                    xp = self.progress.xp(),
                    "progress imported"
                );
                true
            }
            Err(err) => {
                warn!(error = %err, "rejected progress import");
                false
            }
        }
    }

    /// Make the stored record safe to overwrite. Returns `false` while it is not.
    ///
    /// A record that failed to load is re-read and copied to [`PROGRESS_BACKUP_KEY`];
    /// if it still cannot be read, the progress write is skipped for this save.
    async fn release_stored_progress(&mut self) -> bool {
        if !self.guard_stored_progress {
            return true;
        }
        match self.durable.get(PROGRESS_KEY).await {
            Ok(None) => {}
            Ok(Some(raw)) => {
                if let Err(err) = self.durable.set(PROGRESS_BACKUP_KEY, &raw).await {
                    error!(error = %err, "failed to back up stored progress, not overwriting it");
                    return false;
                }
                warn!(key = PROGRESS_BACKUP_KEY, "previous stored progress moved to backup");
            }
            Err(err) => {
                error!(error = %err, "stored progress still unreadable, not overwriting it");
                return false;
            }
        }
        self.guard_stored_progress = false;
        true
    }

    fn notify(&self, unlocked: &[Achievement]) {
        for achievement in unlocked {
            info!(%achievement, "achievement unlocked");
            if let Some(listener) = &self.listener {
                listener(achievement);
            }
        }
    }

    async fn save(&mut self) {
        if self.release_stored_progress().await {
            match serde_json::to_string(&self.progress) {
                Ok(json) => {
                    if let Err(err) = self.durable.set(PROGRESS_KEY, &json).await {
                        error!(error = %err, "failed to save progress");
                    }
                }
                Err(err) => error!(error = %err, "failed to serialize progress"),
            }
        }
        match serde_json::to_string(&self.session) {
            Ok(json) => {
                if let Err(err) = self.session_store.set(SESSION_KEY, &json).await {
                    error!(error = %err, "failed to save session");
                }
            }
            Err(err) => error!(error = %err, "failed to serialize session"),
        }
    }
}

async fn load_progress(
    store: &dyn KeyValueStore,
    now: chrono::DateTime<chrono::Utc>,
) -> (QuizProgress, ProgressSource) {
    match store.get(PROGRESS_KEY).await {
        Ok(Some(json)) => match QuizProgress::from_json(&json) {
            Ok(progress) => (progress, ProgressSource::Stored),
            Err(err) => {
                warn!(error = %err, "stored progress unreadable, starting fresh");
                (QuizProgress::fresh(now), ProgressSource::Unusable)
            }
        },
        Ok(None) => (QuizProgress::fresh(now), ProgressSource::Missing),
        Err(err) => {
            warn!(error = %err, "failed to load progress, starting fresh");
            (QuizProgress::fresh(now), ProgressSource::Unusable)
        }
    }
}

async fn load_session(
    store: &dyn KeyValueStore,
    now: chrono::DateTime<chrono::Utc>,
) -> SessionData {
    match store.get(SESSION_KEY).await {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|err| {
            warn!(error = %err, "stored session unreadable, starting a new one");
            SessionData::new(now)
        }),
        Ok(None) => SessionData::new(now),
        Err(err) => {
            warn!(error = %err, "failed to load session, starting a new one");
            SessionData::new(now)
        }
    }
}

/// Read the device id, generating and storing one on first use.
async fn ensure_device_id(store: &dyn KeyValueStore, clock: &Clock) -> String {
    match store.get(DEVICE_ID_KEY).await {
        Ok(Some(id)) if !id.trim().is_empty() => return id,
        Ok(_) => {}
        Err(err) => {
            // The stored id may still exist; use a temporary one without replacing it.
            warn!(error = %err, "failed to read device id, using a temporary one");
            return generate_device_id(clock);
        }
    }
    let id = generate_device_id(clock);
    if let Err(err) = store.set(DEVICE_ID_KEY, &id).await {
        error!(error = %err, "failed to save device id");
    }
    id
}

fn generate_device_id(clock: &Clock) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("device_{}_{suffix}", clock.now().timestamp_millis())
}
