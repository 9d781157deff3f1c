use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use quiz_core::model::{
    Achievement, CategoryId, Difficulty, PreferencesPatch, QuestionId, SESSION_HISTORY_CAPACITY,
};
use quiz_core::time::fixed_now;
use services::{
    Clock, DEVICE_ID_KEY, PROGRESS_BACKUP_KEY, PROGRESS_KEY, ProgressTracker, SESSION_KEY,
};
use storage::repository::{InMemoryStore, KeyValueStore, Storage, StorageError};

fn in_memory_stores() -> (Storage, InMemoryStore, InMemoryStore) {
    let durable = InMemoryStore::new();
    let session = InMemoryStore::new();
    let storage = Storage::new(Arc::new(durable.clone()), Arc::new(session.clone()));
    (storage, durable, session)
}

fn rust() -> CategoryId {
    CategoryId::new("rust")
}

fn q(n: u32) -> QuestionId {
    QuestionId::new(format!("rs{n}"))
}

/// Store whose every call fails, to exercise the fall-back paths.
struct BrokenStore;

#[async_trait]
impl KeyValueStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Connection("disk unplugged".into()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk unplugged".into()))
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk unplugged".into()))
    }
}

/// Wraps a store and fails the next `failures` reads of one key.
struct FlakyReads {
    inner: InMemoryStore,
    key: &'static str,
    failures: AtomicUsize,
}

impl FlakyReads {
    fn new(inner: &InMemoryStore, key: &'static str, failures: usize) -> Self {
        Self {
            inner: inner.clone(),
            key,
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyReads {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if key == self.key
            && self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(StorageError::Connection("read timed out".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
}

fn flaky_storage(durable: &InMemoryStore, key: &'static str) -> Storage {
    Storage::new(
        Arc::new(FlakyReads::new(durable, key, 1)),
        Arc::new(InMemoryStore::new()),
    )
}

async fn play_twenty(storage: &Storage) {
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), storage).await;
    for n in 1..=20 {
        tracker.record_answer(&q(n), &rust(), n % 4 != 0, 3.0).await;
    }
}

#[tokio::test]
async fn fresh_tracker_starts_empty_and_keeps_device_id() {
    let (storage, durable, _) = in_memory_stores();
    let tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;

    let progress = tracker.progress();
    assert_eq!(progress.total_questions(), 0);
    assert_eq!(progress.level(), 1);
    assert!(tracker.device_id().starts_with("device_"));
    assert_eq!(
        durable.get(DEVICE_ID_KEY).await.unwrap().as_deref(),
        Some(tracker.device_id())
    );

    let reloaded = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    assert_eq!(reloaded.device_id(), tracker.device_id());
}

#[tokio::test]
async fn ten_fast_correct_answers_unlock_quiz_starter() {
    let (storage, _, _) = in_memory_stores();
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;

    for n in 1..=10 {
        tracker.record_answer(&q(n), &rust(), true, 3.0).await;
    }

    let progress = tracker.progress();
    assert_eq!(progress.total_questions(), 10);
    assert_eq!(progress.correct_answers(), 10);
    assert!(progress.xp() >= 155);
    assert!(progress.has_achievement(&Achievement::QuizStarter));
    assert_eq!(tracker.current_session().questions_answered, 10);
}

#[tokio::test]
async fn answers_are_persisted_after_every_call() {
    let (storage, durable, session) = in_memory_stores();
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;

    tracker.record_answer(&q(1), &rust(), false, 12.0).await;
    assert!(durable.get(PROGRESS_KEY).await.unwrap().is_some());
    assert!(session.get(SESSION_KEY).await.unwrap().is_some());

    let reloaded = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    assert_eq!(reloaded.progress(), tracker.progress());
    assert_eq!(reloaded.current_session(), tracker.current_session());
    assert_eq!(reloaded.progress().xp(), 5);
}

#[tokio::test]
async fn streak_follows_calendar_days_between_launches() {
    let (storage, _, _) = in_memory_stores();
    let mut clock = Clock::fixed(fixed_now());

    let mut tracker = ProgressTracker::load(clock, &storage).await;
    tracker.record_answer(&q(1), &rust(), true, 4.0).await;

    for expected in 1..=3 {
        clock.advance(Duration::days(1));
        let mut tracker = ProgressTracker::load(clock, &storage).await;
        let progress = tracker.progress();
        assert_eq!(progress.current_streak(), expected);
        assert!(progress.best_streak() >= progress.current_streak());
        tracker.record_answer(&q(2), &rust(), true, 4.0).await;
    }

    let progress = ProgressTracker::load(clock, &storage).await.progress();
    assert!(progress.has_achievement(&Achievement::Streak3));

    clock.advance(Duration::days(3));
    let tracker = ProgressTracker::load(clock, &storage).await;
    let progress = tracker.progress();
    assert_eq!(progress.current_streak(), 0);
    assert_eq!(progress.best_streak(), 3);
}

#[tokio::test]
async fn bookmark_twice_restores_previous_state() {
    let (storage, _, _) = in_memory_stores();
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    let before = tracker.progress().bookmarked_questions().to_vec();

    assert!(tracker.bookmark_question(&q(4)).await);
    assert!(!tracker.bookmark_question(&q(4)).await);
    assert_eq!(tracker.progress().bookmarked_questions(), before.as_slice());
}

#[tokio::test]
async fn daily_challenge_counts_once_per_day() {
    let (storage, _, _) = in_memory_stores();
    let mut clock = Clock::fixed(fixed_now());
    let mut tracker = ProgressTracker::load(clock, &storage).await;

    assert!(tracker.complete_daily_challenge(80, 45.0).await);
    let xp = tracker.progress().xp();
    assert_eq!(xp, 50);
    assert!(!tracker.complete_daily_challenge(100, 10.0).await);
    assert_eq!(tracker.progress().xp(), xp);
    assert!(tracker.progress().has_achievement(&Achievement::DailyChallenge));

    clock.advance(Duration::days(1));
    let mut tomorrow = ProgressTracker::load(clock, &storage).await;
    assert!(tomorrow.complete_daily_challenge(90, 30.0).await);
    assert_eq!(tomorrow.progress().xp(), 100);
}

#[tokio::test]
async fn end_session_moves_session_into_bounded_history() {
    let (storage, _, _) = in_memory_stores();
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;

    assert!(!tracker.end_session().await);
    assert!(tracker.progress().session_history().is_empty());

    for round in 0..(SESSION_HISTORY_CAPACITY + 5) {
        tracker.record_answer(&q(1), &rust(), round % 2 == 0, 8.0).await;
        assert!(tracker.end_session().await);
        assert!(tracker.progress().session_history().len() <= SESSION_HISTORY_CAPACITY);
    }

    let progress = tracker.progress();
    assert_eq!(progress.session_history().len(), SESSION_HISTORY_CAPACITY);
    assert_eq!(tracker.current_session().questions_answered, 0);
    assert_eq!(progress.session_history()[0].questions_answered, 1);
}

#[tokio::test]
async fn preferences_are_merged_and_persisted() {
    let (storage, _, _) = in_memory_stores();
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;

    tracker
        .update_preferences(PreferencesPatch {
            difficulty: Some(Difficulty::Hard),
            haptic_enabled: Some(false),
            ..PreferencesPatch::new()
        })
        .await;

    let reloaded = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    let prefs = reloaded.progress().preferences().clone();
    assert_eq!(prefs.difficulty, Difficulty::Hard);
    assert!(!prefs.haptic_enabled);
    assert!(prefs.sound_enabled);
}

#[tokio::test]
async fn clear_progress_resets_state_but_keeps_device() {
    let (storage, durable, session) = in_memory_stores();
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    tracker.record_answer(&q(1), &rust(), true, 2.0).await;
    let device = tracker.device_id().to_owned();

    tracker.clear_progress().await;

    assert_eq!(tracker.progress().total_questions(), 0);
    assert_eq!(tracker.current_session().questions_answered, 0);
    assert_eq!(durable.get(PROGRESS_KEY).await.unwrap(), None);
    assert_eq!(session.get(SESSION_KEY).await.unwrap(), None);
    assert_eq!(durable.get(DEVICE_ID_KEY).await.unwrap(), Some(device));
}

#[tokio::test]
async fn export_then_import_restores_state() {
    let (storage, _, _) = in_memory_stores();
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    for n in 1..=6 {
        tracker.record_answer(&q(n), &rust(), n != 3, 6.0).await;
    }
    tracker.bookmark_question(&q(2)).await;
    tracker.end_session().await;

    let snapshot = tracker.progress();
    let exported = tracker.export_progress().unwrap();
    assert!(exported.contains(tracker.device_id()));

    tracker.clear_progress().await;
    assert!(tracker.import_progress(&exported).await);
    assert_eq!(tracker.progress(), snapshot);

    let (other_storage, _, _) = in_memory_stores();
    let mut other = ProgressTracker::load(Clock::fixed(fixed_now()), &other_storage).await;
    assert!(other.import_progress(&exported).await);
    assert_eq!(other.progress(), snapshot);
}

#[tokio::test]
async fn malformed_import_leaves_state_untouched() {
    let (storage, _, _) = in_memory_stores();
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    tracker.record_answer(&q(1), &rust(), true, 2.0).await;
    let before = tracker.progress();

    assert!(!tracker.import_progress("{ not json").await);
    assert!(!tracker.import_progress(r#"{"deviceId":"abc"}"#).await);
    assert!(!tracker.import_progress(r#"{"progress":{"xp":1}}"#).await);
    assert_eq!(tracker.progress(), before);
}

#[tokio::test]
async fn corrupted_stored_progress_falls_back_to_fresh_without_losing_it() {
    let (storage, durable, _) = in_memory_stores();
    let raw = "{ definitely not progress";
    durable.set(PROGRESS_KEY, raw).await.unwrap();

    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    assert_eq!(tracker.progress().total_questions(), 0);
    assert_eq!(durable.get(PROGRESS_KEY).await.unwrap().as_deref(), Some(raw));
    assert_eq!(durable.get(PROGRESS_BACKUP_KEY).await.unwrap(), None);

    tracker.record_answer(&q(1), &rust(), true, 2.0).await;
    assert_eq!(
        durable.get(PROGRESS_BACKUP_KEY).await.unwrap().as_deref(),
        Some(raw)
    );
    let reloaded = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    assert_eq!(reloaded.progress().total_questions(), 1);
}

#[tokio::test]
async fn failed_read_at_launch_leaves_stored_progress_alone() {
    let (storage, durable, _) = in_memory_stores();
    play_twenty(&storage).await;
    let stored = durable.get(PROGRESS_KEY).await.unwrap();

    let glitchy = flaky_storage(&durable, PROGRESS_KEY);
    let tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &glitchy).await;
    assert_eq!(tracker.progress().total_questions(), 0);
    assert_eq!(durable.get(PROGRESS_KEY).await.unwrap(), stored);

    let reloaded = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    assert_eq!(reloaded.progress().total_questions(), 20);
}

#[tokio::test]
async fn playing_after_a_failed_read_backs_up_the_previous_record() {
    let (storage, durable, _) = in_memory_stores();
    play_twenty(&storage).await;

    let glitchy = flaky_storage(&durable, PROGRESS_KEY);
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &glitchy).await;
    tracker.record_answer(&q(1), &rust(), true, 2.0).await;

    let backup = durable.get(PROGRESS_BACKUP_KEY).await.unwrap().unwrap();
    let previous = quiz_core::model::QuizProgress::from_json(&backup).unwrap();
    assert_eq!(previous.total_questions(), 20);
    let reloaded = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    assert_eq!(reloaded.progress().total_questions(), 1);
}

#[tokio::test]
async fn failed_device_id_read_does_not_replace_it() {
    let (storage, durable, _) = in_memory_stores();
    let original = ProgressTracker::load(Clock::fixed(fixed_now()), &storage)
        .await
        .device_id()
        .to_owned();

    let glitchy = flaky_storage(&durable, DEVICE_ID_KEY);
    let _ = ProgressTracker::load(Clock::fixed(fixed_now()), &glitchy).await;
    assert_eq!(
        durable.get(DEVICE_ID_KEY).await.unwrap().as_deref(),
        Some(original.as_str())
    );
}

#[tokio::test]
async fn storage_failures_never_block_mutations() {
    let broken: Arc<dyn KeyValueStore> = Arc::new(BrokenStore);
    let storage = Storage::new(Arc::clone(&broken), broken);
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;

    tracker.record_answer(&q(1), &rust(), true, 2.0).await;
    tracker.bookmark_question(&q(1)).await;
    assert!(tracker.complete_daily_challenge(70, 20.0).await);
    assert!(tracker.end_session().await);
    tracker.clear_progress().await;

    assert_eq!(tracker.progress().total_questions(), 0);
    assert!(tracker.device_id().starts_with("device_"));
}

#[tokio::test]
async fn listener_hears_each_unlock_once() {
    let (storage, _, _) = in_memory_stores();
    let mut tracker = ProgressTracker::load(Clock::fixed(fixed_now()), &storage).await;
    let heard: Arc<Mutex<Vec<Achievement>>> = Arc::default();
    let sink = Arc::clone(&heard);
    tracker.set_achievement_listener(Box::new(move |a| {
        sink.lock().unwrap().push(a.clone());
    }));

    for n in 1..=12 {
        tracker.record_answer(&q(n), &rust(), true, 1.0).await;
    }

    let heard = heard.lock().unwrap();
    assert_eq!(
        heard.iter().filter(|a| **a == Achievement::FirstCorrect).count(),
        1
    );
    assert_eq!(
        heard.iter().filter(|a| **a == Achievement::QuizStarter).count(),
        1
    );
    assert!(heard.contains(&Achievement::CategoryMaster(rust())));
    assert_eq!(heard.len(), tracker.progress().achievements().len());
}
