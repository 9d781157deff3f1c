use chrono::NaiveDate;
use quiz_core::scoring::xp_for_level;
use services::{ProgressTracker, QuestionBank};

const RECENT_SESSIONS: usize = 5;

pub fn print_stats(tracker: &ProgressTracker, today: NaiveDate) {
    let stats = tracker.shareable_stats();
    let progress = tracker.progress();

    println!(
        "Level {} with {} XP (next level at {:.0})",
        stats.level,
        stats.xp,
        xp_for_level(stats.level + 1)
    );
    println!(
        "Streak {} day(s), best {}",
        stats.streak,
        progress.best_streak()
    );
    println!(
        "Answered {} question(s), {}% correct",
        stats.total_questions, stats.accuracy
    );
    if let Some(top) = &stats.top_category {
        println!("Top category: {top}");
    }

    if !progress.achievements().is_empty() {
        let ids: Vec<String> = progress.achievements().iter().map(ToString::to_string).collect();
        println!("Achievements ({}): {}", stats.achievements, ids.join(", "));
    }

    if !progress.category_progress().is_empty() {
        println!();
        println!("Categories:");
        for (id, stat) in progress.category_progress() {
            println!(
                "  {id:<12} {:>3}/{:<3} correct, avg {:.1}s",
                stat.correct, stat.attempted, stat.average_time
            );
        }
    }

    let recent = progress.session_history();
    if !recent.is_empty() {
        println!();
        println!("Recent sessions:");
        for session in recent.iter().take(RECENT_SESSIONS) {
            println!(
                "  {}  {}/{} correct, +{} XP",
                session.date.format("%Y-%m-%d %H:%M"),
                session.correct_answers,
                session.questions_answered,
                session.xp_earned
            );
        }
    }

    let daily = progress.daily_challenge();
    if daily.completed && daily.date == Some(today) {
        println!();
        println!("Daily challenge done today: {}%", daily.score);
    }
}

pub fn print_bookmarks(tracker: &ProgressTracker, bank: &QuestionBank) {
    let progress = tracker.progress();
    let bookmarks = progress.bookmarked_questions();
    if bookmarks.is_empty() {
        println!("No bookmarks yet.");
        return;
    }
    for id in bookmarks {
        match bank.find_question(id) {
            Some((category, question)) => {
                println!("{id:<6} [{}] {}", category.name, question.question);
            }
            None => println!("{id:<6} (no longer in the question bank)"),
        }
    }
}

pub fn print_preferences(tracker: &ProgressTracker) {
    let progress = tracker.progress();
    let prefs = progress.preferences();
    let on_off = |flag: bool| if flag { "on" } else { "off" };
    println!("difficulty: {}", prefs.difficulty);
    println!("sound:      {}", on_off(prefs.sound_enabled));
    println!("haptic:     {}", on_off(prefs.haptic_enabled));
    if let Some(time) = &prefs.daily_reminder_time {
        println!("reminder:   {time}");
    }
    if prefs.preferred_categories.is_empty() {
        println!("categories: all");
    } else {
        let ids: Vec<&str> = prefs.preferred_categories.iter().map(|c| c.as_str()).collect();
        println!("categories: {}", ids.join(", "));
    }
}
