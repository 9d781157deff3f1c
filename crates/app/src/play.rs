use std::io::{self, BufRead, Write};
use std::time::Instant;

use quiz_core::model::{CategoryId, Question};
use services::{AppServices, QuizItem};

/// What the player typed for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Choice(usize),
    Bookmark,
    Quit,
}

fn parse_reply(line: &str, option_count: usize) -> Option<Reply> {
    match line.trim() {
        "q" | "quit" => Some(Reply::Quit),
        "b" | "bookmark" => Some(Reply::Bookmark),
        raw => raw
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=option_count).contains(n))
            .map(|n| Reply::Choice(n - 1)),
    }
}

struct Tally {
    asked: u32,
    correct: u32,
    xp: u64,
}

/// Ask one round of questions, either from a single category or shaped by preferences.
pub async fn play_round(
    app: &mut AppServices,
    category: Option<CategoryId>,
    count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let bank = app.questions();
    let mut rng = rand::rng();
    let items: Vec<QuizItem> = match category {
        Some(id) => {
            if bank.category(&id).is_none() {
                return Err(format!("unknown category: {id}").into());
            }
            bank.random_questions(&id, count, &mut rng)
                .into_iter()
                .map(|question| QuizItem {
                    category: id.clone(),
                    question,
                })
                .collect()
        }
        None => {
            let preferences = app.tracker().progress().preferences().clone();
            bank.select_for_preferences(&preferences, count, &mut rng)
        }
    };

    let tally = ask_all(app, &items).await?;
    finish(app, &tally).await;
    Ok(())
}

/// Run today's challenge; refuses when it was already completed today.
pub async fn daily_challenge(app: &mut AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let today = app.clock().today();
    let progress = app.tracker().progress();
    let done = progress.daily_challenge();
    if done.completed && done.date == Some(today) {
        println!("Today's challenge is already done (score {}).", done.score);
        return Ok(());
    }

    let bank = app.questions();
    let category = bank.daily_challenge(today);
    println!("Daily challenge: {}", category.name);
    let items: Vec<QuizItem> = bank
        .random_questions(&category.id, DAILY_ROUND_SIZE, &mut rand::rng())
        .into_iter()
        .map(|question| QuizItem {
            category: category.id.clone(),
            question,
        })
        .collect();

    let started = Instant::now();
    let tally = ask_all(app, &items).await?;
    if tally.asked > 0 && usize::try_from(tally.asked).ok() == Some(items.len()) {
        let score = tally.correct * 100 / tally.asked;
        let elapsed = started.elapsed().as_secs_f64();
        if app.tracker_mut().complete_daily_challenge(score, elapsed).await {
            println!("Challenge complete: {score}% (+50 XP)");
        }
    } else {
        println!("Challenge abandoned; it stays open for today.");
    }
    finish(app, &tally).await;
    Ok(())
}

const DAILY_ROUND_SIZE: usize = 5;

async fn ask_all(
    app: &mut AppServices,
    items: &[QuizItem],
) -> Result<Tally, Box<dyn std::error::Error>> {
    let mut tally = Tally {
        asked: 0,
        correct: 0,
        xp: 0,
    };
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    'questions: for (index, item) in items.iter().enumerate() {
        render_question(index + 1, items.len(), &item.question);
        let started = Instant::now();
        let choice = loop {
            print!("> ");
            io::stdout().flush()?;
            let Some(line) = lines.next().transpose()? else {
                break 'questions;
            };
            match parse_reply(&line, item.question.options.len()) {
                Some(Reply::Choice(choice)) => break choice,
                Some(Reply::Bookmark) => {
                    let on = app.tracker_mut().bookmark_question(&item.question.id).await;
                    println!("{}", if on { "bookmarked" } else { "bookmark removed" });
                }
                Some(Reply::Quit) => break 'questions,
                None => println!("enter 1-{}, b to bookmark, q to quit", item.question.options.len()),
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        let is_correct = item.question.is_correct(choice);
        let outcome = app
            .tracker_mut()
            .record_answer(&item.question.id, &item.category, is_correct, elapsed)
            .await;

        tally.asked += 1;
        tally.xp += outcome.xp_awarded;
        if is_correct {
            tally.correct += 1;
            println!("Correct! +{} XP", outcome.xp_awarded);
        } else {
            println!(
                "Wrong. Answer: {} (+{} XP)",
                item.question.correct_option().unwrap_or("?"),
                outcome.xp_awarded
            );
        }
        if let Some(explanation) = &item.question.explanation {
            println!("  {explanation}");
        }
        if outcome.leveled_up {
            println!("  Level up! Now level {}", app.tracker().progress().level());
        }
        println!();
    }

    Ok(tally)
}

fn render_question(number: usize, total: usize, question: &Question) {
    println!("[{number}/{total}] ({}) {}", question.difficulty, question.question);
    if let Some(snippet) = &question.code_snippet {
        for line in snippet.lines() {
            println!("    {line}");
        }
    }
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}. {option}", i + 1);
    }
}

async fn finish(app: &mut AppServices, tally: &Tally) {
    if tally.asked == 0 {
        println!("No questions answered.");
        return;
    }
    app.tracker_mut().end_session().await;
    let progress = app.tracker().progress();
    println!(
        "Round over: {}/{} correct, +{} XP. Level {} ({} XP), streak {}.",
        tally.correct,
        tally.asked,
        tally.xp,
        progress.level(),
        progress.xp(),
        progress.current_streak()
    );
}
