use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{CategoryId, Difficulty, PreferencesPatch, QuestionId};
use services::{AppServices, Clock};
use tracing_subscriber::EnvFilter;

mod play;
mod report;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidCount { raw: String },
    InvalidToggle { flag: &'static str, raw: String },
    InvalidDifficulty { raw: String },
    InvalidId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidCount { raw } => write!(f, "invalid --count value: {raw}"),
            ArgsError::InvalidToggle { flag, raw } => {
                write!(f, "invalid {flag} value: {raw} (expected on|off)")
            }
            ArgsError::InvalidDifficulty { raw } => {
                write!(f, "invalid --difficulty value: {raw} (expected easy|medium|hard)")
            }
            ArgsError::InvalidId { raw } => write!(f, "invalid id: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz [--db <sqlite_url>] <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  play [--category <id>] [--count <n>]   answer a round of questions (default)");
    eprintln!("  daily                                  today's challenge");
    eprintln!("  stats                                  level, streak and category breakdown");
    eprintln!("  bookmark <question-id>                 toggle a bookmark");
    eprintln!("  bookmarks                              list bookmarked questions");
    eprintln!("  prefs [--difficulty d] [--sound on|off] [--haptic on|off] [--categories a,b]");
    eprintln!("  export [--out <path>]                  write a JSON backup");
    eprintln!("  import <path>                          restore a JSON backup");
    eprintln!("  clear --yes                            erase all progress");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Play {
        category: Option<CategoryId>,
        count: usize,
    },
    Daily,
    Stats,
    Bookmark(QuestionId),
    Bookmarks,
    Prefs(PreferencesPatch),
    Export {
        out: Option<PathBuf>,
    },
    Import {
        path: PathBuf,
    },
    Clear {
        confirmed: bool,
    },
}

struct Args {
    db_url: String,
    command: Command,
}

const DEFAULT_ROUND_SIZE: usize = 5;

impl Args {
    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite:quiz.sqlite3".into()), normalize_sqlite_url);

        // `--db` may appear anywhere; everything else belongs to the subcommand.
        let mut rest = Vec::new();
        let mut iter = argv.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut iter, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" => return Ok(None),
                _ => rest.push(arg),
            }
        }

        let mut rest = rest.into_iter();
        let command = match rest.next().as_deref() {
            None => Command::Play {
                category: None,
                count: DEFAULT_ROUND_SIZE,
            },
            Some("play") => parse_play(&mut rest)?,
            Some("daily") => Command::Daily,
            Some("stats") => Command::Stats,
            Some("bookmark") => {
                let raw = rest
                    .next()
                    .ok_or(ArgsError::MissingArgument { name: "question-id" })?;
                let id = raw.parse().map_err(|_| ArgsError::InvalidId { raw })?;
                Command::Bookmark(id)
            }
            Some("bookmarks") => Command::Bookmarks,
            Some("prefs") => parse_prefs(&mut rest)?,
            Some("export") => {
                let mut out = None;
                while let Some(arg) = rest.next() {
                    match arg.as_str() {
                        "--out" => out = Some(PathBuf::from(require_value(&mut rest, "--out")?)),
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                Command::Export { out }
            }
            Some("import") => {
                let path = rest
                    .next()
                    .ok_or(ArgsError::MissingArgument { name: "path" })?;
                Command::Import {
                    path: PathBuf::from(path),
                }
            }
            Some("clear") => Command::Clear {
                confirmed: rest.next().as_deref() == Some("--yes"),
            },
            Some(other) => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };

        if let Some(extra) = rest.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Some(Self { db_url, command }))
    }
}

fn parse_play(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let mut category = None;
    let mut count = DEFAULT_ROUND_SIZE;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--category" => {
                let raw = require_value(args, "--category")?;
                category = Some(raw.parse().map_err(|_| ArgsError::InvalidId { raw })?);
            }
            "--count" => {
                let raw = require_value(args, "--count")?;
                count = raw
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or(ArgsError::InvalidCount { raw })?;
            }
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }
    Ok(Command::Play { category, count })
}

fn parse_prefs(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let mut patch = PreferencesPatch::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--difficulty" => {
                let raw = require_value(args, "--difficulty")?;
                let difficulty: Difficulty = raw
                    .parse()
                    .map_err(|_| ArgsError::InvalidDifficulty { raw })?;
                patch.difficulty = Some(difficulty);
            }
            "--sound" => patch.sound_enabled = Some(parse_toggle(args, "--sound")?),
            "--haptic" => patch.haptic_enabled = Some(parse_toggle(args, "--haptic")?),
            "--categories" => {
                let raw = require_value(args, "--categories")?;
                let categories = raw
                    .split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| {
                        s.parse::<CategoryId>().map_err(|_| ArgsError::InvalidId {
                            raw: s.to_owned(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                patch.preferred_categories = Some(categories);
            }
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }
    Ok(Command::Prefs(patch))
}

fn parse_toggle(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<bool, ArgsError> {
    let raw = require_value(args, flag)?;
    match raw.as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(ArgsError::InvalidToggle { flag, raw }),
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let Some(args) = Args::parse(std::env::args().skip(1)).inspect_err(|_| print_usage())?
    else {
        print_usage();
        return Ok(());
    };

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let mut app = AppServices::new_sqlite(&args.db_url, Clock::default_clock()).await?;
    tracing::info!(db = %args.db_url, "storage ready");

    app.tracker_mut()
        .set_achievement_listener(Box::new(|achievement| {
            println!("  * Achievement unlocked: {achievement}");
        }));

    match args.command {
        Command::Play { category, count } => play::play_round(&mut app, category, count).await?,
        Command::Daily => play::daily_challenge(&mut app).await?,
        Command::Stats => report::print_stats(app.tracker(), app.clock().today()),
        Command::Bookmark(id) => {
            let bank = app.questions();
            if bank.find_question(&id).is_none() {
                tracing::warn!(question = %id, "bookmarking a question not in the bank");
            }
            let bookmarked = app.tracker_mut().bookmark_question(&id).await;
            let state = if bookmarked { "bookmarked" } else { "removed bookmark for" };
            println!("{state} {id}");
        }
        Command::Bookmarks => report::print_bookmarks(app.tracker(), &app.questions()),
        Command::Prefs(patch) => {
            if !patch.is_empty() {
                app.tracker_mut().update_preferences(patch).await;
            }
            report::print_preferences(app.tracker());
        }
        Command::Export { out } => {
            let json = app.tracker().export_progress()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("exported progress to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Import { path } => {
            let json = std::fs::read_to_string(&path)?;
            if !app.tracker_mut().import_progress(&json).await {
                return Err(format!("{} is not a valid progress backup", path.display()).into());
            }
            println!("imported progress from {}", path.display());
            report::print_stats(app.tracker(), app.clock().today());
        }
        Command::Clear { confirmed } => {
            if !confirmed {
                return Err("refusing to clear progress without --yes".into());
            }
            app.tracker_mut().clear_progress().await;
            println!("progress cleared");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
