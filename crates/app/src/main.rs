use std::collections::BTreeMap;
use std::fmt;

use course_core::model::{
    Course, CourseId, Module, ModuleId, Quiz, QuizQuestion, QuestionId, QuizId, Section, SectionId,
};
use course_core::Clock;
use services::AppServices;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- demo     [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- progress [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:dev.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL, COURSE_API_BASE_URL, COURSE_API_TOKEN");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Demo,
    Progress,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "demo" => Some(Self::Demo),
            "progress" => Some(Self::Progress),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("COURSE_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = args.next().ok_or(ArgsError::MissingValue { flag: "--db" })?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url })
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
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
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

/// Sample course used by the demo: four modules with a checkpoint quiz
/// gated behind module 3.
fn sample_course() -> (Course, BTreeMap<ModuleId, Quiz>) {
    fn section(id: u64, title: &str) -> Section {
        Section::text(SectionId::new(id), title)
    }

    let modules = vec![
        Module::new(
            ModuleId::new(1),
            "Getting started",
            1,
            vec![
                section(10, "Installing the toolchain"),
                section(11, "Hello, Cargo"),
            ],
        )
        .expect("valid module"),
        Module::new(
            ModuleId::new(2),
            "Ownership",
            2,
            vec![section(20, "Moves"), section(21, "Borrowing")],
        )
        .expect("valid module"),
        Module::new(
            ModuleId::new(3),
            "Error handling",
            3,
            vec![section(30, "Result and ?"), section(31, "thiserror")],
        )
        .expect("valid module"),
        Module::new(
            ModuleId::new(4),
            "Collections",
            4,
            vec![section(40, "Vec and slices")],
        )
        .expect("valid module"),
    ];

    let course = Course::new(CourseId::new(1), "Rust Basics", modules).expect("valid course");

    let quiz = Quiz::new(
        QuizId::new(100),
        "Error handling checkpoint",
        vec![
            QuizQuestion {
                id: QuestionId::new(1),
                prompt: "What does the ? operator do?".into(),
                options: vec!["propagates errors".into(), "panics".into()],
                correct_option: 0,
            },
            QuizQuestion {
                id: QuestionId::new(2),
                prompt: "What derives an error type?".into(),
                options: vec!["serde".into(), "thiserror".into()],
                correct_option: 1,
            },
        ],
    )
    .expect("valid quiz");

    (course, BTreeMap::from([(ModuleId::new(3), quiz)]))
}

/// Walks a learner through the sample course: completes every section,
/// answers the checkpoint quiz, and leaves a note along the way.
async fn run_demo(app: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let (course, quizzes) = sample_course();
    let learning = app.learning();
    let mut session = learning.start_session(course.clone(), quizzes).await?;

    println!("course: {}", course.title());
    println!(
        "starting progress: {}%",
        session.progress().percent
    );

    learning.edit_notes(&mut session, "cargo new creates a project");
    learning.save_notes_now(&mut session).await?;

    for module in course.modules() {
        learning.select_module(&mut session, module.id()).await?;
        for section in module.sections() {
            learning.select_section(&mut session, section.id).await?;
            let result = learning.mark_current_complete(&mut session).await?;
            println!(
                "completed \"{}\" ({}%){}",
                section.title,
                result.progress.percent,
                if result.quiz_opened { " -> quiz" } else { "" }
            );

            if let Some(prompt) = session.quiz_prompt() {
                let quiz = prompt.quiz().clone();
                for question in quiz.questions() {
                    session.answer_question(question.id, question.correct_option)?;
                }
                let outcome = learning.submit_quiz(&mut session).await?;
                println!(
                    "quiz \"{}\": {}% ({})",
                    quiz.title(),
                    outcome.score,
                    if outcome.passed { "passed" } else { "failed" }
                );
                learning.close_quiz(&mut session).await?;
            }
        }
    }

    learning.finish(&mut session).await?;
    println!("final progress: {}%", session.progress().percent);
    Ok(())
}

/// Prints the stored completion percentage for the sample course.
async fn run_progress(app: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let (course, _) = sample_course();
    let percent = app
        .progress()
        .completion_percentage(course.id(), course.total_sections())
        .await?;
    println!("{}: {percent}% complete", course.title());
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Demo,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Demo,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock()).await?;
    if !app.remote_enabled() {
        log::info!("no remote progress API configured, running local-only");
    }

    match cmd {
        Command::Demo => run_demo(&app).await,
        Command::Progress => run_progress(&app).await,
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
