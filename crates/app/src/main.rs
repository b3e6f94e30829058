use std::fmt;
use std::io::{BufRead, Write as _};

use services::oracle::{FALLBACK_DIAGNOSTIC_QUESTION, FALLBACK_NEXT_QUESTION};
use services::session::GameState;
use services::{
    AdaptiveEngine, LessonSession, OllamaOracle, Oracle, OracleConfig, Phase, check_user_input,
    export_pack, import_pack, load_pack,
};
use storage::repository::{Storage, StorageError};
use tutor_core::model::{Learner, SkillId, Subject};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidSubject { raw: String },
    InvalidDbUrl { raw: String },
    MissingFile,
    MissingSkillFields,
    InvalidSkillId { raw: String },
    MissingSkillId,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidSubject { raw } => {
                write!(f, "invalid --subject value: {raw} (Math, Science, Literacy)")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingFile => write!(f, "import requires --file <path>"),
            ArgsError::MissingSkillFields => {
                write!(f, "skills add requires --topic <t> and --subtopic <s>")
            }
            ArgsError::InvalidSkillId { raw } => write!(f, "invalid --id value: {raw}"),
            ArgsError::MissingSkillId => write!(f, "skills rm requires --id <skill_id>"),
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
    eprintln!("  tutor learn   [--db <sqlite_url>] [--name <n>] [--lang <l>] [--subject <s>]");
    eprintln!("  tutor game    [--db <sqlite_url>] [--name <n>] [--lang <l>] [--subject <s>]");
    eprintln!("  tutor stats   [--db <sqlite_url>] [--name <n>] [--lang <l>]");
    eprintln!("  tutor skills  [--db <sqlite_url>] [--subject <s>]");
    eprintln!("  tutor skills add [--db <sqlite_url>] [--subject <s>] --topic <t> --subtopic <st>");
    eprintln!("  tutor skills rm  [--db <sqlite_url>] --id <skill_id>");
    eprintln!("  tutor import  [--db <sqlite_url>] --file <pack.json>");
    eprintln!("  tutor export  [--db <sqlite_url>] [--subject <s>] [--file <pack.json>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://tutor.sqlite3   --name Learner   --lang English   --subject Math");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TUTOR_DB_URL, TUTOR_NAME, TUTOR_LANG, TUTOR_SUBJECT");
    eprintln!("  TUTOR_OLLAMA_URL, TUTOR_MODEL, TUTOR_ORACLE_TIMEOUT_SECS");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Learn,
    Game,
    Stats,
    Skills,
    Import,
    Export,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "learn" => Some(Self::Learn),
            "game" => Some(Self::Game),
            "stats" => Some(Self::Stats),
            "skills" => Some(Self::Skills),
            "import" => Some(Self::Import),
            "export" => Some(Self::Export),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkillsAction {
    List,
    Add,
    Rm,
}

impl SkillsAction {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "add" => Some(Self::Add),
            "rm" => Some(Self::Rm),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    name: String,
    lang: String,
    subject: Subject,
    file: Option<String>,
    topic: Option<String>,
    subtopic: Option<String>,
    skill_id: Option<SkillId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("TUTOR_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://tutor.sqlite3".into(), normalize_sqlite_url);
        let mut name = std::env::var("TUTOR_NAME").unwrap_or_else(|_| "Learner".into());
        let mut lang = std::env::var("TUTOR_LANG").unwrap_or_else(|_| "English".into());
        let mut subject = std::env::var("TUTOR_SUBJECT")
            .ok()
            .and_then(|value| value.parse::<Subject>().ok())
            .unwrap_or(Subject::Math);
        let mut file = None;
        let mut topic = None;
        let mut subtopic = None;
        let mut skill_id = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--name" => name = require_value(args, "--name")?,
                "--lang" => lang = require_value(args, "--lang")?,
                "--subject" => {
                    let value = require_value(args, "--subject")?;
                    subject = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSubject { raw: value.clone() })?;
                }
                "--file" => file = Some(require_value(args, "--file")?),
                "--topic" => topic = Some(require_value(args, "--topic")?),
                "--subtopic" => subtopic = Some(require_value(args, "--subtopic")?),
                "--id" => {
                    let value = require_value(args, "--id")?;
                    let parsed: SkillId = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSkillId { raw: value.clone() })?;
                    skill_id = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            name,
            lang,
            subject,
            file,
            topic,
            subtopic,
            skill_id,
        })
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

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: start a lesson when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Learn,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Learn,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    // `skills` takes an optional action word before its flags.
    let mut skills_action = SkillsAction::List;
    if cmd == Command::Skills {
        if let Some(action) = argv
            .first()
            .map(String::as_str)
            .and_then(SkillsAction::from_arg)
        {
            skills_action = action;
            argv.remove(0);
        }
    }

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    storage.badges.ensure_badges_seed().await?;

    match cmd {
        Command::Learn => learn(&storage, &args).await,
        Command::Game => game(&storage, &args).await,
        Command::Stats => stats(&storage, &args).await,
        Command::Skills => skills(&storage, &args, skills_action).await,
        Command::Import => import(&storage, &args).await,
        Command::Export => export(&storage, &args).await,
    }
}

async fn ensure_learner(
    storage: &Storage,
    engine: &AdaptiveEngine,
    args: &Args,
) -> Result<Learner, Box<dyn std::error::Error>> {
    let learner = storage
        .learners
        .ensure_learner(&args.name, &args.lang, engine.now())
        .await?;
    Ok(learner)
}

async fn learn(storage: &Storage, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let engine = AdaptiveEngine::new(storage);
    let learner = ensure_learner(storage, &engine, args).await?;
    let oracle = OllamaOracle::new(OracleConfig::from_env())?;

    let mut session = LessonSession::new(learner.id(), args.subject, args.lang.clone());
    println!(
        "Hi {}! Let's start with {} quick questions to find your level.",
        learner.name(),
        services::session::DIAGNOSTIC_QUESTIONS
    );
    println!("(Type 'quit' at any time to stop.)");
    println!();

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    // Placement diagnostic. Oracle outages degrade to canned questions and an
    // incorrect verdict rather than aborting the session.
    let mut index = 0;
    while let Phase::Diagnostic(_) = session.phase() {
        let question = match oracle
            .diagnostic_question(session.subject().as_str(), session.lang(), index)
            .await
        {
            Ok(q) => q,
            Err(e) => {
                eprintln!("(tutor offline: {e})");
                FALLBACK_DIAGNOSTIC_QUESTION.to_string()
            }
        };
        println!("{question}");

        let Some(answer) = prompt(&mut lines)? else {
            return Ok(());
        };
        if let Err(rejection) = check_user_input(&answer) {
            println!("{rejection}");
            continue;
        }

        let correct = match oracle
            .judge(
                session.subject().as_str(),
                session.level().as_str(),
                session.lang(),
                &question,
                &answer,
            )
            .await
        {
            Ok(parse) => {
                let verdict = parse.verdict();
                println!("{}", verdict.feedback);
                verdict.correct
            }
            Err(e) => {
                eprintln!("(tutor offline: {e})");
                false
            }
        };

        if let Some(level) = session.record_diagnostic(correct) {
            println!();
            println!("Great, we'll work at the {level} level.");
        }
        index += 1;
    }

    // The lesson proper: one skill at a time, mastery at three in a row.
    'lesson: loop {
        let skill = engine
            .pick_next_skill(learner.id(), session.subject())
            .await?;
        println!();
        println!("Skill: {} / {}", skill.topic(), skill.subtopic());

        let mut question = match oracle
            .lesson_turn(
                session.subject().as_str(),
                session.level().as_str(),
                session.lang(),
                skill.topic(),
                skill.subtopic(),
            )
            .await
        {
            Ok(turn) => turn,
            Err(e) => {
                eprintln!("(tutor offline: {e})");
                FALLBACK_NEXT_QUESTION.to_string()
            }
        };

        loop {
            println!("{question}");
            let Some(answer) = prompt(&mut lines)? else {
                break 'lesson;
            };

            if let Some(reason) = answer.strip_prefix("report ") {
                engine
                    .record_report(learner.id(), skill.id(), reason.trim())
                    .await?;
                println!("Thanks, noted. Let's keep going.");
                continue;
            }
            if answer == "skip" {
                break;
            }
            if let Err(rejection) = check_user_input(&answer) {
                println!("{rejection}");
                continue;
            }

            let verdict = match oracle
                .judge(
                    session.subject().as_str(),
                    session.level().as_str(),
                    session.lang(),
                    &question,
                    &answer,
                )
                .await
            {
                Ok(parse) => parse.verdict(),
                Err(e) => {
                    eprintln!("(tutor offline: {e})");
                    continue;
                }
            };

            println!("{}", verdict.feedback);
            let earned = engine
                .update_progress_with_context(
                    learner.id(),
                    &skill,
                    verdict.correct,
                    Some(question.clone()),
                    Some(verdict.feedback.clone()),
                )
                .await?;
            for code in earned {
                let badge = tutor_core::model::Badge::definition(code);
                println!("*** Badge unlocked: {} ({}) ***", badge.name, badge.description);
            }

            question = verdict.next_question;
        }
    }

    println!();
    print_stats(&engine, &learner).await?;
    Ok(())
}

/// Timed quick-fire quiz. Score and XP live only for the round, but every
/// judged answer still runs through the engine, so streaks, counters, and
/// badges accrue exactly as in a lesson.
async fn game(storage: &Storage, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let engine = AdaptiveEngine::new(storage);
    let learner = ensure_learner(storage, &engine, args).await?;
    let oracle = OllamaOracle::new(OracleConfig::from_env())?;

    let level = services::session::Level::default();
    let mut game = GameState::new(engine.now(), chrono::Duration::seconds(60));
    println!(
        "Quick-fire round, {}! Answer as many as you can in 60 seconds.",
        learner.name()
    );

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    while !game.is_over(engine.now()) {
        let skill = engine
            .pick_next_skill(learner.id(), args.subject)
            .await?;
        let question = match oracle
            .quiz_question(
                args.subject.as_str(),
                level.as_str(),
                &args.lang,
                skill.topic(),
                skill.subtopic(),
            )
            .await
        {
            Ok(q) => q,
            Err(e) => {
                eprintln!("(tutor offline: {e})");
                FALLBACK_DIAGNOSTIC_QUESTION.to_string()
            }
        };
        println!("{question}");

        let Some(answer) = prompt(&mut lines)? else {
            break;
        };
        if game.is_over(engine.now()) {
            println!("Time's up before that one counted!");
            break;
        }
        if let Err(rejection) = check_user_input(&answer) {
            println!("{rejection}");
            continue;
        }

        match oracle
            .judge(args.subject.as_str(), level.as_str(), &args.lang, &question, &answer)
            .await
        {
            Ok(parse) => {
                let verdict = parse.verdict();
                println!("{}", verdict.feedback);
                game.apply(verdict.correct);
                let earned = engine
                    .update_progress_with_context(
                        learner.id(),
                        &skill,
                        verdict.correct,
                        Some(question.clone()),
                        Some(verdict.feedback.clone()),
                    )
                    .await?;
                for code in earned {
                    let badge = tutor_core::model::Badge::definition(code);
                    println!("*** Badge unlocked: {} ({}) ***", badge.name, badge.description);
                }
            }
            Err(e) => eprintln!("(tutor offline: {e})"),
        }
        println!(
            "Score {} | XP {} | {}s left",
            game.score(),
            game.xp(),
            game.remaining(engine.now()).num_seconds()
        );
    }

    println!();
    println!("Final score: {} ({} XP). Well played!", game.score(), game.xp());
    print_stats(&engine, &learner).await
}

/// Prints the answer prompt and reads one trimmed line. `None` means the
/// learner quit or stdin closed.
fn prompt(
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    print!("> ");
    std::io::stdout().flush()?;
    match lines.next() {
        None => {
            println!();
            println!("Bye! Come back soon.");
            Ok(None)
        }
        Some(line) => {
            let line = line?.trim().to_string();
            if line == "quit" || line == "exit" {
                println!("Bye! Come back soon.");
                return Ok(None);
            }
            Ok(Some(line))
        }
    }
}

async fn stats(storage: &Storage, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let engine = AdaptiveEngine::new(storage);
    let learner = ensure_learner(storage, &engine, args).await?;
    print_stats(&engine, &learner).await
}

async fn print_stats(
    engine: &AdaptiveEngine,
    learner: &Learner,
) -> Result<(), Box<dyn std::error::Error>> {
    let stats = engine.learner_stats(learner.id()).await?;

    println!("Stats for {} ({})", learner.name(), learner.lang());
    println!("  answered: {}", stats.answered);
    println!("  correct:  {}", stats.correct);
    if let Some(accuracy) = stats.accuracy() {
        println!("  accuracy: {:.0}%", accuracy * 100.0);
    }
    println!("  mastered: {}", stats.mastered_count);
    if stats.badges.is_empty() {
        println!("  badges:   none yet");
    } else {
        println!("  badges:");
        for (earned, badge) in &stats.badges {
            println!(
                "    {} ({}) earned {}",
                badge.name,
                badge.description,
                earned.earned_at.format("%Y-%m-%d")
            );
        }
    }
    Ok(())
}

async fn skills(
    storage: &Storage,
    args: &Args,
    action: SkillsAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SkillsAction::List => {
            let skills = storage.skills.list_skills(args.subject).await?;
            if skills.is_empty() {
                println!(
                    "No skills for {} yet. Run 'tutor learn' or import a pack.",
                    args.subject
                );
                return Ok(());
            }
            println!("Skills for {}:", args.subject);
            for skill in skills {
                println!("  [{}] {} / {}", skill.id(), skill.topic(), skill.subtopic());
            }
            Ok(())
        }
        SkillsAction::Add => {
            let (Some(topic), Some(subtopic)) = (args.topic.as_deref(), args.subtopic.as_deref())
            else {
                return Err(ArgsError::MissingSkillFields.into());
            };
            match storage.skills.insert_skill(args.subject, topic, subtopic).await {
                Ok(skill) => {
                    println!(
                        "Added [{}] {} / {} to {}.",
                        skill.id(),
                        skill.topic(),
                        skill.subtopic(),
                        args.subject
                    );
                    Ok(())
                }
                Err(StorageError::DuplicateSkill) => {
                    println!("{} already has {topic} / {subtopic}.", args.subject);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        SkillsAction::Rm => {
            let Some(id) = args.skill_id else {
                return Err(ArgsError::MissingSkillId.into());
            };
            match storage.skills.delete_skill(id).await {
                Ok(()) => {
                    println!("Removed skill [{id}] and its progress and events.");
                    Ok(())
                }
                Err(StorageError::NotFound) => {
                    println!("No skill with id {id}.");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

async fn import(storage: &Storage, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let path = args.file.as_deref().ok_or(ArgsError::MissingFile)?;
    let json = std::fs::read_to_string(path)?;
    let pack = load_pack(&json)?;
    let subject = pack.subject.clone();
    let inserted = import_pack(storage.skills.as_ref(), &pack).await?;
    println!("Imported {inserted} new skill(s) into {subject}.");
    Ok(())
}

async fn export(storage: &Storage, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let pack = export_pack(storage.skills.as_ref(), args.subject).await?;
    let json = serde_json::to_string_pretty(&pack)?;
    match args.file.as_deref() {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("Exported {} skill(s) to {path}.", pack.skills.len());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
