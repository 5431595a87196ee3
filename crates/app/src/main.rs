use std::fmt;
use std::path::PathBuf;

use fitrack_core::model::{
    Biometrics, BiometricsError, ProgramId, Section, SettingsError, TrackerSettings,
};
use fitrack_core::progression::SectionFilter;
use fitrack_core::tracker::SelectionError;
use services::session::{ResetMode, SessionTicker, TrackerLoopService, WorkoutSession};
use services::{AppServices, Clock, RestConfig};
use tracing_subscriber::EnvFilter;

mod report;

const DEFAULT_DB_URL: &str = "sqlite:fitrack.sqlite3";

//
// ─── ARGUMENTS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingCommand,
    MissingFile,
    UnknownCommand(String),
    UnknownArg(String),
    InvalidProgramId { raw: String },
    InvalidIndex { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidNumber { name: &'static str, raw: String },
    InvalidSection { raw: String },
    Settings(SettingsError),
    Readings(BiometricsError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingCommand => write!(f, "no command given"),
            ArgsError::MissingFile => write!(f, "import requires a file path"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidProgramId { raw } => write!(f, "invalid program id: {raw}"),
            ArgsError::InvalidIndex { flag, raw } => {
                write!(f, "invalid {flag} value (expected a number from 1): {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNumber { name, raw } => write!(f, "invalid {name} value: {raw}"),
            ArgsError::InvalidSection { raw } => write!(f, "invalid --section value: {raw}"),
            ArgsError::Settings(err) => write!(f, "{err}"),
            ArgsError::Readings(err) => write!(f, "{err}"),
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

/// Parse a 1-based position from the command line into a 0-based index.
fn parse_position(raw: String, flag: &'static str) -> Result<usize, ArgsError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(ArgsError::InvalidIndex { flag, raw }),
    }
}

fn parse_number<T: std::str::FromStr>(raw: String, name: &'static str) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { name, raw })
}

fn parse_section(raw: String) -> Result<SectionFilter, ArgsError> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(SectionFilter::All);
    }
    Section::parse_lenient(&raw)
        .map(SectionFilter::Only)
        .map_err(|_| ArgsError::InvalidSection { raw })
}

fn settings_from_env() -> Result<TrackerSettings, ArgsError> {
    let read = |name: &'static str, default: u32| match std::env::var(name) {
        Ok(raw) => parse_number(raw, name),
        Err(_) => Ok(default),
    };
    let default_secs = read(
        "FITRACK_DEFAULT_EXERCISE_SECS",
        TrackerSettings::DEFAULT_EXERCISE_SECS,
    )?;
    let per_rep = read("FITRACK_SECONDS_PER_REP", TrackerSettings::SECONDS_PER_REP)?;
    TrackerSettings::new(default_secs, per_rep).map_err(ArgsError::Settings)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List,
    Import(PathBuf),
    Show,
    Complete,
    Skip,
    ResetDay,
    ResetProgram,
    Timer,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "list" => Some(Self::List),
            "show" => Some(Self::Show),
            "complete" => Some(Self::Complete),
            "skip" => Some(Self::Skip),
            "reset-day" => Some(Self::ResetDay),
            "reset-program" => Some(Self::ResetProgram),
            "timer" => Some(Self::Timer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Args {
    command: Command,
    db_url: String,
    api: bool,
    program_id: Option<ProgramId>,
    day: Option<usize>,
    exercise: Option<usize>,
    force: bool,
    section: SectionFilter,
    search: String,
    heart_rate: Option<u16>,
    weight_kg: Option<f32>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let command = match args.next().as_deref() {
            None => return Err(ArgsError::MissingCommand),
            Some("--help" | "-h") => {
                print_usage();
                std::process::exit(0);
            }
            Some("import") => Command::Import(
                args.next()
                    .filter(|p| !p.starts_with("--"))
                    .map(PathBuf::from)
                    .ok_or(ArgsError::MissingFile)?,
            ),
            Some(other) => Command::from_arg(other)
                .ok_or_else(|| ArgsError::UnknownCommand(other.to_owned()))?,
        };

        let mut parsed = Self {
            command,
            db_url: std::env::var("FITRACK_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.into()),
            api: false,
            program_id: std::env::var("FITRACK_PROGRAM_ID")
                .ok()
                .and_then(|value| value.parse::<ProgramId>().ok()),
            day: None,
            exercise: None,
            force: false,
            section: SectionFilter::All,
            search: String::new(),
            heart_rate: None,
            weight_kg: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = value;
                }
                "--api" => parsed.api = true,
                "--program-id" => {
                    let value = require_value(&mut args, "--program-id")?;
                    parsed.program_id = Some(
                        value
                            .parse::<ProgramId>()
                            .map_err(|_| ArgsError::InvalidProgramId { raw: value.clone() })?,
                    );
                }
                "--day" => {
                    let value = require_value(&mut args, "--day")?;
                    parsed.day = Some(parse_position(value, "--day")?);
                }
                "--exercise" => {
                    parsed.exercise = Some(parse_position(
                        require_value(&mut args, "--exercise")?,
                        "--exercise",
                    )?);
                }
                "--force" => parsed.force = true,
                "--section" => {
                    parsed.section = parse_section(require_value(&mut args, "--section")?)?;
                }
                "--search" => parsed.search = require_value(&mut args, "--search")?,
                "--heart-rate" => {
                    parsed.heart_rate = Some(parse_number(
                        require_value(&mut args, "--heart-rate")?,
                        "--heart-rate",
                    )?);
                }
                "--weight" => {
                    parsed.weight_kg = Some(parse_number(
                        require_value(&mut args, "--weight")?,
                        "--weight",
                    )?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn readings(&self) -> Result<Option<Biometrics>, ArgsError> {
        if self.heart_rate.is_none() && self.weight_kg.is_none() {
            return Ok(None);
        }
        Biometrics::new(self.heart_rate, self.weight_kg)
            .map(Some)
            .map_err(ArgsError::Readings)
    }

    fn reset_mode(&self) -> ResetMode {
        if self.force {
            ResetMode::ForceLocal
        } else {
            ResetMode::Synced
        }
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  fitrack <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  list                  List stored programs and challenges");
    eprintln!("  import <file>         Import a program document (JSON)");
    eprintln!("  show                  Show progress and the selected day");
    eprintln!("  complete              Complete the selected exercise");
    eprintln!("  skip                  Show the next exercise; not stored between runs");
    eprintln!("  timer                 Count down the selected exercise and complete it");
    eprintln!("  reset-day             Clear the selected day's completions");
    eprintln!("  reset-program         Clear every completion of the program");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>     SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  --api                 Use the REST backend instead of SQLite");
    eprintln!("  --program-id <id>     Program or challenge (default: 1, else the first stored)");
    eprintln!("  --day <n>             Day to select, from 1 (default: first unfinished)");
    eprintln!("  --exercise <n>        Exercise to select, from 1 (default: first open)");
    eprintln!("  --section <name>      Filter shown exercises: warm-up, workout, cool-down, all");
    eprintln!("  --search <text>       Filter shown exercises by title");
    eprintln!("  --heart-rate <bpm>    Reading attached when a day is completed");
    eprintln!("  --weight <kg>         Reading attached when a day is completed");
    eprintln!("  --force               Report a reset the backend rejects instead of failing;");
    eprintln!("                        the next run reloads the backend's progress");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FITRACK_DB_URL, FITRACK_PROGRAM_ID");
    eprintln!("  FITRACK_API_BASE_URL, FITRACK_API_TOKEN, FITRACK_API_RETRIES");
    eprintln!("  FITRACK_DEFAULT_EXERCISE_SECS, FITRACK_SECONDS_PER_REP");
    eprintln!("  RUST_LOG (default: info)");
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

/// Select the requested position, or resume where the user left off.
fn position(
    session: &mut WorkoutSession,
    day: Option<usize>,
    exercise: Option<usize>,
) -> Result<(), SelectionError> {
    let completed = session.progress().completed().clone();
    let day = day.unwrap_or_else(|| {
        session
            .program()
            .days()
            .iter()
            .find(|d| d.exercise_ids().any(|id| !completed.contains(id)))
            .map_or(0, |d| d.index())
    });
    session.select_day(day)?;

    let exercise = exercise.or_else(|| {
        session
            .current_day()
            .and_then(|d| d.exercises().iter().position(|e| !completed.contains(e.id())))
    });
    if let Some(index) = exercise {
        session.select_exercise(index)?;
    }
    Ok(())
}

async fn run_timer(
    tracker: &TrackerLoopService,
    session: &mut WorkoutSession,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(title) = session.current_exercise().map(|e| e.title().to_owned()) else {
        return Err(SelectionError::NoExercise.into());
    };
    session.toggle_timer();
    println!("{title}: {}s", session.timer().remaining_secs());

    let mut ticker = SessionTicker::new();
    ticker.follow(session.timer());
    while ticker.next().await.is_some() {
        if let Some(done) = tracker.tick(session).await? {
            ticker.stop();
            report::completion(session, &done);
            break;
        }
        report::countdown(session.timer());
        ticker.follow(session.timer());
    }
    Ok(())
}

async fn track(services: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let preferred = args.program_id.unwrap_or_else(|| ProgramId::new(1));
    let Some(program_id) = services.resolve_program(preferred).await? else {
        return Err("no programs stored; run the seed binary or `fitrack import <file>`".into());
    };
    if program_id != preferred && args.program_id.is_some() {
        return Err(format!("program {preferred} not found").into());
    }

    let tracker = services.tracker();
    let loaded = tracker.start_session(program_id).await?;
    report::notices(&loaded.notices);
    let mut session = loaded.value;
    position(&mut session, args.day, args.exercise)?;
    session.set_readings(args.readings()?);

    match args.command {
        Command::Show => report::session(&session, args.section, &args.search),
        Command::Complete => {
            let done = tracker.complete_current(&mut session).await?;
            report::completion(&session, &done);
        }
        Command::Skip => {
            let advance = tracker.skip(&mut session);
            report::skipped(&session, advance);
        }
        Command::ResetDay => {
            let reset = tracker.reset_day(&mut session, args.reset_mode()).await?;
            report::reset("day", reset);
        }
        Command::ResetProgram => {
            let reset = tracker.reset_program(&mut session, args.reset_mode()).await?;
            report::reset("program", reset);
        }
        Command::Timer => run_timer(&tracker, &mut session).await?,
        Command::List | Command::Import(_) => {}
    }

    if !session.pending().is_empty() {
        eprintln!(
            "warning: {} acknowledgement(s) could not be saved",
            session.pending().len()
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let settings = settings_from_env()?;

    let clock = Clock::default_clock();
    let services = if args.api {
        AppServices::new_rest(RestConfig::from_env()?, clock, settings)?
    } else {
        AppServices::new_sqlite(&args.db_url, clock, settings).await?
    };
    tracing::debug!(api = args.api, ?settings, "services ready");

    match &args.command {
        Command::List => {
            let listed = services.catalog().list_programs().await;
            report::notices(&listed.notices);
            report::programs(&listed.value);
        }
        Command::Import(path) => {
            let json = tokio::fs::read_to_string(path).await?;
            let imported = services.catalog().import_json(&json).await?;
            report::imported(&imported);
        }
        _ => track(&services, &args).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
