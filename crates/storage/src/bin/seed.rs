use std::fmt;

use chrono::{DateTime, Utc};
use fitrack_core::model::{
    Day, Exercise, ExerciseId, ExerciseKind, Program, ProgramId, ProgramKind, Section,
};
use fitrack_core::Error as DomainError;
use storage::repository::{CompletionRequest, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    program_id: ProgramId,
    challenge_id: ProgramId,
    completions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidProgramId { raw: String },
    InvalidCompletions { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidProgramId { raw } => write!(f, "invalid program id: {raw}"),
            ArgsError::InvalidCompletions { raw } => {
                write!(f, "invalid --completions value: {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

fn parse_id(value: String) -> Result<ProgramId, ArgsError> {
    value
        .parse::<ProgramId>()
        .map_err(|_| ArgsError::InvalidProgramId { raw: value })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("FITRACK_DB_URL").unwrap_or_else(|_| "sqlite:fitrack.sqlite3".into());
        let mut program_id = std::env::var("FITRACK_PROGRAM_ID")
            .ok()
            .and_then(|value| value.parse::<ProgramId>().ok())
            .unwrap_or_else(|| ProgramId::new(1));
        let mut challenge_id = ProgramId::new(2);
        let mut completions = 0;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--program-id" => {
                    program_id = parse_id(require_value(&mut args, "--program-id")?)?;
                }
                "--challenge-id" => {
                    challenge_id = parse_id(require_value(&mut args, "--challenge-id")?)?;
                }
                "--completions" => {
                    let value = require_value(&mut args, "--completions")?;
                    completions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCompletions { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if program_id == challenge_id {
            return Err(ArgsError::InvalidProgramId {
                raw: challenge_id.to_string(),
            });
        }

        Ok(Self {
            db_url,
            program_id,
            challenge_id,
            completions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:fitrack.sqlite3)");
    eprintln!("  --program-id <id>         Id of the demo program (default: 1)");
    eprintln!("  --challenge-id <id>       Id of the demo challenge (default: 2)");
    eprintln!("  --completions <n>         Complete the first n program exercises (default: 0)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  FITRACK_DB_URL, FITRACK_PROGRAM_ID");
}

fn timed(id: u64, title: &str, secs: u32, section: Section) -> Result<Exercise, DomainError> {
    Ok(Exercise::new(
        ExerciseId::new(id),
        title,
        ExerciseKind::Time {
            duration_secs: Some(secs),
        },
        Some(f32::from(u16::try_from(secs / 6).unwrap_or(u16::MAX))),
        section,
    )?)
}

fn reps(id: u64, title: &str, reps: u32, sets: u32) -> Result<Exercise, DomainError> {
    Ok(Exercise::new(
        ExerciseId::new(id),
        title,
        ExerciseKind::Reps {
            reps: Some(reps),
            sets: Some(sets),
        },
        None,
        Section::Workout,
    )?)
}

fn demo_program(id: ProgramId) -> Result<Program, DomainError> {
    let base = id.value() * 1000;
    let days = vec![
        Day::new(
            0,
            "Full body",
            vec![
                timed(base + 1, "Jumping jacks", 60, Section::WarmUp)?,
                reps(base + 2, "Push-ups", 10, 3)?,
                reps(base + 3, "Squats", 15, 3)?,
                timed(base + 4, "Plank", 45, Section::Workout)?,
                timed(base + 5, "Hamstring stretch", 60, Section::CoolDown)?,
            ],
        ),
        Day::new(1, "Rest", Vec::new()),
        Day::new(
            2,
            "Legs and core",
            vec![
                timed(base + 6, "High knees", 45, Section::WarmUp)?,
                reps(base + 7, "Lunges", 12, 3)?,
                reps(base + 8, "Glute bridges", 15, 2)?,
                timed(base + 9, "Side plank", 30, Section::Workout)?,
                timed(base + 10, "Child's pose", 60, Section::CoolDown)?,
            ],
        ),
    ];
    Ok(Program::new(id, ProgramKind::Program, "Full Body Starter", days)?)
}

fn demo_challenge(id: ProgramId) -> Result<Program, DomainError> {
    let base = id.value() * 1000;
    let mut days = Vec::with_capacity(7);
    let holds = (base + 1..).zip([30_u32, 40, 50, 60, 75, 90, 120]);
    for (i, (exercise_id, secs)) in holds.enumerate() {
        days.push(Day::new(
            i,
            "",
            vec![timed(exercise_id, "Plank hold", secs, Section::Workout)?],
        ));
    }
    Ok(Program::new(id, ProgramKind::Challenge, "7-Day Plank Challenge", days)?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let program = demo_program(args.program_id)?;
    let challenge = demo_challenge(args.challenge_id)?;
    storage.programs.upsert_program(&program).await?;
    storage.programs.upsert_program(&challenge).await?;

    let targets = program
        .days()
        .iter()
        .flat_map(|day| day.exercise_ids().map(move |id| (day.index(), id)))
        .take(usize::try_from(args.completions)?);
    let mut completed = 0;
    for (day_index, exercise_id) in targets {
        storage
            .progress
            .complete_exercise(&CompletionRequest {
                program_id: program.id(),
                day_index,
                exercise_id,
                completed_at: now,
            })
            .await?;
        completed += 1;
    }

    println!(
        "Seeded program {} and challenge {} ({} completions) into {}",
        program.id(),
        challenge.id(),
        completed,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
