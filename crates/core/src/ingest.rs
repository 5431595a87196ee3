//! Normalization of backend documents into the typed model.
//!
//! Backend payloads are loosely shaped: ids may be numbers or strings, field
//! names vary between revisions, and durations or titles may be missing.
//! Everything is defaulted here, once, so the rest of the crate only sees
//! validated types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::{
    Achievement, AchievementSet, CompletedSet, Day, Exercise, ExerciseError, ExerciseId,
    ExerciseKind, Program, ProgramError, ProgramId, ProgramKind, ProgressRecord, Section, Streak,
    SYNTHETIC_ID_BASE,
};

//
// ─── ERRORS & NOTES ────────────────────────────────────────────────────────────
//

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    #[error("program document has no id")]
    MissingProgramId,

    #[error("invalid program id: {0}")]
    InvalidProgramId(String),

    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A default that was applied while normalizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestNote {
    SyntheticExerciseId { day: usize, position: usize },
    UnknownSection { day: usize, position: usize, raw: String },
    UnknownKind { day: usize, position: usize, raw: String },
    DefaultTitle { day: usize, position: Option<usize> },
    DroppedCompletedId(String),
    UnknownAchievement(String),
}

/// Normalized value plus the defaults applied to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested<T> {
    pub value: T,
    pub notes: Vec<IngestNote>,
}

//
// ─── RAW DOCUMENTS ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn parse(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExercise {
    #[serde(default, alias = "_id", alias = "exerciseId")]
    pub id: Option<RawId>,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default, alias = "durationSeconds", alias = "durationInSeconds")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub reps: Option<f64>,
    #[serde(default)]
    pub sets: Option<f64>,
    #[serde(default, alias = "calorie", alias = "caloriesBurned")]
    pub calories: Option<f64>,
    #[serde(default, alias = "category")]
    pub section: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDay {
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default)]
    pub exercises: Vec<RawExercise>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProgram {
    #[serde(default, alias = "_id", alias = "programId", alias = "challengeId")]
    pub id: Option<RawId>,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub days: Vec<RawDay>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProgress {
    #[serde(default, alias = "completedExercises")]
    pub completed: Vec<RawId>,
    #[serde(default)]
    pub streak: Option<u32>,
    #[serde(default, alias = "lastCompletedDate")]
    pub last_completed_on: Option<NaiveDate>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub program_completed: Option<bool>,
}

impl RawProgram {
    /// # Errors
    ///
    /// Returns `IngestError::Json` for malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self, IngestError> {
        Ok(serde_json::from_str(raw)?)
    }
}

//
// ─── NORMALIZATION ─────────────────────────────────────────────────────────────
//

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round().min(f64::from(u32::MAX)) as u32)
}

#[allow(clippy::cast_possible_truncation)]
fn calories(value: Option<f64>) -> Option<f32> {
    value.filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as f32)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn exercise_kind(
    raw: &RawExercise,
    day: usize,
    position: usize,
    notes: &mut Vec<IngestNote>,
) -> ExerciseKind {
    let duration_secs = whole(raw.duration);
    let reps = whole(raw.reps);
    let sets = whole(raw.sets);
    let as_time = ExerciseKind::Time { duration_secs };
    let as_reps = ExerciseKind::Reps { reps, sets };

    match non_blank(raw.kind.as_deref()).map(str::to_ascii_lowercase) {
        Some(kind) if matches!(kind.as_str(), "time" | "timed" | "duration") => as_time,
        Some(kind) if matches!(kind.as_str(), "reps" | "rep" | "repetitions") => as_reps,
        Some(_) => {
            notes.push(IngestNote::UnknownKind {
                day,
                position,
                raw: raw.kind.clone().unwrap_or_default(),
            });
            as_time
        }
        None if reps.is_some() && duration_secs.is_none() => as_reps,
        None => as_time,
    }
}

fn normalize_exercise(
    raw: &RawExercise,
    day: usize,
    position: usize,
    seen: &mut HashSet<ExerciseId>,
    notes: &mut Vec<IngestNote>,
) -> Result<Exercise, ExerciseError> {
    let id = raw
        .id
        .as_ref()
        .and_then(RawId::parse)
        .filter(|v| *v < SYNTHETIC_ID_BASE)
        .map(ExerciseId::new)
        .filter(|id| !seen.contains(id));
    let id = id.unwrap_or_else(|| {
        notes.push(IngestNote::SyntheticExerciseId { day, position });
        ExerciseId::synthetic(day, position)
    });
    seen.insert(id);

    let title = match non_blank(raw.title.as_deref()) {
        Some(title) => title.to_owned(),
        None => {
            notes.push(IngestNote::DefaultTitle {
                day,
                position: Some(position),
            });
            format!("Exercise {}", position + 1)
        }
    };

    let section = match non_blank(raw.section.as_deref()) {
        None => Section::Workout,
        Some(s) => Section::parse_lenient(s).unwrap_or_else(|_| {
            notes.push(IngestNote::UnknownSection {
                day,
                position,
                raw: s.to_owned(),
            });
            Section::Workout
        }),
    };

    let kind = exercise_kind(raw, day, position, notes);
    Exercise::new(id, title, kind, calories(raw.calories), section)
}

/// Turn a backend program document into a typed `Program`.
///
/// # Errors
///
/// Returns `IngestError::MissingProgramId` or `IngestError::InvalidProgramId`
/// when the document cannot be identified. Every other gap is defaulted and
/// reported in the notes.
pub fn normalize_program(raw: &RawProgram) -> Result<Ingested<Program>, IngestError> {
    let raw_id = raw.id.as_ref().ok_or(IngestError::MissingProgramId)?;
    let id = raw_id
        .parse()
        .map(ProgramId::new)
        .ok_or_else(|| IngestError::InvalidProgramId(raw_id.describe()))?;

    let mut notes = Vec::new();
    let mut seen = HashSet::new();
    let mut days = Vec::with_capacity(raw.days.len());

    for (day_index, raw_day) in raw.days.iter().enumerate() {
        let mut exercises = Vec::with_capacity(raw_day.exercises.len());
        for (position, raw_ex) in raw_day.exercises.iter().enumerate() {
            // Titles are defaulted above, so construction cannot fail here.
            if let Ok(exercise) =
                normalize_exercise(raw_ex, day_index, position, &mut seen, &mut notes)
            {
                exercises.push(exercise);
            }
        }
        let title = match non_blank(raw_day.title.as_deref()) {
            Some(title) => title.to_owned(),
            None => {
                notes.push(IngestNote::DefaultTitle {
                    day: day_index,
                    position: None,
                });
                String::new()
            }
        };
        days.push(Day::new(day_index, title, exercises));
    }

    let kind = raw
        .kind
        .as_deref()
        .and_then(ProgramKind::parse)
        .unwrap_or_default();
    let title = non_blank(raw.title.as_deref())
        .map_or_else(|| format!("Untitled {}", kind.as_str()), ToOwned::to_owned);

    let program = Program::new(id, kind, title, days)?;
    Ok(Ingested {
        value: program,
        notes,
    })
}

/// Turn a backend progress document into a `ProgressRecord` for `program_id`.
///
/// Unparseable ids and unknown achievements are dropped and reported.
#[must_use]
pub fn normalize_progress(program_id: ProgramId, raw: &RawProgress) -> Ingested<ProgressRecord> {
    let mut notes = Vec::new();

    let completed: CompletedSet = raw
        .completed
        .iter()
        .filter_map(|id| match id.parse() {
            Some(value) => Some(ExerciseId::new(value)),
            None => {
                notes.push(IngestNote::DroppedCompletedId(id.describe()));
                None
            }
        })
        .collect();

    let achievements: AchievementSet = raw
        .achievements
        .iter()
        .filter_map(|a| match Achievement::from_id(a.trim()) {
            Some(achievement) => Some(achievement),
            None => {
                notes.push(IngestNote::UnknownAchievement(a.clone()));
                None
            }
        })
        .collect();

    let streak = Streak::from_persisted(raw.streak.unwrap_or(0), raw.last_completed_on);

    Ingested {
        value: ProgressRecord::from_persisted(
            program_id,
            completed,
            streak,
            achievements,
            raw.program_completed.unwrap_or(false),
        ),
        notes,
    }
}

/// Raw document for a typed program; normalizing it yields the same program.
#[must_use]
pub fn raw_program(program: &Program) -> RawProgram {
    let days = program
        .days()
        .iter()
        .map(|day| RawDay {
            title: Some(day.title().to_owned()),
            exercises: day.exercises().iter().map(raw_exercise).collect(),
        })
        .collect();
    RawProgram {
        id: Some(RawId::Number(program.id().value())),
        title: Some(program.title().to_owned()),
        kind: Some(program.kind().as_str().to_owned()),
        days,
    }
}

fn raw_exercise(exercise: &Exercise) -> RawExercise {
    let (duration, reps, sets) = match exercise.kind() {
        ExerciseKind::Time { duration_secs } => (duration_secs, None, None),
        ExerciseKind::Reps { reps, sets } => (None, reps, sets),
    };
    RawExercise {
        id: Some(RawId::Number(exercise.id().value())),
        title: Some(exercise.title().to_owned()),
        kind: Some(exercise.kind().label().to_owned()),
        duration: duration.map(f64::from),
        reps: reps.map(f64::from),
        sets: sets.map(f64::from),
        calories: exercise.calories().map(f64::from),
        section: Some(exercise.section().as_str().to_owned()),
    }
}

/// Inverse of `normalize_progress`, used by backends that speak the raw shape.
#[must_use]
pub fn raw_progress(record: &ProgressRecord) -> RawProgress {
    RawProgress {
        completed: record
            .completed()
            .iter()
            .map(|id| RawId::Number(id.value()))
            .collect(),
        streak: Some(record.streak().count()),
        last_completed_on: record.streak().last_completed_on(),
        achievements: record
            .achievements()
            .iter()
            .map(|a| a.as_str().to_owned())
            .collect(),
        program_completed: Some(record.program_completed()),
    }
}
