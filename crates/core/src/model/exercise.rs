use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ExerciseId;
use crate::model::settings::TrackerSettings;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExerciseError {
    #[error("exercise title cannot be empty")]
    EmptyTitle,

    #[error("unknown section: {0}")]
    UnknownSection(String),

    #[error("unknown exercise kind: {0}")]
    UnknownKind(String),
}

//
// ─── SECTION & KIND ────────────────────────────────────────────────────────────
//

/// Part of a day's session an exercise belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    WarmUp,
    Workout,
    CoolDown,
}

impl Section {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WarmUp => "Warm-up",
            Self::Workout => "Workout",
            Self::CoolDown => "Cool-down",
        }
    }

    /// Lenient parse used at ingestion: case, spaces, dashes and underscores
    /// are ignored ("warmup", "Warm-up" and "warm_up" are the same section).
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::UnknownSection` when nothing matches.
    pub fn parse_lenient(raw: &str) -> Result<Self, ExerciseError> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "warmup" => Ok(Self::WarmUp),
            "workout" | "main" => Ok(Self::Workout),
            "cooldown" => Ok(Self::CoolDown),
            _ => Err(ExerciseError::UnknownSection(raw.to_owned())),
        }
    }
}

/// How an exercise is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseKind {
    /// Held for `duration_secs` (default applies when absent).
    Time { duration_secs: Option<u32> },
    /// Performed as `reps` repetitions over `sets` sets.
    Reps { reps: Option<u32>, sets: Option<u32> },
}

impl ExerciseKind {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Time { .. } => "time",
            Self::Reps { .. } => "reps",
        }
    }
}

//
// ─── EXERCISE ──────────────────────────────────────────────────────────────────
//

/// A single trackable unit of work inside a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    id: ExerciseId,
    title: String,
    kind: ExerciseKind,
    calories: Option<f32>,
    section: Section,
}

impl Exercise {
    /// Creates a new Exercise.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::EmptyTitle` if the title is empty or whitespace-only.
    pub fn new(
        id: ExerciseId,
        title: impl Into<String>,
        kind: ExerciseKind,
        calories: Option<f32>,
        section: Section,
    ) -> Result<Self, ExerciseError> {
        let title = title.into();
        let title = title.trim();
        if title.is_empty() {
            return Err(ExerciseError::EmptyTitle);
        }
        let calories = calories.filter(|c| c.is_finite() && *c >= 0.0);
        Ok(Self {
            id,
            title: title.to_owned(),
            kind,
            calories,
            section,
        })
    }

    #[must_use]
    pub fn id(&self) -> ExerciseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn kind(&self) -> ExerciseKind {
        self.kind
    }

    #[must_use]
    pub fn calories(&self) -> Option<f32> {
        self.calories
    }

    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    /// Countdown length for this exercise under the given policy.
    #[must_use]
    pub fn planned_secs(&self, settings: &TrackerSettings) -> u32 {
        match self.kind {
            ExerciseKind::Time { duration_secs } => duration_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(settings.default_exercise_secs()),
            ExerciseKind::Reps { reps, sets } => match reps.filter(|r| *r > 0) {
                Some(reps) => reps
                    .saturating_mul(sets.filter(|s| *s > 0).unwrap_or(1))
                    .saturating_mul(settings.seconds_per_rep()),
                None => settings.default_exercise_secs(),
            },
        }
    }
}
