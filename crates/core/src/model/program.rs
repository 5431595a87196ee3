use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::exercise::Exercise;
use crate::model::ids::{ExerciseId, ProgramId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgramError {
    #[error("program title cannot be empty")]
    EmptyTitle,

    #[error("exercise {0} appears more than once in the program")]
    DuplicateExercise(ExerciseId),
}

//
// ─── DAY ───────────────────────────────────────────────────────────────────────
//

/// Ordered container of exercises. An empty day is a rest day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    index: usize,
    title: String,
    exercises: Vec<Exercise>,
}

impl Day {
    #[must_use]
    pub fn new(index: usize, title: impl Into<String>, exercises: Vec<Exercise>) -> Self {
        let title = title.into().trim().to_owned();
        let title = if title.is_empty() {
            format!("Day {}", index + 1)
        } else {
            title
        };
        Self {
            index,
            title,
            exercises,
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    #[must_use]
    pub fn exercise(&self, index: usize) -> Option<&Exercise> {
        self.exercises.get(index)
    }

    #[must_use]
    pub fn is_rest_day(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn exercise_ids(&self) -> impl Iterator<Item = ExerciseId> + '_ {
        self.exercises.iter().map(Exercise::id)
    }

    #[must_use]
    pub fn contains(&self, id: ExerciseId) -> bool {
        self.exercises.iter().any(|e| e.id() == id)
    }
}

//
// ─── PROGRAM ───────────────────────────────────────────────────────────────────
//

/// Whether the plan is a regular program or a gamified challenge.
///
/// Both share every tracking rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProgramKind {
    #[default]
    Program,
    Challenge,
}

impl ProgramKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Challenge => "challenge",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "program" => Some(Self::Program),
            "challenge" => Some(Self::Challenge),
            _ => None,
        }
    }
}

/// A trainer-authored multi-day plan (program or challenge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    id: ProgramId,
    kind: ProgramKind,
    title: String,
    days: Vec<Day>,
}

impl Program {
    /// Creates a new Program.
    ///
    /// Day indices are reassigned to match their position.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::EmptyTitle` for a blank title and
    /// `ProgramError::DuplicateExercise` when an exercise id is reused.
    pub fn new(
        id: ProgramId,
        kind: ProgramKind,
        title: impl Into<String>,
        days: Vec<Day>,
    ) -> Result<Self, ProgramError> {
        let title = title.into();
        let title = title.trim();
        if title.is_empty() {
            return Err(ProgramError::EmptyTitle);
        }

        let mut seen = HashSet::new();
        for id in days.iter().flat_map(Day::exercise_ids) {
            if !seen.insert(id) {
                return Err(ProgramError::DuplicateExercise(id));
            }
        }

        let days = days
            .into_iter()
            .enumerate()
            .map(|(index, day)| Day { index, ..day })
            .collect();

        Ok(Self {
            id,
            kind,
            title: title.to_owned(),
            days,
        })
    }

    #[must_use]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn days(&self) -> &[Day] {
        &self.days
    }

    #[must_use]
    pub fn day(&self, index: usize) -> Option<&Day> {
        self.days.get(index)
    }

    /// Sum of exercise counts across all days.
    #[must_use]
    pub fn total_exercises(&self) -> usize {
        self.days.iter().map(|d| d.exercises().len()).sum()
    }

    pub fn exercise_ids(&self) -> impl Iterator<Item = ExerciseId> + '_ {
        self.days.iter().flat_map(Day::exercise_ids)
    }

    #[must_use]
    pub fn contains(&self, id: ExerciseId) -> bool {
        self.days.iter().any(|d| d.contains(id))
    }
}
