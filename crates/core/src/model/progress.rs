use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::achievement::AchievementSet;
use crate::model::ids::{ExerciseId, ProgramId};
use crate::model::program::{Day, Program};
use crate::model::streak::Streak;

//
// ─── COMPLETED SET ─────────────────────────────────────────────────────────────
//

/// Unique, unordered set of completed exercise ids.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletedSet(BTreeSet<ExerciseId>);

impl CompletedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the id was already present.
    pub fn insert(&mut self, id: ExerciseId) -> bool {
        self.0.insert(id)
    }

    pub fn remove(&mut self, id: ExerciseId) -> bool {
        self.0.remove(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ExerciseId) -> bool {
        self.0.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ExerciseId> + '_ {
        self.0.iter().copied()
    }

    /// Remove every id yielded by `ids`, returning how many were present.
    pub fn remove_all(&mut self, ids: impl IntoIterator<Item = ExerciseId>) -> usize {
        ids.into_iter().filter(|id| self.0.remove(id)).count()
    }
}

impl FromIterator<ExerciseId> for CompletedSet {
    fn from_iter<T: IntoIterator<Item = ExerciseId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

//
// ─── DAY STATUS ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayStatus {
    Rest,
    Pending,
    InProgress,
    Completed,
}

impl DayStatus {
    /// Classify a day against a completed set.
    #[must_use]
    pub fn classify(day: &Day, completed: &CompletedSet) -> Self {
        if day.is_rest_day() {
            return Self::Rest;
        }
        let done = day.exercise_ids().filter(|id| completed.contains(*id)).count();
        if done == day.exercises().len() {
            Self::Completed
        } else if done > 0 {
            Self::InProgress
        } else {
            Self::Pending
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

//
// ─── PROGRESS RECORD ───────────────────────────────────────────────────────────
//

/// Persisted progress for one program or challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    program_id: ProgramId,
    completed: CompletedSet,
    streak: Streak,
    achievements: AchievementSet,
    program_completed: bool,
}

impl ProgressRecord {
    /// Fresh record with nothing completed.
    #[must_use]
    pub fn empty(program_id: ProgramId) -> Self {
        Self {
            program_id,
            completed: CompletedSet::new(),
            streak: Streak::default(),
            achievements: AchievementSet::new(),
            program_completed: false,
        }
    }

    #[must_use]
    pub fn from_persisted(
        program_id: ProgramId,
        completed: CompletedSet,
        streak: Streak,
        achievements: AchievementSet,
        program_completed: bool,
    ) -> Self {
        Self {
            program_id,
            completed,
            streak,
            achievements,
            program_completed,
        }
    }

    #[must_use]
    pub fn program_id(&self) -> ProgramId {
        self.program_id
    }

    #[must_use]
    pub fn completed(&self) -> &CompletedSet {
        &self.completed
    }

    pub fn completed_mut(&mut self) -> &mut CompletedSet {
        &mut self.completed
    }

    #[must_use]
    pub fn streak(&self) -> Streak {
        self.streak
    }

    pub fn streak_mut(&mut self) -> &mut Streak {
        &mut self.streak
    }

    #[must_use]
    pub fn achievements(&self) -> &AchievementSet {
        &self.achievements
    }

    pub fn achievements_mut(&mut self) -> &mut AchievementSet {
        &mut self.achievements
    }

    /// Whether the backend has acknowledged full completion.
    #[must_use]
    pub fn program_completed(&self) -> bool {
        self.program_completed
    }

    pub fn set_program_completed(&mut self, done: bool) {
        self.program_completed = done;
    }

    /// Completed exercises that belong to `program`.
    ///
    /// Ids left over from an older revision of the program are not counted,
    /// so this never exceeds `program.total_exercises()`.
    #[must_use]
    pub fn completed_count(&self, program: &Program) -> usize {
        program
            .exercise_ids()
            .filter(|id| self.completed.contains(*id))
            .count()
    }

    /// `round(completed / total × 100)`, 0 for an empty program.
    #[must_use]
    pub fn percent(&self, program: &Program) -> u8 {
        percent(self.completed_count(program), program.total_exercises())
    }

    #[must_use]
    pub fn is_program_done(&self, program: &Program) -> bool {
        let total = program.total_exercises();
        total > 0 && self.completed_count(program) >= total
    }
}

/// Rounded percentage clamped to `0..=100`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = (done.min(total) as f64 / total as f64) * 100.0;
    ratio.round().clamp(0.0, 100.0) as u8
}
