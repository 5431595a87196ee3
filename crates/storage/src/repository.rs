use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fitrack_core::model::{
    Biometrics, ExerciseId, Program, ProgramId, ProgramKind, ProgressRecord, Streak,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Lightweight listing entry for the program picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSummary {
    pub id: ProgramId,
    pub kind: ProgramKind,
    pub title: String,
    pub days: usize,
    pub exercises: usize,
}

impl ProgramSummary {
    #[must_use]
    pub fn from_program(program: &Program) -> Self {
        Self {
            id: program.id(),
            kind: program.kind(),
            title: program.title().to_owned(),
            days: program.days().len(),
            exercises: program.total_exercises(),
        }
    }
}

/// "Complete exercise" request sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRequest {
    pub program_id: ProgramId,
    pub day_index: usize,
    pub exercise_id: ExerciseId,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRequest {
    #[must_use]
    pub fn completed_on(&self) -> NaiveDate {
        self.completed_at.date_naive()
    }
}

/// "Complete day" request, optionally carrying biometric readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayCompletionRequest {
    pub program_id: ProgramId,
    pub day_index: usize,
    pub biometrics: Option<Biometrics>,
    pub completed_at: DateTime<Utc>,
}

/// Program/challenge catalog.
#[async_trait]
pub trait ProgramRepository: Send + Sync {
    /// List every program and challenge available to the user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn list_programs(&self) -> Result<Vec<ProgramSummary>, StorageError>;

    /// Fetch the full day/exercise tree of a program.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the program cannot be read.
    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>, StorageError>;

    /// Persist or replace a program tree.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the program cannot be stored.
    async fn upsert_program(&self, program: &Program) -> Result<(), StorageError>;
}

/// Per-program progress: completions, streak and achievements.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Current progress; an empty record when the user never started.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if progress cannot be read.
    async fn get_progress(&self, program_id: ProgramId) -> Result<ProgressRecord, StorageError>;

    /// Record a completed exercise and return the updated snapshot.
    ///
    /// Calling this twice with the same exercise id is safe.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exercise is not part of the
    /// program, or other storage errors.
    async fn complete_exercise(
        &self,
        request: &CompletionRequest,
    ) -> Result<ProgressRecord, StorageError>;

    /// Record a completed day and return the current streak.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the completion cannot be stored.
    async fn complete_day(&self, request: &DayCompletionRequest) -> Result<Streak, StorageError>;

    /// Remove the completions of one day.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown program or day.
    async fn reset_day(&self, program_id: ProgramId, day_index: usize)
    -> Result<(), StorageError>;

    /// Remove every completion of a program. Streak and achievements stay.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the reset cannot be stored.
    async fn reset_program(&self, program_id: ProgramId) -> Result<(), StorageError>;

    /// Acknowledge that every exercise of the program is done.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the acknowledgement cannot be stored.
    async fn mark_program_complete(
        &self,
        program_id: ProgramId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Apply a completion to a stored record the way the backend does: insert,
/// then update streak and achievements only when the id is new.
///
/// Returns false when the exercise was already completed.
pub fn apply_completion(
    record: &mut ProgressRecord,
    program: &Program,
    exercise_id: ExerciseId,
    on: NaiveDate,
) -> bool {
    if !record.completed_mut().insert(exercise_id) {
        return false;
    }
    record.streak_mut().record(on);
    let count = record.completed_count(program);
    let streak = record.streak().count();
    record.achievements_mut().evaluate(count, streak);
    true
}

/// Stored day completion, kept for history.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCompletionRecord {
    pub program_id: ProgramId,
    pub day_index: usize,
    pub biometrics: Option<Biometrics>,
    pub completed_at: DateTime<Utc>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    programs: Arc<Mutex<HashMap<ProgramId, Program>>>,
    progress: Arc<Mutex<HashMap<ProgramId, ProgressRecord>>>,
    day_completions: Arc<Mutex<Vec<DayCompletionRecord>>>,
}

fn poisoned<E: ToString>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn program(&self, id: ProgramId) -> Result<Program, StorageError> {
        let guard = self.programs.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    /// Day completions recorded so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn day_completions(&self) -> Result<Vec<DayCompletionRecord>, StorageError> {
        let guard = self.day_completions.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl ProgramRepository for InMemoryRepository {
    async fn list_programs(&self) -> Result<Vec<ProgramSummary>, StorageError> {
        let guard = self.programs.lock().map_err(poisoned)?;
        let mut list: Vec<_> = guard.values().map(ProgramSummary::from_program).collect();
        list.sort_by_key(|p| p.id);
        Ok(list)
    }

    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>, StorageError> {
        let guard = self.programs.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn upsert_program(&self, program: &Program) -> Result<(), StorageError> {
        let mut guard = self.programs.lock().map_err(poisoned)?;
        guard.insert(program.id(), program.clone());
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(&self, program_id: ProgramId) -> Result<ProgressRecord, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard
            .get(&program_id)
            .cloned()
            .unwrap_or_else(|| ProgressRecord::empty(program_id)))
    }

    async fn complete_exercise(
        &self,
        request: &CompletionRequest,
    ) -> Result<ProgressRecord, StorageError> {
        let program = self.program(request.program_id)?;
        let in_day = program
            .day(request.day_index)
            .is_some_and(|d| d.contains(request.exercise_id));
        if !in_day {
            return Err(StorageError::NotFound);
        }

        let mut guard = self.progress.lock().map_err(poisoned)?;
        let record = guard
            .entry(request.program_id)
            .or_insert_with(|| ProgressRecord::empty(request.program_id));
        apply_completion(record, &program, request.exercise_id, request.completed_on());
        Ok(record.clone())
    }

    async fn complete_day(&self, request: &DayCompletionRequest) -> Result<Streak, StorageError> {
        let program = self.program(request.program_id)?;
        if program.day(request.day_index).is_none() {
            return Err(StorageError::NotFound);
        }
        self.day_completions
            .lock()
            .map_err(poisoned)?
            .push(DayCompletionRecord {
                program_id: request.program_id,
                day_index: request.day_index,
                biometrics: request.biometrics,
                completed_at: request.completed_at,
            });
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard
            .get(&request.program_id)
            .map(ProgressRecord::streak)
            .unwrap_or_default())
    }

    async fn reset_day(
        &self,
        program_id: ProgramId,
        day_index: usize,
    ) -> Result<(), StorageError> {
        let program = self.program(program_id)?;
        let day = program.day(day_index).ok_or(StorageError::NotFound)?;
        let mut guard = self.progress.lock().map_err(poisoned)?;
        if let Some(record) = guard.get_mut(&program_id) {
            record.completed_mut().remove_all(day.exercise_ids());
            record.set_program_completed(false);
        }
        Ok(())
    }

    async fn reset_program(&self, program_id: ProgramId) -> Result<(), StorageError> {
        let program = self.program(program_id)?;
        let mut guard = self.progress.lock().map_err(poisoned)?;
        if let Some(record) = guard.get_mut(&program_id) {
            record.completed_mut().remove_all(program.exercise_ids());
            record.set_program_completed(false);
        }
        Ok(())
    }

    async fn mark_program_complete(
        &self,
        program_id: ProgramId,
        _at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard
            .entry(program_id)
            .or_insert_with(|| ProgressRecord::empty(program_id))
            .set_program_completed(true);
        Ok(())
    }
}

/// Aggregates program and progress repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub programs: Arc<dyn ProgramRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let programs: Arc<dyn ProgramRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { programs, progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitrack_core::model::{Achievement, Day, Exercise, ExerciseKind, Section};
    use fitrack_core::time::fixed_now;

    fn build_program() -> Program {
        let ex = |id: u64| {
            Exercise::new(
                ExerciseId::new(id),
                format!("Ex {id}"),
                ExerciseKind::Time {
                    duration_secs: Some(30),
                },
                None,
                Section::Workout,
            )
            .unwrap()
        };
        Program::new(
            ProgramId::new(1),
            ProgramKind::Program,
            "Starter",
            vec![
                Day::new(0, "One", vec![ex(1), ex(2)]),
                Day::new(1, "Two", vec![ex(3)]),
            ],
        )
        .unwrap()
    }

    fn request(exercise: u64, day_index: usize) -> CompletionRequest {
        CompletionRequest {
            program_id: ProgramId::new(1),
            day_index,
            exercise_id: ExerciseId::new(exercise),
            completed_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn unknown_progress_is_empty() {
        let repo = InMemoryRepository::new();
        let progress = repo.get_progress(ProgramId::new(5)).await.unwrap();
        assert!(progress.completed().is_empty());
        assert_eq!(progress.program_id(), ProgramId::new(5));
    }

    #[tokio::test]
    async fn completion_is_idempotent_and_updates_streak() {
        let repo = InMemoryRepository::new();
        repo.upsert_program(&build_program()).await.unwrap();

        let first = repo.complete_exercise(&request(1, 0)).await.unwrap();
        let again = repo.complete_exercise(&request(1, 0)).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(again.completed().len(), 1);
        assert_eq!(again.streak().count(), 1);
        assert!(again.achievements().contains(Achievement::FirstExercise));
    }

    #[tokio::test]
    async fn completion_rejects_exercise_from_other_day() {
        let repo = InMemoryRepository::new();
        repo.upsert_program(&build_program()).await.unwrap();
        let err = repo.complete_exercise(&request(3, 0)).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn reset_day_only_touches_that_day() {
        let repo = InMemoryRepository::new();
        repo.upsert_program(&build_program()).await.unwrap();
        repo.complete_exercise(&request(1, 0)).await.unwrap();
        repo.complete_exercise(&request(3, 1)).await.unwrap();

        repo.reset_day(ProgramId::new(1), 0).await.unwrap();
        let progress = repo.get_progress(ProgramId::new(1)).await.unwrap();
        let ids: Vec<_> = progress.completed().iter().map(|id| id.value()).collect();
        assert_eq!(ids, vec![3]);
        assert_eq!(progress.streak().count(), 1);
    }

    #[tokio::test]
    async fn day_completion_is_recorded_with_biometrics() {
        let repo = InMemoryRepository::new();
        repo.upsert_program(&build_program()).await.unwrap();
        repo.complete_exercise(&request(3, 1)).await.unwrap();

        let streak = repo
            .complete_day(&DayCompletionRequest {
                program_id: ProgramId::new(1),
                day_index: 1,
                biometrics: Some(Biometrics::new(Some(130), None).unwrap()),
                completed_at: fixed_now(),
            })
            .await
            .unwrap();

        assert_eq!(streak.count(), 1);
        let history = repo.day_completions().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].biometrics.unwrap().heart_rate(), Some(130));
    }

    #[tokio::test]
    async fn lists_programs_sorted_by_id() {
        let repo = InMemoryRepository::new();
        repo.upsert_program(&build_program()).await.unwrap();
        let list = repo.list_programs().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].exercises, 3);
        assert_eq!(list[0].days, 2);
    }
}
