use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{
    Achievement, Day, DayStatus, Exercise, ExerciseId, Program, ProgramId, ProgressRecord,
    StreakChange, TrackerSettings,
};
use crate::progression::{
    filter_exercises, next_position, program_overview, Advance, Cursor, DayOverview, SectionFilter,
};
use crate::timer::{ExerciseTimer, TickOutcome, TimerState};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("day {index} is out of range (program has {len} days)")]
    DayOutOfRange { index: usize, len: usize },

    #[error("exercise {index} is out of range (day has {len} exercises)")]
    ExerciseOutOfRange { index: usize, len: usize },

    #[error("no exercise is selected")]
    NoExercise,
}

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// Side effects of a completion, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    ExerciseCompleted {
        exercise_id: ExerciseId,
        day: usize,
        automatic: bool,
    },
    StreakUpdated {
        count: u32,
        change: StreakChange,
    },
    AchievementUnlocked(Achievement),
    DayCompleted {
        day: usize,
    },
    ProgramCompleted {
        program_id: ProgramId,
    },
}

/// Result of a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub exercise_id: ExerciseId,
    /// False when the exercise was already completed (request was a no-op).
    pub inserted: bool,
    pub events: Vec<TrackerEvent>,
    /// Where the selection moved; `None` for a no-op.
    pub advance: Option<Advance>,
    pub percent: u8,
}

impl CompletionOutcome {
    #[must_use]
    pub fn day_completed(&self) -> Option<usize> {
        self.events.iter().find_map(|e| match e {
            TrackerEvent::DayCompleted { day } => Some(*day),
            _ => None,
        })
    }

    #[must_use]
    pub fn program_completed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, TrackerEvent::ProgramCompleted { .. }))
    }
}

//
// ─── TRACKER ───────────────────────────────────────────────────────────────────
//

/// Workout/challenge tracking state for one program.
///
/// Owns the program tree, its progress record, the current selection and
/// the single countdown for the selected exercise. Every selection change
/// rebuilds the countdown in the paused state.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracker {
    program: Program,
    progress: ProgressRecord,
    settings: TrackerSettings,
    cursor: Cursor,
    timer: ExerciseTimer,
}

impl Tracker {
    /// Build a tracker positioned on the first exercise of the first day.
    ///
    /// A progress record for a different program is replaced by an empty one.
    #[must_use]
    pub fn new(program: Program, progress: ProgressRecord, settings: TrackerSettings) -> Self {
        let progress = if progress.program_id() == program.id() {
            progress
        } else {
            ProgressRecord::empty(program.id())
        };
        let cursor = Cursor::default();
        let timer = ExerciseTimer::for_exercise(
            program.day(0).and_then(|d| d.exercise(0)),
            &settings,
        );
        Self {
            program,
            progress,
            settings,
            cursor,
            timer,
        }
    }

    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressRecord {
        &self.progress
    }

    #[must_use]
    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    #[must_use]
    pub fn timer(&self) -> &ExerciseTimer {
        &self.timer
    }

    #[must_use]
    pub fn current_day(&self) -> Option<&Day> {
        self.program.day(self.cursor.day)
    }

    #[must_use]
    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.current_day().and_then(|d| d.exercise(self.cursor.exercise))
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.progress.completed_count(&self.program)
    }

    #[must_use]
    pub fn total_exercises(&self) -> usize {
        self.program.total_exercises()
    }

    #[must_use]
    pub fn percent(&self) -> u8 {
        self.progress.percent(&self.program)
    }

    #[must_use]
    pub fn day_status(&self, index: usize) -> Option<DayStatus> {
        self.program
            .day(index)
            .map(|day| DayStatus::classify(day, self.progress.completed()))
    }

    #[must_use]
    pub fn overview(&self) -> Vec<DayOverview> {
        program_overview(&self.program, self.progress.completed(), &self.settings)
    }

    /// Current day's exercises narrowed by section and title query.
    #[must_use]
    pub fn filtered_exercises(&self, filter: SectionFilter, query: &str) -> Vec<&Exercise> {
        self.current_day()
            .map(|day| filter_exercises(day, filter, query))
            .unwrap_or_default()
    }

    //
    // ─── SELECTION ─────────────────────────────────────────────────────────────
    //

    /// Select a day; the exercise index returns to 0.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::DayOutOfRange` for an unknown day.
    pub fn select_day(&mut self, index: usize) -> Result<(), SelectionError> {
        let len = self.program.days().len();
        if index >= len {
            return Err(SelectionError::DayOutOfRange { index, len });
        }
        self.move_to(Cursor::new(index, 0));
        Ok(())
    }

    /// Select an exercise in the current day.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::ExerciseOutOfRange` for an unknown index.
    pub fn select_exercise(&mut self, index: usize) -> Result<(), SelectionError> {
        let len = self.current_day().map_or(0, |d| d.exercises().len());
        if index >= len {
            return Err(SelectionError::ExerciseOutOfRange { index, len });
        }
        self.move_to(Cursor::new(self.cursor.day, index));
        Ok(())
    }

    fn move_to(&mut self, cursor: Cursor) {
        self.cursor = cursor;
        self.timer = ExerciseTimer::for_exercise(self.current_exercise(), &self.settings);
    }

    //
    // ─── TIMER ─────────────────────────────────────────────────────────────────
    //

    pub fn toggle_timer(&mut self) -> TimerState {
        self.timer.toggle()
    }

    pub fn pause_timer(&mut self) {
        self.timer.pause();
    }

    /// Feed one elapsed second. When the countdown expires the exercise is
    /// completed with the automatic flag and the outcome is returned.
    pub fn tick(&mut self, today: NaiveDate) -> Option<CompletionOutcome> {
        match self.timer.tick() {
            TickOutcome::Expired { exercise_id } => {
                if self.current_exercise().map(Exercise::id) != Some(exercise_id) {
                    return None;
                }
                self.complete_current(today, true).ok()
            }
            TickOutcome::Ignored | TickOutcome::Counting { .. } => None,
        }
    }

    //
    // ─── COMPLETION ────────────────────────────────────────────────────────────
    //

    /// Mark the selected exercise as done and advance.
    ///
    /// Completing an exercise that is already done changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::NoExercise` on a rest day.
    pub fn complete_current(
        &mut self,
        today: NaiveDate,
        automatic: bool,
    ) -> Result<CompletionOutcome, SelectionError> {
        let exercise_id = self
            .current_exercise()
            .map(Exercise::id)
            .ok_or(SelectionError::NoExercise)?;

        if !self.progress.completed_mut().insert(exercise_id) {
            return Ok(CompletionOutcome {
                exercise_id,
                inserted: false,
                events: Vec::new(),
                advance: None,
                percent: self.percent(),
            });
        }

        let day = self.cursor.day;
        let mut events = vec![TrackerEvent::ExerciseCompleted {
            exercise_id,
            day,
            automatic,
        }];

        let change = self.progress.streak_mut().record(today);
        if change != StreakChange::Unchanged {
            events.push(TrackerEvent::StreakUpdated {
                count: self.progress.streak().count(),
                change,
            });
        }

        let completed_count = self.completed_count();
        let streak = self.progress.streak().count();
        events.extend(
            self.progress
                .achievements_mut()
                .evaluate(completed_count, streak)
                .into_iter()
                .map(TrackerEvent::AchievementUnlocked),
        );

        if self.day_status(day) == Some(DayStatus::Completed) {
            events.push(TrackerEvent::DayCompleted { day });
        }
        if self.progress.is_program_done(&self.program) {
            events.push(TrackerEvent::ProgramCompleted {
                program_id: self.program.id(),
            });
        }

        let advance = self.advance();
        Ok(CompletionOutcome {
            exercise_id,
            inserted: true,
            events,
            advance: Some(advance),
            percent: self.percent(),
        })
    }

    /// Move on without marking anything complete.
    pub fn skip(&mut self) -> Advance {
        self.advance()
    }

    fn advance(&mut self) -> Advance {
        let advance = next_position(&self.program, self.cursor, self.progress.completed());
        match advance {
            Advance::SameDay(cursor) | Advance::NextDay(cursor) => self.move_to(cursor),
            Advance::Stay(_) => self.timer.finish(),
        }
        advance
    }

    //
    // ─── RESET ─────────────────────────────────────────────────────────────────
    //

    /// Clear the current day's completions and go back to its first exercise.
    ///
    /// Streak and achievements are kept. Returns how many ids were removed.
    pub fn reset_day(&mut self) -> usize {
        let ids: Vec<ExerciseId> = self
            .current_day()
            .map(|d| d.exercise_ids().collect())
            .unwrap_or_default();
        let removed = self.progress.completed_mut().remove_all(ids);
        self.progress.set_program_completed(false);
        self.move_to(Cursor::new(self.cursor.day, 0));
        removed
    }

    /// Clear every completion in the program and go back to day 0.
    ///
    /// Streak and achievements are kept. Returns how many ids were removed.
    pub fn reset_program(&mut self) -> usize {
        let ids: Vec<ExerciseId> = self.program.exercise_ids().collect();
        let removed = self.progress.completed_mut().remove_all(ids);
        self.progress.set_program_completed(false);
        self.move_to(Cursor::default());
        removed
    }

    //
    // ─── RECONCILE ─────────────────────────────────────────────────────────────
    //

    /// Adopt an authoritative snapshot from the backend.
    ///
    /// Completions, streak and the completion flag come from the snapshot;
    /// achievements are merged so none is lost. Selection and timer are kept.
    pub fn adopt_snapshot(&mut self, snapshot: &ProgressRecord) {
        if snapshot.program_id() != self.program.id() {
            return;
        }
        let mut achievements = snapshot.achievements().clone();
        achievements.merge(self.progress.achievements());
        self.progress = ProgressRecord::from_persisted(
            snapshot.program_id(),
            snapshot.completed().clone(),
            snapshot.streak(),
            achievements,
            snapshot.program_completed(),
        );
    }

    pub fn mark_program_acknowledged(&mut self) {
        self.progress.set_program_completed(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExerciseKind, ProgramKind, Section};

    fn ex(id: u64) -> Exercise {
        Exercise::new(
            ExerciseId::new(id),
            format!("e{id}"),
            ExerciseKind::Time {
                duration_secs: Some(3),
            },
            None,
            Section::Workout,
        )
        .unwrap()
    }

    fn tracker(days: Vec<Vec<u64>>) -> Tracker {
        let days = days
            .into_iter()
            .enumerate()
            .map(|(i, ids)| Day::new(i, "", ids.into_iter().map(ex).collect()))
            .collect();
        let program = Program::new(ProgramId::new(1), ProgramKind::Challenge, "C", days).unwrap();
        Tracker::new(
            program,
            ProgressRecord::empty(ProgramId::new(1)),
            TrackerSettings::default(),
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn ids(t: &Tracker) -> Vec<u64> {
        t.progress().completed().iter().map(|id| id.value()).collect()
    }

    #[test]
    fn completing_middle_exercise_selects_next_later_one() {
        let mut t = tracker(vec![vec![1, 2, 3]]);
        t.select_exercise(1).unwrap();
        let outcome = t.complete_current(today(), false).unwrap();

        assert!(outcome.inserted);
        assert_eq!(ids(&t), vec![2]);
        assert_eq!(t.day_status(0), Some(DayStatus::InProgress));
        assert_eq!(t.current_exercise().unwrap().id(), ExerciseId::new(3));
        assert_eq!(outcome.percent, 33);
        assert_eq!(outcome.day_completed(), None);
    }

    #[test]
    fn completing_whole_program_fires_day_and_program_events() {
        let mut t = tracker(vec![vec![1, 2, 3]]);
        t.complete_current(today(), false).unwrap();
        t.complete_current(today(), false).unwrap();
        let last = t.complete_current(today(), false).unwrap();

        assert_eq!(ids(&t), vec![1, 2, 3]);
        assert_eq!(t.day_status(0), Some(DayStatus::Completed));
        assert_eq!(last.day_completed(), Some(0));
        assert!(last.program_completed());
        assert_eq!(last.percent, 100);
        assert_eq!(last.advance, Some(Advance::Stay(Cursor::new(0, 2))));
        assert_eq!(t.timer().state(), TimerState::Completed);
    }

    #[test]
    fn finishing_a_day_moves_to_next_day() {
        let mut t = tracker(vec![vec![1], vec![2]]);
        let outcome = t.complete_current(today(), false).unwrap();
        assert_eq!(outcome.advance, Some(Advance::NextDay(Cursor::new(1, 0))));
        assert_eq!(t.current_exercise().unwrap().id(), ExerciseId::new(2));
        assert_eq!(outcome.day_completed(), Some(0));
        assert!(!outcome.program_completed());
    }

    #[test]
    fn duplicate_completion_is_a_no_op() {
        let mut t = tracker(vec![vec![1, 2]]);
        t.complete_current(today(), false).unwrap();
        t.select_exercise(0).unwrap();
        let before = t.progress().clone();
        let outcome = t.complete_current(today(), false).unwrap();

        assert!(!outcome.inserted);
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.advance, None);
        assert_eq!(t.progress(), &before);
        assert_eq!(t.cursor(), Cursor::new(0, 0));
    }

    #[test]
    fn first_completion_unlocks_first_achievement_and_starts_streak() {
        let mut t = tracker(vec![vec![1, 2]]);
        let outcome = t.complete_current(today(), false).unwrap();
        assert_eq!(
            outcome.events,
            vec![
                TrackerEvent::ExerciseCompleted {
                    exercise_id: ExerciseId::new(1),
                    day: 0,
                    automatic: false,
                },
                TrackerEvent::StreakUpdated {
                    count: 1,
                    change: StreakChange::Restarted,
                },
                TrackerEvent::AchievementUnlocked(Achievement::FirstExercise),
            ]
        );

        let second = t.complete_current(today(), false).unwrap();
        assert!(!second
            .events
            .iter()
            .any(|e| matches!(e, TrackerEvent::StreakUpdated { .. })));
    }

    #[test]
    fn tenth_completion_unlocks_ten_ex() {
        let mut t = tracker(vec![(1..=12).collect()]);
        let mut unlocked = Vec::new();
        for _ in 0..10 {
            let outcome = t.complete_current(today(), false).unwrap();
            unlocked.extend(outcome.events.into_iter().filter_map(|e| match e {
                TrackerEvent::AchievementUnlocked(a) => Some(a),
                _ => None,
            }));
        }
        assert_eq!(unlocked, vec![Achievement::FirstExercise, Achievement::TenExercises]);
    }

    #[test]
    fn skip_advances_without_completing() {
        let mut t = tracker(vec![vec![1, 2], vec![3]]);
        assert_eq!(t.skip(), Advance::SameDay(Cursor::new(0, 1)));
        assert_eq!(t.skip(), Advance::NextDay(Cursor::new(1, 0)));
        assert!(t.progress().completed().is_empty());
        assert_eq!(t.progress().streak().count(), 0);
        assert!(t.progress().achievements().is_empty());
    }

    #[test]
    fn reset_day_removes_only_that_days_ids() {
        let mut t = tracker(vec![vec![1, 2], vec![3, 4]]);
        for _ in 0..3 {
            t.complete_current(today(), false).unwrap();
        }
        assert_eq!(ids(&t), vec![1, 2, 3]);
        t.select_day(0).unwrap();
        let removed = t.reset_day();

        assert_eq!(removed, 2);
        assert_eq!(ids(&t), vec![3]);
        assert_eq!(t.cursor(), Cursor::new(0, 0));
        assert!(t.progress().achievements().contains(Achievement::FirstExercise));
        assert_eq!(t.progress().streak().count(), 1);
    }

    #[test]
    fn reset_program_returns_to_start() {
        let mut t = tracker(vec![vec![1], vec![2]]);
        t.complete_current(today(), false).unwrap();
        t.complete_current(today(), false).unwrap();
        assert_eq!(t.reset_program(), 2);
        assert!(t.progress().completed().is_empty());
        assert_eq!(t.cursor(), Cursor::default());
        assert_eq!(t.percent(), 0);
    }

    #[test]
    fn selection_change_resets_and_pauses_timer() {
        let mut t = tracker(vec![vec![1, 2]]);
        t.toggle_timer();
        t.tick(today());
        assert_eq!(t.timer().remaining_secs(), 2);
        t.select_exercise(1).unwrap();
        assert_eq!(t.timer().state(), TimerState::Idle);
        assert_eq!(t.timer().remaining_secs(), 3);
        assert_eq!(t.timer().exercise_id(), Some(ExerciseId::new(2)));
    }

    #[test]
    fn timer_expiry_completes_automatically() {
        let mut t = tracker(vec![vec![1, 2]]);
        t.toggle_timer();
        assert!(t.tick(today()).is_none());
        assert!(t.tick(today()).is_none());
        let outcome = t.tick(today()).expect("auto completion");
        assert_eq!(
            outcome.events[0],
            TrackerEvent::ExerciseCompleted {
                exercise_id: ExerciseId::new(1),
                day: 0,
                automatic: true,
            }
        );
        assert_eq!(t.current_exercise().unwrap().id(), ExerciseId::new(2));
        assert_eq!(t.timer().state(), TimerState::Idle);
    }

    #[test]
    fn selecting_out_of_range_is_rejected() {
        let mut t = tracker(vec![vec![1]]);
        assert_eq!(
            t.select_day(3).unwrap_err(),
            SelectionError::DayOutOfRange { index: 3, len: 1 }
        );
        assert_eq!(
            t.select_exercise(1).unwrap_err(),
            SelectionError::ExerciseOutOfRange { index: 1, len: 1 }
        );
    }

    #[test]
    fn rest_day_cannot_be_completed_but_can_be_skipped() {
        let mut t = tracker(vec![vec![], vec![1]]);
        assert_eq!(
            t.complete_current(today(), false).unwrap_err(),
            SelectionError::NoExercise
        );
        assert_eq!(t.skip(), Advance::NextDay(Cursor::new(1, 0)));
    }

    #[test]
    fn completed_never_exceeds_total_across_operations() {
        let mut t = tracker(vec![vec![1, 2], vec![], vec![3]]);
        let ops: [fn(&mut Tracker); 5] = [
            |t| {
                let _ = t.complete_current(today(), false);
            },
            |t| {
                t.skip();
            },
            |t| {
                t.reset_day();
            },
            |t| {
                let _ = t.select_day(0);
            },
            |t| {
                t.reset_program();
            },
        ];
        for round in 0..40 {
            ops[(round * 7 + round / 3) % ops.len()](&mut t);
            assert!(t.completed_count() <= t.total_exercises());
            assert!(t.percent() <= 100);
        }
    }

    #[test]
    fn adopting_snapshot_keeps_local_achievements() {
        let mut t = tracker(vec![vec![1, 2]]);
        t.complete_current(today(), false).unwrap();
        let snapshot = ProgressRecord::empty(ProgramId::new(1));
        t.adopt_snapshot(&snapshot);
        assert!(t.progress().completed().is_empty());
        assert!(t.progress().achievements().contains(Achievement::FirstExercise));
    }
}
