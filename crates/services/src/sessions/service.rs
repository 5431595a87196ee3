use chrono::{DateTime, Utc};
use fitrack_core::model::{Biometrics, Day, DayStatus, Exercise, Program, ProgramId, ProgressRecord};
use fitrack_core::progression::{Cursor, DayOverview, SectionFilter};
use fitrack_core::timer::{ExerciseTimer, TimerState};
use fitrack_core::tracker::{SelectionError, Tracker};

use super::progress::SessionProgress;

//
// ─── PENDING ACKNOWLEDGEMENTS ──────────────────────────────────────────────────
//

/// Follow-up write that has not reached the backend yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingAck {
    DayCompleted {
        day_index: usize,
        biometrics: Option<Biometrics>,
        at: DateTime<Utc>,
    },
    ProgramCompleted {
        at: DateTime<Utc>,
    },
}

impl PendingAck {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::DayCompleted { .. } => "complete day",
            Self::ProgramCompleted { .. } => "complete program",
        }
    }
}

/// Reset kept locally after the backend refused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReset {
    Day(usize),
    Program,
}

impl PendingReset {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Day(_) => "reset day",
            Self::Program => "reset program",
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Explicit tracking session for one program or challenge.
///
/// Wraps the core `Tracker` with the sync bookkeeping the workflow needs:
/// acknowledgements still owed to the backend, readings to attach to the
/// next day completion, and whether local state was reset without the
/// backend agreeing.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSession {
    tracker: Tracker,
    pending: Vec<PendingAck>,
    readings: Option<Biometrics>,
    pending_resets: Vec<PendingReset>,
}

impl WorkoutSession {
    #[must_use]
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker,
            pending: Vec::new(),
            readings: None,
            pending_resets: Vec::new(),
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut Tracker {
        &mut self.tracker
    }

    #[must_use]
    pub fn program(&self) -> &Program {
        self.tracker.program()
    }

    #[must_use]
    pub fn program_id(&self) -> ProgramId {
        self.tracker.program().id()
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressRecord {
        self.tracker.progress()
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.tracker.cursor()
    }

    #[must_use]
    pub fn timer(&self) -> &ExerciseTimer {
        self.tracker.timer()
    }

    #[must_use]
    pub fn current_day(&self) -> Option<&Day> {
        self.tracker.current_day()
    }

    #[must_use]
    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.tracker.current_exercise()
    }

    #[must_use]
    pub fn overview(&self) -> Vec<DayOverview> {
        self.tracker.overview()
    }

    #[must_use]
    pub fn filtered_exercises(&self, filter: SectionFilter, query: &str) -> Vec<&Exercise> {
        self.tracker.filtered_exercises(filter, query)
    }

    /// Aggregated progress numbers for display.
    #[must_use]
    pub fn summary(&self) -> SessionProgress {
        let current_day = self.tracker.cursor().day;
        SessionProgress {
            completed: self.tracker.completed_count(),
            total: self.tracker.total_exercises(),
            percent: self.tracker.percent(),
            streak: self.tracker.progress().streak().count(),
            achievements: self.tracker.progress().achievements().len(),
            current_day,
            current_day_status: self
                .tracker
                .day_status(current_day)
                .unwrap_or(DayStatus::Rest),
            pending_acks: self.pending.len(),
            diverged: self.is_diverged(),
        }
    }

    //
    // ─── SELECTION & TIMER ─────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `SelectionError::DayOutOfRange` for an unknown day.
    pub fn select_day(&mut self, index: usize) -> Result<(), SelectionError> {
        self.tracker.select_day(index)
    }

    /// # Errors
    ///
    /// Returns `SelectionError::ExerciseOutOfRange` for an unknown exercise.
    pub fn select_exercise(&mut self, index: usize) -> Result<(), SelectionError> {
        self.tracker.select_exercise(index)
    }

    pub fn toggle_timer(&mut self) -> TimerState {
        self.tracker.toggle_timer()
    }

    pub fn pause_timer(&mut self) {
        self.tracker.pause_timer();
    }

    //
    // ─── SYNC BOOKKEEPING ──────────────────────────────────────────────────────
    //

    /// Readings attached to the next day completion sent to the backend.
    pub fn set_readings(&mut self, readings: Option<Biometrics>) {
        self.readings = readings.filter(|r| !r.is_empty());
    }

    #[must_use]
    pub fn readings(&self) -> Option<Biometrics> {
        self.readings
    }

    pub(crate) fn take_readings(&mut self) -> Option<Biometrics> {
        self.readings.take()
    }

    #[must_use]
    pub fn pending(&self) -> &[PendingAck] {
        &self.pending
    }

    pub(crate) fn queue(&mut self, ack: PendingAck) {
        if !self.pending.contains(&ack) {
            self.pending.push(ack);
        }
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingAck> {
        std::mem::take(&mut self.pending)
    }

    /// Drop acknowledgements made stale by a reset.
    pub(crate) fn forget_pending(&mut self, day_index: Option<usize>) {
        self.pending.retain(|ack| match (ack, day_index) {
            (PendingAck::DayCompleted { day_index: d, .. }, Some(reset)) => *d != reset,
            _ => false,
        });
    }

    /// True after a local-only reset until the next successful sync.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        !self.pending_resets.is_empty()
    }

    #[must_use]
    pub fn pending_resets(&self) -> &[PendingReset] {
        &self.pending_resets
    }

    /// Remember a local-only reset. A program reset covers every day reset.
    pub(crate) fn keep_reset(&mut self, reset: PendingReset) {
        if self.pending_resets.contains(&reset)
            || self.pending_resets.contains(&PendingReset::Program)
        {
            return;
        }
        if reset == PendingReset::Program {
            self.pending_resets.clear();
        }
        self.pending_resets.push(reset);
    }

    /// Drop local-only resets made redundant by a stored one.
    pub(crate) fn settle_resets(&mut self, stored: PendingReset) {
        match stored {
            PendingReset::Program => self.pending_resets.clear(),
            day => self.pending_resets.retain(|r| *r != day),
        }
    }

    pub(crate) fn take_resets(&mut self) -> Vec<PendingReset> {
        std::mem::take(&mut self.pending_resets)
    }
}
