use serde::{Deserialize, Serialize};

use crate::model::{Exercise, ExerciseId, TrackerSettings};

/// Countdown phase for the selected exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    /// Fresh countdown, never started.
    Idle,
    Running,
    /// Stopped part way; remaining seconds are kept.
    Paused,
    /// Reached zero or the exercise was completed by hand.
    Completed,
}

/// Result of a single one-second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer was not running; nothing changed.
    Ignored,
    Counting { remaining_secs: u32 },
    /// Countdown hit zero for this exercise; completion should run with the
    /// automatic flag.
    Expired { exercise_id: ExerciseId },
}

/// Single countdown owned by the currently selected exercise.
///
/// The timer never ticks by itself: the owner feeds it one tick per elapsed
/// second, so a stale interval can only reach it through the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseTimer {
    exercise_id: Option<ExerciseId>,
    duration_secs: u32,
    remaining_secs: u32,
    state: TimerState,
}

impl ExerciseTimer {
    /// Idle countdown for `exercise` (or an inert timer on a rest day).
    #[must_use]
    pub fn for_exercise(exercise: Option<&Exercise>, settings: &TrackerSettings) -> Self {
        let duration_secs = exercise.map_or(0, |e| e.planned_secs(settings));
        Self {
            exercise_id: exercise.map(Exercise::id),
            duration_secs,
            remaining_secs: duration_secs,
            state: TimerState::Idle,
        }
    }

    #[must_use]
    pub fn exercise_id(&self) -> Option<ExerciseId> {
        self.exercise_id
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Start/Pause toggle.
    ///
    /// A completed countdown restarts from its full duration. Without an
    /// exercise the toggle does nothing.
    pub fn toggle(&mut self) -> TimerState {
        if self.exercise_id.is_none() {
            return self.state;
        }
        self.state = match self.state {
            TimerState::Idle | TimerState::Paused => TimerState::Running,
            TimerState::Running => TimerState::Paused,
            TimerState::Completed => {
                self.remaining_secs = self.duration_secs;
                TimerState::Running
            }
        };
        self.state
    }

    /// Pause if running. Used when the owner loses focus.
    pub fn pause(&mut self) {
        if self.state == TimerState::Running {
            self.state = TimerState::Paused;
        }
    }

    /// Remove exactly one second while running.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != TimerState::Running {
            return TickOutcome::Ignored;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return TickOutcome::Counting {
                remaining_secs: self.remaining_secs,
            };
        }
        self.state = TimerState::Completed;
        match self.exercise_id {
            Some(exercise_id) => TickOutcome::Expired { exercise_id },
            None => TickOutcome::Ignored,
        }
    }

    /// Stop and zero the countdown after a manual completion.
    pub fn finish(&mut self) {
        self.remaining_secs = 0;
        self.state = TimerState::Completed;
    }
}
