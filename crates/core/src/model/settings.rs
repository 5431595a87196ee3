use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("default exercise seconds must be between 5 and 3600")]
    InvalidDefaultExerciseSecs,

    #[error("seconds per rep must be between 1 and 60")]
    InvalidSecondsPerRep,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Timing policy used by the tracker.
///
/// Timed exercises use their stored duration, falling back to
/// `default_exercise_secs`. Rep-based exercises get a synthetic duration of
/// `reps × sets × seconds_per_rep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    default_exercise_secs: u32,
    seconds_per_rep: u32,
}

impl TrackerSettings {
    pub const DEFAULT_EXERCISE_SECS: u32 = 30;
    pub const SECONDS_PER_REP: u32 = 2;

    /// Creates custom tracker settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if either value is outside its allowed range.
    pub fn new(default_exercise_secs: u32, seconds_per_rep: u32) -> Result<Self, SettingsError> {
        if !(5..=3600).contains(&default_exercise_secs) {
            return Err(SettingsError::InvalidDefaultExerciseSecs);
        }
        if !(1..=60).contains(&seconds_per_rep) {
            return Err(SettingsError::InvalidSecondsPerRep);
        }
        Ok(Self {
            default_exercise_secs,
            seconds_per_rep,
        })
    }

    #[must_use]
    pub fn default_exercise_secs(&self) -> u32 {
        self.default_exercise_secs
    }

    #[must_use]
    pub fn seconds_per_rep(&self) -> u32 {
        self.seconds_per_rep
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            default_exercise_secs: Self::DEFAULT_EXERCISE_SECS,
            seconds_per_rep: Self::SECONDS_PER_REP,
        }
    }
}
