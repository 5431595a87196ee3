mod achievement;
mod biometrics;
mod exercise;
mod ids;
mod program;
mod progress;
mod settings;
mod streak;

pub use ids::{ExerciseId, ParseIdError, ProgramId, SYNTHETIC_DAY_STRIDE, SYNTHETIC_ID_BASE};

pub use achievement::{Achievement, AchievementSet};
pub use biometrics::{Biometrics, BiometricsError};
pub use exercise::{Exercise, ExerciseError, ExerciseKind, Section};
pub use program::{Day, Program, ProgramError, ProgramKind};
pub use progress::{percent, CompletedSet, DayStatus, ProgressRecord};
pub use settings::{SettingsError, TrackerSettings};
pub use streak::{Streak, StreakChange};
