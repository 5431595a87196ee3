use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// First value of the range reserved for ids assigned during ingestion.
pub const SYNTHETIC_ID_BASE: u64 = 1 << 62;

/// Synthetic ids reserved per day.
pub const SYNTHETIC_DAY_STRIDE: u64 = 1 << 31;

const SYNTHETIC_MAX_DAY: u64 = (1 << 30) - 1;

/// Unique identifier for a Program or Challenge
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramId(u64);

impl ProgramId {
    /// Creates a new `ProgramId`
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Unique identifier for an Exercise, stable across sessions
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExerciseId(u64);

impl ExerciseId {
    /// Creates a new `ExerciseId`
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Id for an exercise that arrived without a usable id.
    ///
    /// Derived from its position so the same program document always yields
    /// the same id.
    #[must_use]
    ///
    /// Each day owns a block of `SYNTHETIC_DAY_STRIDE` ids, so positions
    /// never spill into the next day and every value stays below 2^63.
    pub fn synthetic(day_index: usize, position: usize) -> Self {
        let day = u64::try_from(day_index).map_or(SYNTHETIC_MAX_DAY, |d| d.min(SYNTHETIC_MAX_DAY));
        let pos = u64::try_from(position)
            .map_or(SYNTHETIC_DAY_STRIDE - 1, |p| p.min(SYNTHETIC_DAY_STRIDE - 1));
        Self(SYNTHETIC_ID_BASE + day * SYNTHETIC_DAY_STRIDE + pos)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.0 >= SYNTHETIC_ID_BASE
    }
}

impl fmt::Debug for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgramId({})", self.0)
    }
}

impl fmt::Debug for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExerciseId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for ProgramId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(ProgramId::new)
            .map_err(|_| ParseIdError {
                kind: "ProgramId".to_string(),
            })
    }
}

impl FromStr for ExerciseId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(ExerciseId::new)
            .map_err(|_| ParseIdError {
                kind: "ExerciseId".to_string(),
            })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
