use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Non-revocable badges unlocked by crossing a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Achievement {
    FirstExercise,
    TenExercises,
    SevenDayStreak,
}

impl Achievement {
    pub const ALL: [Achievement; 3] = [
        Achievement::FirstExercise,
        Achievement::TenExercises,
        Achievement::SevenDayStreak,
    ];

    /// Stable wire id.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstExercise => "first_ex",
            Self::TenExercises => "ten_ex",
            Self::SevenDayStreak => "seven_day_streak",
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "first_ex" => Some(Self::FirstExercise),
            "ten_ex" => Some(Self::TenExercises),
            "seven_day_streak" => Some(Self::SevenDayStreak),
            _ => None,
        }
    }

    fn is_earned(self, completed_count: usize, streak: u32) -> bool {
        match self {
            Self::FirstExercise => completed_count >= 1,
            Self::TenExercises => completed_count >= 10,
            Self::SevenDayStreak => streak >= 7,
        }
    }
}

/// Monotonic set of unlocked achievements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AchievementSet(BTreeSet<Achievement>);

impl AchievementSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, achievement: Achievement) -> bool {
        self.0.contains(&achievement)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Achievement> + '_ {
        self.0.iter().copied()
    }

    /// Returns true if the achievement was not unlocked before.
    pub fn unlock(&mut self, achievement: Achievement) -> bool {
        self.0.insert(achievement)
    }

    /// Union with another set; nothing is ever removed.
    pub fn merge(&mut self, other: &AchievementSet) {
        self.0.extend(other.iter());
    }

    /// Unlock everything the aggregate state has earned and return the newly
    /// unlocked achievements in declaration order.
    pub fn evaluate(&mut self, completed_count: usize, streak: u32) -> Vec<Achievement> {
        Achievement::ALL
            .into_iter()
            .filter(|a| a.is_earned(completed_count, streak))
            .filter(|a| self.unlock(*a))
            .collect()
    }
}

impl FromIterator<Achievement> for AchievementSet {
    fn from_iter<T: IntoIterator<Item = Achievement>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
