use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Consecutive calendar days with at least one completed exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Streak {
    count: u32,
    last_completed_on: Option<NaiveDate>,
}

/// What recording a completion did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// Already counted today.
    Unchanged,
    /// Last completion was yesterday.
    Extended,
    /// First completion ever, or the chain was broken.
    Restarted,
}

impl Streak {
    #[must_use]
    pub fn from_persisted(count: u32, last_completed_on: Option<NaiveDate>) -> Self {
        Self {
            count,
            last_completed_on,
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn last_completed_on(&self) -> Option<NaiveDate> {
        self.last_completed_on
    }

    /// Register a completion made on `today`.
    pub fn record(&mut self, today: NaiveDate) -> StreakChange {
        let change = match self.last_completed_on {
            Some(last) if last == today => StreakChange::Unchanged,
            Some(last) if last.succ_opt() == Some(today) => StreakChange::Extended,
            _ => StreakChange::Restarted,
        };

        match change {
            StreakChange::Unchanged => {}
            StreakChange::Extended => {
                self.count = self.count.saturating_add(1);
                self.last_completed_on = Some(today);
            }
            StreakChange::Restarted => {
                self.count = 1;
                self.last_completed_on = Some(today);
            }
        }
        change
    }
}
