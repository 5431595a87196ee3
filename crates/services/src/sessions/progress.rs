use fitrack_core::model::DayStatus;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    pub streak: u32,
    pub achievements: usize,
    pub current_day: usize,
    pub current_day_status: DayStatus,
    pub pending_acks: usize,
    pub diverged: bool,
}
