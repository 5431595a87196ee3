use fitrack_core::model::{ExerciseId, ProgramId, ProgressRecord, TrackerSettings};
use fitrack_core::tracker::Tracker;
use storage::repository::{ProgramRepository, ProgressRepository, StorageError};

use super::service::{PendingAck, PendingReset, WorkoutSession};
use crate::error::TrackerError;

//
// ─── NOTICES ───────────────────────────────────────────────────────────────────
//

/// Non-blocking problem reported next to otherwise usable data.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Progress could not be read; the session starts from an empty record.
    ProgressUnavailable { reason: String },
    /// The program list could not be read; an empty list is shown.
    CatalogUnavailable { reason: String },
    /// A follow-up write failed and is kept for `retry_pending`.
    AcknowledgementPending { ack: PendingAck, reason: String },
    /// A local-only reset was refused again and the backend's completions
    /// were taken back.
    ResetReverted {
        reset: PendingReset,
        restored: Vec<ExerciseId>,
        reason: String,
    },
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::ProgressUnavailable { reason } => {
                format!("progress unavailable, starting fresh: {reason}")
            }
            Self::CatalogUnavailable { reason } => format!("programs unavailable: {reason}"),
            Self::AcknowledgementPending { ack, reason } => {
                format!("{} not saved yet: {reason}", ack.label())
            }
            Self::ResetReverted {
                reset,
                restored,
                reason,
            } => format!(
                "{} was not kept, {} completion(s) restored: {reason}",
                reset.label(),
                restored.len()
            ),
        }
    }
}

/// Data plus the notices collected while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub notices: Vec<Notice>,
}

impl<T> Loaded<T> {
    #[must_use]
    pub fn clean(value: T) -> Self {
        Self {
            value,
            notices: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.notices.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Loaded<U> {
        Loaded {
            value: f(self.value),
            notices: self.notices,
        }
    }
}

//
// ─── QUERIES ───────────────────────────────────────────────────────────────────
//

/// Storage-backed session loading.
pub(crate) struct SessionQueries;

impl SessionQueries {
    /// Progress for a program, degrading to an empty record on read failure.
    pub async fn progress_or_empty(
        program_id: ProgramId,
        progress: &dyn ProgressRepository,
    ) -> Loaded<ProgressRecord> {
        match progress.get_progress(program_id).await {
            Ok(record) => Loaded::clean(record),
            Err(err) => {
                tracing::warn!(%program_id, error = %err, "progress read failed; using empty record");
                Loaded {
                    value: ProgressRecord::empty(program_id),
                    notices: vec![Notice::ProgressUnavailable {
                        reason: err.to_string(),
                    }],
                }
            }
        }
    }

    /// Build a session from the stored program tree and progress.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::ProgramNotFound` for an unknown program and
    /// `TrackerError::Storage` when the program tree cannot be read.
    pub async fn start_from_storage(
        program_id: ProgramId,
        programs: &dyn ProgramRepository,
        progress: &dyn ProgressRepository,
        settings: TrackerSettings,
    ) -> Result<Loaded<WorkoutSession>, TrackerError> {
        let program = match programs.get_program(program_id).await {
            Ok(Some(program)) => program,
            Ok(None) | Err(StorageError::NotFound) => {
                return Err(TrackerError::ProgramNotFound(program_id));
            }
            Err(err) => return Err(err.into()),
        };

        let record = Self::progress_or_empty(program_id, progress).await;
        tracing::info!(
            %program_id,
            days = program.days().len(),
            completed = record.value.completed().len(),
            "session started"
        );
        Ok(record.map(|record| WorkoutSession::new(Tracker::new(program, record, settings))))
    }
}
