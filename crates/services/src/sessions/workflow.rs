use std::sync::Arc;

use fitrack_core::model::{ExerciseId, ProgramId, TrackerSettings};
use fitrack_core::progression::Advance;
use fitrack_core::tracker::{CompletionOutcome, TrackerEvent};
use storage::repository::{
    CompletionRequest, DayCompletionRequest, ProgramRepository, ProgressRepository, StorageError,
};

use super::queries::{Loaded, Notice, SessionQueries};
use super::service::{PendingAck, PendingReset, WorkoutSession};
use crate::Clock;
use crate::error::TrackerError;

/// Result of a persisted completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub outcome: CompletionOutcome,
    /// Follow-up acknowledgements that failed and stay pending.
    pub notices: Vec<Notice>,
}

/// How a reset reacts when the backend refuses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetMode {
    /// Roll back and return the error.
    #[default]
    Synced,
    /// Keep the local reset and mark the session diverged. The reset is
    /// sent again before the next completion.
    ForceLocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    pub removed: usize,
    /// True when the backend did not confirm the reset.
    pub local_only: bool,
}

/// Orchestrates session start and persisted tracking operations.
///
/// Every write is applied locally first, then sent to the backend. A failed
/// primary write restores the session as it was before the call.
#[derive(Clone)]
pub struct TrackerLoopService {
    clock: Clock,
    programs: Arc<dyn ProgramRepository>,
    progress: Arc<dyn ProgressRepository>,
    settings: TrackerSettings,
}

impl TrackerLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        programs: Arc<dyn ProgramRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            programs,
            progress,
            settings: TrackerSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: TrackerSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Start a session for the given program or challenge.
    ///
    /// A failed progress read is reported as a notice and the session starts
    /// from an empty record.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::ProgramNotFound` or `TrackerError::Storage`
    /// when the program tree is unavailable.
    pub async fn start_session(
        &self,
        program_id: ProgramId,
    ) -> Result<Loaded<WorkoutSession>, TrackerError> {
        SessionQueries::start_from_storage(
            program_id,
            self.programs.as_ref(),
            self.progress.as_ref(),
            self.settings,
        )
        .await
    }

    /// Complete the selected exercise and persist it.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Selection` on a rest day and
    /// `TrackerError::Sync` when the backend rejects the completion; the
    /// session is then unchanged.
    pub async fn complete_current(
        &self,
        session: &mut WorkoutSession,
    ) -> Result<CompletionReport, TrackerError> {
        let before = session.clone();
        let outcome = session
            .tracker_mut()
            .complete_current(self.clock.today(), false)?;
        self.persist_completion(session, before, outcome).await
    }

    /// Feed one elapsed second to the countdown; persists the automatic
    /// completion when it expires.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Sync` when the automatic completion cannot be
    /// stored. The session is rolled back and its countdown paused.
    pub async fn tick(
        &self,
        session: &mut WorkoutSession,
    ) -> Result<Option<CompletionReport>, TrackerError> {
        let before = session.clone();
        let Some(outcome) = session.tracker_mut().tick(self.clock.today()) else {
            return Ok(None);
        };
        match self.persist_completion(session, before, outcome).await {
            Ok(report) => Ok(Some(report)),
            Err(err) => {
                session.pause_timer();
                Err(err)
            }
        }
    }

    /// Move on without completing anything. Nothing is sent to the backend.
    pub fn skip(&self, session: &mut WorkoutSession) -> Advance {
        session.tracker_mut().skip()
    }

    /// Clear the current day's completions.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Sync` in `ResetMode::Synced` when the backend
    /// rejects the reset; the session is then unchanged.
    pub async fn reset_day(
        &self,
        session: &mut WorkoutSession,
        mode: ResetMode,
    ) -> Result<ResetReport, TrackerError> {
        let before = session.clone();
        let day_index = session.cursor().day;
        let removed = session.tracker_mut().reset_day();
        session.forget_pending(Some(day_index));

        let reset = PendingReset::Day(day_index);
        let result = self.send_reset(session.program_id(), reset).await;
        settle_reset(session, before, mode, removed, result, reset)
    }

    /// Clear every completion of the program.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Sync` in `ResetMode::Synced` when the backend
    /// rejects the reset; the session is then unchanged.
    pub async fn reset_program(
        &self,
        session: &mut WorkoutSession,
        mode: ResetMode,
    ) -> Result<ResetReport, TrackerError> {
        let before = session.clone();
        let removed = session.tracker_mut().reset_program();
        session.forget_pending(None);

        let result = self
            .send_reset(session.program_id(), PendingReset::Program)
            .await;
        settle_reset(session, before, mode, removed, result, PendingReset::Program)
    }

    /// Send acknowledgements that failed earlier.
    ///
    /// Returns a notice for each one that is still pending.
    pub async fn retry_pending(&self, session: &mut WorkoutSession) -> Vec<Notice> {
        let mut notices = Vec::new();
        for ack in session.take_pending() {
            if let Err(err) = self.send_ack(session, ack).await {
                tracing::warn!(
                    program_id = %session.program_id(),
                    ack = ack.label(),
                    error = %err,
                    "acknowledgement kept pending"
                );
                notices.push(Notice::AcknowledgementPending {
                    ack,
                    reason: err.to_string(),
                });
                session.queue(ack);
            }
        }
        notices
    }

    /// Replace local progress with the backend's snapshot.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Storage` if progress cannot be read.
    pub async fn refresh(&self, session: &mut WorkoutSession) -> Result<(), TrackerError> {
        let snapshot = self.progress.get_progress(session.program_id()).await?;
        session.tracker_mut().adopt_snapshot(&snapshot);
        session.take_resets();
        Ok(())
    }

    async fn persist_completion(
        &self,
        session: &mut WorkoutSession,
        before: WorkoutSession,
        outcome: CompletionOutcome,
    ) -> Result<CompletionReport, TrackerError> {
        if !outcome.inserted {
            return Ok(CompletionReport {
                outcome,
                notices: Vec::new(),
            });
        }

        let program_id = session.program_id();
        let completed_at = self.clock.now();
        let day_index = outcome
            .events
            .iter()
            .find_map(|e| match e {
                TrackerEvent::ExerciseCompleted { day, .. } => Some(*day),
                _ => None,
            })
            .unwrap_or(before.cursor().day);

        let unsent_reset = self.resend_resets(session).await;
        let request = CompletionRequest {
            program_id,
            day_index,
            exercise_id: outcome.exercise_id,
            completed_at,
        };
        let restored: Vec<ExerciseId> = match self.progress.complete_exercise(&request).await {
            Ok(snapshot) => {
                let local = session.progress().completed().clone();
                session.tracker_mut().adopt_snapshot(&snapshot);
                session.take_resets();
                snapshot
                    .completed()
                    .iter()
                    .filter(|id| !local.contains(*id))
                    .collect()
            }
            Err(err) => {
                tracing::warn!(
                    %program_id,
                    exercise_id = %outcome.exercise_id,
                    error = %err,
                    "completion rejected; rolled back"
                );
                *session = before;
                return Err(TrackerError::sync("complete exercise", err));
            }
        };
        tracing::info!(
            %program_id,
            exercise_id = %outcome.exercise_id,
            day = day_index,
            percent = outcome.percent,
            "exercise completed"
        );

        if let Some(day) = outcome.day_completed() {
            let biometrics = session.take_readings();
            session.queue(PendingAck::DayCompleted {
                day_index: day,
                biometrics,
                at: completed_at,
            });
        }
        if outcome.program_completed() {
            session.queue(PendingAck::ProgramCompleted { at: completed_at });
        }

        let mut notices = Vec::new();
        if let Some((reset, reason)) = unsent_reset {
            tracing::warn!(
                %program_id,
                reset = reset.label(),
                restored = restored.len(),
                "local-only reset replaced by the backend snapshot"
            );
            notices.push(Notice::ResetReverted {
                reset,
                restored,
                reason,
            });
        }
        notices.extend(self.retry_pending(session).await);
        Ok(CompletionReport { outcome, notices })
    }

    async fn send_reset(
        &self,
        program_id: ProgramId,
        reset: PendingReset,
    ) -> Result<(), StorageError> {
        match reset {
            PendingReset::Day(day_index) => self.progress.reset_day(program_id, day_index).await,
            PendingReset::Program => self.progress.reset_program(program_id).await,
        }
    }

    /// Send local-only resets again, stopping at the first refusal.
    ///
    /// Returns the refused reset with the backend's reason. Resets after it
    /// are not attempted.
    async fn resend_resets(
        &self,
        session: &mut WorkoutSession,
    ) -> Option<(PendingReset, String)> {
        let program_id = session.program_id();
        for reset in session.take_resets() {
            match self.send_reset(program_id, reset).await {
                Ok(()) => {
                    tracing::info!(%program_id, reset = reset.label(), "local-only reset stored");
                }
                Err(err) => return Some((reset, err.to_string())),
            }
        }
        None
    }

    async fn send_ack(
        &self,
        session: &mut WorkoutSession,
        ack: PendingAck,
    ) -> Result<(), StorageError> {
        let program_id = session.program_id();
        match ack {
            PendingAck::DayCompleted {
                day_index,
                biometrics,
                at,
            } => {
                let streak = self
                    .progress
                    .complete_day(&DayCompletionRequest {
                        program_id,
                        day_index,
                        biometrics,
                        completed_at: at,
                    })
                    .await?;
                tracing::info!(%program_id, day = day_index, streak = streak.count(), "day completed");
            }
            PendingAck::ProgramCompleted { at } => {
                self.progress.mark_program_complete(program_id, at).await?;
                session.tracker_mut().mark_program_acknowledged();
                tracing::info!(%program_id, "program completed");
            }
        }
        Ok(())
    }
}

fn settle_reset(
    session: &mut WorkoutSession,
    before: WorkoutSession,
    mode: ResetMode,
    removed: usize,
    result: Result<(), StorageError>,
    reset: PendingReset,
) -> Result<ResetReport, TrackerError> {
    let program_id = session.program_id();
    let operation = reset.label();
    match (result, mode) {
        (Ok(()), _) => {
            tracing::info!(%program_id, removed, operation, "reset stored");
            session.settle_resets(reset);
            Ok(ResetReport {
                removed,
                local_only: false,
            })
        }
        (Err(err), ResetMode::ForceLocal) => {
            tracing::warn!(%program_id, error = %err, operation, "keeping local-only reset");
            session.keep_reset(reset);
            Ok(ResetReport {
                removed,
                local_only: true,
            })
        }
        (Err(err), ResetMode::Synced) => {
            tracing::warn!(%program_id, error = %err, operation, "reset rejected; rolled back");
            *session = before;
            Err(TrackerError::sync(operation, err))
        }
    }
}
